//! Named fixed-width binary headers.
//!
//! A [`Layout`] lists field names and kinds in packing order; a [`Header`]
//! pairs a layout with one value per field and keeps the packed image in
//! sync. All fields are little-endian with no padding.
//!
//! ```text
//! Offset  Size  Field              Kind
//! ------  ----  -----------------  ----
//! 0       2     version            u16
//! 2       4     n_batch            i32
//! 6       4     n_features         i32
//! 10      4     n_classes          i32
//! 14      4     type               i32   (1 = float, 2 = double)
//! 18      4     seed               i32
//! 22      4     train_percentage   f32
//! 26      4     test_offset        u32
//! 30      4     validation_offset  u32
//! 34      4     train_offset       u32
//! ```

use std::fmt;

use crate::error::{DatasetError, Result};

/// Packed size of [`Layout::container`].
pub const CONTAINER_HEADER_SIZE: usize = 38;

// ---------------------------------------------------------------------------
// Field kinds and values
// ---------------------------------------------------------------------------

/// Binary kind of one header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U16,
    I32,
    U32,
    F32,
}

impl FieldKind {
    /// Packed width in bytes.
    pub const fn width(self) -> usize {
        match self {
            FieldKind::U16 => 2,
            FieldKind::I32 | FieldKind::U32 | FieldKind::F32 => 4,
        }
    }
}

/// A typed header value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    U16(u16),
    I32(i32),
    U32(u32),
    F32(f32),
}

impl FieldValue {
    pub const fn kind(self) -> FieldKind {
        match self {
            FieldValue::U16(_) => FieldKind::U16,
            FieldValue::I32(_) => FieldKind::I32,
            FieldValue::U32(_) => FieldKind::U32,
            FieldValue::F32(_) => FieldKind::F32,
        }
    }

    /// Integer view; `None` for floats.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            FieldValue::U16(v) => Some(i64::from(v)),
            FieldValue::I32(v) => Some(i64::from(v)),
            FieldValue::U32(v) => Some(i64::from(v)),
            FieldValue::F32(_) => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            FieldValue::F32(v) => f64::from(v),
            other => other.as_i64().map_or(0.0, |v| v as f64),
        }
    }

    /// Convert to `kind`, failing when the value does not fit.
    pub fn coerce(self, kind: FieldKind) -> Result<FieldValue> {
        if self.kind() == kind {
            return Ok(self);
        }
        let out_of_range = || {
            DatasetError::precondition(format!("value {self:?} does not fit a {kind:?} field"))
        };
        match (kind, self.as_i64()) {
            (FieldKind::F32, _) => Ok(FieldValue::F32(self.as_f64() as f32)),
            (_, None) => Err(out_of_range()),
            (FieldKind::U16, Some(v)) => u16::try_from(v).map(FieldValue::U16).map_err(|_| out_of_range()),
            (FieldKind::I32, Some(v)) => i32::try_from(v).map(FieldValue::I32).map_err(|_| out_of_range()),
            (FieldKind::U32, Some(v)) => u32::try_from(v).map(FieldValue::U32).map_err(|_| out_of_range()),
        }
    }

    fn write(self, buf: &mut Vec<u8>) {
        match self {
            FieldValue::U16(v) => buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::I32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::U32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::F32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        }
    }

    fn read(kind: FieldKind, b: &[u8]) -> FieldValue {
        match kind {
            FieldKind::U16 => FieldValue::U16(u16::from_le_bytes([b[0], b[1]])),
            FieldKind::I32 => FieldValue::I32(i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            FieldKind::U32 => FieldValue::U32(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            FieldKind::F32 => FieldValue::F32(f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::U16(v) => write!(f, "{v}"),
            FieldValue::I32(v) => write!(f, "{v}"),
            FieldValue::U32(v) => write!(f, "{v}"),
            FieldValue::F32(v) => write!(f, "{v}"),
        }
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        FieldValue::U16(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::I32(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::U32(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::F32(v)
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Field names and kinds in packing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    fields: Vec<(&'static str, FieldKind)>,
}

impl Layout {
    pub fn new(fields: Vec<(&'static str, FieldKind)>) -> Self {
        Layout { fields }
    }

    /// The 38-byte container header.
    pub fn container() -> Self {
        Layout::new(vec![
            ("version", FieldKind::U16),
            ("n_batch", FieldKind::I32),
            ("n_features", FieldKind::I32),
            ("n_classes", FieldKind::I32),
            ("type", FieldKind::I32),
            ("seed", FieldKind::I32),
            ("train_percentage", FieldKind::F32),
            ("test_offset", FieldKind::U32),
            ("validation_offset", FieldKind::U32),
            ("train_offset", FieldKind::U32),
        ])
    }

    /// Packed size in bytes.
    pub fn byte_length(&self) -> usize {
        self.fields.iter().map(|(_, kind)| kind.width()).sum()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|(n, _)| *n == name)
            .ok_or_else(|| DatasetError::unknown_field(name))
    }

    /// Pack one value per field, in layout order.
    pub fn encode(&self, values: &[FieldValue]) -> Result<Vec<u8>> {
        if values.len() != self.fields.len() {
            return Err(DatasetError::precondition(format!(
                "layout has {} fields, got {} values",
                self.fields.len(),
                values.len()
            )));
        }
        let mut buf = Vec::with_capacity(self.byte_length());
        for ((_, kind), value) in self.fields.iter().zip(values) {
            value.coerce(*kind)?.write(&mut buf);
        }
        Ok(buf)
    }

    /// Unpack a header image.
    pub fn decode(&self, bytes: &[u8]) -> Result<Header> {
        if bytes.len() != self.byte_length() {
            return Err(DatasetError::corrupt(format!(
                "header needs {} bytes, got {}",
                self.byte_length(),
                bytes.len()
            )));
        }
        let mut values = Vec::with_capacity(self.fields.len());
        let mut offset = 0;
        for (_, kind) in &self.fields {
            values.push(FieldValue::read(*kind, &bytes[offset..offset + kind.width()]));
            offset += kind.width();
        }
        Ok(Header {
            layout: self.clone(),
            values,
            binary: bytes.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Named field values plus their packed image.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    layout: Layout,
    values: Vec<FieldValue>,
    binary: Vec<u8>,
}

impl Header {
    /// Build from `(name, value)` pairs that must follow the layout order.
    pub fn new(layout: Layout, fields: &[(&str, FieldValue)]) -> Result<Self> {
        for ((expected, _), (name, _)) in layout.fields.iter().zip(fields) {
            if expected != name {
                return Err(DatasetError::unknown_field(*name));
            }
        }
        let values: Vec<FieldValue> = fields.iter().map(|(_, v)| *v).collect();
        let binary = layout.encode(&values)?;
        let values = layout
            .fields
            .iter()
            .zip(values)
            .map(|((_, kind), v)| v.coerce(*kind))
            .collect::<Result<Vec<_>>>()?;
        Ok(Header {
            layout,
            values,
            binary,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Packed image.
    pub fn binary(&self) -> &[u8] {
        &self.binary
    }

    /// Packed size in bytes.
    pub fn byte_length(&self) -> usize {
        self.layout.byte_length()
    }

    pub fn get(&self, name: &str) -> Result<FieldValue> {
        Ok(self.values[self.layout.position(name)?])
    }

    /// Integer field as `u64`; negative values are rejected.
    pub fn get_u64(&self, name: &str) -> Result<u64> {
        let value = self.get(name)?;
        value
            .as_i64()
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| DatasetError::corrupt(format!("field '{name}' holds {value}")))
    }

    /// Replace one field and re-pack the whole image.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<FieldValue> {
        let position = self.layout.position(name)?;
        let value = value.into().coerce(self.layout.fields[position].1)?;
        self.values[position] = value;
        self.binary = self.layout.encode(&self.values)?;
        Ok(value)
    }

    /// `(name, value)` pairs in layout order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, FieldValue)> + '_ {
        self.layout.names().zip(self.values.iter().copied())
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const WIDTH: usize = 42;
        let rule = format!("+{}+", "-".repeat(WIDTH - 2));
        writeln!(f, "{:-<width$}+", "+----------- HEADER ", width = WIDTH - 1)?;
        for (name, value) in self.fields() {
            writeln!(f, "{:<width$}|", format!("| {name}: {value}"), width = WIDTH - 1)?;
        }
        writeln!(f, "{rule}")?;
        for chunk in self.binary.chunks(8) {
            let hex: Vec<String> = chunk
                .chunks(2)
                .map(|pair| pair.iter().map(|b| format!("{b:02x}")).collect())
                .collect();
            writeln!(f, "{:<width$}|", format!("| {}", hex.join(" ")), width = WIDTH - 1)?;
        }
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header::new(
            Layout::container(),
            &[
                ("version", FieldValue::U16(3)),
                ("n_batch", FieldValue::I32(12)),
                ("n_features", FieldValue::I32(784)),
                ("n_classes", FieldValue::I32(10)),
                ("type", FieldValue::I32(1)),
                ("seed", FieldValue::I32(-1)),
                ("train_percentage", FieldValue::F32(-1.0)),
                ("test_offset", FieldValue::U32(0)),
                ("validation_offset", FieldValue::U32(0)),
                ("train_offset", FieldValue::U32(0)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn container_layout_is_38_bytes() {
        assert_eq!(Layout::container().byte_length(), CONTAINER_HEADER_SIZE);
        assert_eq!(sample().binary().len(), CONTAINER_HEADER_SIZE);
    }

    #[test]
    fn header_roundtrip() {
        let header = sample();
        let decoded = Layout::container().decode(header.binary()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.get("n_features").unwrap(), FieldValue::I32(784));
        assert_eq!(decoded.get("seed").unwrap(), FieldValue::I32(-1));
    }

    #[test]
    fn packing_is_little_endian() {
        let header = sample();
        let bytes = header.binary();
        assert_eq!(&bytes[0..2], &[3, 0]);
        assert_eq!(&bytes[6..10], &784i32.to_le_bytes());
        assert_eq!(&bytes[22..26], &(-1.0f32).to_le_bytes());
    }

    #[test]
    fn set_repacks_image() {
        let mut header = sample();
        header.set("train_offset", 4242u32).unwrap();
        assert_eq!(&header.binary()[34..38], &4242u32.to_le_bytes());
        // integer values coerce into the declared kind
        header.set("test_offset", 38i32).unwrap();
        assert_eq!(header.get("test_offset").unwrap(), FieldValue::U32(38));
    }

    #[test]
    fn set_unknown_field_fails() {
        let mut header = sample();
        let err = header.set("n_rows", 1u32).unwrap_err();
        assert!(matches!(err, DatasetError::UnknownField(_)));
        assert_eq!(header, sample());
    }

    #[test]
    fn set_out_of_range_fails() {
        let mut header = sample();
        assert!(header.set("test_offset", -5i32).is_err());
        assert!(header.set("version", 70_000u32).is_err());
    }

    #[test]
    fn decode_rejects_short_input() {
        let err = Layout::container().decode(&[0u8; 20]).unwrap_err();
        assert!(matches!(err, DatasetError::Corrupt(_)));
    }

    #[test]
    fn new_rejects_out_of_order_fields() {
        let layout = Layout::new(vec![("a", FieldKind::U16), ("b", FieldKind::I32)]);
        let err = Header::new(layout, &[("b", 1i32.into()), ("a", 1u16.into())]).unwrap_err();
        assert!(matches!(err, DatasetError::UnknownField(_)));
    }

    #[test]
    fn display_lists_fields() {
        let text = sample().to_string();
        assert!(text.contains("| n_features: 784"));
        assert!(text.contains("HEADER"));
    }
}
