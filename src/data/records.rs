//! Typed row-major storage shared by the attribute and target sides of a
//! resource.

use std::io::{self, Read, Write};

use super::model::ElementType;
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Values – one contiguous typed buffer
// ---------------------------------------------------------------------------

/// A contiguous buffer of `f32` or `f64` values.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl Values {
    /// Empty buffer of the given type.
    pub fn empty(ty: ElementType) -> Self {
        match ty {
            ElementType::Float => Values::Float(Vec::new()),
            ElementType::Double => Values::Double(Vec::new()),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Values::Float(_) => ElementType::Float,
            Values::Double(_) => ElementType::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Values::Float(v) => v.len(),
            Values::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `[start, end)` out as `f64`.
    pub fn to_f64(&self, start: usize, end: usize) -> Vec<f64> {
        match self {
            Values::Float(v) => v[start..end].iter().map(|x| f64::from(*x)).collect(),
            Values::Double(v) => v[start..end].to_vec(),
        }
    }

    /// Overwrite the values starting at `start`.
    fn store(&mut self, start: usize, values: &[f64]) {
        match self {
            Values::Float(v) => {
                for (dst, src) in v[start..start + values.len()].iter_mut().zip(values) {
                    *dst = *src as f32;
                }
            }
            Values::Double(v) => v[start..start + values.len()].copy_from_slice(values),
        }
    }

    fn gather_rows(&self, rows: &[usize], width: usize) -> Self {
        match self {
            Values::Float(v) => Values::Float(gather(v, rows, width)),
            Values::Double(v) => Values::Double(gather(v, rows, width)),
        }
    }

    fn retain_rows(&mut self, keep: &[bool], width: usize) {
        match self {
            Values::Float(v) => *v = retain(v, keep, width),
            Values::Double(v) => *v = retain(v, keep, width),
        }
    }

    fn slice(&self, start: usize, end: usize) -> Self {
        match self {
            Values::Float(v) => Values::Float(v[start..end].to_vec()),
            Values::Double(v) => Values::Double(v[start..end].to_vec()),
        }
    }

    fn extend(&mut self, other: &Values) -> Result<()> {
        match (self, other) {
            (Values::Float(a), Values::Float(b)) => a.extend_from_slice(b),
            (Values::Double(a), Values::Double(b)) => a.extend_from_slice(b),
            (a, b) => {
                return Err(DatasetError::precondition(format!(
                    "cannot append {} values to {} values",
                    b.element_type(),
                    a.element_type()
                )))
            }
        }
        Ok(())
    }

    /// Cast to another element type. `f64 -> f32` loses precision.
    pub fn cast(&self, ty: ElementType) -> Self {
        match (self, ty) {
            (Values::Float(v), ElementType::Double) => {
                Values::Double(v.iter().map(|x| f64::from(*x)).collect())
            }
            (Values::Double(v), ElementType::Float) => {
                Values::Float(v.iter().map(|x| *x as f32).collect())
            }
            (same, _) => same.clone(),
        }
    }

    /// Write every value little-endian.
    pub fn write_le<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        let mut buf = Vec::with_capacity(self.len() * self.element_type().size());
        match self {
            Values::Float(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_le_bytes())),
            Values::Double(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_le_bytes())),
        }
        writer.write_all(&buf)
    }

    /// Read `count` little-endian values of type `ty`.
    ///
    /// The buffer grows with the bytes actually read, so a bogus `count`
    /// fails with `UnexpectedEof` instead of allocating up front.
    pub fn read_le<R: Read + ?Sized>(reader: &mut R, ty: ElementType, count: usize) -> std::io::Result<Self> {
        let len = count
            .checked_mul(ty.size())
            .and_then(|len| u64::try_from(len).ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "value count overflows"))?;
        let mut buf = Vec::new();
        Read::take(&mut *reader, len).read_to_end(&mut buf)?;
        if buf.len() as u64 != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {len} bytes of values, got {}", buf.len()),
            ));
        }
        Ok(match ty {
            ElementType::Float => Values::Float(
                buf.chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            ElementType::Double => Values::Double(
                buf.chunks_exact(8)
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
        })
    }
}

fn gather<T: Copy>(data: &[T], rows: &[usize], width: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(rows.len() * width);
    for &row in rows {
        out.extend_from_slice(&data[row * width..(row + 1) * width]);
    }
    out
}

fn retain<T: Copy>(data: &[T], keep: &[bool], width: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(data.len());
    for (row, chunk) in data.chunks_exact(width.max(1)).enumerate() {
        if keep[row] {
            out.extend_from_slice(chunk);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Records – rows of fixed width, replicated over depth levels
// ---------------------------------------------------------------------------

/// Fixed-width rows stored once per depth level.
///
/// Depth 1 is plain data; [`Records::repeat`] stacks identical levels. Every
/// row operation applies to all levels, so levels never drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Records {
    width: usize,
    levels: Vec<Values>,
}

impl Records {
    /// No rows, unknown width.
    pub fn empty(ty: ElementType) -> Self {
        Records {
            width: 0,
            levels: vec![Values::empty(ty)],
        }
    }

    /// Single-level records from a flat buffer.
    pub fn new(width: usize, values: Values) -> Result<Self> {
        Self::with_levels(width, vec![values])
    }

    /// Records from explicit levels; all levels must agree in type and length.
    pub fn with_levels(width: usize, levels: Vec<Values>) -> Result<Self> {
        let first = levels
            .first()
            .ok_or_else(|| DatasetError::precondition("records need at least one level"))?;
        if width == 0 && !first.is_empty() {
            return Err(DatasetError::precondition("zero-width rows cannot hold values"));
        }
        if width > 0 && first.len() % width != 0 {
            return Err(DatasetError::precondition(format!(
                "{} values do not divide into rows of width {width}",
                first.len()
            )));
        }
        let (len, ty) = (first.len(), first.element_type());
        if levels.iter().any(|l| l.len() != len || l.element_type() != ty) {
            return Err(DatasetError::precondition("depth levels differ in length or type"));
        }
        Ok(Records { width, levels })
    }

    /// `f64` records from nested rows; every row must have the same width.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        let mut flat = Vec::with_capacity(rows.len() * width);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(DatasetError::precondition(format!(
                    "row {i} has {} values, expected {width}",
                    row.len()
                )));
            }
            flat.extend_from_slice(row);
        }
        Self::new(width, Values::Double(flat))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.levels[0].len() / self.width
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values per row in one level.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of replicated levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn element_type(&self) -> ElementType {
        self.levels[0].element_type()
    }

    pub fn levels(&self) -> &[Values] {
        &self.levels
    }

    /// Row `i` of the first level.
    pub fn row(&self, i: usize) -> Vec<f64> {
        self.levels[0].to_f64(i * self.width, (i + 1) * self.width)
    }

    /// Row `i` of every level, concatenated.
    pub fn record(&self, i: usize) -> Vec<f64> {
        let (start, end) = (i * self.width, (i + 1) * self.width);
        self.levels.iter().flat_map(|l| l.to_f64(start, end)).collect()
    }

    /// Overwrite row `i` in every level from a concatenated record.
    pub fn set_record(&mut self, i: usize, values: &[f64]) -> Result<()> {
        if values.len() != self.width * self.depth() {
            return Err(DatasetError::precondition(format!(
                "record has {} values, expected {} x {}",
                values.len(),
                self.width,
                self.depth()
            )));
        }
        for (level, chunk) in self.levels.iter_mut().zip(values.chunks_exact(self.width.max(1))) {
            level.store(i * self.width, chunk);
        }
        Ok(())
    }

    /// Copy the given rows, in the given order.
    pub fn select(&self, rows: &[usize]) -> Self {
        Records {
            width: self.width,
            levels: self.levels.iter().map(|l| l.gather_rows(rows, self.width)).collect(),
        }
    }

    /// Drop every row whose `keep` flag is false.
    pub fn retain(&mut self, keep: &[bool]) {
        let width = self.width;
        self.levels.iter_mut().for_each(|l| l.retain_rows(keep, width));
    }

    /// Copy of rows `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        Records {
            width: self.width,
            levels: self
                .levels
                .iter()
                .map(|l| l.slice(start * self.width, end * self.width))
                .collect(),
        }
    }

    /// Append the rows of `other`. Empty records adopt `other` wholesale.
    pub fn append(&mut self, other: Records) -> Result<()> {
        if self.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.is_empty() {
            return Ok(());
        }
        if self.width != other.width || self.depth() != other.depth() {
            return Err(DatasetError::precondition(format!(
                "cannot append rows of width {} x depth {} to width {} x depth {}",
                other.width,
                other.depth(),
                self.width,
                self.depth()
            )));
        }
        for (dst, src) in self.levels.iter_mut().zip(other.levels.iter()) {
            dst.extend(src)?;
        }
        Ok(())
    }

    /// Stack `depth` copies of the current levels.
    pub fn repeat(&mut self, depth: usize) {
        let levels = std::mem::take(&mut self.levels);
        self.levels = (0..depth).flat_map(|_| levels.iter().cloned()).collect();
    }

    /// Cast every level.
    pub fn cast(&mut self, ty: ElementType) {
        self.levels = self.levels.iter().map(|l| l.cast(ty)).collect();
    }

    /// Serialized size of every level.
    pub fn byte_len(&self) -> usize {
        self.levels.iter().map(Values::len).sum::<usize>() * self.element_type().size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize, width: usize) -> Records {
        let data: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..width).map(|j| (i * 10 + j) as f64).collect())
            .collect();
        Records::from_rows(&data).unwrap()
    }

    #[test]
    fn from_rows_rejects_ragged() {
        let err = Records::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, DatasetError::Precondition(_)));
    }

    #[test]
    fn select_and_retain() {
        let r = rows(4, 2);
        let picked = r.select(&[3, 1]);
        assert_eq!(picked.row(0), vec![30.0, 31.0]);
        assert_eq!(picked.row(1), vec![10.0, 11.0]);

        let mut kept = r.clone();
        kept.retain(&[true, false, true, false]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.row(1), vec![20.0, 21.0]);
    }

    #[test]
    fn repeat_keeps_levels_in_sync() {
        let mut r = rows(3, 2);
        r.repeat(3);
        assert_eq!(r.depth(), 3);
        assert_eq!(r.len(), 3);
        assert_eq!(r.record(1), vec![10.0, 11.0, 10.0, 11.0, 10.0, 11.0]);

        r.retain(&[true, false, true]);
        assert_eq!(r.len(), 2);
        assert!(r.levels().iter().all(|l| l.len() == 4));
    }

    #[test]
    fn append_to_empty_adopts_other() {
        let mut empty = Records::empty(ElementType::Double);
        empty.append(rows(2, 3)).unwrap();
        assert_eq!(empty.width(), 3);
        assert_eq!(empty.len(), 2);
    }

    #[test]
    fn append_rejects_width_mismatch() {
        let mut a = rows(2, 3);
        assert!(a.append(rows(2, 4)).is_err());
    }

    #[test]
    fn cast_roundtrip_is_close() {
        let mut r = Records::from_rows(&[vec![0.1, 1.0 / 3.0]]).unwrap();
        r.cast(ElementType::Float);
        assert_eq!(r.element_type(), ElementType::Float);
        r.cast(ElementType::Double);
        let row = r.row(0);
        assert!((row[0] - 0.1).abs() < 1e-6);
        assert!((row[1] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn write_read_le() {
        let values = Values::Float(vec![1.5, -2.25, 3.0]);
        let mut buf = Vec::new();
        values.write_le(&mut buf).unwrap();
        assert_eq!(buf.len(), 12);
        let back = Values::read_le(&mut buf.as_slice(), ElementType::Float, 3).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn read_le_rejects_bogus_counts() {
        let bytes = [0u8; 12];
        let err = Values::read_le(&mut bytes.as_slice(), ElementType::Double, 1 << 40).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let err = Values::read_le(&mut bytes.as_slice(), ElementType::Double, usize::MAX).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn byte_len_counts_levels() {
        let mut r = rows(5, 2);
        assert_eq!(r.byte_len(), 5 * 2 * 8);
        r.repeat(2);
        r.cast(ElementType::Float);
        assert_eq!(r.byte_len(), 2 * 5 * 2 * 4);
    }
}
