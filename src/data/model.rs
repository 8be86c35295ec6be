use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// ElementType – numeric type of every value in a resource
// ---------------------------------------------------------------------------

/// Floating point type of the stored values.
///
/// The discriminant doubles as the `type` tag written into container headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// 32-bit float, header tag 1.
    Float,
    /// 64-bit float, header tag 2.
    Double,
}

impl ElementType {
    /// Header tag for this type.
    pub const fn tag(self) -> i32 {
        match self {
            ElementType::Float => 1,
            ElementType::Double => 2,
        }
    }

    /// Inverse of [`ElementType::tag`].
    pub const fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            1 => Some(ElementType::Float),
            2 => Some(ElementType::Double),
            _ => None,
        }
    }

    /// Size of one value in bytes.
    pub const fn size(self) -> usize {
        match self {
            ElementType::Float => 4,
            ElementType::Double => 8,
        }
    }
}

impl FromStr for ElementType {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "float" | "float32" => Ok(ElementType::Float),
            "double" | "float64" => Ok(ElementType::Double),
            other => Err(DatasetError::invalid_type(other)),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Float => write!(f, "float"),
            ElementType::Double => write!(f, "double"),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordField – which side of a resource an operation touches
// ---------------------------------------------------------------------------

/// Selects the attribute or the target side of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordField {
    /// Feature vectors.
    #[default]
    Attributes,
    /// Label vectors or scalars.
    #[serde(alias = "outputs")]
    Targets,
}

impl FromStr for RecordField {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "attributes" => Ok(RecordField::Attributes),
            "targets" | "outputs" => Ok(RecordField::Targets),
            other => Err(DatasetError::invalid_target(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// ClassLabel – class identity derived from a target row
// ---------------------------------------------------------------------------

/// Class of a record: the argmax index of a multi-valued target, otherwise
/// the raw scalar.
///
/// Wraps an `f64` so scalar regression-style targets keep their value. Used
/// as a `BTreeMap` key, hence the manual `Eq`/`Ord` via `total_cmp`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassLabel(f64);

impl ClassLabel {
    /// Build a label from a class index.
    pub fn new(value: f64) -> Self {
        ClassLabel(value)
    }

    /// Derive the label of one target row.
    pub fn from_target(row: &[f64]) -> Result<Self> {
        match row {
            [] => Err(DatasetError::precondition("target row is empty")),
            [scalar] => Ok(ClassLabel(*scalar)),
            values => {
                // First maximum wins on ties.
                let mut best = 0;
                for (i, v) in values.iter().enumerate().skip(1) {
                    if *v > values[best] {
                        best = i;
                    }
                }
                Ok(ClassLabel(best as f64))
            }
        }
    }

    /// Underlying value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for ClassLabel {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for ClassLabel {}

impl PartialOrd for ClassLabel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassLabel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::hash::Hash for ClassLabel {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ClassLabel> for String {
    fn from(label: ClassLabel) -> Self {
        label.to_string()
    }
}

impl TryFrom<String> for ClassLabel {
    type Error = std::num::ParseFloatError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.trim().parse::<f64>().map(ClassLabel)
    }
}

// ---------------------------------------------------------------------------
// Record – one (attributes, targets) pair, detached from its resource
// ---------------------------------------------------------------------------

/// A single record copied out of a resource.
///
/// Values are widened to `f64`; every depth level is concatenated in order,
/// so `attributes.len() == width * depth`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Attribute values across all depth levels.
    pub attributes: Vec<f64>,
    /// Target values across all depth levels.
    pub targets: Vec<f64>,
}

impl Record {
    /// Class of this record (first target level).
    pub fn class(&self, target_width: usize) -> Result<ClassLabel> {
        let end = target_width.min(self.targets.len());
        ClassLabel::from_target(&self.targets[..end])
    }
}
