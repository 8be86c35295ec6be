//! Build recipes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::loader::LoadOptions;
use crate::data::ElementType;
use crate::error::Result;
use crate::format::{FormatVersion, WriterOptions};
use crate::pipeline::{Pipeline, Transform};

/// Everything needed to turn a source file into a container.
///
/// # Example
///
/// ```
/// use denn_db::config::Recipe;
/// use denn_db::format::FormatVersion;
///
/// let recipe: Recipe = serde_json::from_str(r#"{
///     "version": 1,
///     "out_type": "float",
///     "seed": 7,
///     "steps": [
///         { "op": "simple_shuffle", "target": "train" },
///         { "op": "extract_to", "from": "train", "to": "validation", "amount": 2000 },
///         { "op": "split", "target": "train", "batch_size": 1000 }
///     ]
/// }"#).unwrap();
/// assert_eq!(recipe.version, FormatVersion::V1);
/// assert_eq!(recipe.steps.len(), 3);
/// assert!(!recipe.save_stats);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recipe {
    /// Container format version.
    pub version: FormatVersion,

    /// Element type of the written data.
    pub out_type: ElementType,

    /// Seed for every randomized step; entropy when unset.
    pub seed: Option<u64>,

    /// How the source file is parsed.
    pub input: LoadOptions,

    /// Transformations, in order.
    pub steps: Vec<Transform>,

    /// Write `<output>.stat.json` next to the container.
    pub save_stats: bool,
}

impl Default for Recipe {
    fn default() -> Self {
        Self {
            version: FormatVersion::V1,
            out_type: ElementType::Float,
            seed: None,
            input: LoadOptions::default(),
            steps: Vec::new(),
            save_stats: false,
        }
    }
}

impl Recipe {
    /// Read a JSON recipe.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The steps with a final cast to `out_type` unless the recipe ends with one.
    pub fn pipeline(&self) -> Result<Pipeline> {
        let mut steps = self.steps.clone();
        let cast = Transform::ConvertType {
            out_type: self.out_type,
        };
        if steps.last() != Some(&cast) {
            steps.push(cast);
        }
        Pipeline::new(steps, self.seed)
    }

    /// Header options; a seed beyond `i32` is recorded as unknown.
    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            version: self.version,
            seed: self
                .seed
                .and_then(|s| i32::try_from(s).ok())
                .unwrap_or(-1),
            ..WriterOptions::default()
        }
    }
}
