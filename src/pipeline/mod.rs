//! Ordered dataset transformations.
//!
//! A [`Pipeline`] is a validated list of [`Transform`] steps plus one seeded
//! random generator shared by every randomized step, so a fixed seed
//! reproduces the whole run.

pub mod balance;
pub mod ops;

use std::fmt;

use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::data::{Dataset, ElementType, RecordField, Split};
use crate::error::{DatasetError, Result};
use crate::stats::ClassStats;

pub use balance::{extract_to_with_class_ratio, BalanceOptions, BalanceReport};
pub use ops::ExtractSummary;

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// How many records an extraction takes: an exact count or a fraction of the
/// source split. Integers deserialize as counts, decimals as fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Count(usize),
    Fraction(f64),
}

impl Amount {
    fn check(self) -> Result<()> {
        match self {
            Amount::Fraction(f) if !(0.0..=1.0).contains(&f) => Err(DatasetError::invalid_parameters(
                format!("fraction {f} outside [0, 1]"),
            )),
            _ => Ok(()),
        }
    }

    /// Record count against a source of `available` records.
    pub fn resolve(self, available: usize) -> Result<usize> {
        self.check()?;
        let count = match self {
            Amount::Count(n) => n,
            Amount::Fraction(f) => (available as f64 * f).floor() as usize,
        };
        if count > available {
            return Err(DatasetError::invalid_parameters(format!(
                "cannot take {count} records from {available}"
            )));
        }
        Ok(count)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Count(n) => write!(f, "{n}"),
            Amount::Fraction(x) => write!(f, "{}%", x * 100.0),
        }
    }
}

fn default_tolerance() -> f64 {
    balance::DEFAULT_TOLERANCE
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// One pipeline step, as written in a recipe:
///
/// ```json
/// { "op": "extract_to", "from": "train", "to": "validation", "amount": 0.1 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    SimpleShuffle {
        #[serde(default)]
        target: Option<Split>,
    },
    MergeResources {
        target: Split,
    },
    ExtractTo {
        from: Split,
        to: Split,
        amount: Amount,
    },
    RandomCopyTo {
        from: Split,
        to: Split,
        amount: Amount,
    },
    ExtractToWithClassRatio {
        from: Split,
        to: Split,
        amount: Amount,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
        #[serde(default)]
        max_iterations: Option<usize>,
        #[serde(default)]
        reference: Option<ClassStats>,
    },
    Split {
        target: Split,
        #[serde(default)]
        batch_size: Option<usize>,
        #[serde(default)]
        n_batch: Option<usize>,
    },
    ConvertType {
        out_type: ElementType,
    },
    AddDepth {
        depth: usize,
        #[serde(default)]
        target: Option<Split>,
        #[serde(default)]
        field: RecordField,
    },
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Transform::SimpleShuffle { .. } => "simple_shuffle",
            Transform::MergeResources { .. } => "merge_resources",
            Transform::ExtractTo { .. } => "extract_to",
            Transform::RandomCopyTo { .. } => "random_copy_to",
            Transform::ExtractToWithClassRatio { .. } => "extract_to_with_class_ratio",
            Transform::Split { .. } => "split",
            Transform::ConvertType { .. } => "convert_type",
            Transform::AddDepth { .. } => "add_depth",
        }
    }

    /// Checks that need no data: conflicting or out-of-range parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            Transform::ExtractTo { from, to, amount }
            | Transform::RandomCopyTo { from, to, amount }
            | Transform::ExtractToWithClassRatio { from, to, amount, .. } => {
                if from == to {
                    return Err(DatasetError::invalid_parameters(format!(
                        "{}: source and destination are both '{from}'",
                        self.name()
                    )));
                }
                amount.check()?;
            }
            Transform::Split {
                batch_size,
                n_batch,
                ..
            } => match (batch_size, n_batch) {
                (Some(0), None) | (None, Some(0)) => {
                    return Err(DatasetError::invalid_parameters(
                        "split: batch size and batch count must be positive",
                    ))
                }
                (Some(_), None) | (None, Some(_)) => {}
                _ => {
                    return Err(DatasetError::invalid_parameters(
                        "split: give exactly one of batch_size and n_batch",
                    ))
                }
            },
            Transform::AddDepth { depth: 0, .. } => {
                return Err(DatasetError::invalid_parameters("add_depth: depth must be at least 1"))
            }
            _ => {}
        }
        if let Transform::ExtractToWithClassRatio {
            tolerance,
            max_iterations,
            ..
        } = self
        {
            if !(*tolerance > 0.0) {
                return Err(DatasetError::invalid_parameters(format!(
                    "tolerance must be positive, got {tolerance}"
                )));
            }
            if *max_iterations == Some(0) {
                return Err(DatasetError::invalid_parameters("max_iterations must be positive"));
            }
        }
        Ok(())
    }

    /// Run this step against `dataset`.
    pub fn apply(&self, dataset: &mut Dataset, rng: &mut ChaCha8Rng) -> Result<()> {
        match self {
            Transform::SimpleShuffle { target } => ops::simple_shuffle(dataset, *target, rng),
            Transform::MergeResources { target } => ops::merge_resources(dataset, *target)?,
            Transform::ExtractTo { from, to, amount } => {
                let summary = ops::extract_to(dataset, *from, *to, *amount)?;
                info!("moved {} records {from} -> {to}", summary.moved);
            }
            Transform::RandomCopyTo { from, to, amount } => {
                let summary = ops::random_copy_to(dataset, *from, *to, *amount, rng)?;
                info!("copied {} records {from} -> {to}", summary.moved);
            }
            Transform::ExtractToWithClassRatio {
                from,
                to,
                amount,
                tolerance,
                max_iterations,
                reference,
            } => {
                let options = BalanceOptions {
                    tolerance: *tolerance,
                    max_iterations: *max_iterations,
                    reference: reference.clone(),
                };
                balance::extract_to_with_class_ratio(dataset, *from, *to, *amount, &options)?;
            }
            Transform::Split {
                target,
                batch_size,
                n_batch,
            } => ops::split(dataset, *target, *batch_size, *n_batch)?,
            Transform::ConvertType { out_type } => ops::convert_type(dataset, *out_type),
            Transform::AddDepth {
                depth,
                target,
                field,
            } => ops::add_depth(dataset, *depth, *target, *field)?,
        }
        Ok(())
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::SimpleShuffle { target: Some(t) } => write!(f, "simple_shuffle({t})"),
            Transform::SimpleShuffle { target: None } => write!(f, "simple_shuffle(all)"),
            Transform::MergeResources { target } => write!(f, "merge_resources({target})"),
            Transform::ExtractTo { from, to, amount }
            | Transform::RandomCopyTo { from, to, amount }
            | Transform::ExtractToWithClassRatio { from, to, amount, .. } => {
                write!(f, "{}({from} -> {to}, {amount})", self.name())
            }
            Transform::Split {
                target,
                batch_size,
                n_batch,
            } => match (batch_size, n_batch) {
                (Some(b), _) => write!(f, "split({target}, batch_size={b})"),
                (_, Some(n)) => write!(f, "split({target}, n_batch={n})"),
                _ => write!(f, "split({target})"),
            },
            Transform::ConvertType { out_type } => write!(f, "convert_type({out_type})"),
            Transform::AddDepth { depth, field, .. } => write!(f, "add_depth({depth}, {field:?})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Validated steps plus the generator they share.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<Transform>,
    rng: ChaCha8Rng,
}

impl Pipeline {
    /// Validate every step up front; `seed` of `None` draws from entropy.
    pub fn new(steps: Vec<Transform>, seed: Option<u64>) -> Result<Self> {
        for step in &steps {
            step.validate()?;
        }
        Ok(Pipeline {
            steps,
            rng: seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64),
        })
    }

    pub fn steps(&self) -> &[Transform] {
        &self.steps
    }

    /// Apply every step in order; the first failure stops the run.
    pub fn run(&mut self, dataset: &mut Dataset) -> Result<()> {
        let Pipeline { steps, rng } = self;
        let total = steps.len();
        for (i, step) in steps.iter().enumerate() {
            info!("[{}/{total}] {step}", i + 1);
            step.apply(dataset, rng)?;
            debug!(
                "train {} ({} resources), validation {}, test {}",
                dataset.train().len(),
                dataset.train().resources().len(),
                dataset.validation().len(),
                dataset.test().len()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Resource;

    fn dataset(n: usize) -> Dataset {
        let attrs: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64; 3]).collect();
        let targets: Vec<Vec<f64>> = (0..n).map(|i| vec![(i % 2) as f64, ((i + 1) % 2) as f64]).collect();
        let mut ds = Dataset::default();
        ds.insert(Resource::from_rows(&attrs, &targets).unwrap(), Split::Train);
        ds
    }

    #[test]
    fn amount_parses_count_and_fraction() {
        assert_eq!(serde_json::from_str::<Amount>("20").unwrap(), Amount::Count(20));
        assert_eq!(serde_json::from_str::<Amount>("0.25").unwrap(), Amount::Fraction(0.25));
        assert_eq!(Amount::Fraction(0.25).resolve(10).unwrap(), 2);
        assert!(Amount::Fraction(-0.1).resolve(10).is_err());
        assert!(Amount::Count(11).resolve(10).is_err());
    }

    #[test]
    fn transforms_deserialize_from_recipe_json() {
        let json = r#"[
            {"op": "simple_shuffle"},
            {"op": "extract_to", "from": "train", "to": "test", "amount": 20},
            {"op": "extract_to_with_class_ratio", "from": "train", "to": "validation", "amount": 0.1},
            {"op": "split", "target": "train", "batch_size": 30},
            {"op": "convert_type", "out_type": "float"},
            {"op": "add_depth", "depth": 4, "field": "outputs"}
        ]"#;
        let steps: Vec<Transform> = serde_json::from_str(json).unwrap();
        assert_eq!(steps[0], Transform::SimpleShuffle { target: None });
        assert!(matches!(
            steps[2],
            Transform::ExtractToWithClassRatio { tolerance, max_iterations: None, .. } if tolerance == 2.0
        ));
        assert_eq!(
            steps[5],
            Transform::AddDepth {
                depth: 4,
                target: None,
                field: RecordField::Targets
            }
        );
        assert!(serde_json::from_str::<Transform>(r#"{"op": "explode"}"#).is_err());
    }

    #[test]
    fn validation_happens_before_any_step() {
        let steps = vec![
            Transform::SimpleShuffle { target: None },
            Transform::Split {
                target: Split::Train,
                batch_size: Some(10),
                n_batch: Some(2),
            },
        ];
        assert!(matches!(Pipeline::new(steps, Some(1)), Err(DatasetError::InvalidParameters(_))));

        let same = Transform::ExtractTo {
            from: Split::Test,
            to: Split::Test,
            amount: Amount::Count(1),
        };
        assert!(same.validate().is_err());
        assert!(Transform::AddDepth { depth: 0, target: None, field: RecordField::Attributes }
            .validate()
            .is_err());
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let steps = vec![
            Transform::SimpleShuffle { target: None },
            Transform::RandomCopyTo {
                from: Split::Train,
                to: Split::Validation,
                amount: Amount::Fraction(0.2),
            },
        ];
        let mut a = dataset(40);
        let mut b = dataset(40);
        Pipeline::new(steps.clone(), Some(99)).unwrap().run(&mut a).unwrap();
        Pipeline::new(steps, Some(99)).unwrap().run(&mut b).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.validation().len(), 8);
    }

    #[test]
    fn failing_step_reports_error() {
        let steps = vec![Transform::ExtractTo {
            from: Split::Validation,
            to: Split::Test,
            amount: Amount::Count(1),
        }];
        let mut ds = dataset(5);
        let err = Pipeline::new(steps, Some(0)).unwrap().run(&mut ds).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidParameters(_)));
        assert_eq!(ds.train().len(), 5);
    }

    #[test]
    fn display_names_steps() {
        let step = Transform::ExtractTo {
            from: Split::Train,
            to: Split::Test,
            amount: Amount::Count(20),
        };
        assert_eq!(step.to_string(), "extract_to(train -> test, 20)");
    }
}
