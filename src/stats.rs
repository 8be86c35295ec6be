//! Class distribution and attribute statistics.
//!
//! [`ClassStats`] drives stratified extraction; [`DatasetStats`] is the JSON
//! sidecar written next to a container.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::{ClassLabel, Container, Dataset, Resource};
use crate::error::Result;

/// Per-class record counts and percentages.
///
/// # Example
///
/// ```
/// use denn_db::data::{ClassLabel, Resource};
/// use denn_db::stats::ClassStats;
///
/// let attrs = vec![vec![0.0]; 4];
/// let targets = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
/// let resource = Resource::from_rows(&attrs, &targets).unwrap();
///
/// let stats = ClassStats::of_resource(&resource).unwrap();
/// assert_eq!(stats.num_classes, 2);
/// assert_eq!(stats.percentage(ClassLabel::new(0.0)), 75.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    /// Number of distinct classes.
    pub num_classes: usize,
    /// Records per class.
    pub counter: BTreeMap<ClassLabel, usize>,
    /// Share of records per class, in percent.
    pub percentages: BTreeMap<ClassLabel, f64>,
}

impl ClassStats {
    /// Tally a sequence of labels.
    pub fn from_labels(labels: impl IntoIterator<Item = ClassLabel>) -> Self {
        let mut counter = BTreeMap::new();
        let mut total = 0usize;
        for label in labels {
            *counter.entry(label).or_insert(0) += 1;
            total += 1;
        }
        let percentages = counter
            .iter()
            .map(|(label, count)| (*label, *count as f64 / total as f64 * 100.0))
            .collect();
        ClassStats {
            num_classes: counter.len(),
            counter,
            percentages,
        }
    }

    pub fn of_resource(resource: &Resource) -> Result<Self> {
        Self::of_resources(std::iter::once(resource))
    }

    pub fn of_container(container: &Container) -> Result<Self> {
        Self::of_resources(container.iter())
    }

    /// Distribution over every split of `dataset`.
    pub fn of_dataset(dataset: &Dataset) -> Result<Self> {
        Self::of_resources(dataset.resources())
    }

    fn of_resources<'a>(resources: impl Iterator<Item = &'a Resource>) -> Result<Self> {
        let mut labels = Vec::new();
        for resource in resources {
            for i in 0..resource.len() {
                labels.push(resource.class_of(i)?);
            }
        }
        Ok(Self::from_labels(labels))
    }

    /// Percentage of `label`, 0 when absent.
    pub fn percentage(&self, label: ClassLabel) -> f64 {
        self.percentages.get(&label).copied().unwrap_or(0.0)
    }

    /// Add every class of `reference` missing here with a zero share.
    pub fn align_to(&mut self, reference: &ClassStats) {
        for label in reference.percentages.keys() {
            self.percentages.entry(*label).or_insert(0.0);
            self.counter.entry(*label).or_insert(0);
        }
        self.num_classes = self.num_classes.max(reference.num_classes).max(self.counter.len());
    }

    /// Sum of absolute percentage differences over the union of classes.
    pub fn divergence(&self, other: &ClassStats) -> f64 {
        self.percentages
            .keys()
            .chain(other.percentages.keys())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .map(|label| (self.percentage(*label) - other.percentage(*label)).abs())
            .sum()
    }
}

/// Summary statistics over every attribute value of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
    /// `variance / mean`, 0 when the mean is 0.
    pub coefficient_of_variation: f64,
}

impl AttributeStats {
    /// Two passes over all attribute values; mean and variance are per value.
    pub fn of_dataset(dataset: &Dataset) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for_each_value(dataset, |v| {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        });
        if count == 0 {
            return Self::default();
        }
        let mean = sum / count as f64;
        let mut squares = 0.0;
        for_each_value(dataset, |v| squares += (v - mean).powi(2));
        let variance = squares / count as f64;
        AttributeStats {
            min,
            max,
            mean,
            variance,
            coefficient_of_variation: if mean == 0.0 { 0.0 } else { variance / mean },
        }
    }
}

/// Visits the first depth level of every attribute row.
fn for_each_value(dataset: &Dataset, mut f: impl FnMut(f64)) {
    for resource in dataset.resources() {
        let attributes = resource.attributes();
        for i in 0..attributes.len() {
            attributes.row(i).into_iter().for_each(&mut f);
        }
    }
}

/// The statistics sidecar document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub class_stats: ClassStats,
    pub attribute_stats: AttributeStats,
}

impl DatasetStats {
    pub fn of_dataset(dataset: &Dataset) -> Result<Self> {
        Ok(DatasetStats {
            class_stats: ClassStats::of_dataset(dataset)?,
            attribute_stats: AttributeStats::of_dataset(dataset),
        })
    }

    /// Write as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        log::info!("wrote statistics to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Split;

    fn dataset(classes: &[usize]) -> Dataset {
        let attrs: Vec<Vec<f64>> = (0..classes.len()).map(|i| vec![i as f64, 1.0]).collect();
        let targets: Vec<Vec<f64>> = classes.iter().map(|&c| vec![c as f64]).collect();
        let mut ds = Dataset::default();
        ds.insert(Resource::from_rows(&attrs, &targets).unwrap(), Split::Train);
        ds
    }

    #[test]
    fn class_stats_percentages() {
        let stats = ClassStats::of_dataset(&dataset(&[0, 0, 0, 1])).unwrap();
        assert_eq!(stats.num_classes, 2);
        assert_eq!(stats.counter[&ClassLabel::new(0.0)], 3);
        assert!((stats.percentage(ClassLabel::new(1.0)) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn align_and_divergence() {
        let reference = ClassStats::from_labels([0.0, 0.0, 1.0, 2.0].map(ClassLabel::new));
        let mut partial = ClassStats::from_labels([0.0, 0.0].map(ClassLabel::new));
        // 50/25/25 against 100/0/0
        assert!((partial.divergence(&reference) - 100.0).abs() < 1e-9);
        partial.align_to(&reference);
        assert_eq!(partial.percentage(ClassLabel::new(2.0)), 0.0);
        assert_eq!(partial.counter[&ClassLabel::new(1.0)], 0);
        assert_eq!(partial.num_classes, 3);
    }

    #[test]
    fn attribute_stats_are_per_value() {
        // 4 records of 2 values: 0,1, 1,1, 2,1, 3,1 → 10 / 8, not 10 / 4
        let stats = AttributeStats::of_dataset(&dataset(&[0, 0, 1, 1]));
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 3.0);
        assert!((stats.mean - 1.25).abs() < 1e-12);
        // deviations: 1.5625, .0625, .0625, .0625, .5625, .0625, 3.0625, .0625 → 5.5 / 8
        assert!((stats.variance - 0.6875).abs() < 1e-12);
        assert!((stats.coefficient_of_variation - 0.55).abs() < 1e-12);
    }

    #[test]
    fn sidecar_json_shape() {
        let stats = DatasetStats::of_dataset(&dataset(&[0, 1])).unwrap();
        let json: serde_json::Value = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["class_stats"]["num_classes"], 2);
        assert_eq!(json["class_stats"]["counter"]["1"], 1);
        assert!(json["attribute_stats"]["variance"].is_number());
    }
}
