//! Stratified extraction: plain front extraction followed by record swaps
//! until the extracted class distribution matches a reference.

use std::collections::BTreeSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::ops::{take_front, ExtractSummary};
use super::Amount;
use crate::data::filter::{first_in_resource, first_of_class};
use crate::data::{ClassLabel, Dataset, Split};
use crate::error::{DatasetError, Result};
use crate::stats::ClassStats;

pub const DEFAULT_TOLERANCE: f64 = 2.0;

/// Knobs for [`extract_to_with_class_ratio`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceOptions {
    /// Stop once the summed absolute percentage difference drops below this.
    pub tolerance: f64,
    /// Swap budget; twice the extracted count when unset.
    pub max_iterations: Option<usize>,
    /// Target distribution; the whole dataset before extraction when unset.
    pub reference: Option<ClassStats>,
}

impl Default for BalanceOptions {
    fn default() -> Self {
        BalanceOptions {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: None,
            reference: None,
        }
    }
}

/// Outcome of a stratified extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub summary: ExtractSummary,
    pub swaps: usize,
    /// Final summed absolute percentage difference.
    pub divergence: f64,
}

/// The class to swap out of the extracted set and the class to swap in.
///
/// Differences are `reference% - extracted%`: the most negative one is the
/// most over-represented class, the most positive one the most lacking.
fn classes_to_swap(reference: &ClassStats, extracted: &ClassStats) -> Option<(ClassLabel, ClassLabel)> {
    let labels: BTreeSet<ClassLabel> = reference
        .percentages
        .keys()
        .chain(extracted.percentages.keys())
        .copied()
        .collect();
    let mut diffs: Vec<(ClassLabel, f64)> = labels
        .into_iter()
        .map(|label| (label, reference.percentage(label) - extracted.percentage(label)))
        .collect();
    diffs.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (remove, add) = (diffs.first()?.0, diffs.last()?.0);
    (remove != add).then_some((remove, add))
}

/// Move `amount` records from `from` to `to` keeping the class ratio.
///
/// Works on a copy of the source split; the dataset changes only when the
/// distribution converges, so a [`DatasetError::BalancingFailed`] leaves it
/// as it was.
pub fn extract_to_with_class_ratio(
    dataset: &mut Dataset,
    from: Split,
    to: Split,
    amount: Amount,
    options: &BalanceOptions,
) -> Result<BalanceReport> {
    if !(options.tolerance > 0.0) {
        return Err(DatasetError::invalid_parameters(format!(
            "tolerance must be positive, got {}",
            options.tolerance
        )));
    }
    let count = amount.resolve(dataset.split(from).len())?;
    let reference = match &options.reference {
        Some(reference) => reference.clone(),
        None => ClassStats::of_dataset(dataset)?,
    };
    let (source, target) = dataset.pair_mut(from, to)?;

    let mut remainder = source.clone();
    let mut extracted = take_front(&mut remainder, count)?;
    let cap = options.max_iterations.unwrap_or(2 * extracted.len());

    let mut swaps = 0;
    let divergence = loop {
        let mut current = ClassStats::of_resource(&extracted)?;
        current.align_to(&reference);
        let divergence = reference.divergence(&current);
        if extracted.is_empty() || divergence < options.tolerance {
            break divergence;
        }
        if swaps >= cap {
            return Err(DatasetError::balancing_failed(
                swaps,
                format!("divergence still {divergence:.2} (tolerance {})", options.tolerance),
            ));
        }
        let (remove, add) = classes_to_swap(&reference, &current)
            .ok_or_else(|| DatasetError::balancing_failed(swaps, "no class to swap"))?;
        let Some(out_idx) = first_in_resource(&extracted, remove)? else {
            return Err(DatasetError::balancing_failed(
                swaps,
                format!("no extracted record of class {remove}"),
            ));
        };
        let Some(in_idx) = first_of_class(&remainder, add)? else {
            return Err(DatasetError::balancing_failed(
                swaps,
                format!("no remaining {from} record of class {add}"),
            ));
        };
        let outgoing = extracted.get(out_idx)?;
        let incoming = remainder.get(in_idx)?;
        extracted.set(out_idx, &incoming)?;
        remainder.set(in_idx, &outgoing)?;
        swaps += 1;
        debug!("swap {swaps}: class {remove} out, class {add} in (divergence {divergence:.2})");
    };

    *source = remainder;
    let moved = extracted.len();
    if !extracted.is_empty() {
        target.insert(extracted);
    }
    info!("extract_to_with_class_ratio {from} -> {to}: moved {moved} after {swaps} swaps");
    Ok(BalanceReport {
        summary: ExtractSummary {
            source_len: source.len(),
            target_len: target.len(),
            moved,
        },
        swaps,
        divergence,
    })
}
