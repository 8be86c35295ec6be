//! Dataset modifiers. Each one validates its parameters against the
//! current dataset before touching it.

use log::debug;
use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Amount;
use crate::data::{Container, Dataset, ElementType, RecordField, Resource, Split};
use crate::error::{DatasetError, Result};

/// Sizes around one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractSummary {
    /// Records left in the source split.
    pub source_len: usize,
    /// Records in the destination split afterwards.
    pub target_len: usize,
    /// Records moved or copied.
    pub moved: usize,
}

/// Splits named by an optional target: one split or all three.
fn targets(target: Option<Split>) -> Vec<Split> {
    target.map_or_else(|| Split::ALL.to_vec(), |s| vec![s])
}

/// Shuffle every resource of `target`, or of every split.
pub fn simple_shuffle<R: Rng + ?Sized>(dataset: &mut Dataset, target: Option<Split>, rng: &mut R) {
    for split in targets(target) {
        for resource in dataset.split_mut(split).resources_mut() {
            resource.shuffle(rng);
        }
    }
}

/// Fold every resource of `target` into a single one.
pub fn merge_resources(dataset: &mut Dataset, target: Split) -> Result<()> {
    let container = dataset.split_mut(target);
    let mut merged = Resource::empty();
    for resource in container.iter() {
        merged.append(resource.clone())?;
    }
    container.take_all();
    container.insert(merged);
    Ok(())
}

/// Remove the first `quota` records of `source`, walking resources in order.
///
/// Whole resources are taken while they fit; the last one is cut at
/// `[0, quota)`. Fully drained resources leave the container.
pub(crate) fn take_front(source: &mut Container, mut quota: usize) -> Result<Resource> {
    let mut taken = Resource::empty();
    while quota > 0 {
        let Some(first) = source.resources().first() else {
            break;
        };
        if quota < first.len() {
            let indices: Vec<usize> = (0..quota).collect();
            taken.append(source.resources_mut()[0].extract(&indices)?)?;
            quota = 0;
        } else {
            quota -= first.len();
            taken.append(source.delete(0)?)?;
        }
    }
    Ok(taken)
}

/// Move `amount` records from the front of `from` into `to`.
pub fn extract_to(dataset: &mut Dataset, from: Split, to: Split, amount: Amount) -> Result<ExtractSummary> {
    let count = amount.resolve(dataset.split(from).len())?;
    let (source, target) = dataset.pair_mut(from, to)?;
    let extracted = take_front(source, count)?;
    let moved = extracted.len();
    if !extracted.is_empty() {
        target.insert(extracted);
    }
    debug!("extract_to {from} -> {to}: moved {moved}");
    Ok(ExtractSummary {
        source_len: source.len(),
        target_len: target.len(),
        moved,
    })
}

/// Copy a random sample of `amount` records from `from` into `to`.
///
/// Every resource contributes `floor(len * count / total)` records drawn
/// without replacement, so the copied total may fall short of `count`.
pub fn random_copy_to<R: Rng + ?Sized>(
    dataset: &mut Dataset,
    from: Split,
    to: Split,
    amount: Amount,
    rng: &mut R,
) -> Result<ExtractSummary> {
    let total = dataset.split(from).len();
    let count = amount.resolve(total)?;
    let (source, target) = dataset.pair_mut(from, to)?;
    let mut copied = Resource::empty();
    if total > 0 {
        let factor = count as f64 / total as f64;
        for resource in source.iter() {
            let n = (resource.len() as f64 * factor).floor() as usize;
            let indices = sample(rng, resource.len(), n.min(resource.len())).into_vec();
            copied.append(resource.copy_fields(&indices)?)?;
        }
    }
    let moved = copied.len();
    if !copied.is_empty() {
        target.insert(copied);
    }
    debug!("random_copy_to {from} -> {to}: copied {moved} of {count} requested");
    Ok(ExtractSummary {
        source_len: source.len(),
        target_len: target.len(),
        moved,
    })
}

/// Cut the resources of `target` until none exceeds the batch size.
///
/// Exactly one of `batch_size` and `n_batch` is given; the other follows
/// from the split's record count. Oversized resources are replaced in
/// place by their `split(n_batch)` pieces; empty pieces are dropped.
pub fn split(dataset: &mut Dataset, target: Split, batch_size: Option<usize>, n_batch: Option<usize>) -> Result<()> {
    let container = dataset.split_mut(target);
    let total = container.len();
    let (batch_size, n_batch) = match (batch_size, n_batch) {
        (Some(0), None) | (None, Some(0)) => {
            return Err(DatasetError::invalid_parameters("batch size and batch count must be positive"))
        }
        (Some(size), None) => (size, total.div_ceil(size)),
        (None, Some(n)) => (total / n, n),
        _ => {
            return Err(DatasetError::invalid_parameters(
                "give exactly one of batch_size and n_batch",
            ))
        }
    };
    if total == 0 {
        return Ok(());
    }
    if batch_size == 0 {
        return Err(DatasetError::invalid_parameters(format!(
            "{n_batch} batches over {total} records leaves empty batches"
        )));
    }
    debug!("split {target}: batch_size {batch_size}, n_batch {n_batch}");
    while let Some(pos) = container.iter().position(|r| r.len() > batch_size) {
        let pieces: Vec<Resource> = container.resources()[pos]
            .split(n_batch)?
            .into_iter()
            .filter(|piece| !piece.is_empty())
            .collect();
        container.replace(pos, pieces)?;
    }
    Ok(())
}

/// Cast every resource of every split.
pub fn convert_type(dataset: &mut Dataset, ty: ElementType) {
    for resource in dataset.resources_mut() {
        resource.convert_type(ty);
    }
}

/// Stack `depth` copies of `field` in every resource of `target`, or of every split.
pub fn add_depth(dataset: &mut Dataset, depth: usize, target: Option<Split>, field: RecordField) -> Result<()> {
    if depth == 0 {
        return Err(DatasetError::invalid_parameters("depth must be at least 1"));
    }
    for split in targets(target) {
        for resource in dataset.split_mut(split).resources_mut() {
            resource.repeat(depth, field)?;
        }
    }
    Ok(())
}
