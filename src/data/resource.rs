use rand::seq::SliceRandom;
use rand::Rng;

use super::model::{ClassLabel, ElementType, Record, RecordField};
use super::records::Records;
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Resource – paired attribute / target rows
// ---------------------------------------------------------------------------

/// The unit of transformation: attribute rows paired with target rows.
///
/// Both sides always hold the same number of records and the same element
/// type. Each resource owns its buffers; extraction and copies deep-copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    attributes: Records,
    targets: Records,
}

impl Default for Resource {
    fn default() -> Self {
        Self::empty()
    }
}

impl Resource {
    /// Pair two record sets, checking length and element type.
    pub fn new(attributes: Records, targets: Records) -> Result<Self> {
        if attributes.len() != targets.len() {
            return Err(DatasetError::precondition(format!(
                "{} attribute rows but {} target rows",
                attributes.len(),
                targets.len()
            )));
        }
        if !attributes.is_empty() && attributes.element_type() != targets.element_type() {
            return Err(DatasetError::precondition(format!(
                "attributes are {} but targets are {}",
                attributes.element_type(),
                targets.element_type()
            )));
        }
        Ok(Resource { attributes, targets })
    }

    /// Build a `double` resource from nested rows.
    pub fn from_rows(attributes: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<Self> {
        Self::new(Records::from_rows(attributes)?, Records::from_rows(targets)?)
    }

    /// A resource with no records.
    pub fn empty() -> Self {
        Resource {
            attributes: Records::empty(ElementType::Double),
            targets: Records::empty(ElementType::Double),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn attributes(&self) -> &Records {
        &self.attributes
    }

    pub fn targets(&self) -> &Records {
        &self.targets
    }

    pub fn element_type(&self) -> ElementType {
        self.attributes.element_type()
    }

    fn check_index(&self, i: usize) -> Result<()> {
        if i >= self.len() {
            return Err(DatasetError::out_of_range(i, self.len()));
        }
        Ok(())
    }

    fn check_indices(&self, indices: &[usize]) -> Result<()> {
        let mut seen = vec![false; self.len()];
        for &i in indices {
            self.check_index(i)?;
            if std::mem::replace(&mut seen[i], true) {
                return Err(DatasetError::precondition(format!("index {i} listed twice")));
            }
        }
        Ok(())
    }

    /// Copy record `i`.
    pub fn get(&self, i: usize) -> Result<Record> {
        self.check_index(i)?;
        Ok(Record {
            attributes: self.attributes.record(i),
            targets: self.targets.record(i),
        })
    }

    /// Overwrite record `i`.
    pub fn set(&mut self, i: usize, record: &Record) -> Result<()> {
        self.check_index(i)?;
        if record.attributes.len() != self.attributes.width() * self.attributes.depth()
            || record.targets.len() != self.targets.width() * self.targets.depth()
        {
            return Err(DatasetError::precondition(format!(
                "record shape ({}, {}) does not fit resource rows",
                record.attributes.len(),
                record.targets.len()
            )));
        }
        self.attributes.set_record(i, &record.attributes)?;
        self.targets.set_record(i, &record.targets)
    }

    /// Class of record `i`, from its first target level.
    pub fn class_of(&self, i: usize) -> Result<ClassLabel> {
        self.check_index(i)?;
        ClassLabel::from_target(&self.targets.row(i))
    }

    /// Apply one random permutation to both sides.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &mut Self {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        self.attributes = self.attributes.select(&order);
        self.targets = self.targets.select(&order);
        self
    }

    /// Remove the records at `indices` and return them as a new resource.
    ///
    /// Removal is computed against the indices as they were before the call,
    /// so the order of `indices` only affects the order of the result.
    pub fn extract(&mut self, indices: &[usize]) -> Result<Resource> {
        let taken = self.copy_fields(indices)?;
        let mut keep = vec![true; self.len()];
        for &i in indices {
            keep[i] = false;
        }
        self.attributes.retain(&keep);
        self.targets.retain(&keep);
        Ok(taken)
    }

    /// Copy the records at `indices` into a new resource.
    pub fn copy_fields(&self, indices: &[usize]) -> Result<Resource> {
        self.check_indices(indices)?;
        Ok(Resource {
            attributes: self.attributes.select(indices),
            targets: self.targets.select(indices),
        })
    }

    /// Cut into `n` contiguous chunks as even as possible.
    ///
    /// Later chunks take the remainder: 10 records in 3 chunks gives 3, 3, 4.
    /// Chunks are empty when `n` exceeds the record count.
    pub fn split(&self, n: usize) -> Result<Vec<Resource>> {
        if n == 0 {
            return Err(DatasetError::invalid_parameters("cannot split into 0 chunks"));
        }
        let (base, rem) = (self.len() / n, self.len() % n);
        let mut start = 0;
        let mut chunks = Vec::with_capacity(n);
        for chunk in 0..n {
            let size = base + usize::from(chunk >= n - rem);
            chunks.push(Resource {
                attributes: self.attributes.slice(start, start + size),
                targets: self.targets.slice(start, start + size),
            });
            start += size;
        }
        Ok(chunks)
    }

    /// Replace one side with `depth` stacked copies of itself.
    pub fn repeat(&mut self, depth: usize, field: RecordField) -> Result<&mut Self> {
        if depth == 0 {
            return Err(DatasetError::invalid_parameters("depth must be at least 1"));
        }
        match field {
            RecordField::Attributes => self.attributes.repeat(depth),
            RecordField::Targets => self.targets.repeat(depth),
        }
        Ok(self)
    }

    /// Cast both sides to `ty`.
    pub fn convert_type(&mut self, ty: ElementType) -> &mut Self {
        self.attributes.cast(ty);
        self.targets.cast(ty);
        self
    }

    /// Append the records of `other`. An empty resource becomes `other`.
    pub fn append(&mut self, other: Resource) -> Result<()> {
        if self.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.is_empty() {
            return Ok(());
        }
        if self.element_type() != other.element_type() {
            return Err(DatasetError::precondition(format!(
                "cannot concatenate {} records onto {} records",
                other.element_type(),
                self.element_type()
            )));
        }
        // Validate both sides before touching either.
        if self.targets.width() != other.targets.width()
            || self.targets.depth() != other.targets.depth()
        {
            return Err(DatasetError::precondition("target shapes differ"));
        }
        self.attributes.append(other.attributes)?;
        self.targets.append(other.targets)
    }

    /// Concatenation by value.
    pub fn concat(mut self, other: Resource) -> Result<Resource> {
        self.append(other)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    /// `n` records whose single attribute equals the index and whose target
    /// one-hot encodes `index % 2`.
    fn numbered(n: usize) -> Resource {
        let attrs: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64]).collect();
        let targets: Vec<Vec<f64>> = (0..n)
            .map(|i| if i % 2 == 0 { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
            .collect();
        Resource::from_rows(&attrs, &targets).unwrap()
    }

    fn pairs(r: &Resource) -> Vec<(Vec<f64>, Vec<f64>)> {
        (0..r.len())
            .map(|i| {
                let rec = r.get(i).unwrap();
                (rec.attributes, rec.targets)
            })
            .collect()
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let err = Resource::from_rows(&[vec![1.0], vec![2.0]], &[vec![1.0]]).unwrap_err();
        assert!(matches!(err, DatasetError::Precondition(_)));
    }

    #[test]
    fn shuffle_preserves_pairs() {
        let mut r = numbered(50);
        let mut before = pairs(&r);
        r.shuffle(&mut ChaCha8Rng::seed_from_u64(7));
        let mut after = pairs(&r);
        assert_eq!(after.len(), 50);
        assert_ne!(before, after);

        let key = |p: &(Vec<f64>, Vec<f64>)| p.0[0] as i64;
        before.sort_by_key(key);
        after.sort_by_key(key);
        assert_eq!(before, after);
    }

    #[test]
    fn shuffle_is_reproducible() {
        let mut a = numbered(20);
        let mut b = numbered(20);
        a.shuffle(&mut ChaCha8Rng::seed_from_u64(3));
        b.shuffle(&mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn extract_uses_pre_removal_indices() {
        let mut r = numbered(10);
        let taken = r.extract(&[7, 2, 5]).unwrap();
        assert_eq!(taken.len(), 3);
        assert_eq!(r.len(), 7);
        assert_eq!(taken.get(0).unwrap().attributes, vec![7.0]);
        assert_eq!(taken.get(1).unwrap().attributes, vec![2.0]);
        assert_eq!(taken.get(2).unwrap().attributes, vec![5.0]);
        let left: Vec<f64> = (0..r.len()).map(|i| r.get(i).unwrap().attributes[0]).collect();
        assert_eq!(left, vec![0.0, 1.0, 3.0, 4.0, 6.0, 8.0, 9.0]);
    }

    #[test]
    fn extract_rejects_bad_indices_without_mutation() {
        let mut r = numbered(4);
        assert!(r.extract(&[1, 9]).is_err());
        assert!(r.extract(&[1, 1]).is_err());
        assert_eq!(r.len(), 4);
    }

    #[test]
    fn copy_fields_is_non_destructive() {
        let r = numbered(6);
        let copy = r.copy_fields(&[0, 5]).unwrap();
        assert_eq!(copy.len(), 2);
        assert_eq!(r.len(), 6);
        assert_eq!(copy.get(1).unwrap(), r.get(5).unwrap());
    }

    #[test]
    fn split_puts_remainder_last() {
        let r = numbered(10);
        let sizes: Vec<usize> = r.split(3).unwrap().iter().map(Resource::len).collect();
        assert_eq!(sizes, vec![3, 3, 4]);

        let chunks = r.split(4).unwrap();
        let sizes: Vec<usize> = chunks.iter().map(Resource::len).collect();
        assert_eq!(sizes, vec![2, 2, 3, 3]);
        // contiguous, never reordered
        assert_eq!(chunks[1].get(0).unwrap().attributes, vec![2.0]);
        assert_eq!(chunks[3].get(2).unwrap().attributes, vec![9.0]);
    }

    #[test]
    fn repeat_attributes() {
        let mut r = numbered(3);
        r.repeat(4, RecordField::Attributes).unwrap();
        assert_eq!(r.len(), 3);
        assert_eq!(r.attributes().depth(), 4);
        assert_eq!(r.targets().depth(), 1);
        assert_eq!(r.get(2).unwrap().attributes, vec![2.0; 4]);
    }

    #[test]
    fn convert_type_roundtrip_within_tolerance() {
        let attrs = vec![vec![0.1, 2.0 / 3.0], vec![1e-3, 123.456]];
        let targets = vec![vec![1.0], vec![0.0]];
        let mut r = Resource::from_rows(&attrs, &targets).unwrap();
        r.convert_type(ElementType::Double).convert_type(ElementType::Float);
        assert_eq!(r.element_type(), ElementType::Float);
        for (i, row) in attrs.iter().enumerate() {
            let got = r.get(i).unwrap().attributes;
            for (a, b) in got.iter().zip(row) {
                assert!((a - b).abs() <= b.abs() * 1e-6 + 1e-7);
            }
        }
    }

    #[test]
    fn append_to_empty_equals_other() {
        let mut r = Resource::empty();
        r.append(numbered(4)).unwrap();
        assert_eq!(r, numbered(4));
    }

    #[test]
    fn concat_appends_in_order() {
        let joined = numbered(2).concat(numbered(3)).unwrap();
        assert_eq!(joined.len(), 5);
        assert_eq!(joined.get(4).unwrap().attributes, vec![2.0]);
    }

    #[test]
    fn concat_rejects_type_mismatch() {
        let mut floats = numbered(2);
        floats.convert_type(ElementType::Float);
        assert!(numbered(2).concat(floats).is_err());
    }

    #[test]
    fn set_and_class_of() {
        let mut r = numbered(4);
        assert_eq!(r.class_of(1).unwrap(), ClassLabel::new(1.0));
        let rec = r.get(0).unwrap();
        r.set(1, &rec).unwrap();
        assert_eq!(r.class_of(1).unwrap(), ClassLabel::new(0.0));
        assert!(r.class_of(4).is_err());
    }
}
