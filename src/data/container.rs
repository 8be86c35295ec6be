use super::model::Record;
use super::resource::Resource;
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Container – the resources of one split
// ---------------------------------------------------------------------------

/// Ordered resources forming one split, indexable as one flat sequence.
///
/// Flat access scans the resource list, so it costs O(resources) per call.
/// Splits hold a handful of large resources, which keeps this cheap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    resources: Vec<Resource>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one resource.
    pub fn insert(&mut self, resource: Resource) -> &mut Self {
        self.resources.push(resource);
        self
    }

    /// Append several resources in order.
    pub fn insert_all(&mut self, resources: impl IntoIterator<Item = Resource>) -> &mut Self {
        self.resources.extend(resources);
        self
    }

    /// Remove and return the resource at `position`.
    pub fn delete(&mut self, position: usize) -> Result<Resource> {
        if position >= self.resources.len() {
            return Err(DatasetError::out_of_range(position, self.resources.len()));
        }
        Ok(self.resources.remove(position))
    }

    /// Replace the resource at `position` with `pieces`, keeping them in place.
    pub fn replace(&mut self, position: usize, pieces: Vec<Resource>) -> Result<Resource> {
        if position >= self.resources.len() {
            return Err(DatasetError::out_of_range(position, self.resources.len()));
        }
        let removed = self.resources.splice(position..=position, pieces).next();
        removed.ok_or_else(|| DatasetError::out_of_range(position, self.resources.len()))
    }

    /// Remove every resource.
    pub fn take_all(&mut self) -> Vec<Resource> {
        std::mem::take(&mut self.resources)
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut [Resource] {
        &mut self.resources
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.resources.iter()
    }

    /// Total records across all resources.
    pub fn len(&self) -> usize {
        self.resources.iter().map(Resource::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map a flat index to `(resource, local index)`.
    pub fn locate(&self, index: usize) -> Result<(usize, usize)> {
        let mut local = index;
        for (position, resource) in self.resources.iter().enumerate() {
            if local < resource.len() {
                return Ok((position, local));
            }
            local -= resource.len();
        }
        Err(DatasetError::out_of_range(index, self.len()))
    }

    /// Copy the record at flat index `index`.
    pub fn get(&self, index: usize) -> Result<Record> {
        let (position, local) = self.locate(index)?;
        self.resources[position].get(local)
    }

    /// Overwrite the record at flat index `index`.
    pub fn set(&mut self, index: usize, record: &Record) -> Result<()> {
        let (position, local) = self.locate(index)?;
        self.resources[position].set(local, record)
    }
}

impl<'a> IntoIterator for &'a Container {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
