use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::container::Container;
use super::model::Record;
use super::resource::Resource;
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Split – the three fixed partitions
// ---------------------------------------------------------------------------

/// One of the three dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    /// Declaration order, also the order of global flat indexing.
    pub const ALL: [Split; 3] = [Split::Train, Split::Validation, Split::Test];

    pub const fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
            Split::Test => "test",
        }
    }
}

impl FromStr for Split {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Split::Train),
            "validation" => Ok(Split::Validation),
            "test" => Ok(Split::Test),
            other => Err(DatasetError::unknown_split(other)),
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether targets are class labels or continuous values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    #[default]
    Classification,
    Regression,
}

// ---------------------------------------------------------------------------
// Dataset – train / validation / test plus provenance
// ---------------------------------------------------------------------------

/// The aggregate transformed by the pipeline and written to a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    /// Attributes were min-max normalized by the loader.
    pub normalized: bool,
    /// Targets are one-hot encoded.
    pub one_hot: bool,
    pub kind: Kind,
    train: Container,
    validation: Container,
    test: Container,
}

impl Dataset {
    /// Empty dataset with the given provenance flags.
    pub fn new(normalized: bool, one_hot: bool, kind: Kind) -> Self {
        Dataset {
            normalized,
            one_hot,
            kind,
            ..Self::default()
        }
    }

    pub fn split(&self, split: Split) -> &Container {
        match split {
            Split::Train => &self.train,
            Split::Validation => &self.validation,
            Split::Test => &self.test,
        }
    }

    pub fn split_mut(&mut self, split: Split) -> &mut Container {
        match split {
            Split::Train => &mut self.train,
            Split::Validation => &mut self.validation,
            Split::Test => &mut self.test,
        }
    }

    /// Mutable access to two different splits at once.
    pub fn pair_mut(&mut self, a: Split, b: Split) -> Result<(&mut Container, &mut Container)> {
        match (a, b) {
            (Split::Train, Split::Validation) => Ok((&mut self.train, &mut self.validation)),
            (Split::Train, Split::Test) => Ok((&mut self.train, &mut self.test)),
            (Split::Validation, Split::Train) => Ok((&mut self.validation, &mut self.train)),
            (Split::Validation, Split::Test) => Ok((&mut self.validation, &mut self.test)),
            (Split::Test, Split::Train) => Ok((&mut self.test, &mut self.train)),
            (Split::Test, Split::Validation) => Ok((&mut self.test, &mut self.validation)),
            (same, _) => Err(DatasetError::invalid_parameters(format!(
                "source and destination are both '{same}'"
            ))),
        }
    }

    pub fn train(&self) -> &Container {
        &self.train
    }

    pub fn validation(&self) -> &Container {
        &self.validation
    }

    pub fn test(&self) -> &Container {
        &self.test
    }

    /// Add a resource to a split.
    pub fn insert(&mut self, resource: Resource, split: Split) -> &mut Self {
        self.split_mut(split).insert(resource);
        self
    }

    /// Add a resource to a split named at runtime.
    pub fn insert_named(&mut self, resource: Resource, split: &str) -> Result<&mut Self> {
        let split = split.parse::<Split>()?;
        Ok(self.insert(resource, split))
    }

    /// `(split, container)` pairs in declaration order.
    pub fn splits(&self) -> impl Iterator<Item = (Split, &Container)> + '_ {
        Split::ALL.into_iter().map(move |s| (s, self.split(s)))
    }

    /// Every resource of every split, train first.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> + '_ {
        self.splits().flat_map(|(_, c)| c.iter())
    }

    pub fn resources_mut(&mut self) -> impl Iterator<Item = &mut Resource> + '_ {
        self.train
            .resources_mut()
            .iter_mut()
            .chain(self.validation.resources_mut().iter_mut())
            .chain(self.test.resources_mut().iter_mut())
    }

    /// First resource in declaration order, if any.
    pub fn first_resource(&self) -> Option<&Resource> {
        self.resources().find(|r| !r.is_empty())
    }

    /// Total records across all splits.
    pub fn len(&self) -> usize {
        self.splits().map(|(_, c)| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record at a global flat index spanning train, validation, test.
    pub fn get(&self, index: usize) -> Result<Record> {
        let mut local = index;
        for (_, container) in self.splits() {
            if local < container.len() {
                return container.get(local);
            }
            local -= container.len();
        }
        Err(DatasetError::out_of_range(index, self.len()))
    }
}
