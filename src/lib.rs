//! Dataset preparation for DENN trainers.
//!
//! Load a tabular source into a [`data::Dataset`], reshape it with a
//! [`pipeline::Pipeline`], then write the versioned binary container with
//! [`format::ContainerWriter`] and read it back with
//! [`format::ContainerReader`].

pub mod config;
pub mod data;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod stats;

pub use config::Recipe;
pub use data::{Container, Dataset, Resource, Split};
pub use error::{DatasetError, Result};
pub use format::{ContainerReader, ContainerWriter, FormatVersion, WriterOptions};
pub use pipeline::{Amount, Pipeline, Transform};
