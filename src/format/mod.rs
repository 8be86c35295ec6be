//! The binary container consumed by the trainer.
//!
//! A container is a 38-byte [`Header`] followed by one test block, one
//! validation block and `n_batch` train blocks. Block prefixes depend on the
//! [`FormatVersion`]; payloads are little-endian `f32` or `f64`.

pub mod header;
pub mod reader;
pub mod source;
pub mod version;
pub mod writer;

pub use header::{FieldKind, FieldValue, Header, Layout, CONTAINER_HEADER_SIZE};
pub use reader::{Batches, ContainerReader};
pub use source::{ByteSource, FileSource};
pub use version::{BlockHeader, FormatVersion, Region};
pub use writer::{ContainerWriter, WriteProgress, WriterOptions};
