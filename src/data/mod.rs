/// Data layer: records, resources, splits, and loading.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset (one train Resource)
///   └──────────┘
///        │
///        ▼
///   ┌──────────────────────────────┐
///   │ Dataset                       │  train / validation / test
///   │   Container → Vec<Resource>   │  flat indexing across resources
///   │   Resource  → Records × 2     │  attributes + targets
///   └──────────────────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  class predicates → record positions
///   └──────────┘
/// ```

pub mod container;
pub mod dataset;
pub mod filter;
pub mod loader;
pub mod model;
pub mod records;
pub mod resource;

pub use container::Container;
pub use dataset::{Dataset, Kind, Split};
pub use model::{ClassLabel, ElementType, Record, RecordField};
pub use records::{Records, Values};
pub use resource::Resource;
