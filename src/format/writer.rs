use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};

use super::header::{FieldValue, Header, Layout, CONTAINER_HEADER_SIZE};
use super::version::{BlockHeader, FormatVersion, Region};
use crate::data::{Container, Dataset, ElementType, Resource};
use crate::error::{DatasetError, Result};

/// Header values not derived from the data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriterOptions {
    pub version: FormatVersion,
    /// Recorded verbatim; -1 when unknown.
    pub seed: i32,
    /// Recorded verbatim; -1.0 when unknown.
    pub train_percentage: f32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            version: FormatVersion::V1,
            seed: -1,
            train_percentage: -1.0,
        }
    }
}

/// One event per written block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteProgress {
    pub region: Region,
    /// Position of the block within its region.
    pub block: usize,
    /// Blocks in the whole container.
    pub total_blocks: usize,
    pub records: usize,
}

/// Row geometry shared by every resource of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Shape {
    features: usize,
    classes: usize,
    depth: usize,
    element_type: ElementType,
}

impl Shape {
    fn of(resource: &Resource) -> Self {
        Shape {
            features: resource.attributes().width(),
            classes: resource.targets().width(),
            depth: resource.attributes().depth(),
            element_type: resource.element_type(),
        }
    }

    /// Payload bytes for `rows` records.
    fn payload_len(&self, rows: usize) -> usize {
        rows * (self.features * self.depth + self.classes) * self.element_type.size()
    }
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| DatasetError::precondition(format!("{what} {value} does not fit in 32 bits")))
}

// ---------------------------------------------------------------------------
// ContainerWriter
// ---------------------------------------------------------------------------

/// Serializes a [`Dataset`] into the versioned container layout.
///
/// ```text
/// [header 38 B][test block][validation block][train block 0]...[train block n-1]
/// ```
pub struct ContainerWriter<'a> {
    dataset: &'a Dataset,
    options: WriterOptions,
    shape: Shape,
    progress: Option<Box<dyn FnMut(WriteProgress) + 'a>>,
}

impl<'a> ContainerWriter<'a> {
    /// Check that `dataset` is representable in `options.version`.
    pub fn new(dataset: &'a Dataset, options: WriterOptions) -> Result<Self> {
        let first = dataset
            .first_resource()
            .ok_or_else(|| DatasetError::precondition("dataset holds no records"))?;
        let shape = Shape::of(first);
        for resource in dataset.resources().filter(|r| !r.is_empty()) {
            let other = Shape::of(resource);
            if other != shape {
                return Err(DatasetError::precondition(format!(
                    "resources disagree on shape: {shape:?} vs {other:?}"
                )));
            }
            if resource.targets().depth() != 1 {
                return Err(DatasetError::precondition(
                    "replicated targets cannot be written to a container",
                ));
            }
        }
        if shape.depth > 1 && !options.version.has_depth() {
            return Err(DatasetError::precondition(format!(
                "depth {} needs format v3, not {}",
                shape.depth, options.version
            )));
        }
        Ok(ContainerWriter {
            dataset,
            options,
            shape,
            progress: None,
        })
    }

    /// Register a callback invoked after each block.
    pub fn on_progress(mut self, callback: impl FnMut(WriteProgress) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    fn train_blocks(&self) -> impl Iterator<Item = &'a Resource> + 'a {
        self.dataset.train().iter().filter(|r| !r.is_empty())
    }

    /// Bytes taken by the single block of `container`.
    fn region_len(&self, container: &Container, region: Region) -> usize {
        self.options.version.prefix_len(region) + self.shape.payload_len(container.len())
    }

    /// The header this writer will emit, offsets included.
    pub fn header(&self) -> Result<Header> {
        let test_offset = CONTAINER_HEADER_SIZE;
        let validation_offset = test_offset + self.region_len(self.dataset.test(), Region::Test);
        let train_offset =
            validation_offset + self.region_len(self.dataset.validation(), Region::Validation);

        let n_batch = i32::try_from(self.train_blocks().count())
            .map_err(|_| DatasetError::precondition("too many train batches"))?;
        let features = i32::try_from(self.shape.features)
            .map_err(|_| DatasetError::precondition("too many features"))?;
        let classes = i32::try_from(self.shape.classes)
            .map_err(|_| DatasetError::precondition("too many target values"))?;

        Header::new(
            Layout::container(),
            &[
                ("version", FieldValue::U16(self.options.version.number())),
                ("n_batch", FieldValue::I32(n_batch)),
                ("n_features", FieldValue::I32(features)),
                ("n_classes", FieldValue::I32(classes)),
                ("type", FieldValue::I32(self.shape.element_type.tag())),
                ("seed", FieldValue::I32(self.options.seed)),
                ("train_percentage", FieldValue::F32(self.options.train_percentage)),
                ("test_offset", FieldValue::U32(to_u32(test_offset, "test offset")?)),
                (
                    "validation_offset",
                    FieldValue::U32(to_u32(validation_offset, "validation offset")?),
                ),
                ("train_offset", FieldValue::U32(to_u32(train_offset, "train offset")?)),
            ],
        )
    }

    /// Write the whole container to `writer`, returning the emitted header.
    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> Result<Header> {
        let header = self.header()?;
        debug!("container header:\n{header}");
        writer.write_all(header.binary())?;

        let dataset = self.dataset;
        let total_blocks = 2 + self.train_blocks().count();

        info!("writing test set ({} records)", dataset.test().len());
        self.write_block(writer, Region::Test, 0, dataset.test().iter(), total_blocks)?;
        info!("writing validation set ({} records)", dataset.validation().len());
        self.write_block(writer, Region::Validation, 0, dataset.validation().iter(), total_blocks)?;

        info!("writing train set ({} batches)", total_blocks - 2);
        let batches: Vec<&Resource> = self.train_blocks().collect();
        for (index, resource) in batches.into_iter().enumerate() {
            self.write_block(writer, Region::Train, index, std::iter::once(resource), total_blocks)?;
        }
        writer.flush()?;
        Ok(header)
    }

    /// Stream `resources` as one block: prefix, every attribute level, labels.
    fn write_block<'r, W: Write>(
        &mut self,
        writer: &mut W,
        region: Region,
        index: usize,
        resources: impl Iterator<Item = &'r Resource> + Clone,
        total_blocks: usize,
    ) -> Result<()> {
        let records: usize = resources.clone().map(Resource::len).sum();
        let prefix = BlockHeader::new(
            self.options.version,
            region,
            to_u32(index, "batch index")?,
            to_u32(records, "record count")?,
            to_u32(self.shape.depth, "depth")?,
        );
        prefix.write_to(writer)?;
        for level in 0..self.shape.depth {
            for resource in resources.clone().filter(|r| !r.is_empty()) {
                resource.attributes().levels()[level].write_le(writer)?;
            }
        }
        for resource in resources.filter(|r| !r.is_empty()) {
            resource.targets().levels()[0].write_le(writer)?;
        }
        debug!("{region:?} block {index}: {records} records");
        if let Some(callback) = self.progress.as_mut() {
            callback(WriteProgress {
                region,
                block: index,
                total_blocks,
                records,
            });
        }
        Ok(())
    }

    /// Write to `path`; a `.gz` extension selects gzip compression.
    pub fn save(&mut self, path: &Path) -> Result<Header> {
        let mut file = BufWriter::new(File::create(path)?);
        let header = if is_gzip(path) {
            let mut encoder = GzEncoder::new(file, Compression::default());
            let header = self.write_to(&mut encoder)?;
            encoder.finish()?.flush()?;
            header
        } else {
            self.write_to(&mut file)?
        };
        info!("dataset {} completed", path.display());
        Ok(header)
    }
}

/// Whether `path` names a gzip stream.
pub(crate) fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RecordField, Split};

    fn resource(n: usize, start: usize) -> Resource {
        let attrs: Vec<Vec<f64>> = (start..start + n).map(|i| vec![i as f64, -(i as f64)]).collect();
        let targets: Vec<Vec<f64>> = (start..start + n).map(|i| vec![(i % 2) as f64]).collect();
        Resource::from_rows(&attrs, &targets).unwrap()
    }

    fn dataset() -> Dataset {
        let mut ds = Dataset::default();
        ds.insert(resource(3, 0), Split::Train)
            .insert(resource(2, 3), Split::Train)
            .insert(resource(2, 5), Split::Validation)
            .insert(resource(1, 7), Split::Test);
        ds
    }

    #[test]
    fn offsets_follow_block_sizes() {
        let ds = dataset();
        let writer = ContainerWriter::new(&ds, WriterOptions::default()).unwrap();
        let header = writer.header().unwrap();
        // one test record: 4 B count + 3 doubles
        assert_eq!(header.get_u64("test_offset").unwrap(), 38);
        assert_eq!(header.get_u64("validation_offset").unwrap(), 38 + 4 + 24);
        assert_eq!(header.get_u64("train_offset").unwrap(), 66 + 4 + 48);
        assert_eq!(header.get("n_batch").unwrap(), FieldValue::I32(2));
        assert_eq!(header.get("type").unwrap(), FieldValue::I32(2));
        assert_eq!(header.get("seed").unwrap(), FieldValue::I32(-1));
    }

    #[test]
    fn written_length_matches_layout() {
        let ds = dataset();
        let mut buf = Vec::new();
        let mut events = Vec::new();
        ContainerWriter::new(&ds, WriterOptions::default())
            .unwrap()
            .on_progress(|event| events.push(event))
            .write_to(&mut buf)
            .unwrap();
        // train: (8 + 3*24) + (8 + 2*24)
        assert_eq!(buf.len(), 118 + 80 + 56);
        assert_eq!(events.len(), 4);
        assert_eq!(events[3].region, Region::Train);
        assert_eq!(events[3].block, 1);
        assert!(events.iter().all(|e| e.total_blocks == 4));
    }

    #[test]
    fn v1_train_block_layout() {
        let mut ds = Dataset::default();
        ds.insert(resource(1, 4), Split::Train);
        ds.split_mut(Split::Train).resources_mut()[0].convert_type(ElementType::Float);
        let mut buf = Vec::new();
        ContainerWriter::new(&ds, WriterOptions::default())
            .unwrap()
            .write_to(&mut buf)
            .unwrap();
        // empty test and validation blocks: a zero count each
        assert_eq!(&buf[38..46], &[0u8; 8]);
        let block = &buf[46..];
        assert_eq!(&block[0..4], &0u32.to_le_bytes());
        assert_eq!(&block[4..8], &1u32.to_le_bytes());
        assert_eq!(&block[8..12], &4.0f32.to_le_bytes());
        assert_eq!(&block[12..16], &(-4.0f32).to_le_bytes());
        assert_eq!(&block[16..20], &0.0f32.to_le_bytes());
        assert_eq!(block.len(), 20);
    }

    #[test]
    fn depth_requires_v3() {
        let mut ds = dataset();
        for r in ds.resources_mut() {
            r.repeat(2, RecordField::Attributes).unwrap();
        }
        let err = ContainerWriter::new(&ds, WriterOptions::default()).err().unwrap();
        assert!(matches!(err, DatasetError::Precondition(_)));

        let options = WriterOptions {
            version: FormatVersion::V3,
            ..WriterOptions::default()
        };
        let header = ContainerWriter::new(&ds, options).unwrap().header().unwrap();
        // v3 test block: count + depth + 1 * (2*2 + 1) doubles
        assert_eq!(header.get_u64("validation_offset").unwrap(), 38 + 8 + 40);
    }

    #[test]
    fn replicated_targets_rejected() {
        let mut ds = dataset();
        for r in ds.resources_mut() {
            r.repeat(2, RecordField::Targets).unwrap();
        }
        let options = WriterOptions {
            version: FormatVersion::V3,
            ..WriterOptions::default()
        };
        assert!(ContainerWriter::new(&ds, options).is_err());
    }

    #[test]
    fn mixed_types_rejected() {
        let mut ds = dataset();
        ds.split_mut(Split::Test).resources_mut()[0].convert_type(ElementType::Float);
        assert!(ContainerWriter::new(&ds, WriterOptions::default()).is_err());
    }

    #[test]
    fn empty_dataset_rejected() {
        assert!(ContainerWriter::new(&Dataset::default(), WriterOptions::default()).is_err());
    }

    #[test]
    fn gzip_extension_detection() {
        assert!(is_gzip(Path::new("out/mnist.gz")));
        assert!(is_gzip(Path::new("out/mnist.GZ")));
        assert!(!is_gzip(Path::new("out/mnist.data")));
        assert!(!is_gzip(Path::new("out/mnist")));
    }
}
