use std::io::{self, Read};
use std::path::Path;

use log::{debug, warn};

use super::header::{Header, Layout, CONTAINER_HEADER_SIZE};
use super::source::{ByteSource, FileSource};
use super::version::{truncated, BlockHeader, FormatVersion, Region};
use crate::data::{ElementType, Records, Resource, Values};
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Block decoding
// ---------------------------------------------------------------------------

/// Everything needed to decode one block, taken from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockDecoder {
    version: FormatVersion,
    element_type: ElementType,
    features: usize,
    classes: usize,
}

impl BlockDecoder {
    fn read(&self, reader: &mut dyn Read, region: Region) -> Result<(BlockHeader, Resource)> {
        let prefix = BlockHeader::read_from(reader, self.version, region)?;
        let count = prefix.count as usize;
        let level_len = values_in(count, self.features)?;
        let levels = (0..prefix.depth())
            .map(|_| Values::read_le(reader, self.element_type, level_len).map_err(truncated))
            .collect::<Result<Vec<_>>>()?;
        let labels = Values::read_le(reader, self.element_type, values_in(count, self.classes)?)
            .map_err(truncated)?;
        let resource = Resource::new(
            Records::with_levels(self.features, levels)?,
            Records::new(self.classes, labels)?,
        )?;
        Ok((prefix, resource))
    }

    /// Consume one block without materializing it.
    fn skip(&self, reader: &mut dyn Read, region: Region) -> Result<BlockHeader> {
        let prefix = BlockHeader::read_from(reader, self.version, region)?;
        let bytes = self
            .features
            .checked_mul(prefix.depth())
            .and_then(|n| n.checked_add(self.classes))
            .and_then(|width| (prefix.count as usize).checked_mul(width))
            .and_then(|values| values.checked_mul(self.element_type.size()))
            .and_then(|bytes| u64::try_from(bytes).ok())
            .ok_or_else(|| DatasetError::corrupt("block size overflows"))?;
        let skipped = io::copy(&mut reader.take(bytes), &mut io::sink())?;
        if skipped != bytes {
            return Err(DatasetError::corrupt("train block shorter than its record count"));
        }
        Ok(prefix)
    }
}

/// `count * width` values, or `Corrupt` when a block header lies about its size.
fn values_in(count: usize, width: usize) -> Result<usize> {
    count
        .checked_mul(width)
        .ok_or_else(|| DatasetError::corrupt(format!("{count} records of width {width} overflow")))
}

// ---------------------------------------------------------------------------
// ContainerReader
// ---------------------------------------------------------------------------

/// Random and sequential access to a written container.
///
/// # Example
///
/// ```no_run
/// use denn_db::format::ContainerReader;
///
/// let reader = ContainerReader::open("mnist.gz")?;
/// let test = reader.read_test()?;
/// for batch in reader.batches()? {
///     let batch = batch?;
///     println!("{} train records", batch.len());
/// }
/// println!("{} test records", test.len());
/// # Ok::<(), denn_db::error::DatasetError>(())
/// ```
#[derive(Debug)]
pub struct ContainerReader<S> {
    source: S,
    header: Header,
    decoder: BlockDecoder,
    n_batch: usize,
    test_offset: u64,
    validation_offset: u64,
    train_offset: u64,
}

impl ContainerReader<FileSource> {
    /// Open a container file; `.gz` is decompressed on the fly.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_source(FileSource::new(path.as_ref()))
    }
}

impl<S: ByteSource> ContainerReader<S> {
    /// Parse the header of `source`.
    pub fn from_source(source: S) -> Result<Self> {
        let mut image = [0u8; CONTAINER_HEADER_SIZE];
        source.open_at(0)?.read_exact(&mut image).map_err(truncated)?;
        let header = Layout::container().decode(&image)?;

        let number = header.get_u64("version")?;
        let version = FormatVersion::try_from(u16::try_from(number).unwrap_or(u16::MAX))?;
        let tag = header.get("type")?.as_i64().unwrap_or_default();
        let element_type = i32::try_from(tag)
            .ok()
            .and_then(ElementType::from_tag)
            .ok_or_else(|| DatasetError::corrupt(format!("unknown element type tag {tag}")))?;

        let reader = ContainerReader {
            decoder: BlockDecoder {
                version,
                element_type,
                features: header.get_u64("n_features")? as usize,
                classes: header.get_u64("n_classes")? as usize,
            },
            n_batch: header.get_u64("n_batch")? as usize,
            test_offset: header.get_u64("test_offset")?,
            validation_offset: header.get_u64("validation_offset")?,
            train_offset: header.get_u64("train_offset")?,
            header,
            source,
        };
        debug!(
            "opened {} ({version}, {element_type}, {} batches)",
            reader.source.describe(),
            reader.n_batch
        );
        Ok(reader)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn version(&self) -> FormatVersion {
        self.decoder.version
    }

    pub fn element_type(&self) -> ElementType {
        self.decoder.element_type
    }

    /// Number of train batches.
    pub fn n_batch(&self) -> usize {
        self.n_batch
    }

    pub fn n_features(&self) -> usize {
        self.decoder.features
    }

    pub fn n_classes(&self) -> usize {
        self.decoder.classes
    }

    fn read_region(&self, offset: u64, region: Region) -> Result<Resource> {
        let mut stream = self.source.open_at(offset)?;
        let (_, resource) = self.decoder.read(&mut stream, region)?;
        Ok(resource)
    }

    /// The test block.
    pub fn read_test(&self) -> Result<Resource> {
        self.read_region(self.test_offset, Region::Test)
    }

    /// The validation block.
    pub fn read_validation(&self) -> Result<Resource> {
        self.read_region(self.validation_offset, Region::Validation)
    }

    /// Train batch `index`, wrapping modulo the batch count.
    pub fn batch(&self, index: usize) -> Result<Resource> {
        if self.n_batch == 0 {
            return Err(DatasetError::out_of_range(index, 0));
        }
        let target = index % self.n_batch;
        let mut stream = self.source.open_at(self.train_offset)?;
        for _ in 0..target {
            self.decoder.skip(&mut stream, Region::Train)?;
        }
        let (prefix, resource) = self.decoder.read(&mut stream, Region::Train)?;
        check_batch_index(prefix, target);
        Ok(resource)
    }

    /// Every train batch in file order over one stream.
    pub fn batches(&self) -> Result<Batches<'_>> {
        Ok(Batches {
            stream: self.source.open_at(self.train_offset)?,
            decoder: self.decoder,
            next: 0,
            total: self.n_batch,
        })
    }
}

fn check_batch_index(prefix: BlockHeader, expected: usize) {
    if let Some(found) = prefix.batch_index {
        if found as usize != expected {
            warn!("train block {expected} is labelled as batch {found}");
        }
    }
}

/// Sequential iterator over train batches; stops after the first error.
pub struct Batches<'s> {
    stream: Box<dyn Read + 's>,
    decoder: BlockDecoder,
    next: usize,
    total: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<Resource>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let index = self.next;
        match self.decoder.read(&mut self.stream, Region::Train) {
            Ok((prefix, resource)) => {
                check_batch_index(prefix, index);
                self.next += 1;
                Some(Ok(resource))
            }
            Err(err) => {
                self.next = self.total;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.next;
        (0, Some(left))
    }
}
