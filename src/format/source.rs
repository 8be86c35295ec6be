//! Where container bytes come from.
//!
//! Every read opens a fresh stream positioned at the requested offset and
//! drops it when the read completes, so no handle outlives one operation.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use super::writer::is_gzip;
use crate::error::{DatasetError, Result};

/// A re-openable byte stream.
pub trait ByteSource {
    /// Open a reader positioned `offset` bytes into the uncompressed data.
    fn open_at(&self, offset: u64) -> Result<Box<dyn Read + '_>>;

    /// Human-readable origin for log lines.
    fn describe(&self) -> String;
}

/// A container stored on disk, gzip-compressed or raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Gzip(PathBuf),
    Raw(PathBuf),
}

impl FileSource {
    /// Pick the stream kind from the extension: `.gz` is gzip, anything else raw.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if is_gzip(&path) {
            FileSource::Gzip(path)
        } else {
            FileSource::Raw(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            FileSource::Gzip(path) | FileSource::Raw(path) => path,
        }
    }
}

impl ByteSource for FileSource {
    fn open_at(&self, offset: u64) -> Result<Box<dyn Read + '_>> {
        match self {
            FileSource::Gzip(path) => {
                let mut decoder = GzDecoder::new(BufReader::new(File::open(path)?));
                // gzip streams cannot seek; decompress and discard the prefix
                let skipped = io::copy(&mut (&mut decoder).take(offset), &mut io::sink())?;
                if skipped != offset {
                    return Err(DatasetError::corrupt(format!(
                        "offset {offset} is past the end of {} ({skipped} bytes)",
                        path.display()
                    )));
                }
                Ok(Box::new(decoder))
            }
            FileSource::Raw(path) => {
                let mut file = File::open(path)?;
                let len = file.metadata()?.len();
                if offset > len {
                    return Err(DatasetError::corrupt(format!(
                        "offset {offset} is past the end of {} ({len} bytes)",
                        path.display()
                    )));
                }
                file.seek(SeekFrom::Start(offset))?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }

    fn describe(&self) -> String {
        self.path().display().to_string()
    }
}

/// An in-memory container image.
impl ByteSource for Vec<u8> {
    fn open_at(&self, offset: u64) -> Result<Box<dyn Read + '_>> {
        let start = usize::try_from(offset)
            .ok()
            .filter(|start| *start <= self.len())
            .ok_or_else(|| {
                DatasetError::corrupt(format!("offset {offset} is past the end of {} bytes", self.len()))
            })?;
        Ok(Box::new(&self[start..]))
    }

    fn describe(&self) -> String {
        format!("<{} bytes in memory>", self.len())
    }
}
