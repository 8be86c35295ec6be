use std::fmt;
use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Format versions
// ---------------------------------------------------------------------------

/// Container block layout.
///
/// ```text
/// v1  train: [batch u32][n u32][data][labels]   test/validation: [n u32][data][labels]
/// v2  every block: [n u32][data][labels]
/// v3  train: [batch u32][n u32][depth u32][data x depth][labels]
///     test/validation: [n u32][depth u32][data x depth][labels]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum FormatVersion {
    #[default]
    V1,
    V2,
    V3,
}

impl FormatVersion {
    pub const fn number(self) -> u16 {
        match self {
            FormatVersion::V1 => 1,
            FormatVersion::V2 => 2,
            FormatVersion::V3 => 3,
        }
    }

    /// Train blocks carry their batch index.
    pub const fn has_batch_index(self) -> bool {
        !matches!(self, FormatVersion::V2)
    }

    /// Every block carries the depth of its attribute data.
    pub const fn has_depth(self) -> bool {
        matches!(self, FormatVersion::V3)
    }

    /// Size of the fixed prefix before a block's payload.
    pub const fn prefix_len(self, region: Region) -> usize {
        let mut len = 4;
        if self.has_batch_index() && matches!(region, Region::Train) {
            len += 4;
        }
        if self.has_depth() {
            len += 4;
        }
        len
    }
}

impl TryFrom<u16> for FormatVersion {
    type Error = DatasetError;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            1 => Ok(FormatVersion::V1),
            2 => Ok(FormatVersion::V2),
            3 => Ok(FormatVersion::V3),
            other => Err(DatasetError::UnknownFormatVersion(other)),
        }
    }
}

impl From<FormatVersion> for u16 {
    fn from(version: FormatVersion) -> u16 {
        version.number()
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// Which part of the container a block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Test,
    Validation,
    Train,
}

// ---------------------------------------------------------------------------
// Block prefix
// ---------------------------------------------------------------------------

/// The fixed fields in front of every block payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Present on v1/v3 train blocks only.
    pub batch_index: Option<u32>,
    pub count: u32,
    /// Present on v3 blocks only.
    pub depth: Option<u32>,
}

impl BlockHeader {
    /// Build the prefix `version` expects for `region`.
    pub fn new(version: FormatVersion, region: Region, batch_index: u32, count: u32, depth: u32) -> Self {
        BlockHeader {
            batch_index: (version.has_batch_index() && region == Region::Train).then_some(batch_index),
            count,
            depth: version.has_depth().then_some(depth),
        }
    }

    /// Depth of the attribute payload, 1 when not recorded.
    pub fn depth(&self) -> usize {
        self.depth.map_or(1, |d| d as usize)
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        if let Some(index) = self.batch_index {
            writer.write_all(&index.to_le_bytes())?;
        }
        writer.write_all(&self.count.to_le_bytes())?;
        if let Some(depth) = self.depth {
            writer.write_all(&depth.to_le_bytes())?;
        }
        Ok(())
    }

    /// Read the prefix `version` defines for `region`.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R, version: FormatVersion, region: Region) -> Result<Self> {
        let batch_index = if version.has_batch_index() && region == Region::Train {
            Some(read_u32(reader)?)
        } else {
            None
        };
        let count = read_u32(reader)?;
        let depth = if version.has_depth() {
            let depth = read_u32(reader)?;
            if depth == 0 {
                return Err(DatasetError::corrupt("block declares depth 0"));
            }
            Some(depth)
        } else {
            None
        };
        Ok(BlockHeader {
            batch_index,
            count,
            depth,
        })
    }
}

fn read_u32<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(u32::from_le_bytes(buf))
}

/// Map an early end of stream to [`DatasetError::Corrupt`].
pub(crate) fn truncated(err: io::Error) -> DatasetError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => DatasetError::corrupt("unexpected end of container data"),
        io::ErrorKind::InvalidData => DatasetError::corrupt(err.to_string()),
        _ => DatasetError::Io(err),
    }
}
