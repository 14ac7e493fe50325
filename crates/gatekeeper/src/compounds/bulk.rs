//! Bulk record store: plain or BGZF, same read semantics.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use gate_common::GateError;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::bgzf::{BgzfReader, is_bgzf};

pub enum BulkRecords {
    Plain { path: PathBuf, len: u64 },
    Bgzf(BgzfReader),
}

impl BulkRecords {
    /// Opens `path`, detecting block compression from the leading bytes
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, GateError> {
        let path = path.as_ref();
        if is_bgzf(path).await? {
            tracing::info!(path = %path.display(), "Bulk records are BGZF compressed");
            return Ok(Self::Bgzf(BgzfReader::open(path).await?));
        }

        let len = tokio::fs::metadata(path).await?.len();
        Ok(Self::Plain {
            path: path.to_path_buf(),
            len,
        })
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Bgzf(_))
    }

    /// Exactly `size` bytes at logical `offset`
    pub async fn read(&self, offset: u64, size: usize) -> Result<Vec<u8>, GateError> {
        match self {
            Self::Bgzf(reader) => reader.read_at(offset, size).await,
            Self::Plain { path, len } => {
                let end = offset.checked_add(size as u64);
                if end.is_none_or(|end| end > *len) {
                    return Err(GateError::CorruptRecord(format!(
                        "{}: range {offset}+{size} beyond end {len}",
                        path.display()
                    )));
                }
                let mut file = File::open(path).await?;
                file.seek(SeekFrom::Start(offset)).await?;
                let mut buf = vec![0u8; size];
                file.read_exact(&mut buf).await?;
                Ok(buf)
            }
        }
    }
}
