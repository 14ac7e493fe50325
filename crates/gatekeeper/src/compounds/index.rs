//! Fixed-width compound index file.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use gate_common::GateError;
use gate_common::constants::INDEX_RECORD_SIZE;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// One 40-byte little-endian index slot
///
/// ```text
/// +0  id              u32
/// +4  reserved        u32
/// +8  external_key    u64
/// +16 offset          u64   byte offset into the bulk record store
/// +24 size            u32
/// +28 reserved        u32
/// +32 atom_count      u16
/// +34 bond_count      u16
/// +36 complexity      u16
/// +38 is_chiral       u8
/// +39 reserved        u8
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub id: u32,
    pub external_key: u64,
    pub offset: u64,
    pub size: u32,
    pub atom_count: u16,
    pub bond_count: u16,
    pub complexity_score: u16,
    pub is_chiral: bool,
}

impl IndexRecord {
    pub fn from_bytes(buf: &[u8; INDEX_RECORD_SIZE]) -> Self {
        let u16_at = |at: usize| u16::from_le_bytes([buf[at], buf[at + 1]]);
        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let u64_at = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[at..at + 8]);
            u64::from_le_bytes(raw)
        };

        Self {
            id: u32_at(0),
            external_key: u64_at(8),
            offset: u64_at(16),
            size: u32_at(24),
            atom_count: u16_at(32),
            bond_count: u16_at(34),
            complexity_score: u16_at(36),
            is_chiral: buf[38] != 0,
        }
    }

    /// Reserved fields are written as zero
    pub fn to_bytes(&self) -> [u8; INDEX_RECORD_SIZE] {
        let mut buf = [0u8; INDEX_RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.id.to_le_bytes());
        buf[8..16].copy_from_slice(&self.external_key.to_le_bytes());
        buf[16..24].copy_from_slice(&self.offset.to_le_bytes());
        buf[24..28].copy_from_slice(&self.size.to_le_bytes());
        buf[32..34].copy_from_slice(&self.atom_count.to_le_bytes());
        buf[34..36].copy_from_slice(&self.bond_count.to_le_bytes());
        buf[36..38].copy_from_slice(&self.complexity_score.to_le_bytes());
        buf[38] = u8::from(self.is_chiral);
        buf
    }
}

/// Random-access reader over the index file. Slot `n` lives at `n * 40`.
pub struct CompoundIndex {
    path: PathBuf,
    record_count: u64,
}

impl CompoundIndex {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, GateError> {
        let path = path.as_ref().to_path_buf();
        let len = tokio::fs::metadata(&path).await?.len();
        if len % INDEX_RECORD_SIZE as u64 != 0 {
            return Err(GateError::CorruptRecord(format!(
                "index file {} has size {len}, not a multiple of {INDEX_RECORD_SIZE}",
                path.display()
            )));
        }

        Ok(Self {
            path,
            record_count: len / INDEX_RECORD_SIZE as u64,
        })
    }

    /// Number of slots, including unused ones
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub async fn lookup(&self, id: u32) -> Result<IndexRecord, GateError> {
        if id == 0 || u64::from(id) >= self.record_count {
            return Err(GateError::NotFound(format!("compound {id}")));
        }

        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start(u64::from(id) * INDEX_RECORD_SIZE as u64))
            .await?;
        let mut buf = [0u8; INDEX_RECORD_SIZE];
        file.read_exact(&mut buf).await?;

        let record = IndexRecord::from_bytes(&buf);
        if record.id == 0 || record.size == 0 {
            return Err(GateError::NotFound(format!("compound {id} (unused slot)")));
        }
        if record.id != id {
            return Err(GateError::CorruptRecord(format!(
                "index slot {id} holds record {}",
                record.id
            )));
        }
        Ok(record)
    }
}
