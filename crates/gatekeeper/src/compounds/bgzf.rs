//! Random access into BGZF (blocked gzip) files.
//!
//! A BGZF file is a series of independent gzip members, each at most 64 KiB
//! uncompressed, whose `BC` extra subfield carries the compressed block
//! size. Scanning the headers once gives a seek table from logical
//! (uncompressed) offsets to blocks.

use std::io::{Read, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use gate_common::GateError;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// gzip ID1 ID2, CM=deflate, FLG=FEXTRA
pub const BGZF_MAGIC: [u8; 4] = [0x1f, 0x8b, 0x08, 0x04];

/// ID1..XLEN
const FIXED_HEADER_LEN: usize = 12;

/// CRC32 + ISIZE
const TRAILER_LEN: u64 = 8;

#[derive(Debug, Clone, Copy)]
struct Block {
    compressed_offset: u64,
    compressed_size: u64,
    logical_offset: u64,
    logical_size: u64,
}

impl Block {
    fn logical_end(&self) -> u64 {
        self.logical_offset + self.logical_size
    }
}

/// Returns true if the file starts with a BGZF block header
pub async fn is_bgzf(path: impl AsRef<Path>) -> Result<bool, GateError> {
    let mut file = File::open(path.as_ref()).await?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic).await {
        Ok(_) => Ok(magic == BGZF_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Total block size from the `BC` subfield of a gzip extra field
fn block_size(extra: &[u8]) -> Option<u64> {
    let mut rest = extra;
    while rest.len() >= 4 {
        let len = u16::from_le_bytes([rest[2], rest[3]]) as usize;
        let data = rest.get(4..4 + len)?;
        if rest[0] == b'B' && rest[1] == b'C' && len == 2 {
            return Some(u64::from(u16::from_le_bytes([data[0], data[1]])) + 1);
        }
        rest = &rest[4 + len..];
    }
    None
}

pub struct BgzfReader {
    path: PathBuf,
    /// Non-empty blocks in file order
    blocks: Vec<Block>,
    logical_len: u64,
}

impl BgzfReader {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, GateError> {
        let path = path.as_ref().to_path_buf();
        let corrupt = |at: u64, what: &str| {
            GateError::CorruptRecord(format!("{} at byte {at}: {what}", path.display()))
        };

        let mut file = File::open(&path).await?;
        let file_len = file.metadata().await?.len();

        let mut blocks = Vec::new();
        let mut position = 0u64;
        let mut logical = 0u64;

        while position < file_len {
            file.seek(SeekFrom::Start(position)).await?;
            let mut header = [0u8; FIXED_HEADER_LEN];
            file.read_exact(&mut header)
                .await
                .map_err(|_| corrupt(position, "truncated block header"))?;
            if header[..4] != BGZF_MAGIC {
                return Err(corrupt(position, "bad block magic"));
            }

            let xlen = u16::from_le_bytes([header[10], header[11]]) as usize;
            let mut extra = vec![0u8; xlen];
            file.read_exact(&mut extra)
                .await
                .map_err(|_| corrupt(position, "truncated extra field"))?;
            let size = block_size(&extra).ok_or_else(|| corrupt(position, "missing BC subfield"))?;
            if size < FIXED_HEADER_LEN as u64 + xlen as u64 + TRAILER_LEN
                || position + size > file_len
            {
                return Err(corrupt(position, "block size out of range"));
            }

            file.seek(SeekFrom::Start(position + size - 4)).await?;
            let isize = file.read_u32_le().await?;
            if isize > 0 {
                blocks.push(Block {
                    compressed_offset: position,
                    compressed_size: size,
                    logical_offset: logical,
                    logical_size: u64::from(isize),
                });
            }

            logical += u64::from(isize);
            position += size;
        }

        tracing::debug!(
            path = %path.display(),
            blocks = blocks.len(),
            logical_len = logical,
            "BGZF seek table built"
        );

        Ok(Self {
            path,
            blocks,
            logical_len: logical,
        })
    }

    /// Uncompressed length of the whole file
    pub fn logical_len(&self) -> u64 {
        self.logical_len
    }

    /// Read exactly `size` bytes starting at logical `offset`, crossing
    /// block boundaries as needed
    pub async fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>, GateError> {
        let end = offset.checked_add(size as u64);
        if end.is_none_or(|end| end > self.logical_len) {
            return Err(GateError::CorruptRecord(format!(
                "{}: range {offset}+{size} beyond end {}",
                self.path.display(),
                self.logical_len
            )));
        }

        let mut file = File::open(&self.path).await?;
        let mut out = Vec::with_capacity(size);
        let mut cursor = offset;
        let mut next = self.blocks.partition_point(|b| b.logical_end() <= cursor);

        while out.len() < size {
            let block = self.blocks.get(next).ok_or_else(|| {
                GateError::CorruptRecord(format!("{}: short read at {cursor}", self.path.display()))
            })?;
            let data = self.inflate(&mut file, block).await?;

            let start = (cursor - block.logical_offset) as usize;
            let take = (data.len() - start).min(size - out.len());
            out.extend_from_slice(&data[start..start + take]);
            cursor += take as u64;
            next += 1;
        }

        Ok(out)
    }

    async fn inflate(&self, file: &mut File, block: &Block) -> Result<Vec<u8>, GateError> {
        file.seek(SeekFrom::Start(block.compressed_offset)).await?;
        let mut raw = vec![0u8; block.compressed_size as usize];
        file.read_exact(&mut raw).await?;

        let mut data = Vec::with_capacity(block.logical_size as usize);
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut data)
            .map_err(|e| {
                GateError::CorruptRecord(format!(
                    "{}: block at {}: {e}",
                    self.path.display(),
                    block.compressed_offset
                ))
            })?;

        if data.len() as u64 != block.logical_size {
            return Err(GateError::CorruptRecord(format!(
                "{}: block at {} inflated to {} bytes, expected {}",
                self.path.display(),
                block.compressed_offset,
                data.len(),
                block.logical_size
            )));
        }
        Ok(data)
    }
}
