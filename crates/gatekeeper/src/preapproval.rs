//! Per-group pre-approval list.
//!
//! `{groups_dir}/g_{group_id}/anointed.bin` holds ascending big-endian u64
//! user ids, 8 bytes each.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use gate_common::GateError;
use gate_common::constants::{PRE_APPROVAL_ENTRY_SIZE, PRE_APPROVAL_FILE_NAME};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

pub struct PreApprovalList {
    groups_dir: PathBuf,
}

impl PreApprovalList {
    pub fn new(groups_dir: impl AsRef<Path>) -> Self {
        Self {
            groups_dir: groups_dir.as_ref().to_path_buf(),
        }
    }

    pub fn list_path(&self, group_id: i64) -> PathBuf {
        self.groups_dir
            .join(format!("g_{group_id}"))
            .join(PRE_APPROVAL_FILE_NAME)
    }

    /// Binary search for `user_id` in the group's list; a missing list
    /// approves nobody
    pub async fn is_pre_approved(&self, group_id: i64, user_id: i64) -> Result<bool, GateError> {
        if group_id <= 0 || user_id <= 0 {
            return Err(GateError::Internal(format!(
                "invalid pre-approval lookup group={group_id} user={user_id}"
            )));
        }

        let path = self.list_path(group_id);
        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let size = file.metadata().await?.len();
        if size % PRE_APPROVAL_ENTRY_SIZE as u64 != 0 {
            return Err(GateError::CorruptRecord(format!(
                "{} has size {size}, not a multiple of {PRE_APPROVAL_ENTRY_SIZE}",
                path.display()
            )));
        }

        let target = user_id as u64;
        let mut low = 0u64;
        let mut high = size / PRE_APPROVAL_ENTRY_SIZE as u64;
        while low < high {
            let mid = low + (high - low) / 2;
            file.seek(SeekFrom::Start(mid * PRE_APPROVAL_ENTRY_SIZE as u64))
                .await?;
            let entry = file.read_u64().await?;
            match entry.cmp(&target) {
                std::cmp::Ordering::Equal => return Ok(true),
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_list(dir: &Path, group_id: i64, ids: &[u64]) {
        let group_dir = dir.join(format!("g_{group_id}"));
        std::fs::create_dir_all(&group_dir).unwrap();
        let bytes: Vec<u8> = ids.iter().flat_map(|id| id.to_be_bytes()).collect();
        std::fs::write(group_dir.join(PRE_APPROVAL_FILE_NAME), bytes).unwrap();
    }

    #[tokio::test]
    async fn test_present_and_absent_ids() {
        let dir = tempfile::tempdir().unwrap();
        let ids = [3, 17, 256, 1_000_000, 5_000_000_000];
        write_list(dir.path(), 42, &ids);
        let list = PreApprovalList::new(dir.path());

        for id in ids {
            assert!(list.is_pre_approved(42, id as i64).await.unwrap(), "{id}");
        }
        for id in [1, 4, 255, 257, 999_999, 6_000_000_000] {
            assert!(!list.is_pre_approved(42, id).await.unwrap(), "{id}");
        }
    }

    #[tokio::test]
    async fn test_empty_and_missing_lists() {
        let dir = tempfile::tempdir().unwrap();
        write_list(dir.path(), 42, &[]);
        let list = PreApprovalList::new(dir.path());

        assert!(!list.is_pre_approved(42, 3).await.unwrap());
        assert!(!list.is_pre_approved(43, 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_ragged_list_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let group_dir = dir.path().join("g_42");
        std::fs::create_dir_all(&group_dir).unwrap();
        std::fs::write(group_dir.join(PRE_APPROVAL_FILE_NAME), [0u8; 12]).unwrap();

        let list = PreApprovalList::new(dir.path());
        assert!(matches!(
            list.is_pre_approved(42, 3).await,
            Err(GateError::CorruptRecord(_))
        ));
    }
}
