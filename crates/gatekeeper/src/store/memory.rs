//! In-process store, used for tests and `store_backend = "memory"`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use gate_common::GateError;
use gate_common::constants::CHALLENGE_SEQUENCE_START;
use parking_lot::RwLock;

use super::{KvStore, RecordKind};

pub struct MemoryStore {
    records: RwLock<HashMap<(RecordKind, i64), Vec<u8>>>,
    sequence: AtomicI32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            sequence: AtomicI32::new(CHALLENGE_SEQUENCE_START),
        }
    }

    /// Number of stored records of `kind`
    pub fn count(&self, kind: RecordKind) -> usize {
        self.records.read().keys().filter(|(k, _)| *k == kind).count()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, kind: RecordKind, key: i64) -> Result<Option<Vec<u8>>, GateError> {
        Ok(self.records.read().get(&(kind, key)).cloned())
    }

    async fn put(&self, kind: RecordKind, key: i64, value: &[u8]) -> Result<(), GateError> {
        self.records.write().insert((kind, key), value.to_vec());
        Ok(())
    }

    async fn delete(&self, kind: RecordKind, key: i64) -> Result<(), GateError> {
        self.records.write().remove(&(kind, key));
        Ok(())
    }

    async fn next_sequence(&self) -> Result<i32, GateError> {
        let next = self.sequence.fetch_add(1, Ordering::SeqCst);
        if next == i32::MAX {
            return Err(GateError::Internal("challenge sequence exhausted".into()));
        }
        Ok(next)
    }
}
