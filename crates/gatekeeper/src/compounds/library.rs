//! Candidate list + index + bulk records behind one handle.

use std::path::Path;

use gate_common::GateError;

use super::{BulkRecords, CandidateList, CompoundIndex, IndexRecord};

/// Read-only challenge material, opened once at startup
pub struct CompoundLibrary {
    candidates: CandidateList,
    index: CompoundIndex,
    records: BulkRecords,
}

impl CompoundLibrary {
    pub async fn open(
        candidate_path: impl AsRef<Path>,
        index_path: impl AsRef<Path>,
        records_path: impl AsRef<Path>,
    ) -> Result<Self, GateError> {
        let candidates = CandidateList::load(candidate_path).await?;
        let index = CompoundIndex::open(index_path).await?;
        let records = BulkRecords::open(records_path).await?;

        tracing::info!(
            candidates = candidates.len(),
            index_slots = index.record_count(),
            compressed = records.is_compressed(),
            "Compound library opened"
        );

        Ok(Self::from_parts(candidates, index, records))
    }

    pub fn from_parts(candidates: CandidateList, index: CompoundIndex, records: BulkRecords) -> Self {
        Self {
            candidates,
            index,
            records,
        }
    }

    pub fn candidates(&self) -> &CandidateList {
        &self.candidates
    }

    pub fn next_random_candidate(&self) -> Result<u32, GateError> {
        self.candidates.next_random()
    }

    pub async fn index_record(&self, id: u32) -> Result<IndexRecord, GateError> {
        self.index.lookup(id).await
    }

    /// Raw record bytes for `id`
    pub async fn fetch_record(&self, id: u32) -> Result<Vec<u8>, GateError> {
        let entry = self.index.lookup(id).await?;
        self.records.read(entry.offset, entry.size as usize).await
    }

    pub async fn fetch_record_text(&self, id: u32) -> Result<String, GateError> {
        let bytes = self.fetch_record(id).await?;
        String::from_utf8(bytes)
            .map_err(|e| GateError::CorruptRecord(format!("compound {id} is not UTF-8: {e}")))
    }
}
