//! Candidate list: the ids considered good challenge material.

use std::path::Path;

use gate_common::GateError;
use rand::Rng;

/// `count: u32` followed by `count` little-endian `u32` ids, loaded fully
/// into memory
#[derive(Debug, Clone)]
pub struct CandidateList {
    ids: Vec<u32>,
}

impl CandidateList {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, GateError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let list = Self::parse(&bytes)
            .map_err(|e| GateError::CorruptRecord(format!("{}: {e}", path.display())))?;

        tracing::info!(
            path = %path.display(),
            candidates = list.len(),
            "Candidate list loaded"
        );
        Ok(list)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let Some((head, body)) = bytes.split_first_chunk::<4>() else {
            return Err("missing count header".into());
        };
        let count = u32::from_le_bytes(*head) as usize;
        if body.len() != count * 4 {
            return Err(format!(
                "header declares {count} ids but {} bytes follow",
                body.len()
            ));
        }

        let ids = body
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { ids })
    }

    pub fn from_ids(ids: Vec<u32>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    /// Uniform draw over the whole list
    pub fn next_random(&self) -> Result<u32, GateError> {
        if self.ids.is_empty() {
            return Err(GateError::NotFound("candidate list is empty".into()));
        }
        let at = rand::rng().random_range(0..self.ids.len());
        Ok(self.ids[at])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn encode(ids: &[u32]) -> Vec<u8> {
        let mut bytes = (ids.len() as u32).to_le_bytes().to_vec();
        for id in ids {
            bytes.extend_from_slice(&id.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_parse() {
        let list = CandidateList::parse(&encode(&[5, 9, 1024])).unwrap();
        assert_eq!(list.ids(), &[5, 9, 1024]);
        assert!(list.contains(9));
        assert!(!list.contains(10));
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let mut bytes = encode(&[5, 9]);
        bytes.pop();
        assert!(CandidateList::parse(&bytes).is_err());
        assert!(CandidateList::parse(&[1, 0]).is_err());
    }

    #[test]
    fn test_draws_cover_whole_list() {
        let ids = [11, 22, 33, 44, 55];
        let list = CandidateList::from_ids(ids.to_vec());
        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            let id = list.next_random().unwrap();
            assert!(list.contains(id));
            seen.insert(id);
        }
        assert_eq!(seen.len(), ids.len());
    }

    #[test]
    fn test_empty_list_has_no_draw() {
        let list = CandidateList::from_ids(Vec::new());
        assert!(matches!(list.next_random(), Err(GateError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), encode(&[7, 8])).unwrap();
        let list = CandidateList::load(file.path()).await.unwrap();
        assert_eq!(list.len(), 2);
    }
}
