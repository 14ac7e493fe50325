//! Application state and shared resources.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::collaborators::{ChannelAudit, ChemistryToolkit, MessagingClient};
use crate::compounds::CompoundLibrary;
use crate::config::{AppConfig, StoreBackend};
use crate::engine::{EngineParts, VerificationEngine};
use crate::preapproval::PreApprovalList;
use crate::store::{SessionRepository, StoreRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Candidate list, index and bulk records
    pub library: Arc<CompoundLibrary>,

    /// Per-group pre-approval lists
    pub preapproval: Arc<PreApprovalList>,

    /// Session stores, one per bot identity
    pub registry: Arc<StoreRegistry>,
}

impl AppState {
    /// Open the compound data and connect the session store
    pub async fn new(config: AppConfig) -> Result<Self> {
        let library = CompoundLibrary::open(
            &config.data.candidate_path,
            &config.data.index_path,
            &config.data.records_path,
        )
        .await
        .context("Failed to open compound library")?;

        let registry = match config.store_backend {
            StoreBackend::Redis => StoreRegistry::connect(&config.redis_url)
                .await
                .context("Failed to connect to Redis")?,
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory session store, sessions are lost on restart");
                StoreRegistry::in_memory()
            }
        };

        let preapproval = PreApprovalList::new(&config.data.groups_dir);

        Ok(Self {
            config,
            library: Arc::new(library),
            preapproval: Arc::new(preapproval),
            registry: Arc::new(registry),
        })
    }

    /// Session repository of the configured bot identity
    pub fn repository(&self) -> Result<SessionRepository> {
        let store = self
            .registry
            .for_bot(self.config.bot_user_id)
            .context("Failed to open session store")?;
        Ok(SessionRepository::new(store, self.config.group_defaults.clone()))
    }

    /// Wire the engine to the platform and chemistry collaborators
    pub fn engine(
        &self,
        client: Arc<dyn MessagingClient>,
        chemistry: Arc<dyn ChemistryToolkit>,
    ) -> Result<VerificationEngine> {
        let audit = Arc::new(ChannelAudit::new(client.clone(), self.config.audit_channel_id));

        Ok(VerificationEngine::new(EngineParts {
            repository: self.repository()?,
            library: self.library.clone(),
            preapproval: self.preapproval.clone(),
            client,
            chemistry,
            audit,
            bot_user_id: self.config.bot_user_id,
            challenge: self.config.challenge.clone(),
            rate_limit: self.config.rate_limit.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compounds::IndexRecord;
    use gate_common::constants::{CHALLENGE_SEQUENCE_START, INDEX_RECORD_SIZE};
    use std::path::Path;

    const ALANINE: &str = "C[C@H](N)C(=O)O";

    fn write_data(dir: &Path) -> AppConfig {
        let mut candidates = 1u32.to_le_bytes().to_vec();
        candidates.extend_from_slice(&1u32.to_le_bytes());
        std::fs::write(dir.join("candidates.bin"), candidates).unwrap();

        let entry = IndexRecord {
            id: 1,
            external_key: 5950,
            offset: 0,
            size: ALANINE.len() as u32,
            atom_count: 6,
            bond_count: 5,
            complexity_score: 61,
            is_chiral: true,
        };
        let mut index = vec![0u8; INDEX_RECORD_SIZE];
        index.extend_from_slice(&entry.to_bytes());
        std::fs::write(dir.join("index.bin"), index).unwrap();
        std::fs::write(dir.join("records.sdf"), format!("{ALANINE}\n")).unwrap();

        let mut config = AppConfig::default();
        config.bot_user_id = 77;
        config.store_backend = StoreBackend::Memory;
        config.data.candidate_path = dir.join("candidates.bin").display().to_string();
        config.data.index_path = dir.join("index.bin").display().to_string();
        config.data.records_path = dir.join("records.sdf").display().to_string();
        config.data.groups_dir = dir.join("groups").display().to_string();
        config
    }

    #[tokio::test]
    async fn test_state_with_memory_store() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(write_data(dir.path())).await.unwrap();

        assert_eq!(state.library.fetch_record_text(1).await.unwrap(), ALANINE);
        let repo = state.repository().unwrap();
        assert_eq!(repo.next_challenge_id().await.unwrap(), CHALLENGE_SEQUENCE_START);
        assert!(!state.preapproval.is_pre_approved(3, 4).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_data_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_data(dir.path());
        config.data.index_path = dir.path().join("absent.bin").display().to_string();

        let err = AppState::new(config).await.err().unwrap();
        assert!(err.to_string().contains("compound library"));
    }

    #[tokio::test]
    async fn test_repository_requires_bot_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_data(dir.path());
        config.bot_user_id = 0;

        let state = AppState::new(config).await.unwrap();
        assert!(state.repository().is_err());
    }
}
