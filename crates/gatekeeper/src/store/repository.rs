//! Typed access to sessions, group configs and blocked users.

use std::sync::Arc;

use gate_common::{GateError, GroupAuthConfig, GroupInfo, UserAuthSession, now_millis};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{KvStore, RecordKind};
use crate::config::GroupDefaultsConfig;

/// Session and group-config repository over one bot's store
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn KvStore>,
    /// Applied when a group is seen for the first time
    group_defaults: GroupDefaultsConfig,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn KvStore>, group_defaults: GroupDefaultsConfig) -> Self {
        Self {
            store,
            group_defaults,
        }
    }

    pub fn group_defaults(&self) -> &GroupDefaultsConfig {
        &self.group_defaults
    }

    async fn load<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
        key: i64,
    ) -> Result<Option<T>, GateError> {
        let Some(bytes) = self.store.get(kind, key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            GateError::CorruptRecord(format!("{} record {key}: {e}", kind.segment()))
        })
    }

    async fn persist<T: Serialize>(
        &self,
        kind: RecordKind,
        key: i64,
        value: &T,
    ) -> Result<(), GateError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| GateError::Internal(format!("encode {} record: {e}", kind.segment())))?;
        self.store.put(kind, key, &bytes).await
    }

    pub async fn get_session(&self, user_id: i64) -> Result<Option<UserAuthSession>, GateError> {
        self.load(RecordKind::Session, user_id).await
    }

    /// Like `get_session`, but an unreadable record is deleted and treated
    /// as absent
    pub async fn get_session_or_discard(
        &self,
        user_id: i64,
    ) -> Result<Option<UserAuthSession>, GateError> {
        match self.get_session(user_id).await {
            Err(GateError::CorruptRecord(reason)) => {
                tracing::warn!(user_id, reason = %reason, "Discarding unreadable session");
                self.drop_session(user_id).await?;
                Ok(None)
            }
            other => other,
        }
    }

    pub async fn save_session(&self, session: &UserAuthSession) -> Result<(), GateError> {
        session.check_invariants()?;
        self.persist(RecordKind::Session, session.user_id, session)
            .await
    }

    /// Removing an absent session is not an error
    pub async fn drop_session(&self, user_id: i64) -> Result<(), GateError> {
        self.store.delete(RecordKind::Session, user_id).await
    }

    pub async fn get_group_config(
        &self,
        group_id: i64,
    ) -> Result<Option<GroupAuthConfig>, GateError> {
        self.load(RecordKind::GroupConfig, group_id).await
    }

    pub async fn save_group_config(&self, config: &GroupAuthConfig) -> Result<(), GateError> {
        config.validate()?;
        self.persist(RecordKind::GroupConfig, config.group_id, config)
            .await
    }

    /// Stored config for `group`, created from the defaults when absent.
    /// A changed group title is written back.
    pub async fn get_or_create_group_config(
        &self,
        group: &GroupInfo,
    ) -> Result<GroupAuthConfig, GateError> {
        match self.get_group_config(group.group_id).await? {
            Some(mut config) => {
                if config.group_name != group.name {
                    config.group_name = group.name.clone();
                    self.save_group_config(&config).await?;
                }
                Ok(config)
            }
            None => {
                let config = self.group_defaults.apply(group);
                self.save_group_config(&config).await?;
                tracing::debug!(group_id = group.group_id, "New group config created");
                Ok(config)
            }
        }
    }

    pub async fn next_challenge_id(&self) -> Result<i32, GateError> {
        self.store.next_sequence().await
    }

    /// Whether private events from `user_id` are ignored
    pub async fn is_blocked(&self, user_id: i64) -> Result<bool, GateError> {
        Ok(self.store.get(RecordKind::Blocked, user_id).await?.is_some())
    }

    /// Returns false if the user was already blocked
    pub async fn block_user(&self, user_id: i64) -> Result<bool, GateError> {
        if self.is_blocked(user_id).await? {
            return Ok(false);
        }
        self.persist(RecordKind::Blocked, user_id, &now_millis()).await?;
        tracing::info!(user_id, "User blocked");
        Ok(true)
    }

    /// Returns false if the user was not blocked
    pub async fn unblock_user(&self, user_id: i64) -> Result<bool, GateError> {
        if !self.is_blocked(user_id).await? {
            return Ok(false);
        }
        self.store.delete(RecordKind::Blocked, user_id).await?;
        tracing::info!(user_id, "User unblocked");
        Ok(true)
    }
}
