//! Verification session store.
//!
//! A per-bot-identity key-value store holding JSON records. `RecordKind`
//! keeps session keys and group-config keys in separate namespaces.
//!
//! ```text
//! gate:{bot_user_id}:session:{user_id}   -> UserAuthSession
//! gate:{bot_user_id}:group:{group_id}    -> GroupAuthConfig
//! gate:{bot_user_id}:blocked:{user_id}   -> blocked-at millis
//! gate:{bot_user_id}:challenge_seq       -> i64 counter
//! ```

mod memory;
mod redis;
mod registry;
mod repository;

pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use registry::StoreRegistry;
pub use repository::SessionRepository;

use async_trait::async_trait;
use gate_common::GateError;
use gate_common::constants::store_keys;

/// Record namespaces inside one bot's store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Session,
    GroupConfig,
    Blocked,
}

impl RecordKind {
    pub fn segment(&self) -> &'static str {
        match self {
            Self::Session => store_keys::SESSION_SEGMENT,
            Self::GroupConfig => store_keys::GROUP_CONFIG_SEGMENT,
            Self::Blocked => store_keys::BLOCKED_SEGMENT,
        }
    }
}

/// Raw byte store scoped to one bot identity.
///
/// Single-key operations are linearizable (last write wins); there are no
/// cross-key transactions.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, kind: RecordKind, key: i64) -> Result<Option<Vec<u8>>, GateError>;

    async fn put(&self, kind: RecordKind, key: i64, value: &[u8]) -> Result<(), GateError>;

    async fn delete(&self, kind: RecordKind, key: i64) -> Result<(), GateError>;

    /// Next challenge id; strictly increasing for the lifetime of the store
    async fn next_sequence(&self) -> Result<i32, GateError>;
}

/// Full key of a record
pub fn record_key(bot_user_id: i64, kind: RecordKind, key: i64) -> String {
    format!(
        "{}{}:{}:{}",
        store_keys::ROOT_PREFIX,
        bot_user_id,
        kind.segment(),
        key
    )
}

/// Key of the challenge sequence counter
pub fn sequence_key(bot_user_id: i64) -> String {
    format!(
        "{}{}:{}",
        store_keys::ROOT_PREFIX,
        bot_user_id,
        store_keys::CHALLENGE_SEQUENCE_SEGMENT
    )
}
