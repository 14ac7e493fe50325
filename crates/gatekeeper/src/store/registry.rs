//! One store per bot identity, created lazily.

use std::collections::HashMap;
use std::sync::Arc;

use gate_common::GateError;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;

use super::{KvStore, MemoryStore, RedisStore};

enum Backend {
    Redis(ConnectionManager),
    Memory,
}

/// Hands out the store for a bot user id, creating it on first use.
///
/// Concurrent first requests for the same id observe one instance.
pub struct StoreRegistry {
    backend: Backend,
    stores: Mutex<HashMap<i64, Arc<dyn KvStore>>>,
}

impl StoreRegistry {
    /// Registry backed by a shared Redis connection
    pub async fn connect(redis_url: &str) -> Result<Self, GateError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| GateError::Store(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| GateError::Store(e.to_string()))?;

        tracing::info!(redis_url = %redis_url, "Store registry connected");

        Ok(Self {
            backend: Backend::Redis(conn),
            stores: Mutex::new(HashMap::new()),
        })
    }

    /// Registry of in-process stores
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory,
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn for_bot(&self, bot_user_id: i64) -> Result<Arc<dyn KvStore>, GateError> {
        if bot_user_id <= 0 {
            return Err(GateError::Config(format!("invalid bot user id {bot_user_id}")));
        }

        let mut stores = self.stores.lock();
        let store = stores.entry(bot_user_id).or_insert_with(|| {
            tracing::debug!(bot_user_id, "Opening session store");
            match &self.backend {
                Backend::Redis(conn) => Arc::new(RedisStore::new(conn.clone(), bot_user_id)),
                Backend::Memory => Arc::new(MemoryStore::new()),
            }
        });
        Ok(store.clone())
    }
}
