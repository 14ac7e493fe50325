//! Redis-backed store.

use async_trait::async_trait;
use gate_common::GateError;
use gate_common::constants::CHALLENGE_SEQUENCE_START;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{KvStore, RecordKind, record_key, sequence_key};

/// Store for one bot identity on a shared Redis connection
pub struct RedisStore {
    /// Connection manager (auto-reconnecting, cheap to clone)
    redis: ConnectionManager,
    bot_user_id: i64,
}

impl RedisStore {
    pub fn new(redis: ConnectionManager, bot_user_id: i64) -> Self {
        Self { redis, bot_user_id }
    }
}

fn store_error(e: redis::RedisError) -> GateError {
    GateError::Store(e.to_string())
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, kind: RecordKind, key: i64) -> Result<Option<Vec<u8>>, GateError> {
        let mut conn = self.redis.clone();
        conn.get(record_key(self.bot_user_id, kind, key))
            .await
            .map_err(store_error)
    }

    async fn put(&self, kind: RecordKind, key: i64, value: &[u8]) -> Result<(), GateError> {
        let mut conn = self.redis.clone();
        conn.set::<_, _, ()>(record_key(self.bot_user_id, kind, key), value)
            .await
            .map_err(store_error)
    }

    async fn delete(&self, kind: RecordKind, key: i64) -> Result<(), GateError> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(record_key(self.bot_user_id, kind, key))
            .await
            .map_err(store_error)
    }

    async fn next_sequence(&self) -> Result<i32, GateError> {
        let mut conn = self.redis.clone();
        let count: i64 = conn
            .incr(sequence_key(self.bot_user_id), 1)
            .await
            .map_err(store_error)?;

        let next = i64::from(CHALLENGE_SEQUENCE_START) + count - 1;
        i32::try_from(next)
            .map_err(|_| GateError::Internal(format!("challenge sequence exhausted at {next}")))
    }
}
