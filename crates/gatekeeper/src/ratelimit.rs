//! Keyed token bucket.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Sweep full buckets once this many keys are tracked
const PRUNE_THRESHOLD: usize = 1024;

struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// `capacity` tokens per key, one token back every `refill_interval`
pub struct TokenBucket<K> {
    capacity: u32,
    refill_interval: Duration,
    buckets: Mutex<HashMap<K, Bucket>>,
}

impl<K: Eq + Hash> TokenBucket<K> {
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            refill_interval: refill_interval.max(Duration::from_millis(1)),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token for `key`.
    ///
    /// Returns the tokens left after this call, or -1 if none was available.
    /// 0 means the quota was just exhausted and the caller should tell the
    /// user once; negative means drop silently.
    pub fn consume(&self, key: K) -> i64 {
        self.consume_at(key, Instant::now())
    }

    fn consume_at(&self, key: K, now: Instant) -> i64 {
        let mut buckets = self.buckets.lock();
        if buckets.len() > PRUNE_THRESHOLD {
            let full_after = self.refill_interval * self.capacity;
            buckets.retain(|_, b| now.saturating_duration_since(b.last_refill) < full_after);
        }
        let bucket = buckets.entry(key).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let refills = (elapsed.as_millis() / self.refill_interval.as_millis()) as u64;
        if refills > 0 {
            bucket.tokens = (u64::from(bucket.tokens) + refills).min(u64::from(self.capacity)) as u32;
            bucket.last_refill += self.refill_interval * refills.min(u64::from(u32::MAX)) as u32;
        }

        if bucket.tokens == 0 {
            return -1;
        }
        bucket.tokens -= 1;
        i64::from(bucket.tokens)
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }
}
