//! Reply -> follow-up association for cascade delete.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::collaborators::{ChatId, MessageId};

/// Bounded LRU of `(chat, user message) -> bot reply`; eviction is by size
pub struct CascadeDeleter {
    links: Mutex<LruCache<(ChatId, MessageId), MessageId>>,
}

impl CascadeDeleter {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            links: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Delete `follow_up` when `trigger` is deleted
    pub fn link(&self, chat: ChatId, trigger: MessageId, follow_up: MessageId) {
        self.links.lock().put((chat, trigger), follow_up);
    }

    /// Remove and return the follow-ups of the deleted `triggers`
    pub fn take(&self, chat: ChatId, triggers: &[MessageId]) -> Vec<MessageId> {
        let mut links = self.links.lock();
        triggers
            .iter()
            .filter_map(|trigger| links.pop(&(chat, *trigger)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.links.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
