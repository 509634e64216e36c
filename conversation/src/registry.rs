use std::collections::HashMap;
use std::sync::Arc;

use dbot_core::Sequence;
use tokio::sync::RwLock;

/// Chat id → active sequence. At most one entry per chat; registering again for a chat replaces
/// the previous sequence (last write wins, the displaced sequence is not notified).
///
/// Cloning is cheap and every clone shares the same map, so sequences can hold a clone to
/// deregister themselves.
#[derive(Clone, Default)]
pub struct ActiveSequenceRegistry {
    sequences: Arc<RwLock<HashMap<i64, Arc<dyn Sequence>>>>,
}

impl ActiveSequenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts the sequence for `chat_id`; returns the displaced one, if any.
    pub async fn register(
        &self,
        chat_id: i64,
        sequence: Arc<dyn Sequence>,
    ) -> Option<Arc<dyn Sequence>> {
        self.sequences.write().await.insert(chat_id, sequence)
    }

    /// Removes the entry for `chat_id`; returns it, if any.
    pub async fn deregister(&self, chat_id: i64) -> Option<Arc<dyn Sequence>> {
        self.sequences.write().await.remove(&chat_id)
    }

    /// Removes the entry for `chat_id` only while it is still `sequence`. Returns true when removed.
    pub async fn deregister_if_current(&self, chat_id: i64, sequence: &Arc<dyn Sequence>) -> bool {
        let mut sequences = self.sequences.write().await;
        let is_current = sequences
            .get(&chat_id)
            .is_some_and(|current| std::ptr::addr_eq(Arc::as_ptr(current), Arc::as_ptr(sequence)));
        if is_current {
            sequences.remove(&chat_id);
        }
        is_current
    }

    pub async fn get(&self, chat_id: i64) -> Option<Arc<dyn Sequence>> {
        self.sequences.read().await.get(&chat_id).cloned()
    }

    pub async fn contains(&self, chat_id: i64) -> bool {
        self.sequences.read().await.contains_key(&chat_id)
    }

    pub async fn len(&self) -> usize {
        self.sequences.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sequences.read().await.is_empty()
    }
}
