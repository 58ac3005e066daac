use std::sync::Arc;

use {
    chatmux_common::types::ConversationId,
    dashmap::DashMap,
    tokio::sync::{Mutex, OwnedMutexGuard},
};

/// One async mutex per conversation.
///
/// Guards the router's "read state, compute transition, write state" cycle so
/// two updates from the same chat cannot interleave and lose a transition.
/// Different conversations never contend.
#[derive(Debug, Default)]
pub struct ConversationLocks {
    locks: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. Released when the guard drops.
    pub async fn lock(&self, id: ConversationId) -> OwnedMutexGuard<()> {
        // Clone the Arc out before awaiting so no shard lock is held across
        // the await.
        let mutex = Arc::clone(self.locks.entry(id).or_default().value());
        mutex.lock_owned().await
    }

    /// Drop the mutex for `id` if nobody is holding or waiting on it.
    pub fn forget(&self, id: ConversationId) {
        self.locks
            .remove_if(&id, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::time::Duration};

    #[tokio::test]
    async fn same_conversation_is_serialized() {
        let locks = Arc::new(ConversationLocks::new());
        let guard = locks.lock(ConversationId(1)).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock(ConversationId(1)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_conversations_do_not_contend() {
        let locks = ConversationLocks::new();
        let _a = locks.lock(ConversationId(1)).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(ConversationId(2))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn forget_keeps_held_locks() {
        let locks = ConversationLocks::new();
        let guard = locks.lock(ConversationId(1)).await;
        locks.forget(ConversationId(1));
        assert_eq!(locks.len(), 1);

        drop(guard);
        locks.forget(ConversationId(1));
        assert!(locks.is_empty());
    }
}
