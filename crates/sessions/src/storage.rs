use {async_trait::async_trait, chatmux_common::types::ConversationId, dashmap::DashMap};

use crate::Result;

/// Maps a conversation to the route path it currently sits on.
///
/// Implementations must be safe to call from many dispatch tasks at once.
/// `get`/`set` are individually atomic; callers that read, compute, and write
/// back must hold the conversation's lock from [`crate::ConversationLocks`]
/// across the whole cycle.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Current path, or `None` when the conversation has no state yet.
    async fn get(&self, id: ConversationId) -> Result<Option<String>>;

    async fn set(&self, id: ConversationId, path: &str) -> Result<()>;

    /// Forget the conversation's state; the next lookup starts from the root.
    async fn reset(&self, id: ConversationId) -> Result<()>;
}

/// Sharded in-memory session storage.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    sessions: DashMap<ConversationId, String>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations with stored state.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStorage for InMemoryStorage {
    async fn get(&self, id: ConversationId) -> Result<Option<String>> {
        Ok(self.sessions.get(&id).map(|path| path.value().clone()))
    }

    async fn set(&self, id: ConversationId, path: &str) -> Result<()> {
        self.sessions.insert(id, path.to_string());
        Ok(())
    }

    async fn reset(&self, id: ConversationId) -> Result<()> {
        self.sessions.remove(&id);
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::sync::Arc};

    #[tokio::test]
    async fn get_missing_is_none() {
        let storage = InMemoryStorage::new();
        assert!(storage.get(ConversationId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_overwrites() {
        let storage = InMemoryStorage::new();
        storage.set(ConversationId(1), "/pets").await.unwrap();
        storage.set(ConversationId(1), "/pets/cat").await.unwrap();
        assert_eq!(
            storage.get(ConversationId(1)).await.unwrap().as_deref(),
            Some("/pets/cat")
        );
    }

    #[tokio::test]
    async fn reset_only_touches_one_conversation() {
        let storage = InMemoryStorage::new();
        storage.set(ConversationId(1), "/pets").await.unwrap();
        storage.set(ConversationId(2), "/pets/cat").await.unwrap();

        storage.reset(ConversationId(1)).await.unwrap();

        assert!(storage.get(ConversationId(1)).await.unwrap().is_none());
        assert_eq!(
            storage.get(ConversationId(2)).await.unwrap().as_deref(),
            Some("/pets/cat")
        );
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_writers_on_distinct_conversations() {
        let storage = Arc::new(InMemoryStorage::new());
        let mut tasks = Vec::new();
        for id in 0..32 {
            let storage = Arc::clone(&storage);
            tasks.push(tokio::spawn(async move {
                storage
                    .set(ConversationId(id), &format!("/n{id}"))
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(storage.len(), 32);
        assert_eq!(
            storage.get(ConversationId(7)).await.unwrap().as_deref(),
            Some("/n7")
        );
    }
}
