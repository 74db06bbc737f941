//! Process-local [`SessionStore`], used by tests and `DATABASE_URL=memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::session::Session;
use crate::repositories::session::SessionStore;
use crate::types::UserId;

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<UserId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.user_id, session.clone());
        Ok(())
    }

    async fn get(&self, user_id: UserId) -> Result<Session, StoreError> {
        self.sessions
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, user_id: UserId) -> Result<(), StoreError> {
        self.sessions.write().await.remove(&user_id);
        Ok(())
    }
}
