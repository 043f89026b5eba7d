use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Result, SupportError};
use crate::models::Message;

/// Append-only message log for one chat session.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: Uuid,
    started_at: DateTime<Utc>,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory registry of live conversations, keyed by session id.
///
/// Sessions exist from `create` until `end`; nothing is persisted. Each
/// conversation has its own lock so one session's turns run one at a time.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Arc<Mutex<Conversation>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Uuid {
        let conversation = Conversation::new();
        let id = conversation.id();
        self.sessions
            .lock()
            .await
            .insert(id, Arc::new(Mutex::new(conversation)));
        tracing::info!(session = %id, "Session started");
        id
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<Mutex<Conversation>>> {
        self.sessions
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| unknown_session(id))
    }

    /// Copy of the session's current state.
    pub async fn snapshot(&self, id: Uuid) -> Result<Conversation> {
        let handle = self.get(id).await?;
        let conversation = handle.lock().await;
        Ok(conversation.clone())
    }

    pub async fn end(&self, id: Uuid) -> Result<Conversation> {
        let handle = self
            .sessions
            .lock()
            .await
            .remove(&id)
            .ok_or_else(|| unknown_session(id))?;
        let conversation = handle.lock().await.clone();
        tracing::info!(session = %id, messages = conversation.len(), "Session ended");
        Ok(conversation)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

fn unknown_session(id: Uuid) -> SupportError {
    SupportError::UnknownSession(id)
}
