use crate::models::gemini::Content;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Conversation identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

pub type History = Arc<Mutex<Vec<Content>>>;

/// In-memory conversation histories
///
/// A session is created on first use. Runs on the same session are
/// serialized by the history lock.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<SessionKey, History>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, key: &SessionKey) -> History {
        if let Some(history) = self.sessions.get(key) {
            return Arc::clone(history.value());
        }

        tracing::debug!(
            app_name = %key.app_name,
            user_id = %key.user_id,
            session_id = %key.session_id,
            "Creating session"
        );
        self.sessions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
