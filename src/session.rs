//! Per-session conversation state
//!
//! Keyed store of bounded conversation histories. One writer per session at
//! a time; distinct sessions are fully independent. Only the orchestrator
//! mutates histories.

use crate::models::{ComposedResponse, Query};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// One completed turn: the query as asked and the response as returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub query: Query,
    pub response: ComposedResponse,
}

/// A bounded view of recent exchanges handed to handlers and the classifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationWindow {
    pub exchanges: Vec<Exchange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

impl ConversationWindow {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

/// Conversation history for one session
#[derive(Debug, Clone)]
pub struct SessionHistory {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    turns: VecDeque<TurnRecord>,
    max_turns: usize,
}

impl SessionHistory {
    pub fn new(session_id: Uuid, max_turns: usize) -> Self {
        Self {
            session_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            turns: VecDeque::new(),
            max_turns,
        }
    }

    /// Append a completed turn, evicting oldest-first past the ceiling.
    pub fn push(&mut self, record: TurnRecord) {
        self.turns.push_back(record);
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
        self.updated_at = Utc::now();
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Iterate over all retained turns, oldest first
    pub fn turns(&self) -> impl Iterator<Item = &TurnRecord> {
        self.turns.iter()
    }

    /// Last `count` exchanges rendered for classification and handler context.
    pub fn window(&self, count: usize) -> ConversationWindow {
        let skip = self.turns.len().saturating_sub(count);
        ConversationWindow {
            exchanges: self
                .turns
                .iter()
                .skip(skip)
                .map(|turn| Exchange {
                    question: turn.query.text.clone(),
                    answer: turn.response.answer.clone(),
                })
                .collect(),
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.updated_at = Utc::now();
    }
}

/// Keyed store mapping session ids to their histories.
///
/// The outer map is read-mostly; each history sits behind its own mutex so
/// turns within one session serialize while other sessions proceed.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<SessionHistory>>>>,
    max_turns: usize,
}

impl SessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns,
        }
    }

    /// Get or create the history for a session.
    pub async fn session(&self, session_id: Uuid) -> Arc<Mutex<SessionHistory>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(history) = sessions.get(&session_id) {
                return history.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(SessionHistory::new(session_id, self.max_turns))))
            .clone()
    }

    /// Destroy a session's state. Returns whether it existed.
    pub async fn end_session(&self, session_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&session_id).is_some()
    }

    /// Read-only copy of a session's retained turns, oldest first.
    pub async fn snapshot(&self, session_id: Uuid) -> Option<Vec<TurnRecord>> {
        let history = {
            let sessions = self.sessions.read().await;
            sessions.get(&session_id).cloned()
        }?;

        let locked = history.lock().await;
        Some(locked.turns().cloned().collect())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComposedResponse, ResponseStatus};

    fn record(question: &str, answer: &str) -> TurnRecord {
        TurnRecord {
            query: Query::new(question),
            response: ComposedResponse {
                answer: answer.to_string(),
                citations: vec![],
                payloads: vec![],
                contributors: vec![],
                status: ResponseStatus::Answered,
            },
        }
    }

    #[test]
    fn test_eviction_is_oldest_first() {
        let mut history = SessionHistory::new(Uuid::new_v4(), 3);

        for i in 0..5 {
            history.push(record(&format!("question {}", i), "answer"));
        }

        assert_eq!(history.turn_count(), 3);
        let questions: Vec<_> = history.turns().map(|t| t.query.text.as_str()).collect();
        assert_eq!(questions, vec!["question 2", "question 3", "question 4"]);
    }

    #[test]
    fn test_window_takes_most_recent() {
        let mut history = SessionHistory::new(Uuid::new_v4(), 10);

        for i in 0..6 {
            history.push(record(&format!("question {}", i), &format!("answer {}", i)));
        }

        let window = history.window(2);
        assert_eq!(window.exchanges.len(), 2);
        assert_eq!(window.exchanges[0].question, "question 4");
        assert_eq!(window.exchanges[1].answer, "answer 5");
    }

    #[tokio::test]
    async fn test_store_get_or_create_and_end() {
        let store = SessionStore::new(5);
        let session_id = Uuid::new_v4();

        let history = store.session(session_id).await;
        history.lock().await.push(record("q", "a"));

        assert_eq!(store.session_count().await, 1);
        let snapshot = store.snapshot(session_id).await.unwrap();
        assert_eq!(snapshot.len(), 1);

        assert!(store.end_session(session_id).await);
        assert!(!store.end_session(session_id).await);
        assert!(store.snapshot(session_id).await.is_none());
    }
}
