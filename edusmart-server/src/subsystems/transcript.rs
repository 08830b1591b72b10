//! Conversation transcript
//!
//! Append-only log of turns keyed by `(user_id, session_id)`. The read path
//! returns the newest turns first; callers reverse them for display.
//!
//! `Transcript` never fails outward: a storage outage is logged and the chat
//! carries on without history.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edusmart_core::{ConversationTurn, DegradedReason, NewTurn, Outcome};
use sqlx::PgPool;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("In-memory transcript poisoned")]
    Poisoned,
}

#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Persist one turn and return its id.
    async fn append(&self, turn: &NewTurn) -> Result<i64, TranscriptError>;

    /// Up to `limit` turns for the session, newest first.
    async fn recent(
        &self,
        user_id: &str,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, TranscriptError>;

    async fn ping(&self) -> Result<(), TranscriptError>;
}

// ============================================================================
// Postgres
// ============================================================================

pub struct PgTranscriptStore {
    pool: PgPool,
}

impl PgTranscriptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TranscriptStore for PgTranscriptStore {
    async fn append(&self, turn: &NewTurn) -> Result<i64, TranscriptError> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO conversation_history
                (user_id, session_id, user_message, assistant_response, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&turn.user_id)
        .bind(&turn.session_id)
        .bind(&turn.user_message)
        .bind(&turn.assistant_response)
        .bind(turn.timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn recent(
        &self,
        user_id: &str,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, TranscriptError> {
        let rows = sqlx::query_as::<_, ConversationTurn>(
            r#"
            SELECT id, user_id, session_id,
                   COALESCE(user_message, '') AS user_message,
                   COALESCE(assistant_response, '') AS assistant_response,
                   COALESCE(timestamp, created_at, now()) AS timestamp,
                   COALESCE(created_at, timestamp, now()) AS created_at
            FROM conversation_history
            WHERE user_id = $1 AND session_id = $2
            ORDER BY conversation_history.timestamp DESC NULLS LAST, id DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(session_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn ping(&self) -> Result<(), TranscriptError> {
        sqlx::query("SELECT 1 FROM conversation_history LIMIT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store for running without Postgres, and for tests.
#[derive(Default)]
pub struct MemoryTranscriptStore {
    turns: Mutex<Vec<ConversationTurn>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn append(&self, turn: &NewTurn) -> Result<i64, TranscriptError> {
        let mut turns = self.turns.lock().map_err(|_| TranscriptError::Poisoned)?;
        let id = turns.len() as i64 + 1;
        turns.push(ConversationTurn {
            id,
            user_id: turn.user_id.clone(),
            session_id: turn.session_id.clone(),
            user_message: turn.user_message.clone(),
            assistant_response: turn.assistant_response.clone(),
            timestamp: turn.timestamp,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn recent(
        &self,
        user_id: &str,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, TranscriptError> {
        let turns = self.turns.lock().map_err(|_| TranscriptError::Poisoned)?;
        let mut matching: Vec<ConversationTurn> = turns
            .iter()
            .filter(|t| t.user_id == user_id && t.session_id == session_id)
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn ping(&self) -> Result<(), TranscriptError> {
        self.turns.lock().map(|_| ()).map_err(|_| TranscriptError::Poisoned)
    }
}

// ============================================================================
// Component
// ============================================================================

#[derive(Clone)]
pub struct Transcript {
    store: Arc<dyn TranscriptStore>,
}

impl Transcript {
    pub fn new(store: Arc<dyn TranscriptStore>) -> Self {
        Self { store }
    }

    pub async fn append(
        &self,
        user_id: &str,
        session_id: &str,
        user_message: &str,
        assistant_response: &str,
        timestamp: DateTime<Utc>,
    ) -> Outcome<()> {
        let turn = NewTurn {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            user_message: user_message.to_string(),
            assistant_response: assistant_response.to_string(),
            timestamp,
        };

        match self.store.append(&turn).await {
            Ok(id) => {
                tracing::debug!(id, user_id, session_id, "Stored conversation turn");
                Outcome::ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, user_id, session_id, "Failed to store conversation turn");
                Outcome::degraded((), DegradedReason::StoreUnavailable(e.to_string()))
            }
        }
    }

    pub async fn recent(
        &self,
        user_id: &str,
        session_id: &str,
        limit: u32,
    ) -> Outcome<Vec<ConversationTurn>> {
        match self.store.recent(user_id, session_id, limit).await {
            Ok(turns) => Outcome::ok(turns),
            Err(e) => {
                tracing::warn!(error = %e, user_id, session_id, "Conversation history unavailable");
                Outcome::degraded(Vec::new(), DegradedReason::StoreUnavailable(e.to_string()))
            }
        }
    }

    /// `"connected"` or `"error: …"` for the diagnostics probe.
    pub async fn status(&self) -> String {
        match self.store.ping().await {
            Ok(()) => "connected".to_string(),
            Err(e) => format!("error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct BrokenStore;

    #[async_trait]
    impl TranscriptStore for BrokenStore {
        async fn append(&self, _turn: &NewTurn) -> Result<i64, TranscriptError> {
            Err(TranscriptError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn recent(
            &self,
            _user_id: &str,
            _session_id: &str,
            _limit: u32,
        ) -> Result<Vec<ConversationTurn>, TranscriptError> {
            Err(TranscriptError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn ping(&self) -> Result<(), TranscriptError> {
            Err(TranscriptError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    fn memory() -> Transcript {
        Transcript::new(Arc::new(MemoryTranscriptStore::new()))
    }

    #[tokio::test]
    async fn append_then_recent_returns_it_first() {
        let transcript = memory();
        let t0 = Utc::now();
        transcript.append("u1", "s1", "first", "one", t0).await;
        transcript
            .append("u1", "s1", "second", "two", t0 + Duration::seconds(1))
            .await;

        let latest = transcript.recent("u1", "s1", 1).await;
        assert!(!latest.is_degraded());
        assert_eq!(latest.value().len(), 1);
        assert_eq!(latest.value()[0].user_message, "second");
    }

    #[tokio::test]
    async fn sessions_do_not_leak_into_each_other() {
        let transcript = memory();
        let now = Utc::now();
        transcript.append("u1", "s1", "in s1", "a", now).await;
        transcript.append("u1", "s2", "in s2", "b", now).await;
        transcript.append("u2", "s1", "other user", "c", now).await;

        let turns = transcript.recent("u1", "s1", 10).await.into_value();
        assert_eq!(turns.len(), 1);
        assert!(turns.iter().all(|t| t.session_id == "s1" && t.user_id == "u1"));
    }

    #[tokio::test]
    async fn equal_timestamps_order_by_id() {
        let transcript = memory();
        let now = Utc::now();
        for msg in ["a", "b", "c"] {
            transcript.append("u", "s", msg, "r", now).await;
        }

        let turns = transcript.recent("u", "s", 5).await.into_value();
        let messages: Vec<&str> = turns.iter().map(|t| t.user_message.as_str()).collect();
        assert_eq!(messages, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn unknown_session_is_empty_not_degraded() {
        let outcome = memory().recent("nobody", "none", 5).await;
        assert!(outcome.value().is_empty());
        assert!(!outcome.is_degraded());
    }

    #[tokio::test]
    async fn broken_store_degrades_both_paths() {
        let transcript = Transcript::new(Arc::new(BrokenStore));

        let stored = transcript.append("u", "s", "m", "r", Utc::now()).await;
        assert!(matches!(stored.reason(), Some(DegradedReason::StoreUnavailable(_))));

        let history = transcript.recent("u", "s", 5).await;
        assert!(history.value().is_empty());
        assert!(matches!(history.reason(), Some(DegradedReason::StoreUnavailable(_))));

        assert!(transcript.status().await.starts_with("error: "));
    }

    #[tokio::test]
    async fn memory_store_reports_connected() {
        assert_eq!(memory().status().await, "connected");
    }
}
