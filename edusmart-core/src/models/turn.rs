use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted user-message / assistant-response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationTurn {
    pub id: i64,
    pub user_id: String,
    pub session_id: String,
    pub user_message: String,
    pub assistant_response: String,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A turn that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTurn {
    pub user_id: String,
    pub session_id: String,
    pub user_message: String,
    pub assistant_response: String,
    pub timestamp: DateTime<Utc>,
}
