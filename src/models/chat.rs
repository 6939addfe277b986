use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChatThread {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub subject: String,
    pub status: String,
    pub opened_by: Uuid,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct OpenThreadRequest {
    pub subject: String,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub body: String,
}

/// Messages paginate by created_at cursor, oldest first.
#[derive(Debug, Deserialize)]
pub struct MessageListQuery {
    pub after: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}
