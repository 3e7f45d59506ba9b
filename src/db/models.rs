use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: Uuid,
    pub page_url: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredChatMessage {
    pub id: i64,
    pub session_id: Uuid,
    pub sender: String,
    pub content: String,
    pub page_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A session together with its messages, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTranscript {
    pub session: ChatSession,
    pub messages: Vec<StoredChatMessage>,
}

/// An admin record: the JSON document plus bookkeeping columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub collection: String,
    pub id: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDeadLetter {
    pub id: i64,
    pub conversation_id: Uuid,
    /// Session the conversation ended up in, once any of its requests got through.
    pub session_id: Option<String>,
    pub message_id: Uuid,
    pub payload: serde_json::Value,
    pub error: String,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}
