use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }
}

/// One line of the in-memory transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: Sender::Bot,
            text: text.into(),
        }
    }
}

/// Contact details gathered across the lead steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub service: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub context: Option<String>,
}

/// Body of `POST /chat/message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub sender: Sender,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_complete: Option<bool>,
}

impl PersistRequest {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            session_id: None,
            sender: Sender::User,
            message: message.into(),
            page_url: None,
            name: None,
            email: None,
            session_complete: None,
        }
    }
}

/// `data` of a successful `POST /chat/message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistAck {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
}

/// A persistence request produced by one accepted user action, tied to the
/// transcript entry it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub message_id: Uuid,
    pub request: PersistRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed(String),
}

/// A transcript line together with the delivery state of its persistence call.
/// Bot lines are never persisted and carry no status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub message: ChatMessage,
    pub delivery: Option<DeliveryStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn persist_request_matches_wire_shape() {
        let mut request = PersistRequest::user("Hello");
        request.session_id = Some("s-1".into());
        request.page_url = Some("/services".into());
        request.session_complete = Some(true);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "sessionId": "s-1",
                "sender": "user",
                "message": "Hello",
                "pageUrl": "/services",
                "sessionComplete": true
            })
        );
    }

    #[test]
    fn first_request_omits_session_id() {
        let value = serde_json::to_value(PersistRequest::user("hi")).unwrap();
        assert!(value.get("sessionId").is_none());
    }
}
