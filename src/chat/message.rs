//! Text message value and its wire payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChatError;

/// Signal kind under which text messages travel over the transport.
pub const TEXT_CHAT_SIGNAL: &str = "text-chat";

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    /// Local identifier, used to match a send outcome to its request.
    pub id: Uuid,
    /// Connection ID of the sender (None until the message is sent).
    pub sender_id: Option<String>,
    /// Sender's display name.
    pub sender_alias: String,
    /// Message content.
    pub text: String,
    /// Timestamp when the message was created.
    pub sent_at: DateTime<Utc>,
}

impl TextMessage {
    /// Create a new outbound message.
    pub fn new(sender_alias: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: None,
            sender_alias: sender_alias.into(),
            text: text.into(),
            sent_at: Utc::now(),
        }
    }

    /// Set the sender's connection ID.
    pub fn with_sender_id(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    /// Length of the text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Format the message for display.
    pub fn format(&self) -> String {
        format!("<{}> {}", self.sender_alias, self.text)
    }

    /// Encode the message as a `text-chat` signal payload.
    pub fn to_payload(&self) -> String {
        let wire = WireMessage {
            sender: WireSender {
                id: self.sender_id.clone().unwrap_or_default(),
                alias: self.sender_alias.clone(),
            },
            text: self.text.clone(),
            sent_on: self.sent_at.timestamp_millis(),
        };
        // Serializing plain strings and integers cannot fail.
        serde_json::to_string(&wire).unwrap_or_default()
    }

    /// Decode a `text-chat` signal payload.
    ///
    /// The decoded message gets a fresh local ID.
    pub fn from_payload(payload: &str) -> Result<Self, ChatError> {
        let wire: WireMessage = serde_json::from_str(payload)
            .map_err(|e| ChatError::TransportReceive(format!("malformed payload: {e}")))?;
        let sent_at = DateTime::from_timestamp_millis(wire.sent_on).ok_or_else(|| {
            ChatError::TransportReceive(format!("invalid timestamp: {}", wire.sent_on))
        })?;

        Ok(Self {
            id: Uuid::new_v4(),
            sender_id: Some(wire.sender.id).filter(|id| !id.is_empty()),
            sender_alias: wire.sender.alias,
            text: wire.text,
            sent_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireSender {
    #[serde(default)]
    id: String,
    alias: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    sender: WireSender,
    text: String,
    #[serde(rename = "sentOn")]
    sent_on: i64,
}
