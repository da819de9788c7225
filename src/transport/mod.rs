//! Transport seam for textchat.
//!
//! A [`Transport`] issues join, leave and send requests to the real-time
//! channel and reports their outcomes later as [`TransportEvent`]s, which
//! the owner feeds into [`crate::ChatSession::handle_event`] (or hands the
//! whole event stream to [`crate::ChatSession::pump_events`]).

pub mod loopback;

use thiserror::Error;
use uuid::Uuid;

use crate::chat::{Connection, TextMessage};
use crate::config::Credentials;

pub use loopback::{LoopbackHub, LoopbackTransport};

/// Error reported by the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    /// Create a transport error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Sending half of a transport event stream.
pub type EventSender = tokio::sync::mpsc::UnboundedSender<TransportEvent>;

/// Receiving half of a transport event stream.
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<TransportEvent>;

/// Asynchronous notification from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The join request succeeded.
    JoinSucceeded {
        /// The local participant's connection.
        local: Connection,
        /// Participants already present in the channel.
        remotes: Vec<Connection>,
    },
    /// The join request failed.
    JoinFailed(TransportError),
    /// The leave request completed, or the channel dropped us.
    LeaveCompleted(Result<(), TransportError>),
    /// A remote participant joined.
    RemoteJoined(Connection),
    /// A remote participant left.
    RemoteLeft(String),
    /// A raw signal arrived.
    SignalReceived {
        /// Signal kind; text messages use [`crate::chat::TEXT_CHAT_SIGNAL`].
        kind: String,
        /// Encoded payload.
        payload: String,
        /// Connection ID of the sender, if known.
        from: Option<String>,
    },
    /// An already decoded inbound message.
    MessageReceived(TextMessage),
    /// Inbound delivery failed.
    ReceiveFailed(TransportError),
    /// Outcome of a send request.
    SendCompleted {
        /// ID of the message passed to [`Transport::send`].
        message_id: Uuid,
        /// Whether the transport delivered it.
        result: Result<(), TransportError>,
    },
}

/// Requests a session can issue to the real-time channel.
///
/// Implementations must not block: each call only issues the request and
/// returns. `Err` means the request could not be issued at all; otherwise
/// the outcome arrives later as a [`TransportEvent`].
pub trait Transport: Send + Sync {
    /// Request to join the channel.
    fn join(&self, credentials: &Credentials) -> Result<(), TransportError>;

    /// Request to leave the channel.
    fn leave(&self) -> Result<(), TransportError>;

    /// Request delivery of a message to every participant.
    fn send(&self, message: &TextMessage) -> Result<(), TransportError>;
}
