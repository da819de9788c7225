//! Session state and the signals a session emits.

use super::connection::Connection;
use super::message::TextMessage;
use crate::error::ChatError;

/// Lifecycle state of a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not attached to the channel.
    #[default]
    Disconnected,
    /// Join requested, outcome pending.
    Connecting,
    /// Attached to the channel.
    Connected,
    /// Leave requested, outcome pending.
    Disconnecting,
}

impl ConnectionState {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection lifecycle signals, delivered to the connection handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// A join outcome resolved.
    DidConnect,
    /// A leave outcome resolved.
    DidDisconnect,
    /// A participant joined.
    ConnectionCreated,
    /// A participant left.
    ConnectionDestroyed,
}

/// Message signals, delivered to the message handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSignal {
    /// An outbound send outcome resolved.
    DidSendMessage,
    /// An inbound message was delivered.
    DidReceiveMessage,
}

/// A signal together with its payload and error.
///
/// This is the single internal event the session fans out to every sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Join outcome. Carries the local connection on success.
    DidConnect {
        connection: Option<Connection>,
        error: Option<ChatError>,
    },
    /// Leave outcome. Carries the former local connection, if there was one.
    DidDisconnect {
        connection: Option<Connection>,
        error: Option<ChatError>,
    },
    /// A participant joined.
    ConnectionCreated(Connection),
    /// A participant left.
    ConnectionDestroyed(Connection),
    /// Outbound send outcome.
    DidSendMessage {
        message: Option<TextMessage>,
        error: Option<ChatError>,
    },
    /// Inbound delivery. `message` is absent when `error` is set by a
    /// failed receive.
    DidReceiveMessage {
        message: Option<TextMessage>,
        error: Option<ChatError>,
    },
}

impl ChatEvent {
    /// The error accompanying this signal, if any.
    pub fn error(&self) -> Option<&ChatError> {
        match self {
            ChatEvent::DidConnect { error, .. }
            | ChatEvent::DidDisconnect { error, .. }
            | ChatEvent::DidSendMessage { error, .. }
            | ChatEvent::DidReceiveMessage { error, .. } => error.as_ref(),
            ChatEvent::ConnectionCreated(_) | ChatEvent::ConnectionDestroyed(_) => None,
        }
    }

    /// The connection signal for this event, if it is a lifecycle event.
    pub fn connection_signal(&self) -> Option<ConnectionSignal> {
        match self {
            ChatEvent::DidConnect { .. } => Some(ConnectionSignal::DidConnect),
            ChatEvent::DidDisconnect { .. } => Some(ConnectionSignal::DidDisconnect),
            ChatEvent::ConnectionCreated(_) => Some(ConnectionSignal::ConnectionCreated),
            ChatEvent::ConnectionDestroyed(_) => Some(ConnectionSignal::ConnectionDestroyed),
            _ => None,
        }
    }

    /// The message signal for this event, if it is a message event.
    pub fn message_signal(&self) -> Option<MessageSignal> {
        match self {
            ChatEvent::DidSendMessage { .. } => Some(MessageSignal::DidSendMessage),
            ChatEvent::DidReceiveMessage { .. } => Some(MessageSignal::DidReceiveMessage),
            _ => None,
        }
    }

    /// The connection payload, if any.
    pub fn connection(&self) -> Option<&Connection> {
        match self {
            ChatEvent::DidConnect { connection, .. }
            | ChatEvent::DidDisconnect { connection, .. } => connection.as_ref(),
            ChatEvent::ConnectionCreated(c) | ChatEvent::ConnectionDestroyed(c) => Some(c),
            _ => None,
        }
    }

    /// The message payload, if any.
    pub fn message(&self) -> Option<&TextMessage> {
        match self {
            ChatEvent::DidSendMessage { message, .. }
            | ChatEvent::DidReceiveMessage { message, .. } => message.as_ref(),
            _ => None,
        }
    }
}
