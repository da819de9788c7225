//! Error types for textchat.

use thiserror::Error;

/// Crate-level error for configuration, logging setup and session construction.
#[derive(Error, Debug)]
pub enum TextChatError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for configuration input.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Error carried alongside a chat signal.
///
/// Everything except [`ChatError::InvalidStateTransition`] and
/// [`ChatError::MessageTooLong`] is reported by the transport and passed
/// through unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// An operation was attempted outside the state it requires.
    #[error("cannot {operation} while {state}")]
    InvalidStateTransition {
        /// The rejected operation.
        operation: &'static str,
        /// The session state at the time of the call.
        state: &'static str,
    },

    /// The transport failed to join the channel.
    #[error("transport connect error: {0}")]
    TransportConnect(String),

    /// The transport failed to leave the channel.
    #[error("transport disconnect error: {0}")]
    TransportDisconnect(String),

    /// The transport failed to deliver an outbound message.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// An inbound message could not be received or decoded.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// Outbound message text exceeds the configured limit.
    #[error("message too long: {length} characters (max {max})")]
    MessageTooLong {
        /// Length of the rejected text in characters.
        length: usize,
        /// Configured maximum.
        max: usize,
    },
}

impl ChatError {
    /// Check whether this error was synthesized locally rather than reported by the transport.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ChatError::InvalidStateTransition { .. } | ChatError::MessageTooLong { .. }
        )
    }
}

/// Result type alias for textchat operations.
pub type Result<T> = std::result::Result<T, TextChatError>;
