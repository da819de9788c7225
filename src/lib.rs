//! textchat - client-side text chat over a real-time signaling transport.
//!
//! A [`ChatSession`] joins a channel through a [`Transport`], tracks the
//! participants that come and go, and sends and receives text messages.
//! Every outcome is reported as a signal to an optional [`ChatObserver`],
//! the connection or message handler, and any event subscribers.

pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod transport;

pub use chat::{
    connection_handler, message_handler, ChatEvent, ChatObserver, ChatSession, Connection,
    ConnectionHandler, ConnectionRegistry, ConnectionSignal, ConnectionState, MessageHandler,
    MessageSignal, TextMessage, TEXT_CHAT_SIGNAL,
};
pub use config::{Config, Credentials};
pub use error::{ChatError, Result, TextChatError};
pub use transport::{LoopbackHub, LoopbackTransport, Transport, TransportError, TransportEvent};
