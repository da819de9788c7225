//! Chat module for textchat.
//!
//! This module provides the client side of a text chat channel:
//! - Connection records and the registry of known participants
//! - The chat session state machine (connect, disconnect, send)
//! - Signals fanned out to an observer, callback handlers and subscribers

mod connection;
mod message;
mod registry;
mod session;
mod signal;
mod sink;

pub use connection::Connection;
pub use message::{TextMessage, TEXT_CHAT_SIGNAL};
pub use registry::ConnectionRegistry;
pub use session::ChatSession;
pub use signal::{ChatEvent, ConnectionSignal, ConnectionState, MessageSignal};
pub use sink::{
    connection_handler, message_handler, ChatObserver, ConnectionHandler, MessageHandler,
};
