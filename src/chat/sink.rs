//! Signal sinks: the structured observer and the callback handlers.
//!
//! The session turns every transport event into zero or more [`ChatEvent`]s
//! and fans each one out to the observer and the matching handler from a
//! snapshot of the registrations.

use std::sync::{Arc, Weak};

use super::connection::Connection;
use super::message::TextMessage;
use super::signal::{ChatEvent, ConnectionSignal, MessageSignal};
use crate::error::ChatError;

/// Structured listener for chat signals.
///
/// Every method has an empty default so implementors only override what
/// they care about. The session holds observers without owning them.
pub trait ChatObserver: Send + Sync {
    /// A join outcome resolved; `error` is `None` on success.
    fn did_connect(&self, _error: Option<&ChatError>) {}

    /// A leave outcome resolved; `error` is `None` on success.
    fn did_disconnect(&self, _error: Option<&ChatError>) {}

    /// A participant joined the channel.
    fn connection_created(&self, _connection: &Connection) {}

    /// A participant left the channel.
    fn connection_destroyed(&self, _connection: &Connection) {}

    /// An outbound send outcome resolved.
    fn did_send_message(&self, _message: Option<&TextMessage>, _error: Option<&ChatError>) {}

    /// An inbound message arrived, or failed to arrive.
    fn did_receive_message(&self, _message: Option<&TextMessage>, _error: Option<&ChatError>) {}
}

/// Callback receiving connection lifecycle signals.
pub type ConnectionHandler =
    Arc<dyn Fn(ConnectionSignal, Option<&Connection>, Option<&ChatError>) + Send + Sync>;

/// Callback receiving message signals.
pub type MessageHandler =
    Arc<dyn Fn(MessageSignal, Option<&TextMessage>, Option<&ChatError>) + Send + Sync>;

/// Wrap a closure as a [`ConnectionHandler`].
pub fn connection_handler<F>(f: F) -> ConnectionHandler
where
    F: Fn(ConnectionSignal, Option<&Connection>, Option<&ChatError>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a [`MessageHandler`].
pub fn message_handler<F>(f: F) -> MessageHandler
where
    F: Fn(MessageSignal, Option<&TextMessage>, Option<&ChatError>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Handler captured when an operation was issued.
///
/// Its outcome goes to this handler instead of whatever handler is
/// installed when the outcome arrives.
#[derive(Clone)]
pub(crate) enum BoundHandler {
    Connection(Option<ConnectionHandler>),
    Message(Option<MessageHandler>),
}

/// A single event waiting to be fanned out.
pub(crate) struct Delivery {
    pub event: ChatEvent,
    pub bound: Option<BoundHandler>,
}

impl Delivery {
    /// Deliver to the handlers installed at dispatch time.
    pub fn new(event: ChatEvent) -> Self {
        Self { event, bound: None }
    }

    /// Deliver to the handler captured when the operation was issued.
    pub fn bound(event: ChatEvent, handler: BoundHandler) -> Self {
        Self {
            event,
            bound: Some(handler),
        }
    }
}

/// Registered sinks.
#[derive(Default)]
pub(crate) struct SinkSet {
    observer: Option<Weak<dyn ChatObserver>>,
    pub connection_handler: Option<ConnectionHandler>,
    pub message_handler: Option<MessageHandler>,
}

impl SinkSet {
    pub fn set_observer(&mut self, observer: Option<&Arc<dyn ChatObserver>>) {
        self.observer = observer.map(Arc::downgrade);
    }

    /// Freeze the current registrations for one dispatch pass.
    ///
    /// Reassigning a sink while a pass is running affects only later passes.
    pub fn snapshot(&self) -> SinkSnapshot {
        SinkSnapshot {
            observer: self.observer.as_ref().and_then(Weak::upgrade),
            connection_handler: self.connection_handler.clone(),
            message_handler: self.message_handler.clone(),
        }
    }
}

pub(crate) struct SinkSnapshot {
    observer: Option<Arc<dyn ChatObserver>>,
    connection_handler: Option<ConnectionHandler>,
    message_handler: Option<MessageHandler>,
}

impl SinkSnapshot {
    pub fn deliver(&self, delivery: &Delivery) {
        let event = &delivery.event;

        if let Some(observer) = &self.observer {
            notify_observer(observer.as_ref(), event);
        }

        if let Some(signal) = event.connection_signal() {
            let handler = match &delivery.bound {
                Some(BoundHandler::Connection(bound)) => bound.as_ref(),
                _ => self.connection_handler.as_ref(),
            };
            if let Some(handler) = handler {
                handler(signal, event.connection(), event.error());
            }
        }

        if let Some(signal) = event.message_signal() {
            let handler = match &delivery.bound {
                Some(BoundHandler::Message(bound)) => bound.as_ref(),
                _ => self.message_handler.as_ref(),
            };
            if let Some(handler) = handler {
                handler(signal, event.message(), event.error());
            }
        }
    }
}

fn notify_observer(observer: &dyn ChatObserver, event: &ChatEvent) {
    match event {
        ChatEvent::DidConnect { error, .. } => observer.did_connect(error.as_ref()),
        ChatEvent::DidDisconnect { error, .. } => observer.did_disconnect(error.as_ref()),
        ChatEvent::ConnectionCreated(connection) => observer.connection_created(connection),
        ChatEvent::ConnectionDestroyed(connection) => observer.connection_destroyed(connection),
        ChatEvent::DidSendMessage { message, error } => {
            observer.did_send_message(message.as_ref(), error.as_ref())
        }
        ChatEvent::DidReceiveMessage { message, error } => {
            observer.did_receive_message(message.as_ref(), error.as_ref())
        }
    }
}
