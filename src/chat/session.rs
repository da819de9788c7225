//! Chat session: connection lifecycle and signal dispatch.
//!
//! All state lives behind one lock and every mutation goes through a single
//! dispatch path: take the dispatch lock, apply the operation or transport
//! event to the state, release the state lock, then fan the resulting
//! events out to the sinks. Events are therefore applied atomically and
//! delivered in the order they were applied.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::connection::Connection;
use super::message::{TextMessage, TEXT_CHAT_SIGNAL};
use super::registry::ConnectionRegistry;
use super::signal::{ChatEvent, ConnectionState};
use super::sink::{
    BoundHandler, ChatObserver, ConnectionHandler, Delivery, MessageHandler, SinkSet,
};
use crate::config::{ChatConfig, Config, Credentials};
use crate::error::ChatError;
use crate::transport::{EventReceiver, Transport, TransportEvent};
use crate::Result;

/// Mutable session state, only touched under the dispatch lock.
#[derive(Default)]
struct SessionState {
    state: ConnectionState,
    self_connection: Option<Connection>,
    /// Local connection while a leave is in flight.
    departing: Option<Connection>,
    registry: ConnectionRegistry,
    receiver_alias: Option<String>,
    /// Set once an inbound message has named the receiver in this connection.
    receiver_alias_from_message: bool,
    /// Handler captured by the in-flight connect.
    pending_connect: Option<BoundHandler>,
    /// In-flight sends in issue order, with the handler captured for each.
    pending_sends: Vec<(TextMessage, Option<MessageHandler>)>,
}

impl SessionState {
    fn self_id(&self) -> Option<&str> {
        self.self_connection
            .as_ref()
            .or(self.departing.as_ref())
            .map(Connection::connection_id)
    }

    fn is_attached(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Disconnecting
        )
    }

    fn set_state(&mut self, state: ConnectionState) {
        debug!("Chat session state changed: {} -> {}", self.state, state);
        self.state = state;
    }

    fn note_remote(&mut self, connection: &Connection) {
        if !self.receiver_alias_from_message && !connection.custom_data().is_empty() {
            self.receiver_alias = Some(connection.custom_data().to_string());
        }
    }

    /// Tear down after a leave outcome.
    ///
    /// Sends still in flight can no longer complete, so each one resolves
    /// with an error before the disconnect itself is reported.
    fn finish_disconnect(&mut self, error: Option<ChatError>) -> Vec<Delivery> {
        let former = self.self_connection.take().or(self.departing.take());
        self.set_state(ConnectionState::Disconnected);
        self.registry.clear();
        self.receiver_alias = None;
        self.receiver_alias_from_message = false;

        let mut deliveries: Vec<Delivery> = self
            .pending_sends
            .drain(..)
            .map(|(message, handler)| {
                Delivery::bound(
                    ChatEvent::DidSendMessage {
                        message: Some(message),
                        error: Some(ChatError::TransportSend(
                            "disconnected before delivery completed".to_string(),
                        )),
                    },
                    BoundHandler::Message(handler),
                )
            })
            .collect();
        deliveries.push(Delivery::new(ChatEvent::DidDisconnect {
            connection: former,
            error,
        }));
        deliveries
    }

    fn receive(&mut self, message: TextMessage) -> Vec<Delivery> {
        if message.sender_id.is_some() && message.sender_id.as_deref() == self.self_id() {
            debug!("Ignoring echo of own message {}", message.id);
            return Vec::new();
        }
        self.receiver_alias = Some(message.sender_alias.clone());
        self.receiver_alias_from_message = true;
        vec![Delivery::new(ChatEvent::DidReceiveMessage {
            message: Some(message),
            error: None,
        })]
    }

    /// Apply one transport event and return the signals it produces.
    fn apply(&mut self, event: TransportEvent) -> Vec<Delivery> {
        match event {
            TransportEvent::JoinSucceeded { local, remotes } => {
                if self.state != ConnectionState::Connecting {
                    debug!("Ignoring stale join success while {}", self.state);
                    return Vec::new();
                }
                self.registry.clear();
                self.receiver_alias = None;
                self.receiver_alias_from_message = false;
                for remote in remotes {
                    self.note_remote(&remote);
                    self.registry.upsert(remote);
                }
                self.registry.upsert(local.clone());
                self.self_connection = Some(local.clone());
                self.set_state(ConnectionState::Connected);

                let event = ChatEvent::DidConnect {
                    connection: Some(local),
                    error: None,
                };
                vec![self.connect_outcome(event)]
            }
            TransportEvent::JoinFailed(e) => {
                if self.state != ConnectionState::Connecting {
                    debug!("Ignoring stale join failure while {}", self.state);
                    return Vec::new();
                }
                self.set_state(ConnectionState::Disconnected);
                let event = ChatEvent::DidConnect {
                    connection: None,
                    error: Some(ChatError::TransportConnect(e.0)),
                };
                vec![self.connect_outcome(event)]
            }
            TransportEvent::LeaveCompleted(result) => {
                if !self.is_attached() {
                    debug!("Ignoring leave outcome while {}", self.state);
                    return Vec::new();
                }
                self.finish_disconnect(result.err().map(|e| ChatError::TransportDisconnect(e.0)))
            }
            TransportEvent::RemoteJoined(connection) => {
                if !self.is_attached() || self.self_id() == Some(connection.connection_id()) {
                    debug!(
                        "Ignoring join of {} while {}",
                        connection.connection_id(),
                        self.state
                    );
                    return Vec::new();
                }
                self.note_remote(&connection);
                if self.registry.upsert(connection.clone()).is_some() {
                    debug!("Connection {} reported joined twice", connection.connection_id());
                    return Vec::new();
                }
                vec![Delivery::new(ChatEvent::ConnectionCreated(connection))]
            }
            TransportEvent::RemoteLeft(connection_id) => {
                if !self.is_attached() || self.self_id() == Some(connection_id.as_str()) {
                    debug!("Ignoring departure of {} while {}", connection_id, self.state);
                    return Vec::new();
                }
                match self.registry.remove(&connection_id) {
                    Some(connection) => {
                        vec![Delivery::new(ChatEvent::ConnectionDestroyed(connection))]
                    }
                    None => {
                        debug!("Departure of unknown connection {}", connection_id);
                        Vec::new()
                    }
                }
            }
            TransportEvent::SignalReceived {
                kind,
                payload,
                from,
            } => {
                if kind != TEXT_CHAT_SIGNAL || !self.is_attached() {
                    return Vec::new();
                }
                if from.is_some() && from.as_deref() == self.self_id() {
                    return Vec::new();
                }
                match TextMessage::from_payload(&payload) {
                    Ok(mut message) => {
                        if message.sender_id.is_none() {
                            message.sender_id = from;
                        }
                        self.receive(message)
                    }
                    Err(error) => vec![Delivery::new(ChatEvent::DidReceiveMessage {
                        message: None,
                        error: Some(error),
                    })],
                }
            }
            TransportEvent::MessageReceived(message) => {
                if !self.is_attached() {
                    return Vec::new();
                }
                self.receive(message)
            }
            TransportEvent::ReceiveFailed(e) => {
                if !self.is_attached() {
                    return Vec::new();
                }
                vec![Delivery::new(ChatEvent::DidReceiveMessage {
                    message: None,
                    error: Some(ChatError::TransportReceive(e.0)),
                })]
            }
            TransportEvent::SendCompleted { message_id, result } => {
                let Some((message, handler)) = self.take_pending_send(message_id) else {
                    debug!("Ignoring outcome for unknown message {}", message_id);
                    return Vec::new();
                };
                vec![Delivery::bound(
                    ChatEvent::DidSendMessage {
                        message: Some(message),
                        error: result.err().map(|e| ChatError::TransportSend(e.0)),
                    },
                    BoundHandler::Message(handler),
                )]
            }
        }
    }

    fn take_pending_send(&mut self, id: Uuid) -> Option<(TextMessage, Option<MessageHandler>)> {
        let index = self.pending_sends.iter().position(|(m, _)| m.id == id)?;
        Some(self.pending_sends.remove(index))
    }

    fn connect_outcome(&mut self, event: ChatEvent) -> Delivery {
        match self.pending_connect.take() {
            Some(handler) => Delivery::bound(event, handler),
            None => Delivery::new(event),
        }
    }
}

fn invalid(operation: &'static str, state: ConnectionState) -> ChatError {
    ChatError::InvalidStateTransition {
        operation,
        state: state.as_str(),
    }
}

/// A text chat session over a [`Transport`].
///
/// Operations never block on the network and never return errors: each
/// outcome, including a rejected call, arrives as a signal on the observer,
/// the matching handler and every [`subscribe`](Self::subscribe)r.
pub struct ChatSession {
    config: ChatConfig,
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    alias: RwLock<String>,
    state: Mutex<SessionState>,
    sinks: RwLock<SinkSet>,
    events: broadcast::Sender<ChatEvent>,
    /// Serializes apply-then-deliver passes.
    dispatch: Mutex<()>,
}

impl ChatSession {
    /// Create a new session.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.chat.event_capacity);
        Ok(Self {
            config: config.chat.clone(),
            credentials: config.credentials.clone(),
            transport,
            alias: RwLock::new(config.chat.alias.clone()),
            state: Mutex::new(SessionState::default()),
            sinks: RwLock::new(SinkSet::default()),
            events,
            dispatch: Mutex::new(()),
        })
    }

    /// Get the local display name.
    pub async fn alias(&self) -> String {
        self.alias.read().await.clone()
    }

    /// Set the local display name used for subsequent [`send`](Self::send)s.
    pub async fn set_alias(&self, alias: impl Into<String>) {
        *self.alias.write().await = alias.into();
    }

    /// Alias of the most recently observed remote participant.
    ///
    /// An inbound message's sender alias always wins; a joining connection's
    /// custom data is used only until the first message of the connection.
    pub async fn receiver_alias(&self) -> Option<String> {
        self.state.lock().await.receiver_alias.clone()
    }

    /// The local participant's connection while connected.
    pub async fn self_connection(&self) -> Option<Connection> {
        self.state.lock().await.self_connection.clone()
    }

    /// Current lifecycle state.
    pub async fn connection_state(&self) -> ConnectionState {
        self.state.lock().await.state
    }

    /// All known connections, including the local one.
    pub async fn connections(&self) -> Vec<Connection> {
        self.state.lock().await.registry.all()
    }

    /// Look up a known connection.
    pub async fn connection(&self, connection_id: &str) -> Option<Connection> {
        self.state
            .lock()
            .await
            .registry
            .get(connection_id)
            .cloned()
    }

    /// Register the observer. The session keeps only a weak reference.
    pub async fn set_observer<O: ChatObserver + 'static>(&self, observer: &Arc<O>) {
        let observer: Arc<dyn ChatObserver> = observer.clone();
        self.sinks.write().await.set_observer(Some(&observer));
    }

    /// Remove the observer.
    pub async fn clear_observer(&self) {
        self.sinks.write().await.set_observer(None);
    }

    /// Install or remove the persistent connection handler.
    pub async fn set_connection_handler(&self, handler: Option<ConnectionHandler>) {
        self.sinks.write().await.connection_handler = handler;
    }

    /// Install or remove the persistent message handler.
    pub async fn set_message_handler(&self, handler: Option<MessageHandler>) {
        self.sinks.write().await.message_handler = handler;
    }

    /// Receive every signal as a [`ChatEvent`].
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Join the channel.
    pub async fn connect(&self) {
        self.start_connect(None).await;
    }

    /// Join the channel, reporting connection signals to `handler`.
    ///
    /// If the call is accepted, `handler` also becomes the persistent
    /// connection handler. A rejected call reports only to `handler`.
    pub async fn connect_with_handler(&self, handler: ConnectionHandler) {
        self.start_connect(Some(handler)).await;
    }

    async fn start_connect(&self, handler: Option<ConnectionHandler>) {
        let _dispatch = self.dispatch.lock().await;
        let deliveries = {
            let mut state = self.state.lock().await;
            if state.state != ConnectionState::Disconnected {
                debug!("Rejecting connect while {}", state.state);
                let event = ChatEvent::DidConnect {
                    connection: None,
                    error: Some(invalid("connect", state.state)),
                };
                vec![match handler {
                    Some(h) => Delivery::bound(event, BoundHandler::Connection(Some(h))),
                    None => Delivery::new(event),
                }]
            } else {
                let bound = {
                    let mut sinks = self.sinks.write().await;
                    if let Some(h) = handler {
                        sinks.connection_handler = Some(h);
                    }
                    sinks.connection_handler.clone()
                };
                state.set_state(ConnectionState::Connecting);
                state.pending_connect = Some(BoundHandler::Connection(bound));

                match self.transport.join(&self.credentials) {
                    Ok(()) => Vec::new(),
                    Err(e) => {
                        state.set_state(ConnectionState::Disconnected);
                        let event = ChatEvent::DidConnect {
                            connection: None,
                            error: Some(ChatError::TransportConnect(e.0)),
                        };
                        vec![state.connect_outcome(event)]
                    }
                }
            }
        };
        self.fan_out(deliveries).await;
    }

    /// Leave the channel.
    pub async fn disconnect(&self) {
        let _dispatch = self.dispatch.lock().await;
        let deliveries = {
            let mut state = self.state.lock().await;
            if state.state != ConnectionState::Connected {
                debug!("Rejecting disconnect while {}", state.state);
                vec![Delivery::new(ChatEvent::DidDisconnect {
                    connection: None,
                    error: Some(invalid("disconnect", state.state)),
                })]
            } else {
                state.departing = state.self_connection.take();
                state.set_state(ConnectionState::Disconnecting);
                match self.transport.leave() {
                    Ok(()) => Vec::new(),
                    Err(e) => state.finish_disconnect(Some(ChatError::TransportDisconnect(e.0))),
                }
            }
        };
        self.fan_out(deliveries).await;
    }

    /// Send `text` under the current alias.
    pub async fn send(&self, text: impl Into<String>) {
        let alias = self.alias().await;
        self.send_custom(TextMessage::new(alias, text)).await;
    }

    /// Send a prepared message.
    ///
    /// Produces exactly one `DidSendMessage` signal: immediately if the call
    /// is rejected, otherwise when the transport reports the outcome.
    pub async fn send_custom(&self, mut message: TextMessage) {
        let _dispatch = self.dispatch.lock().await;
        let deliveries = {
            let mut state = self.state.lock().await;
            let handler = self.sinks.read().await.message_handler.clone();
            let length = message.char_len();

            let error = if state.state != ConnectionState::Connected {
                Some(invalid("send", state.state))
            } else if length > self.config.max_message_length {
                Some(ChatError::MessageTooLong {
                    length,
                    max: self.config.max_message_length,
                })
            } else {
                if message.sender_id.is_none() {
                    message.sender_id = state.self_id().map(str::to_string);
                }
                match self.transport.send(&message) {
                    Ok(()) => {
                        state.pending_sends.push((message, handler));
                        return;
                    }
                    Err(e) => Some(ChatError::TransportSend(e.0)),
                }
            };

            debug!("Send of message {} failed: {:?}", message.id, error);
            vec![Delivery::bound(
                ChatEvent::DidSendMessage {
                    message: Some(message),
                    error,
                },
                BoundHandler::Message(handler),
            )]
        };
        self.fan_out(deliveries).await;
    }

    /// Apply one transport event and deliver the resulting signals.
    pub async fn handle_event(&self, event: TransportEvent) {
        let _dispatch = self.dispatch.lock().await;
        let deliveries = self.state.lock().await.apply(event);
        self.fan_out(deliveries).await;
    }

    /// Apply transport events until the stream closes.
    pub async fn pump_events(&self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("Transport event stream closed");
    }

    async fn fan_out(&self, deliveries: Vec<Delivery>) {
        if deliveries.is_empty() {
            return;
        }
        let sinks = self.sinks.read().await.snapshot();
        for delivery in deliveries {
            sinks.deliver(&delivery);
            // No subscribers is not an error.
            let _ = self.events.send(delivery.event);
        }
    }
}
