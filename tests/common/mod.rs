//! Test helpers for session tests.
//!
//! Provides a scripted transport, a recording observer and handler logs.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::timeout;

use textchat::{
    connection_handler, message_handler, ChatError, ChatEvent, ChatObserver, ChatSession, Config,
    Connection, ConnectionHandler, ConnectionSignal, Credentials, MessageHandler, MessageSignal,
    TextMessage, Transport, TransportError,
};

/// Default timeout for waiting on events.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration with valid credentials for session "room".
pub fn test_config() -> Config {
    Config::with_credentials(Credentials::new("key", "room", "token"))
}

/// Build a connection record created now.
pub fn conn(id: &str, custom_data: &str) -> Connection {
    Connection::new(id, Utc::now(), custom_data)
}

/// A request the session issued to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Join(String),
    Leave,
    Send(TextMessage),
}

/// Transport that records requests; outcomes are injected by the test.
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<Request>>,
    refuse: Mutex<bool>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every following request fail to issue.
    pub fn refuse_requests(&self, refuse: bool) {
        *self.refuse.lock().unwrap() = refuse;
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn join_count(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| matches!(r, Request::Join(_)))
            .count()
    }

    /// The most recently sent message.
    pub fn last_sent(&self) -> Option<TextMessage> {
        self.requests().into_iter().rev().find_map(|r| match r {
            Request::Send(message) => Some(message),
            _ => None,
        })
    }

    fn record(&self, request: Request) -> Result<(), TransportError> {
        self.requests.lock().unwrap().push(request);
        if *self.refuse.lock().unwrap() {
            Err(TransportError::new("request refused"))
        } else {
            Ok(())
        }
    }
}

impl Transport for MockTransport {
    fn join(&self, credentials: &Credentials) -> Result<(), TransportError> {
        self.record(Request::Join(credentials.session_id.clone()))
    }

    fn leave(&self) -> Result<(), TransportError> {
        self.record(Request::Leave)
    }

    fn send(&self, message: &TextMessage) -> Result<(), TransportError> {
        self.record(Request::Send(message.clone()))
    }
}

/// Create a session over a fresh mock transport.
pub fn mock_session() -> (ChatSession, Arc<MockTransport>) {
    let transport = MockTransport::new();
    let session = ChatSession::new(&test_config(), transport.clone()).unwrap();
    (session, transport)
}

/// Observer that records each callback as a short label.
#[derive(Default)]
pub struct RecordingObserver {
    calls: Mutex<Vec<String>>,
}

fn outcome(error: Option<&ChatError>) -> String {
    match error {
        None => "ok".to_string(),
        Some(ChatError::InvalidStateTransition { .. }) => "invalid".to_string(),
        Some(e) => format!("err({e})"),
    }
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ChatObserver for RecordingObserver {
    fn did_connect(&self, error: Option<&ChatError>) {
        self.push(format!("connect:{}", outcome(error)));
    }

    fn did_disconnect(&self, error: Option<&ChatError>) {
        self.push(format!("disconnect:{}", outcome(error)));
    }

    fn connection_created(&self, connection: &Connection) {
        self.push(format!("created:{}", connection.connection_id()));
    }

    fn connection_destroyed(&self, connection: &Connection) {
        self.push(format!("destroyed:{}", connection.connection_id()));
    }

    fn did_send_message(&self, message: Option<&TextMessage>, error: Option<&ChatError>) {
        let text = message.map(|m| m.text.as_str()).unwrap_or("-");
        self.push(format!("sent:{}:{}", text, outcome(error)));
    }

    fn did_receive_message(&self, message: Option<&TextMessage>, error: Option<&ChatError>) {
        let text = message.map(|m| m.text.as_str()).unwrap_or("-");
        self.push(format!("received:{}:{}", text, outcome(error)));
    }
}

/// Connection handler entries: signal, connection ID, error.
pub type ConnectionLog = Arc<Mutex<Vec<(ConnectionSignal, Option<String>, Option<ChatError>)>>>;

/// Message handler entries: signal, message text, error.
pub type MessageLog = Arc<Mutex<Vec<(MessageSignal, Option<String>, Option<ChatError>)>>>;

/// A connection handler that appends to a shared log.
pub fn recording_connection_handler() -> (ConnectionHandler, ConnectionLog) {
    let log: ConnectionLog = Arc::default();
    let sink = log.clone();
    let handler = connection_handler(move |signal, connection, error| {
        sink.lock().unwrap().push((
            signal,
            connection.map(|c| c.connection_id().to_string()),
            error.cloned(),
        ));
    });
    (handler, log)
}

/// A message handler that appends to a shared log.
pub fn recording_message_handler() -> (MessageHandler, MessageLog) {
    let log: MessageLog = Arc::default();
    let sink = log.clone();
    let handler = message_handler(move |signal, message, error| {
        sink.lock()
            .unwrap()
            .push((signal, message.map(|m| m.text.clone()), error.cloned()));
    });
    (handler, log)
}

/// Receive the next event or panic after [`DEFAULT_TIMEOUT`].
pub async fn next_event(events: &mut broadcast::Receiver<ChatEvent>) -> ChatEvent {
    timeout(DEFAULT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for chat event")
        .expect("event channel closed")
}

/// Receive events until one matches `pred`.
pub async fn wait_for(
    events: &mut broadcast::Receiver<ChatEvent>,
    pred: impl Fn(&ChatEvent) -> bool,
) -> ChatEvent {
    loop {
        let event = next_event(events).await;
        if pred(&event) {
            return event;
        }
    }
}
