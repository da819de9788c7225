use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, warn};

use textchat::{
    ChatError, ChatEvent, ChatObserver, ChatSession, Config, Connection, Credentials, LoopbackHub,
    TextMessage,
};

/// Logs every signal a session emits.
struct LogObserver {
    name: &'static str,
}

impl ChatObserver for LogObserver {
    fn did_connect(&self, error: Option<&ChatError>) {
        match error {
            None => info!("[{}] connected", self.name),
            Some(e) => warn!("[{}] connect failed: {}", self.name, e),
        }
    }

    fn did_disconnect(&self, error: Option<&ChatError>) {
        match error {
            None => info!("[{}] disconnected", self.name),
            Some(e) => warn!("[{}] disconnect failed: {}", self.name, e),
        }
    }

    fn connection_created(&self, connection: &Connection) {
        info!(
            "[{}] {} joined ({})",
            self.name,
            connection.connection_id(),
            connection.custom_data()
        );
    }

    fn connection_destroyed(&self, connection: &Connection) {
        info!("[{}] {} left", self.name, connection.connection_id());
    }

    fn did_send_message(&self, message: Option<&TextMessage>, error: Option<&ChatError>) {
        match (message, error) {
            (Some(m), None) => info!("[{}] sent {}", self.name, m.format()),
            (_, Some(e)) if e.is_local() => warn!("[{}] send rejected: {}", self.name, e),
            (_, Some(e)) => warn!("[{}] send failed: {}", self.name, e),
            (None, None) => {}
        }
    }

    fn did_receive_message(&self, message: Option<&TextMessage>, error: Option<&ChatError>) {
        match (message, error) {
            (Some(m), None) => info!("[{}] received {}", self.name, m.format()),
            (_, Some(e)) => warn!("[{}] receive failed: {}", self.name, e),
            (None, None) => {}
        }
    }
}

/// Wait for the first event matching `pred`, giving up after a few seconds.
async fn wait_for(events: &mut broadcast::Receiver<ChatEvent>, pred: impl Fn(&ChatEvent) -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while let Ok(event) = events.recv().await {
            if pred(&event) {
                return;
            }
        }
    })
    .await;
    if result.is_err() {
        warn!("Timed out waiting for chat event");
    }
}

async fn start_participant(
    hub: &Arc<LoopbackHub>,
    config: &Config,
    name: &'static str,
) -> textchat::Result<(Arc<ChatSession>, Arc<LogObserver>)> {
    let (transport, events) = hub.transport(name);
    let session = Arc::new(ChatSession::new(config, Arc::new(transport))?);
    session.set_alias(name).await;

    let observer = Arc::new(LogObserver { name });
    session.set_observer(&observer).await;

    let pump = Arc::clone(&session);
    tokio::spawn(async move { pump.pump_events(events).await });

    Ok((session, observer))
}

#[tokio::main]
async fn main() -> textchat::Result<()> {
    // Load configuration
    let mut config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };
    if config.credentials.validate().is_err() {
        config.credentials = Credentials::new("demo-key", "demo-session", "demo-token");
    }

    // Initialize logging
    if let Err(e) = textchat::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        textchat::logging::init_console_only(&config.logging.level);
    }

    info!(
        "textchat loopback demo on session {}",
        config.credentials.session_id
    );

    let hub = LoopbackHub::new(config.credentials.session_id.clone());
    let (alice, _alice_observer) = start_participant(&hub, &config, "Alice").await?;
    let (bob, _bob_observer) = start_participant(&hub, &config, "Bob").await?;

    let mut alice_events = alice.subscribe();
    let mut bob_events = bob.subscribe();

    alice.connect().await;
    wait_for(&mut alice_events, |e| matches!(e, ChatEvent::DidConnect { .. })).await;
    bob.connect().await;
    wait_for(&mut bob_events, |e| matches!(e, ChatEvent::DidConnect { .. })).await;

    // Over the limit: rejected locally without reaching the hub.
    alice
        .send("x".repeat(config.chat.max_message_length + 1))
        .await;
    alice.send("Hello from Alice").await;
    wait_for(&mut bob_events, |e| {
        matches!(e, ChatEvent::DidReceiveMessage { .. })
    })
    .await;
    info!("Bob's receiver alias: {:?}", bob.receiver_alias().await);

    bob.disconnect().await;
    wait_for(&mut bob_events, |e| matches!(e, ChatEvent::DidDisconnect { .. })).await;
    alice.disconnect().await;
    wait_for(&mut alice_events, |e| {
        matches!(e, ChatEvent::DidDisconnect { .. })
    })
    .await;

    info!("{} participants left on the hub", hub.member_count());
    Ok(())
}
