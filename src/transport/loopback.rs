//! In-process loopback transport.
//!
//! A [`LoopbackHub`] stands in for a real signaling service: every
//! [`LoopbackTransport`] created from it is one participant, and events are
//! delivered through unbounded tokio channels so outcomes always arrive
//! after the request returns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::{EventReceiver, EventSender, Transport, TransportError, TransportEvent};
use crate::chat::{Connection, TextMessage, TEXT_CHAT_SIGNAL};
use crate::config::Credentials;

/// A joined participant.
struct Member {
    connection: Connection,
    events: EventSender,
}

/// Shared in-memory channel.
pub struct LoopbackHub {
    session_id: String,
    /// Members indexed by connection ID.
    members: Mutex<HashMap<String, Member>>,
}

impl LoopbackHub {
    /// Create a hub serving the given session ID.
    pub fn new(session_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            session_id: session_id.into(),
            members: Mutex::new(HashMap::new()),
        })
    }

    /// Create a participant transport and its event stream.
    ///
    /// `custom_data` becomes the participant's connection data on join.
    pub fn transport(
        self: &Arc<Self>,
        custom_data: impl Into<String>,
    ) -> (LoopbackTransport, EventReceiver) {
        let (events, receiver) = tokio::sync::mpsc::unbounded_channel();
        let transport = LoopbackTransport {
            hub: Arc::clone(self),
            custom_data: custom_data.into(),
            events,
            connection_id: Mutex::new(None),
        };
        (transport, receiver)
    }

    /// Number of joined participants.
    pub fn member_count(&self) -> usize {
        self.members().len()
    }

    /// Drop a participant as if its network link failed.
    ///
    /// The participant receives a failed leave outcome and everyone else
    /// sees it leave. Returns false if no such participant is joined.
    pub fn drop_member(&self, connection_id: &str) -> bool {
        let mut members = self.members();
        let Some(member) = members.remove(connection_id) else {
            return false;
        };
        debug!("Loopback dropping member {}", connection_id);
        let _ = member
            .events
            .send(TransportEvent::LeaveCompleted(Err(TransportError::new(
                "connection dropped",
            ))));
        broadcast(&members, TransportEvent::RemoteLeft(connection_id.to_string()));
        true
    }

    fn members(&self) -> MutexGuard<'_, HashMap<String, Member>> {
        self.members.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn broadcast(members: &HashMap<String, Member>, event: TransportEvent) {
    for member in members.values() {
        let _ = member.events.send(event.clone());
    }
}

/// One participant's view of a [`LoopbackHub`].
pub struct LoopbackTransport {
    hub: Arc<LoopbackHub>,
    custom_data: String,
    events: EventSender,
    connection_id: Mutex<Option<String>>,
}

impl LoopbackTransport {
    /// Connection ID assigned by the hub while joined.
    pub fn connection_id(&self) -> Option<String> {
        self.connection_id_slot().clone()
    }

    fn connection_id_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.connection_id.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current connection ID, if the hub still knows this participant.
    fn joined_id(&self, members: &HashMap<String, Member>) -> Option<String> {
        self.connection_id_slot()
            .clone()
            .filter(|id| members.contains_key(id))
    }
}

impl Transport for LoopbackTransport {
    fn join(&self, credentials: &Credentials) -> Result<(), TransportError> {
        let mut members = self.hub.members();
        if self.joined_id(&members).is_some() {
            return Err(TransportError::new("already joined"));
        }

        if credentials.session_id != self.hub.session_id {
            let _ = self.events.send(TransportEvent::JoinFailed(TransportError::new(
                format!("unknown session {}", credentials.session_id),
            )));
            return Ok(());
        }

        let connection = Connection::new(Uuid::new_v4().to_string(), Utc::now(), &self.custom_data);
        let id = connection.connection_id().to_string();
        let remotes = members.values().map(|m| m.connection.clone()).collect();

        broadcast(&members, TransportEvent::RemoteJoined(connection.clone()));
        members.insert(
            id.clone(),
            Member {
                connection: connection.clone(),
                events: self.events.clone(),
            },
        );
        *self.connection_id_slot() = Some(id.clone());
        debug!("Loopback member {} joined {}", id, self.hub.session_id);

        let _ = self.events.send(TransportEvent::JoinSucceeded {
            local: connection,
            remotes,
        });
        Ok(())
    }

    fn leave(&self) -> Result<(), TransportError> {
        let mut members = self.hub.members();
        let id = self
            .joined_id(&members)
            .ok_or_else(|| TransportError::new("not joined"))?;

        members.remove(&id);
        *self.connection_id_slot() = None;
        debug!("Loopback member {} left {}", id, self.hub.session_id);

        broadcast(&members, TransportEvent::RemoteLeft(id));
        let _ = self.events.send(TransportEvent::LeaveCompleted(Ok(())));
        Ok(())
    }

    fn send(&self, message: &TextMessage) -> Result<(), TransportError> {
        let members = self.hub.members();
        let id = self
            .joined_id(&members)
            .ok_or_else(|| TransportError::new("not joined"))?;

        broadcast(
            &members,
            TransportEvent::SignalReceived {
                kind: TEXT_CHAT_SIGNAL.to_string(),
                payload: message.to_payload(),
                from: Some(id),
            },
        );
        let _ = self.events.send(TransportEvent::SendCompleted {
            message_id: message.id,
            result: Ok(()),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(session_id: &str) -> Credentials {
        Credentials::new("key", session_id, "token")
    }

    #[tokio::test]
    async fn test_join_reports_local_and_remotes() {
        let hub = LoopbackHub::new("room");
        let (alice, mut alice_rx) = hub.transport("Alice");
        let (bob, mut bob_rx) = hub.transport("Bob");

        alice.join(&credentials("room")).unwrap();
        let TransportEvent::JoinSucceeded { local, remotes } = alice_rx.recv().await.unwrap()
        else {
            panic!("expected JoinSucceeded");
        };
        assert_eq!(local.custom_data(), "Alice");
        assert!(remotes.is_empty());

        bob.join(&credentials("room")).unwrap();
        let TransportEvent::JoinSucceeded { remotes, .. } = bob_rx.recv().await.unwrap() else {
            panic!("expected JoinSucceeded");
        };
        assert_eq!(remotes, vec![local]);

        match alice_rx.recv().await.unwrap() {
            TransportEvent::RemoteJoined(conn) => assert_eq!(conn.custom_data(), "Bob"),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(hub.member_count(), 2);
    }

    #[tokio::test]
    async fn test_join_wrong_session_fails_async() {
        let hub = LoopbackHub::new("room");
        let (alice, mut rx) = hub.transport("Alice");

        assert!(alice.join(&credentials("elsewhere")).is_ok());
        assert!(matches!(
            rx.recv().await.unwrap(),
            TransportEvent::JoinFailed(_)
        ));
        assert_eq!(hub.member_count(), 0);
    }

    #[tokio::test]
    async fn test_double_join_rejected() {
        let hub = LoopbackHub::new("room");
        let (alice, _rx) = hub.transport("Alice");

        alice.join(&credentials("room")).unwrap();
        assert!(alice.join(&credentials("room")).is_err());
    }

    #[tokio::test]
    async fn test_leave_notifies_others() {
        let hub = LoopbackHub::new("room");
        let (alice, mut alice_rx) = hub.transport("Alice");
        let (bob, mut bob_rx) = hub.transport("Bob");
        alice.join(&credentials("room")).unwrap();
        bob.join(&credentials("room")).unwrap();
        let bob_id = bob.connection_id().unwrap();

        bob.leave().unwrap();
        assert!(bob.connection_id().is_none());

        // Bob: JoinSucceeded, LeaveCompleted
        let _ = bob_rx.recv().await;
        assert_eq!(
            bob_rx.recv().await.unwrap(),
            TransportEvent::LeaveCompleted(Ok(()))
        );

        // Alice: JoinSucceeded, RemoteJoined, RemoteLeft
        let _ = alice_rx.recv().await;
        let _ = alice_rx.recv().await;
        assert_eq!(
            alice_rx.recv().await.unwrap(),
            TransportEvent::RemoteLeft(bob_id)
        );
        assert!(bob.leave().is_err());
    }

    #[tokio::test]
    async fn test_send_broadcasts_signal_and_reports_outcome() {
        let hub = LoopbackHub::new("room");
        let (alice, mut alice_rx) = hub.transport("Alice");
        let (bob, mut bob_rx) = hub.transport("Bob");
        alice.join(&credentials("room")).unwrap();
        bob.join(&credentials("room")).unwrap();
        let alice_id = alice.connection_id().unwrap();

        let message = TextMessage::new("Alice", "hi").with_sender_id(&alice_id);
        alice.send(&message).unwrap();

        let _ = bob_rx.recv().await; // JoinSucceeded
        match bob_rx.recv().await.unwrap() {
            TransportEvent::SignalReceived {
                kind,
                payload,
                from,
            } => {
                assert_eq!(kind, TEXT_CHAT_SIGNAL);
                assert_eq!(from.as_deref(), Some(alice_id.as_str()));
                assert_eq!(TextMessage::from_payload(&payload).unwrap().text, "hi");
            }
            other => panic!("unexpected event {other:?}"),
        }

        let mut outcome = None;
        while let Ok(event) = alice_rx.try_recv() {
            if let TransportEvent::SendCompleted { message_id, result } = event {
                outcome = Some((message_id, result));
            }
        }
        assert_eq!(outcome, Some((message.id, Ok(()))));
    }

    #[tokio::test]
    async fn test_send_when_not_joined() {
        let hub = LoopbackHub::new("room");
        let (alice, _rx) = hub.transport("Alice");
        assert!(alice.send(&TextMessage::new("Alice", "hi")).is_err());
    }

    #[tokio::test]
    async fn test_drop_member() {
        let hub = LoopbackHub::new("room");
        let (alice, mut alice_rx) = hub.transport("Alice");
        alice.join(&credentials("room")).unwrap();
        let id = alice.connection_id().unwrap();

        assert!(hub.drop_member(&id));
        assert!(!hub.drop_member(&id));

        let _ = alice_rx.recv().await;
        assert!(matches!(
            alice_rx.recv().await.unwrap(),
            TransportEvent::LeaveCompleted(Err(_))
        ));
        assert_eq!(hub.member_count(), 0);
        assert!(alice.send(&TextMessage::new("Alice", "hi")).is_err());
    }
}
