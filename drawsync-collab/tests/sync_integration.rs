//! End-to-end tests of the full sync pipeline: two or three synchronizers
//! connected through a real relay via real channel clients, converging on
//! the same scene.

use drawsync_collab::client::{ChannelClient, SessionEvent};
use drawsync_collab::protocol::{EventKind, WireEvent};
use drawsync_collab::server::{RelayConfig, RelayServer};
use drawsync_collab::synchronizer::{HeadlessSurface, Synchronizer};
use drawsync_core::{DrawableObject, ObjectId, ParticipantId, ParticipantInfo};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

/// Find a free port for testing.
async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a relay on a free port, return the port.
async fn start_test_relay() -> u16 {
    let port = free_port().await;
    let config = RelayConfig {
        bind_addr: format!("127.0.0.1:{port}"),
        channel_capacity: 64,
    };
    let relay = RelayServer::new(config);
    tokio::spawn(async move {
        relay.run().await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    port
}

/// A participant: synchronizer + connected channel client.
struct Participant {
    sync: Synchronizer<HeadlessSurface>,
    client: ChannelClient,
    events: mpsc::Receiver<SessionEvent>,
}

impl Participant {
    async fn connect(port: u16, id: &str, name: &str) -> Self {
        let info = ParticipantInfo::new(ParticipantId::new(id), name);
        let sync = Synchronizer::new(info.clone(), HeadlessSurface);
        let mut client = ChannelClient::new(info, format!("ws://127.0.0.1:{port}"));
        let mut events = client.take_event_rx().unwrap();
        client.connect().await.unwrap();
        // Drain the Connected event.
        let _ = timeout(Duration::from_secs(1), events.recv()).await;
        Self {
            sync,
            client,
            events,
        }
    }

    /// Wait for the next remote event of the given kind, applying every
    /// event (and sending any elected reply) along the way.
    async fn pump_until(&mut self, kind: EventKind) -> WireEvent {
        loop {
            let event = timeout(Duration::from_secs(2), self.events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event channel closed");
            if let SessionEvent::Remote(event) = event {
                if let Some(reply) = self.sync.apply_remote(&event) {
                    self.client.send(&reply).await.unwrap();
                }
                if event.kind == kind {
                    return event;
                }
            }
        }
    }

    /// Apply everything already queued, sending elected replies.
    async fn pump_pending(&mut self) {
        while let Ok(Some(event)) = timeout(Duration::from_millis(100), self.events.recv()).await {
            if let SessionEvent::Remote(event) = event {
                if let Some(reply) = self.sync.apply_remote(&event) {
                    self.client.send(&reply).await.unwrap();
                }
            }
        }
    }
}

#[tokio::test]
async fn test_drawing_converges_between_participants() {
    let port = start_test_relay().await;

    let mut alice = Participant::connect(port, "user_alice00", "Alice").await;
    let mut bob = Participant::connect(port, "user_bob0000", "Bob").await;

    // Alice draws a stroke and broadcasts it.
    let event = alice
        .sync
        .local_insert(DrawableObject::freehand(vec![[0.0, 0.0], [10.0, 10.0]]));
    let drawn_id = event.object().unwrap().id.unwrap();
    alice.client.send(&event).await.unwrap();

    bob.pump_until(EventKind::Drawing).await;

    assert_eq!(bob.sync.scene().len(), 1);
    let stored = bob.sync.scene().get(&drawn_id).unwrap();
    assert_eq!(stored.points, vec![[0.0, 0.0], [10.0, 10.0]]);
    assert_eq!(
        stored,
        alice.sync.scene().get(&drawn_id).unwrap(),
        "payloads must converge"
    );
}

#[tokio::test]
async fn test_modify_and_remove_converge() {
    let port = start_test_relay().await;

    let mut alice = Participant::connect(port, "user_alice00", "Alice").await;
    let mut bob = Participant::connect(port, "user_bob0000", "Bob").await;

    let insert = alice
        .sync
        .local_insert(DrawableObject::rectangle(100.0, 100.0, 100.0, 100.0));
    let id = insert.object().unwrap().id.unwrap();
    alice.client.send(&insert).await.unwrap();
    bob.pump_until(EventKind::ObjectModified).await;

    // Move it.
    let mut moved = alice.sync.scene().get(&id).unwrap().clone();
    moved.x = 250.0;
    let modify = alice.sync.local_modify(moved).unwrap();
    alice.client.send(&modify).await.unwrap();
    bob.pump_until(EventKind::ObjectModified).await;
    assert_eq!(bob.sync.scene().get(&id).unwrap().x, 250.0);

    // Delete it.
    let remove = alice.sync.local_remove(&id).unwrap();
    alice.client.send(&remove).await.unwrap();
    bob.pump_until(EventKind::ObjectRemoved).await;
    assert!(bob.sync.scene().is_empty());
}

#[tokio::test]
async fn test_clear_canvas_converges() {
    let port = start_test_relay().await;

    let mut alice = Participant::connect(port, "user_alice00", "Alice").await;
    let mut bob = Participant::connect(port, "user_bob0000", "Bob").await;

    let insert = alice.sync.local_insert(DrawableObject::circle(5.0, 5.0, 2.0));
    alice.client.send(&insert).await.unwrap();
    bob.pump_until(EventKind::ObjectModified).await;
    assert_eq!(bob.sync.scene().len(), 1);

    let clear = alice.sync.local_clear();
    alice.client.send(&clear).await.unwrap();
    bob.pump_until(EventKind::ClearCanvas).await;
    assert!(bob.sync.scene().is_empty());
}

#[tokio::test]
async fn test_late_joiner_receives_canvas_state() {
    let port = start_test_relay().await;

    // Alice draws before anyone else is around.
    let mut alice = Participant::connect(port, "user_alice00", "Alice").await;
    for _ in 0..3 {
        let event = alice.sync.local_insert(DrawableObject::circle(1.0, 2.0, 3.0));
        alice.client.send(&event).await.unwrap();
    }
    assert_eq!(alice.sync.scene().len(), 3);

    // Zoe joins late; her announce reaches Alice, who is the smallest
    // active identity and answers with the canvas state.
    let mut zoe = Participant::connect(port, "user_zoe0000", "Zoe").await;
    assert!(zoe.sync.scene().is_empty());

    alice.pump_until(EventKind::PresenceAnnounce).await;
    zoe.pump_until(EventKind::CanvasState).await;

    assert_eq!(zoe.sync.scene().len(), 3, "late joiner must catch up");
}

#[tokio::test]
async fn test_own_edits_do_not_come_back() {
    let port = start_test_relay().await;

    let mut alice = Participant::connect(port, "user_alice00", "Alice").await;
    let _bob = Participant::connect(port, "user_bob0000", "Bob").await;

    let event = alice.sync.local_insert(DrawableObject::circle(0.0, 0.0, 1.0));
    alice.client.send(&event).await.unwrap();

    // Alice sees Bob's announce, but never her own drawing.
    alice.pump_pending().await;
    assert_eq!(alice.sync.scene().len(), 1);
    assert_eq!(alice.sync.roster().len(), 2);
}

#[tokio::test]
async fn test_disconnect_sends_best_effort_departure() {
    let port = start_test_relay().await;

    let mut alice = Participant::connect(port, "user_alice00", "Alice").await;
    let mut bob = Participant::connect(port, "user_bob0000", "Bob").await;
    alice.pump_pending().await;
    bob.pump_pending().await;

    let departure = bob.sync.departure_event();
    let _ = bob.client.send(&departure).await;
    bob.client.disconnect().await;

    let event = alice.pump_until(EventKind::PresenceDeparture).await;
    assert_eq!(event.participant.as_str(), "user_bob0000");
    let entry = alice
        .sync
        .roster()
        .entry(&ParticipantId::new("user_bob0000"))
        .unwrap();
    assert!(!entry.active);
    assert_eq!(entry.info.name, "Bob");
}

#[tokio::test]
async fn test_removal_of_unknown_object_is_harmless_end_to_end() {
    let port = start_test_relay().await;

    let mut alice = Participant::connect(port, "user_alice00", "Alice").await;
    let mut bob = Participant::connect(port, "user_bob0000", "Bob").await;
    alice.pump_pending().await;

    let event = WireEvent::object_removed(
        ParticipantId::new("user_alice00"),
        ObjectId::new("obj_9000_user_alice00"),
    );
    alice.client.send(&event).await.unwrap();

    bob.pump_until(EventKind::ObjectRemoved).await;
    assert!(bob.sync.scene().is_empty(), "no-op apply, no error");
}
