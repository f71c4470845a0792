//! WebSocket channel client: one participant's connection to the relay.
//!
//! Provides:
//! - Connection lifecycle (connect, best-effort departure, teardown)
//! - Fire-and-forget event sends (no queue, no replay: edits made while
//!   disconnected are lost, and callers must treat send failures as loss)
//! - A reader task that forwards decoded remote events to the application
//!
//! The reader drops frames whose identity matches the local participant
//! before they reach application code, so a relay bug that echoed a frame
//! could not re-apply a local edit. The synchronizer performs the same
//! check again on apply; the rule is cheap and load-bearing.

use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use futures_util::{SinkExt, StreamExt};

use crate::protocol::{ProtocolError, WireEvent};
use drawsync_core::ParticipantInfo;

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events delivered to the application by the channel client.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Channel established and the local announce has been sent.
    Connected,
    /// Channel lost. No replay will happen on reconnect.
    Disconnected,
    /// A decoded event from some other participant.
    Remote(WireEvent),
}

/// One participant's event channel to the relay hub.
pub struct ChannelClient {
    local: ParticipantInfo,
    state: Arc<RwLock<ConnectionState>>,
    /// Feeds the writer task; present only while connected.
    outgoing_tx: Option<mpsc::Sender<Vec<u8>>>,
    /// Handed to the application once via `take_event_rx`.
    event_rx: Option<mpsc::Receiver<SessionEvent>>,
    event_tx: mpsc::Sender<SessionEvent>,
    server_url: String,
}

impl ChannelClient {
    /// Create a client for the given participant and relay URL.
    pub fn new(local: ParticipantInfo, server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            local,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
            server_url: server_url.into(),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.event_rx.take()
    }

    /// Connect to the relay and announce the local participant.
    ///
    /// Spawns the writer and reader tasks.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        *self.state.write().await = ConnectionState::Connecting;

        let ws_stream = match tokio_tungstenite::connect_async(&self.server_url).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                log::warn!("connect to {} failed: {e}", self.server_url);
                return Err(ProtocolError::ConnectionClosed);
            }
        };

        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: drain the outgoing channel into the WebSocket.
        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(256);
        self.outgoing_tx = Some(out_tx);
        tokio::spawn(async move {
            while let Some(data) = out_rx.recv().await {
                if ws_writer
                    .send(tokio_tungstenite::tungstenite::Message::Binary(data.into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            // Channel dropped: polite close.
            let _ = ws_writer
                .send(tokio_tungstenite::tungstenite::Message::Close(None))
                .await;
        });

        // Announce before anything else so the relay can attribute this
        // channel and peers can populate their rosters.
        let announce = WireEvent::presence_announce(&self.local);
        let encoded = announce.encode()?;
        if let Some(ref tx) = self.outgoing_tx {
            let _ = tx.send(encoded).await;
        }

        *self.state.write().await = ConnectionState::Connected;
        let _ = self.event_tx.send(SessionEvent::Connected).await;

        // Reader task: decode inbound frames, filter self, forward.
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        let local_id = self.local.id.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(tokio_tungstenite::tungstenite::Message::Binary(data)) => {
                        let bytes: Vec<u8> = data.into();
                        match WireEvent::decode(&bytes) {
                            Ok(event) => {
                                if event.participant == local_id {
                                    // Transport-level feedback suppression.
                                    continue;
                                }
                                let _ = event_tx.send(SessionEvent::Remote(event)).await;
                            }
                            Err(e) => {
                                log::warn!("dropping undecodable frame: {e}");
                            }
                        }
                    }
                    Ok(tokio_tungstenite::tungstenite::Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }

            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(SessionEvent::Disconnected).await;
        });

        Ok(())
    }

    /// Send an event to the relay. Fire-and-forget: a `ConnectionClosed`
    /// error means the event is lost and will not be retried.
    pub async fn send(&self, event: &WireEvent) -> Result<(), ProtocolError> {
        if *self.state.read().await != ConnectionState::Connected {
            return Err(ProtocolError::ConnectionClosed);
        }

        let encoded = event.encode()?;
        match self.outgoing_tx {
            Some(ref tx) => tx
                .send(encoded)
                .await
                .map_err(|_| ProtocolError::ConnectionClosed),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Best-effort departure, then tear the channel down.
    ///
    /// The departure may be lost if the channel is already unusable; the
    /// relay synthesizes one from the channel close either way.
    pub async fn disconnect(&mut self) {
        let departure = WireEvent::presence_departure(self.local.id.clone());
        let _ = self.send(&departure).await;

        // Dropping the sender ends the writer task after it drains, which
        // closes the WebSocket and unhooks the reader.
        self.outgoing_tx = None;
        *self.state.write().await = ConnectionState::Disconnected;
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// The local participant this channel belongs to.
    pub fn local(&self) -> &ParticipantInfo {
        &self.local
    }

    /// The relay URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}
