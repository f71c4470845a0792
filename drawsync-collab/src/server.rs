//! WebSocket relay hub.
//!
//! Architecture:
//! ```text
//! Participant A ──┐                      ┌── Participant B
//!                 ├── SessionRegistry ───┤
//! Participant C ──┘    (fan-out only)    └── Participant D
//! ```
//!
//! The hub holds no drawing state. Every inbound frame is fanned out,
//! byte-for-byte unmodified, to every other open channel; the only thing
//! the hub decodes is the event envelope (kind and identity), and only to
//! register announcements, synthesize departures, and log. Payloads are
//! never validated: a malformed frame is forwarded as-is.
//!
//! There is no acknowledgment, retry, or delivery guarantee. Fan-out cost
//! is O(connected channels) per event with no batching, so a
//! high-frequency source (cursor movement) degrades proportionally to
//! participant count; that ceiling is accepted for whiteboard-sized
//! sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{EventKind, WireEvent};
use crate::registry::SessionRegistry;
use drawsync_core::ParticipantInfo;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to.
    pub bind_addr: String,
    /// Fan-out buffer per receiver; a participant lagging past this many
    /// frames starts losing the oldest ones.
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            channel_capacity: 256,
        }
    }
}

/// Relay statistics.
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_events: u64,
    pub total_bytes: u64,
    /// Frames dropped at lagging receivers, summed across connections.
    pub dropped_frames: u64,
}

/// The relay hub server.
pub struct RelayServer {
    config: RelayConfig,
    registry: Arc<SessionRegistry>,
    stats: Arc<RwLock<RelayStats>>,
}

impl RelayServer {
    /// Create a relay with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new(config.channel_capacity));
        Self {
            config,
            registry,
            stats: Arc::new(RwLock::new(RelayStats::default())),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RelayConfig::default())
    }

    /// Start accepting WebSocket connections. Runs the accept loop until
    /// the listener fails; call from an async runtime.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("relay listening on {}", self.config.bind_addr);

        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("new TCP connection from {addr}");

            let registry = self.registry.clone();
            let stats = self.stats.clone();

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, registry, stats).await {
                    log::error!("connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle one participant's channel for its whole lifetime.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        registry: Arc<SessionRegistry>,
        stats: Arc<RwLock<RelayStats>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (token, mut relay_rx) = registry.register().await;
        log::info!("channel open from {addr}");

        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        loop {
            tokio::select! {
                // Inbound frame from this participant.
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Binary(data))) => {
                            let bytes: Vec<u8> = data.into();
                            {
                                let mut s = stats.write().await;
                                s.total_events += 1;
                                s.total_bytes += bytes.len() as u64;
                            }

                            match WireEvent::decode(&bytes) {
                                Ok(event) => {
                                    if event.kind == EventKind::PresenceAnnounce {
                                        // Identity from the envelope is enough even
                                        // when the announce payload is unreadable.
                                        let info = event.participant_info().unwrap_or_else(|_| {
                                            ParticipantInfo::with_id(event.participant.clone())
                                        });
                                        log::info!(
                                            "{} announced as {:?} from {addr}",
                                            info.id, info.name
                                        );
                                        registry.announce(token, info).await;
                                    } else {
                                        match event.kind {
                                            EventKind::CursorMove => {
                                                log::trace!("cursor from {}", event.participant)
                                            }
                                            EventKind::ClearCanvas => {
                                                log::info!("{} cleared the canvas", event.participant)
                                            }
                                            kind => log::debug!(
                                                "{:?} from {} ({} bytes)",
                                                kind, event.participant, bytes.len()
                                            ),
                                        }
                                    }
                                }
                                Err(e) => {
                                    // No validation: forward it anyway.
                                    log::warn!("forwarding undecodable frame from {addr}: {e}");
                                }
                            }

                            let _ = registry.broadcast_from(token, Arc::new(bytes));
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("channel closed from {addr}");
                            break;
                        }

                        Some(Ok(Message::Ping(data))) => {
                            if ws_sender.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }

                        Some(Ok(Message::Text(_))) => {
                            log::debug!("ignoring text frame from {addr}");
                        }

                        Some(Err(e)) => {
                            log::error!("websocket error from {addr}: {e}");
                            break;
                        }

                        _ => {}
                    }
                }

                // Outbound frame from some other participant.
                frame = relay_rx.recv() => {
                    match frame {
                        Ok(frame) => {
                            if frame.origin == token {
                                // Transport-level self-filter: never echo a
                                // frame back to the channel it arrived on.
                                continue;
                            }
                            if ws_sender
                                .send(Message::Binary(frame.bytes.to_vec().into()))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            log::warn!("participant at {addr} lagged, dropped {n} frames");
                            stats.write().await.dropped_frames += n;
                        }
                        Err(_) => break,
                    }
                }
            }
        }

        // Channel gone: unregister, then tell everyone who left. The
        // departure carries the bare identity, nothing else.
        if let Some(info) = registry.unregister(token).await {
            let departure = WireEvent::presence_departure(info.id.clone());
            if let Ok(encoded) = departure.encode() {
                let _ = registry.broadcast_from(token, Arc::new(encoded));
            }
            log::info!("{} ({:?}) departed", info.id, info.name);
        }

        {
            let mut s = stats.write().await;
            s.active_connections -= 1;
        }

        Ok(())
    }

    /// Relay statistics snapshot.
    pub async fn stats(&self) -> RelayStats {
        self.stats.read().await.clone()
    }

    /// The configured bind address.
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// The session registry backing this relay.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_default() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:5000");
        assert_eq!(config.channel_capacity, 256);
    }

    #[test]
    fn test_relay_creation() {
        let relay = RelayServer::with_defaults();
        assert_eq!(relay.bind_addr(), "127.0.0.1:5000");
        assert_eq!(relay.registry().capacity(), 256);
    }

    #[test]
    fn test_relay_custom_config() {
        let relay = RelayServer::new(RelayConfig {
            bind_addr: "0.0.0.0:8080".to_string(),
            channel_capacity: 512,
        });
        assert_eq!(relay.bind_addr(), "0.0.0.0:8080");
        assert_eq!(relay.registry().capacity(), 512);
    }

    #[tokio::test]
    async fn test_relay_stats_initial() {
        let relay = RelayServer::with_defaults();
        let stats = relay.stats().await;
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.total_events, 0);
        assert_eq!(stats.total_bytes, 0);
        assert_eq!(stats.dropped_frames, 0);
    }
}
