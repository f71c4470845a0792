//! Session registry and fan-out to N-1 participants.
//!
//! One bounded tokio broadcast channel serves the whole session: every
//! connection subscribes on registration, frames are pre-encoded
//! `Arc<Vec<u8>>` so fan-out never re-serializes, and each frame carries
//! the origin connection's token so the transport layer itself drops
//! self-originated deliveries before application code ever sees them.
//!
//! Per-receiver buffering means a slow participant lags and drops frames
//! (`RecvError::Lagged`) without ever delaying delivery to anyone else.
//! Delivery is fire-and-forget, at most once.

use drawsync_core::{ParticipantId, ParticipantInfo};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// A pre-encoded event tagged with its origin connection.
#[derive(Debug, Clone)]
pub struct RelayFrame {
    /// Token of the connection the frame arrived on.
    pub origin: u64,
    pub bytes: Arc<Vec<u8>>,
}

/// Snapshot of registry counters for monitoring.
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    pub frames_sent: u64,
    pub connected: usize,
    pub announced: usize,
}

/// Process-wide mapping from connection token to announced participant,
/// plus the session's fan-out channel.
///
/// Owned by the relay server and handed to connection handlers by `Arc`;
/// nothing here is ambient global state.
pub struct SessionRegistry {
    sender: broadcast::Sender<RelayFrame>,
    /// token -> announced identity. A connection appears here on
    /// `register` with no info and gains info on `announce`.
    participants: RwLock<HashMap<u64, Option<ParticipantInfo>>>,
    next_token: AtomicU64,
    frames_sent: AtomicU64,
    capacity: usize,
}

impl SessionRegistry {
    /// Create a registry whose fan-out channel buffers `capacity` frames
    /// per receiver before a lagging receiver starts dropping.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            participants: RwLock::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            frames_sent: AtomicU64::new(0),
            capacity,
        }
    }

    /// Register a new connection. Returns its origin token and the
    /// receiver it must drain to observe other participants' frames.
    pub async fn register(&self) -> (u64, broadcast::Receiver<RelayFrame>) {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.participants.write().await.insert(token, None);
        (token, self.sender.subscribe())
    }

    /// Attach an announced identity to a connection.
    pub async fn announce(&self, token: u64, info: ParticipantInfo) {
        self.participants.write().await.insert(token, Some(info));
    }

    /// Remove a connection. Returns its announced identity, if any, so
    /// the caller can synthesize a departure notice.
    pub async fn unregister(&self, token: u64) -> Option<ParticipantInfo> {
        self.participants.write().await.remove(&token).flatten()
    }

    /// Fan a pre-encoded frame out to every other connection.
    ///
    /// Lock-free: one channel send plus an atomic counter. Returns the
    /// number of subscribed receivers (including ones that will filter
    /// the frame out as self-originated).
    pub fn broadcast_from(&self, origin: u64, bytes: Arc<Vec<u8>>) -> usize {
        let delivered = self.sender.send(RelayFrame { origin, bytes }).unwrap_or(0);
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        delivered
    }

    /// Announced identity of a connection, if it has announced.
    pub async fn identity_of(&self, token: u64) -> Option<ParticipantId> {
        self.participants
            .read()
            .await
            .get(&token)
            .and_then(|info| info.as_ref().map(|i| i.id.clone()))
    }

    /// All currently announced participants.
    pub async fn participants(&self) -> Vec<ParticipantInfo> {
        self.participants
            .read()
            .await
            .values()
            .filter_map(|info| info.clone())
            .collect()
    }

    /// Number of open connections, announced or not.
    pub async fn connection_count(&self) -> usize {
        self.participants.read().await.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counter snapshot.
    pub async fn stats(&self) -> RegistryStats {
        let participants = self.participants.read().await;
        RegistryStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            connected: participants.len(),
            announced: participants.values().filter(|i| i.is_some()).count(),
        }
    }
}
