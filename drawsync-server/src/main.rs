//! DrawSync relay hub binary.
//!
//! Accepts WebSocket connections and fans every whiteboard event out to
//! all other participants. Holds no drawing state: restarting the relay
//! loses nothing but the live connections.
//!
//! Configuration is environment-first:
//! - `DRAWSYNC_ADDR` (or the first CLI argument): bind address,
//!   default `127.0.0.1:5000`
//! - `DRAWSYNC_CHANNEL_CAPACITY`: per-receiver fan-out buffer,
//!   default 256
//! - `RUST_LOG`: standard env_logger filter

use drawsync_collab::{RelayConfig, RelayServer};
use log::info;

fn config_from_env() -> RelayConfig {
    let mut config = RelayConfig::default();

    if let Some(addr) = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DRAWSYNC_ADDR").ok())
    {
        config.bind_addr = addr;
    }

    if let Ok(capacity) = std::env::var("DRAWSYNC_CHANNEL_CAPACITY") {
        match capacity.parse() {
            Ok(capacity) => config.channel_capacity = capacity,
            Err(_) => log::warn!("ignoring invalid DRAWSYNC_CHANNEL_CAPACITY {capacity:?}"),
        }
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = config_from_env();
    info!(
        "starting relay on {} (channel capacity {})",
        config.bind_addr, config.channel_capacity
    );

    RelayServer::new(config).run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:5000");
    }

    #[test]
    fn test_config_from_env_defaults() {
        let config = config_from_env();
        assert_eq!(config.channel_capacity, 256);
    }
}
