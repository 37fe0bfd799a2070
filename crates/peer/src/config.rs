use std::time::Duration;

use durak::{DiscoveryConfig, Identity, SessionConfig};

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub discovery: DiscoveryConfig,
    pub session: SessionConfig,
    /// Fixed identity instead of a random one. Useful for scripted runs.
    pub identity: Option<Identity>,
    /// Pause before each bot move so the log stays readable.
    pub move_delay: Duration,
    /// Give up if nothing arrives from the opponent for this long.
    pub idle_timeout: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            session: SessionConfig::default(),
            identity: None,
            move_delay: Duration::from_millis(300),
            idle_timeout: Duration::from_secs(60),
        }
    }
}
