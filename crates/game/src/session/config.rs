use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::net::{DEFAULT_GAME_PORTS, DEFAULT_LISTEN_TIMEOUT};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Port 0 is where player 0 listens, port 1 where player 1 listens.
    pub ports: [u16; 2],
    pub bind_ip: IpAddr,
    /// Wait before player 0 pushes the freshly dealt game.
    pub start_delay: Duration,
    pub listen_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ports: DEFAULT_GAME_PORTS,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            start_delay: Duration::from_millis(500),
            listen_timeout: DEFAULT_LISTEN_TIMEOUT,
        }
    }
}
