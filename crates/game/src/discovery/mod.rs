use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::Rng;

use crate::net::{DEFAULT_DISCOVERY_PORT, Identity, Message, Transport};

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub bind_addr: SocketAddr,
    /// Where announcements go. Normally the limited broadcast address.
    pub broadcast_addr: SocketAddr,
    /// How long one round waits for an answer before announcing again.
    pub round_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::UNSPECIFIED,
                DEFAULT_DISCOVERY_PORT,
            )),
            broadcast_addr: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::BROADCAST,
                DEFAULT_DISCOVERY_PORT,
            )),
            round_timeout: Duration::from_secs(5),
        }
    }
}

/// The peer found by discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub addr: SocketAddr,
    pub identity: Identity,
}

pub fn random_identity() -> Identity {
    rand::thread_rng().gen_range(1..=Identity::MAX)
}

pub struct DiscoveryService {
    identity: Identity,
    transport: Transport,
    config: DiscoveryConfig,
}

impl DiscoveryService {
    pub fn new(config: DiscoveryConfig) -> io::Result<Self> {
        Self::with_identity(random_identity(), config)
    }

    pub fn with_identity(identity: Identity, config: DiscoveryConfig) -> io::Result<Self> {
        if identity == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "discovery identity must be non-zero",
            ));
        }
        let transport = Transport::broadcast(config.bind_addr)?;
        log::info!(
            "Discovery as {} on {}, announcing to {}",
            identity,
            transport.local_addr(),
            config.broadcast_addr
        );

        Ok(Self {
            identity,
            transport,
            config,
        })
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Announces and waits until some peer answers. Never gives up.
    pub fn run(&self) -> Pairing {
        loop {
            if let Some(pairing) = self.scan_once() {
                return pairing;
            }
        }
    }

    /// Runs discovery on a background thread and hands the result to `callback`.
    pub fn spawn<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Pairing) + Send + 'static,
    {
        thread::spawn(move || {
            let pairing = self.run();
            callback(pairing);
        })
    }

    /// One announce-and-wait round.
    pub fn scan_once(&self) -> Option<Pairing> {
        log::info!("Scanning...");
        self.announce(&Message::Discovery {
            sender: self.identity,
        });

        let (message, addr) = self
            .transport
            .receive_until(|m, _| self.is_for_me(m), self.config.round_timeout)?;

        match message {
            Message::Discovery { sender } => {
                self.announce(&Message::StopScan {
                    sender: self.identity,
                    to_pid: sender,
                });
                log::info!("Found peer {} at {}", sender, addr);
                Some(Pairing {
                    addr,
                    identity: sender,
                })
            }
            Message::StopScan { sender, .. } => {
                log::info!("Peer {} at {} confirmed pairing", sender, addr);
                Some(Pairing {
                    addr,
                    identity: sender,
                })
            }
            Message::State { .. } | Message::Quit => None,
        }
    }

    fn is_for_me(&self, message: &Message) -> bool {
        match *message {
            Message::Discovery { sender } => sender != self.identity,
            Message::StopScan { sender, to_pid } => {
                sender != self.identity && to_pid == self.identity
            }
            Message::State { .. } | Message::Quit => false,
        }
    }

    fn announce(&self, message: &Message) {
        if let Err(e) = self.transport.send(message, self.config.broadcast_addr) {
            log::warn!("Failed to announce {}: {}", message.action(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_config() -> DiscoveryConfig {
        DiscoveryConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            broadcast_addr: "127.0.0.1:9".parse().unwrap(),
            round_timeout: Duration::from_millis(150),
        }
    }

    #[test]
    fn test_random_identity_non_zero() {
        for _ in 0..1000 {
            assert_ne!(random_identity(), 0);
        }
    }

    #[test]
    fn test_zero_identity_rejected() {
        let result = DiscoveryService::with_identity(0, loopback_config());
        assert!(result.is_err());
    }

    #[test]
    fn test_message_filter() {
        let service = DiscoveryService::with_identity(10, loopback_config()).unwrap();

        assert!(service.is_for_me(&Message::Discovery { sender: 11 }));
        assert!(!service.is_for_me(&Message::Discovery { sender: 10 }));
        assert!(service.is_for_me(&Message::StopScan {
            sender: 11,
            to_pid: 10
        }));
        assert!(!service.is_for_me(&Message::StopScan {
            sender: 11,
            to_pid: 12
        }));
        assert!(!service.is_for_me(&Message::StopScan {
            sender: 10,
            to_pid: 10
        }));
        assert!(!service.is_for_me(&Message::Quit));
    }

    #[test]
    fn test_own_echo_is_ignored() {
        let mut config = loopback_config();
        let scratch = Transport::bind("127.0.0.1:0").unwrap();
        let port = scratch.local_addr().port();
        drop(scratch);
        config.bind_addr = SocketAddr::from(([127, 0, 0, 1], port));
        config.broadcast_addr = config.bind_addr;

        let service = DiscoveryService::with_identity(5, config).unwrap();
        assert!(service.scan_once().is_none());
    }

    #[test]
    fn test_stop_scan_addressed_to_me() {
        let service = DiscoveryService::with_identity(5, loopback_config()).unwrap();
        let peer = Transport::bind("127.0.0.1:0").unwrap();

        peer.send(
            &Message::StopScan {
                sender: 6,
                to_pid: 7,
            },
            service.local_addr(),
        )
        .unwrap();
        peer.send(
            &Message::StopScan {
                sender: 6,
                to_pid: 5,
            },
            service.local_addr(),
        )
        .unwrap();

        let pairing = service.scan_once().unwrap();
        assert_eq!(pairing.identity, 6);
        assert_eq!(pairing.addr, peer.local_addr());
    }
}
