use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};

use super::protocol::{MAX_PACKET_SIZE, Message};
use super::stats::{NetworkStats, SharedStats};

pub const DEFAULT_LISTEN_TIMEOUT: Duration = Duration::from_millis(200);

// A zero read timeout means "block forever" to the OS.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// One UDP socket carrying JSON messages, one message per datagram.
pub struct Transport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    stats: Arc<SharedStats>,
    running: Arc<AtomicBool>,
}

impl Transport {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        Self::from_socket(UdpSocket::bind(addr)?)
    }

    /// Send-only transport on an ephemeral port.
    pub fn unbound() -> io::Result<Self> {
        Self::bind("0.0.0.0:0")
    }

    /// Bound transport allowed to send to broadcast addresses. The port is
    /// shared, so several peers on one host can listen on it at once.
    pub fn broadcast(addr: SocketAddr) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
        socket.set_reuse_port(true)?;
        socket.set_broadcast(true)?;
        socket.bind(&addr.into())?;

        Self::from_socket(socket.into())
    }

    fn from_socket(socket: UdpSocket) -> io::Result<Self> {
        let local_addr = socket.local_addr()?;
        log::debug!("Transport bound on {}", local_addr);

        Ok(Self {
            socket,
            local_addr,
            stats: Arc::new(SharedStats::default()),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats.snapshot()
    }

    /// Fire and forget. Delivery is never confirmed.
    pub fn send(&self, message: &Message, addr: SocketAddr) -> io::Result<usize> {
        let data = message.serialize().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )
        })?;

        let bytes = self.socket.send_to(&data, addr)?;
        self.stats.record_sent(bytes);
        log::debug!("Sent {} ({} bytes) to {}", message.action(), bytes, addr);

        Ok(bytes)
    }

    /// Waits up to `timeout` for one message. Timeouts and malformed payloads
    /// both yield `None`.
    pub fn receive(&self, timeout: Duration) -> Option<(Message, SocketAddr)> {
        receive_on(&self.socket, &self.stats, timeout)
    }

    /// Keeps receiving until a message satisfies `predicate` or `timeout` elapses.
    pub fn receive_until<P>(
        &self,
        mut predicate: P,
        timeout: Duration,
    ) -> Option<(Message, SocketAddr)>
    where
        P: FnMut(&Message, SocketAddr) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            if let Some((message, addr)) = self.receive(remaining) {
                if predicate(&message, addr) {
                    return Some((message, addr));
                }
            }
        }
    }

    /// Spawns the background receive loop. `callback` runs on the listener
    /// thread for every decoded message until [`Transport::shutdown`].
    pub fn run_listener<F>(
        &self,
        poll_timeout: Duration,
        mut callback: F,
    ) -> io::Result<JoinHandle<()>>
    where
        F: FnMut(Message, SocketAddr) + Send + 'static,
    {
        let socket = self.socket.try_clone()?;
        let stats = Arc::clone(&self.stats);
        let running = Arc::clone(&self.running);
        let local_addr = self.local_addr;

        running.store(true, Ordering::SeqCst);

        thread::Builder::new()
            .name(format!("listener-{}", local_addr.port()))
            .spawn(move || {
                log::debug!("Listener on {} started", local_addr);
                while running.load(Ordering::SeqCst) {
                    if let Some((message, addr)) = receive_on(&socket, &stats, poll_timeout) {
                        callback(message, addr);
                    }
                }
                log::debug!("Listener on {} stopped", local_addr);
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown();
        log::debug!("Closing socket {}", self.local_addr);
    }
}

fn receive_on(
    socket: &UdpSocket,
    stats: &SharedStats,
    timeout: Duration,
) -> Option<(Message, SocketAddr)> {
    if let Err(e) = socket.set_read_timeout(Some(timeout.max(MIN_TIMEOUT))) {
        log::warn!("Failed to set read timeout: {}", e);
        return None;
    }

    let mut buffer = [0u8; MAX_PACKET_SIZE];
    match socket.recv_from(&mut buffer) {
        Ok((size, addr)) => match Message::deserialize(&buffer[..size]) {
            Ok(message) => {
                stats.record_received(size);
                log::debug!(
                    "Received {} ({} bytes) from {}",
                    message.action(),
                    size,
                    addr
                );
                Some((message, addr))
            }
            Err(e) => {
                stats.record_malformed();
                log::error!("Dropping malformed datagram from {}: {}", addr, e);
                None
            }
        },
        Err(ref e)
            if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
        {
            None
        }
        Err(e) => {
            log::warn!("Receive failed: {}", e);
            None
        }
    }
}
