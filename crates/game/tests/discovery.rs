use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use durak::{DiscoveryConfig, DiscoveryService, Message, Pairing, Transport};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(43000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(10, Ordering::SeqCst)
}

fn any_interface(port: u16) -> SocketAddr {
    format!("0.0.0.0:{}", port).parse().unwrap()
}

fn loopback(port: u16) -> SocketAddr {
    format!("127.0.0.1:{}", port).parse().unwrap()
}

/// Two services whose "broadcasts" land on each other.
fn cross_wired(first_id: u64, second_id: u64) -> (DiscoveryService, DiscoveryService) {
    let port = next_port();
    let a = loopback(port);
    let b = loopback(port + 1);

    let first = DiscoveryService::with_identity(
        first_id,
        DiscoveryConfig {
            bind_addr: a,
            broadcast_addr: b,
            round_timeout: Duration::from_millis(200),
        },
    )
    .unwrap();
    let second = DiscoveryService::with_identity(
        second_id,
        DiscoveryConfig {
            bind_addr: b,
            broadcast_addr: a,
            round_timeout: Duration::from_millis(200),
        },
    )
    .unwrap();

    (first, second)
}

fn run_both(first: DiscoveryService, second: DiscoveryService) -> (Pairing, Pairing) {
    let (tx_first, rx_first) = mpsc::channel();
    let (tx_second, rx_second) = mpsc::channel();

    let h1 = first.spawn(move |p| {
        let _ = tx_first.send(p);
    });
    let h2 = second.spawn(move |p| {
        let _ = tx_second.send(p);
    });

    let p1 = rx_first.recv_timeout(Duration::from_secs(5)).unwrap();
    let p2 = rx_second.recv_timeout(Duration::from_secs(5)).unwrap();
    h1.join().unwrap();
    h2.join().unwrap();

    (p1, p2)
}

#[test]
fn test_two_peers_find_each_other() {
    let (first, second) = cross_wired(100, 200);
    let first_addr = first.local_addr();
    let second_addr = second.local_addr();

    let (p1, p2) = run_both(first, second);

    assert_eq!(p1.identity, 200);
    assert_eq!(p1.addr, second_addr);
    assert_eq!(p2.identity, 100);
    assert_eq!(p2.addr, first_addr);
}

#[test]
fn test_pairing_independent_of_start_order() {
    for _ in 0..3 {
        let (first, second) = cross_wired(7, 3);
        let first_addr = first.local_addr();
        let second_addr = second.local_addr();

        // Let the second peer's announcement sit in the first peer's buffer.
        let (p2, p1) = {
            let (tx, rx) = mpsc::channel();
            let h2 = second.spawn(move |p| {
                let _ = tx.send(p);
            });
            std::thread::sleep(Duration::from_millis(50));
            let p1 = first.run();
            let p2 = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            h2.join().unwrap();
            (p2, p1)
        };

        assert_eq!(p1.identity, 3);
        assert_eq!(p1.addr, second_addr);
        assert_eq!(p2.identity, 7);
        assert_eq!(p2.addr, first_addr);
    }
}

#[test]
fn test_reply_to_announcement_is_stop_scan() {
    let port = next_port();
    let service = DiscoveryService::with_identity(
        11,
        DiscoveryConfig {
            bind_addr: loopback(port),
            broadcast_addr: loopback(port + 1),
            round_timeout: Duration::from_millis(300),
        },
    )
    .unwrap();
    let peer = Transport::bind(loopback(port + 1)).unwrap();

    peer.send(&Message::Discovery { sender: 22 }, service.local_addr())
        .unwrap();
    let pairing = service.scan_once().unwrap();
    assert_eq!(pairing.identity, 22);

    let (first, _) = peer.receive(Duration::from_secs(1)).unwrap();
    assert_eq!(first, Message::Discovery { sender: 11 });
    let (second, _) = peer.receive(Duration::from_secs(1)).unwrap();
    assert_eq!(
        second,
        Message::StopScan {
            sender: 11,
            to_pid: 22
        }
    );
}

#[test]
fn test_two_peers_share_discovery_port() {
    let port = next_port();
    let config = DiscoveryConfig {
        bind_addr: any_interface(port),
        broadcast_addr: loopback(port),
        round_timeout: Duration::from_millis(200),
    };

    let first = DiscoveryService::with_identity(1, config.clone()).unwrap();
    let second = DiscoveryService::with_identity(2, config).unwrap();

    assert_eq!(first.local_addr(), any_interface(port));
    assert_eq!(second.local_addr(), any_interface(port));
}
