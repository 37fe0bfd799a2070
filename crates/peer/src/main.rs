mod bot;
mod config;
mod events;

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use config::PeerConfig;
use durak::{DiscoveryService, GameSession, GameState, SessionEvent};
use events::{BotMove, GameEnd, log_rejection};

#[derive(Parser)]
#[command(name = "durak-peer")]
#[command(about = "Headless two-player Durak peer")]
struct Args {
    #[arg(long, default_value_t = durak::DEFAULT_DISCOVERY_PORT)]
    discovery_port: u16,

    #[arg(
        long,
        default_value = "255.255.255.255",
        help = "Address announcements are sent to"
    )]
    broadcast: Ipv4Addr,

    #[arg(long, num_args = 2, default_values_t = durak::DEFAULT_GAME_PORTS)]
    game_ports: Vec<u16>,

    #[arg(long, help = "Fixed identity instead of a random one")]
    identity: Option<u64>,

    #[arg(long, default_value_t = 300, help = "Pause before each move in ms")]
    move_delay_ms: u64,

    #[arg(long, default_value_t = 5, help = "Seconds per discovery round")]
    round_timeout_secs: u64,

    #[arg(
        long,
        default_value_t = 60,
        help = "Give up after this many idle seconds"
    )]
    idle_timeout_secs: u64,
}

impl Args {
    fn into_config(self) -> PeerConfig {
        let mut config = PeerConfig::default();

        config.discovery.bind_addr = SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::UNSPECIFIED,
            self.discovery_port,
        ));
        config.discovery.broadcast_addr =
            SocketAddr::V4(SocketAddrV4::new(self.broadcast, self.discovery_port));
        config.discovery.round_timeout = Duration::from_secs(self.round_timeout_secs);

        if let [first, second] = self.game_ports[..] {
            config.session.ports = [first, second];
        }
        config.identity = self.identity;
        config.move_delay = Duration::from_millis(self.move_delay_ms);
        config.idle_timeout = Duration::from_secs(self.idle_timeout_secs);
        config
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();

    let discovery = match config.identity {
        Some(id) => DiscoveryService::with_identity(id, config.discovery.clone()),
        None => DiscoveryService::new(config.discovery.clone()),
    }
    .context("failed to bind discovery socket")?;

    log::info!(
        "Searching for an opponent as {} on {}",
        discovery.identity(),
        discovery.local_addr()
    );
    let pairing = discovery.run();
    let my_id = discovery.identity();
    drop(discovery);

    let mut session = GameSession::new(
        my_id,
        pairing.identity,
        pairing.addr.ip(),
        config.session.clone(),
    )
    .context("failed to open game session")?;
    log::info!(
        "Paired as {} with {}",
        session.my_identity(),
        session.remote_identity()
    );
    let events = session.subscribe();
    session.start().context("failed to start game session")?;

    let end = play(&session, &events, &config);
    session.stop();

    match end {
        Some(end) => log::info!("Game over: {}", end.as_str()),
        None => log::warn!("No word from the opponent, giving up"),
    }
    Ok(())
}

fn play(
    session: &GameSession,
    events: &Receiver<SessionEvent>,
    config: &PeerConfig,
) -> Option<GameEnd> {
    loop {
        let state = match events.recv_timeout(config.idle_timeout) {
            Ok(SessionEvent::StateUpdated(state)) => state,
            Ok(SessionEvent::OpponentQuit) => return Some(GameEnd::OpponentQuit),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return None,
        };

        if let Some(outcome) = session.outcome() {
            log::debug!("Winner: {}", outcome.as_str());
            return Some(outcome.into());
        }

        act(session, &state, config.move_delay);
    }
}

fn act(session: &GameSession, state: &GameState, delay: Duration) {
    let Some(mv) = bot::next_move(state, session.my_index()) else {
        return;
    };

    thread::sleep(delay);
    log::info!("Playing: {}", mv.describe());

    let result = match mv {
        BotMove::Attack(card) => session.attack(card),
        BotMove::Defend {
            attacking,
            defending,
        } => session.defend(defending, attacking),
        BotMove::FinishTurn => session.finish_turn().map(|outcome| {
            log::debug!("Turn finished: {:?}", outcome);
        }),
    };

    if let Err(error) = result {
        log_rejection(&mv, &error);
    }
}
