mod config;
mod events;

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::net::{Identity, Message, Transport, decode, encode};
use crate::rules::{Card, GameState, MoveError, TurnOutcome};

pub use config::SessionConfig;
pub use events::{FieldTarget, Outcome, SessionEvent, TurnFinishResult};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("identities must be non-zero and distinct (local {local}, remote {remote})")]
    InvalidIdentity { local: Identity, remote: Identity },
    #[error("not your turn")]
    NotYourTurn,
    #[error("no game in progress")]
    NoGame,
    #[error("only player 0 deals")]
    NotDealer,
    #[error("field is empty")]
    EmptyField,
    #[error("no attacking card at field index {0}")]
    FieldIndex(usize),
    #[error(transparent)]
    Move(#[from] MoveError),
    #[error("network error: {0}")]
    Io(#[from] io::Error),
}

/// State reachable from both the caller's thread and the listener thread.
struct Shared {
    state: Mutex<Option<GameState>>,
    subscribers: Mutex<Vec<Sender<SessionEvent>>>,
    sender: Transport,
    remote_addr: SocketAddr,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, Option<GameState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: SessionEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Notifies locally and pushes the full state to the peer.
    /// Callers hold the state lock so events leave in mutation order.
    fn push_state(&self, state: &GameState) {
        self.publish(SessionEvent::StateUpdated(state.clone()));

        let message = Message::State {
            state: encode(state),
        };
        if let Err(e) = self.sender.send(&message, self.remote_addr) {
            log::warn!("Failed to push state to {}: {}", self.remote_addr, e);
        }
    }

    fn send_quit(&self) {
        if let Err(e) = self.sender.send(&Message::Quit, self.remote_addr) {
            log::warn!("Failed to send quit to {}: {}", self.remote_addr, e);
        }
    }

    fn on_remote_message(&self, message: Message, from: SocketAddr) {
        match message {
            Message::State { state } => {
                let remote = match decode(state) {
                    Ok(remote) => remote,
                    Err(e) => {
                        log::error!("Undecodable state from {}: {}", from, e);
                        return;
                    }
                };

                let mut guard = self.lock_state();
                if let Some(local) = guard.as_ref() {
                    if remote.revision <= local.revision {
                        log::debug!(
                            "Dropping stale state revision {} (local {})",
                            remote.revision,
                            local.revision
                        );
                        return;
                    }
                }
                self.publish(SessionEvent::StateUpdated(remote.clone()));
                *guard = Some(remote);
            }
            Message::Quit => {
                log::info!("Opponent at {} quit", from);
                self.publish(SessionEvent::OpponentQuit);
            }
            other => log::debug!("Ignoring {} from {} on game channel", other.action(), from),
        }
    }
}

/// One side of a two-player match.
///
/// The peer with the smaller identity is player 0, deals the game and
/// attacks first. Each side listens on one port and sends to the other.
pub struct GameSession {
    shared: Arc<Shared>,
    receiver: Transport,
    listener: Option<JoinHandle<()>>,
    config: SessionConfig,
    my_id: Identity,
    remote_id: Identity,
    my_index: usize,
}

impl GameSession {
    pub fn new(
        my_id: Identity,
        remote_id: Identity,
        remote_ip: IpAddr,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        if my_id == 0 || remote_id == 0 || my_id == remote_id {
            return Err(SessionError::InvalidIdentity {
                local: my_id,
                remote: remote_id,
            });
        }

        let me_first = my_id < remote_id;
        let my_index = if me_first { 0 } else { 1 };
        let (listen_port, remote_port) = if me_first {
            (config.ports[0], config.ports[1])
        } else {
            (config.ports[1], config.ports[0])
        };

        let receiver = Transport::bind(SocketAddr::new(config.bind_ip, listen_port))?;
        let sender = Transport::unbound()?;
        let remote_addr = SocketAddr::new(remote_ip, remote_port);

        log::info!(
            "Session as player {} listening on {}, peer at {}",
            my_index,
            receiver.local_addr(),
            remote_addr
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
                sender,
                remote_addr,
            }),
            receiver,
            listener: None,
            config,
            my_id,
            remote_id,
            my_index,
        })
    }

    /// Registers a new observer. Every state change and quit is delivered
    /// exactly once to each live receiver.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel();
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Starts listening. Player 0 also deals a fresh game and pushes it.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.start_listener()?;
        if self.my_index == 0 {
            self.deal(GameState::random());
        }
        Ok(())
    }

    /// Like [`GameSession::start`], but player 0 plays `game` instead of a
    /// random deal.
    pub fn start_with(&mut self, game: GameState) -> Result<(), SessionError> {
        if self.my_index != 0 {
            return Err(SessionError::NotDealer);
        }
        self.start_listener()?;
        self.deal(game);
        Ok(())
    }

    fn start_listener(&mut self) -> Result<(), SessionError> {
        let shared = Arc::clone(&self.shared);
        let handle = self
            .receiver
            .run_listener(self.config.listen_timeout, move |message, from| {
                shared.on_remote_message(message, from)
            })?;
        self.listener = Some(handle);
        Ok(())
    }

    fn deal(&self, game: GameState) {
        *self.shared.lock_state() = Some(game);
        log::info!("Dealt a new game");

        // Give the peer's listener time to come up before the first push.
        let shared = Arc::clone(&self.shared);
        let running = self.receiver.running();
        let delay = self.config.start_delay;
        thread::spawn(move || {
            thread::sleep(delay);
            if !running.load(Ordering::SeqCst) {
                return;
            }
            let guard = shared.lock_state();
            if let Some(state) = guard.as_ref() {
                shared.push_state(state);
            }
        });
    }

    pub fn stop(&mut self) {
        self.shared.send_quit();
        self.receiver.shutdown();
        if let Some(handle) = self.listener.take() {
            if handle.join().is_err() {
                log::error!("Listener thread panicked");
            }
        }
        log::info!("Session stopped");
    }

    pub fn attack(&self, card: Card) -> Result<(), SessionError> {
        let mut guard = self.shared.lock_state();
        let state = guard.as_mut().ok_or(SessionError::NoGame)?;

        if state.attacker_index != self.my_index {
            return Err(SessionError::NotYourTurn);
        }
        state.attack(card)?;

        self.shared.push_state(state);
        Ok(())
    }

    /// Beats a field card, given either as the card itself or by its
    /// position on the field.
    pub fn defend(
        &self,
        my_card: Card,
        target: impl Into<FieldTarget>,
    ) -> Result<(), SessionError> {
        let mut guard = self.shared.lock_state();
        let state = guard.as_mut().ok_or(SessionError::NoGame)?;

        if state.attacker_index == self.my_index {
            return Err(SessionError::NotYourTurn);
        }
        if state.field.is_empty() {
            return Err(SessionError::EmptyField);
        }

        let field_card = match target.into() {
            FieldTarget::Card(card) => card,
            FieldTarget::Index(index) => state
                .field
                .attack_at(index)
                .ok_or(SessionError::FieldIndex(index))?,
        };
        state.defend(field_card, my_card)?;

        self.shared.push_state(state);
        Ok(())
    }

    pub fn finish_turn(&self) -> Result<TurnFinishResult, SessionError> {
        let mut guard = self.shared.lock_state();
        let state = guard.as_mut().ok_or(SessionError::NoGame)?;

        if state.field.is_empty() {
            return Ok(TurnFinishResult::Empty);
        }

        let my_turn = state.attacker_index == self.my_index;
        let unbeaten = state.any_unbeaten_cards();
        if my_turn && unbeaten {
            return Ok(TurnFinishResult::CantForceToTake);
        }
        if !my_turn && !unbeaten {
            return Ok(TurnFinishResult::CantTakeNow);
        }

        let outcome: TurnOutcome = state.finish_turn()?;
        self.shared.push_state(state);
        Ok(outcome.into())
    }

    pub fn state(&self) -> Option<GameState> {
        self.shared.lock_state().clone()
    }

    pub fn my_cards(&self) -> Vec<Card> {
        self.shared
            .lock_state()
            .as_ref()
            .map(|s| s.players[self.my_index].cards.clone())
            .unwrap_or_default()
    }

    pub fn opponent_cards(&self) -> Vec<Card> {
        self.shared
            .lock_state()
            .as_ref()
            .map(|s| s.players[self.opponent_index()].cards.clone())
            .unwrap_or_default()
    }

    pub fn is_my_turn(&self) -> bool {
        self.shared
            .lock_state()
            .as_ref()
            .is_some_and(|s| s.attacker_index == self.my_index)
    }

    pub fn outcome(&self) -> Option<Outcome> {
        let winner = self.shared.lock_state().as_ref()?.winner?;
        Some(if self.is_me(winner) {
            Outcome::Me
        } else {
            Outcome::Opponent
        })
    }

    pub fn my_index(&self) -> usize {
        self.my_index
    }

    pub fn opponent_index(&self) -> usize {
        1 - self.my_index
    }

    pub fn is_me(&self, index: usize) -> bool {
        index == self.my_index
    }

    pub fn my_identity(&self) -> Identity {
        self.my_id
    }

    pub fn remote_identity(&self) -> Identity {
        self.remote_id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.receiver.local_addr()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.shared.remote_addr
    }
}
