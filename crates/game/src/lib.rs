pub mod discovery;
pub mod net;
pub mod rules;
pub mod session;

pub use discovery::{DiscoveryConfig, DiscoveryService, Pairing, random_identity};
pub use net::{
    CodecError, DEFAULT_DISCOVERY_PORT, DEFAULT_GAME_PORTS, EncodedState, Identity, Message,
    NetworkStats, PacketError, Transport, decode, encode,
};
pub use rules::{
    CARDS_IN_HAND_MAX, Card, DECK_SIZE, DealError, Field, GameState, LastUpdate, MoveError,
    Player, Rank, Suit, TurnOutcome, standard_deck,
};
pub use session::{
    FieldTarget, GameSession, Outcome, SessionConfig, SessionError, SessionEvent, TurnFinishResult,
};
