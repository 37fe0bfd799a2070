mod card;
mod engine;

pub use card::{CARDS_IN_HAND_MAX, Card, DECK_SIZE, N_PLAYERS, Player, Rank, Suit, standard_deck};
pub use engine::{DealError, Field, GameState, LastUpdate, MoveError, TakenCards, TurnOutcome};
