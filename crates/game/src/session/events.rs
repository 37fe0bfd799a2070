use crate::rules::{Card, GameState, TurnOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateUpdated(GameState),
    OpponentQuit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Me,
    Opponent,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Me => "me",
            Outcome::Opponent => "opponent",
        }
    }
}

/// Which attacking card a defence answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    Card(Card),
    Index(usize),
}

impl From<Card> for FieldTarget {
    fn from(card: Card) -> Self {
        FieldTarget::Card(card)
    }
}

impl From<usize> for FieldTarget {
    fn from(index: usize) -> Self {
        FieldTarget::Index(index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnFinishResult {
    /// Attacker tried to end the turn while cards are still unbeaten.
    CantForceToTake,
    GameOver,
    TookCards,
    NormalTurn,
    Empty,
    /// Defender tried to take with nothing left to take.
    CantTakeNow,
}

impl From<TurnOutcome> for TurnFinishResult {
    fn from(outcome: TurnOutcome) -> Self {
        match outcome {
            TurnOutcome::NormalTurn => TurnFinishResult::NormalTurn,
            TurnOutcome::TookCards => TurnFinishResult::TookCards,
            TurnOutcome::GameOver => TurnFinishResult::GameOver,
        }
    }
}
