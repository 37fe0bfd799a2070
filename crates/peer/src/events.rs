use durak::{Card, Outcome, SessionError};

/// A move the bot wants to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotMove {
    Attack(Card),
    Defend { attacking: Card, defending: Card },
    FinishTurn,
}

impl BotMove {
    pub fn describe(&self) -> String {
        match self {
            BotMove::Attack(card) => format!("attack with {}", card),
            BotMove::Defend {
                attacking,
                defending,
            } => format!("beat {} with {}", attacking, defending),
            BotMove::FinishTurn => String::from("finish turn"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEnd {
    Won,
    Lost,
    OpponentQuit,
}

impl From<Outcome> for GameEnd {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Me => GameEnd::Won,
            Outcome::Opponent => GameEnd::Lost,
        }
    }
}

impl GameEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameEnd::Won => "won",
            GameEnd::Lost => "lost",
            GameEnd::OpponentQuit => "opponent quit",
        }
    }
}

/// Moves rejected by the session are logged and skipped; the next state
/// update gives the bot another chance.
pub fn log_rejection(mv: &BotMove, error: &SessionError) {
    log::warn!("Move '{}' rejected: {}", mv.describe(), error);
}
