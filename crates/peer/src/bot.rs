use durak::{Card, GameState};

use crate::events::BotMove;

/// Cheapest-card strategy: spend non-trumps before trumps, low ranks before
/// high ones. Returns `None` while waiting for the opponent.
pub fn next_move(state: &GameState, my_index: usize) -> Option<BotMove> {
    if state.is_over() {
        return None;
    }
    if state.attacker_index == my_index {
        attacker_move(state)
    } else {
        defender_move(state)
    }
}

fn cost(state: &GameState, card: &Card) -> (bool, Card) {
    (card.suit == state.trump_suit(), *card)
}

fn attacker_move(state: &GameState) -> Option<BotMove> {
    if state.any_unbeaten_cards() {
        return None;
    }

    let hand = &state.attacking_player().cards;
    let cheapest = hand
        .iter()
        .filter(|c| state.can_add_to_field(c))
        .min_by_key(|c| cost(state, c));

    match cheapest {
        Some(&card) if state.field.is_empty() => Some(BotMove::Attack(card)),
        // Pile on only with non-trumps.
        Some(&card) if card.suit != state.trump_suit() => Some(BotMove::Attack(card)),
        _ if state.field.is_empty() => None,
        _ => Some(BotMove::FinishTurn),
    }
}

fn defender_move(state: &GameState) -> Option<BotMove> {
    let attacking = *state.unbeaten_cards().first()?;

    let answer = state
        .defending_player()
        .cards
        .iter()
        .filter(|c| state.can_beat(&attacking, c))
        .min_by_key(|c| cost(state, c));

    match answer {
        Some(&defending) => Some(BotMove::Defend {
            attacking,
            defending,
        }),
        None => Some(BotMove::FinishTurn),
    }
}
