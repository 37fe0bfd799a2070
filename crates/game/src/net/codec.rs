//! Flat, transmissible form of [`GameState`].
//!
//! The field is a mapping keyed by cards, which JSON objects cannot express,
//! so it travels as an ordered list of `[attack, defence-or-null]` pairs and
//! is rebuilt by inserting them back in the listed order.

use serde::{Deserialize, Serialize};

use crate::rules::{Card, Field, GameState, LastUpdate, N_PLAYERS, Player};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedPlayer {
    pub index: usize,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedState {
    pub trump: Card,
    pub attacker_index: usize,
    pub deck: Vec<Card>,
    pub winner: Option<usize>,
    pub field: Vec<(Card, Option<Card>)>,
    pub players: Vec<EncodedPlayer>,
    pub last_update: Option<LastUpdate>,
    #[serde(default)]
    pub discard: Vec<Card>,
    #[serde(default)]
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("expected 2 players, got {0}")]
    PlayerCount(usize),
    #[error("player at position {position} has index {index}")]
    PlayerIndex { position: usize, index: usize },
    #[error("player index {0} out of range")]
    OutOfRange(usize),
    #[error("card {0} attacks twice on the field")]
    DuplicateAttack(Card),
}

pub fn encode(state: &GameState) -> EncodedState {
    EncodedState {
        trump: state.trump,
        attacker_index: state.attacker_index,
        deck: state.deck.clone(),
        winner: state.winner,
        field: state.field.iter().copied().collect(),
        players: state
            .players
            .iter()
            .map(|p| EncodedPlayer {
                index: p.index,
                cards: p.cards.clone(),
            })
            .collect(),
        last_update: state.last_update.clone(),
        discard: state.discard.clone(),
        revision: state.revision,
    }
}

pub fn decode(encoded: EncodedState) -> Result<GameState, CodecError> {
    let EncodedState {
        trump,
        attacker_index,
        deck,
        winner,
        field: pairs,
        players,
        last_update,
        discard,
        revision,
    } = encoded;

    if attacker_index >= N_PLAYERS {
        return Err(CodecError::OutOfRange(attacker_index));
    }
    if let Some(w) = winner.filter(|&w| w >= N_PLAYERS) {
        return Err(CodecError::OutOfRange(w));
    }

    let players: [EncodedPlayer; N_PLAYERS] = players
        .try_into()
        .map_err(|v: Vec<EncodedPlayer>| CodecError::PlayerCount(v.len()))?;
    for (position, p) in players.iter().enumerate() {
        if p.index != position {
            return Err(CodecError::PlayerIndex {
                position,
                index: p.index,
            });
        }
    }
    // Hands are stored as received; the sender already keeps them sorted.
    let players = players.map(|p| Player {
        index: p.index,
        cards: p.cards,
    });

    let mut field = Field::new();
    for (attacking, defending) in pairs {
        if !field.insert_pair(attacking, defending) {
            return Err(CodecError::DuplicateAttack(attacking));
        }
    }

    Ok(GameState {
        deck,
        players,
        trump,
        attacker_index,
        field,
        discard,
        winner,
        last_update,
        revision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Rank, Suit};

    fn played_state() -> GameState {
        let mut state = GameState::random();
        let hand = state.attacking_player().cards.clone();
        state.attack(hand[0]).unwrap();
        if let Some(&extra) = hand[1..].iter().find(|c| state.can_add_to_field(c)) {
            state.attack(extra).unwrap();
        }
        let defender = state.defending_player().cards.clone();
        for unbeaten in state.unbeaten_cards() {
            if let Some(&answer) = defender.iter().find(|d| state.can_beat(&unbeaten, d)) {
                if state.defend(unbeaten, answer).is_ok() {
                    break;
                }
            }
        }
        state
    }

    #[test]
    fn test_round_trip_preserves_everything() {
        for _ in 0..100 {
            let state = played_state();
            let decoded = decode(encode(&state)).unwrap();
            assert_eq!(decoded, state);
        }
    }

    #[test]
    fn test_round_trip_through_json() {
        let state = played_state();
        let json = serde_json::to_string(&encode(&state)).unwrap();
        let back: EncodedState = serde_json::from_str(&json).unwrap();
        let decoded = decode(back).unwrap();

        assert_eq!(decoded.field, state.field);
        assert_eq!(decoded.deck, state.deck);
        assert_eq!(decoded.players, state.players);
        assert_eq!(decoded.trump, state.trump);
        assert_eq!(decoded.attacker_index, state.attacker_index);
        assert_eq!(decoded.winner, state.winner);
        assert_eq!(decoded.revision, state.revision);
    }

    #[test]
    fn test_field_is_a_pair_list() {
        let mut state = GameState::random();
        let card = state.attacking_player().cards[0];
        state.attack(card).unwrap();

        let value = serde_json::to_value(encode(&state)).unwrap();
        let field = value["field"].as_array().unwrap();
        assert_eq!(field.len(), 1);
        assert!(field[0][1].is_null());
        assert_eq!(field[0][0][0], card.rank.as_str());
    }

    #[test]
    fn test_field_order_survives() {
        let mut state = GameState::random();
        let a = Card::new(Rank::Ace, Suit::Spades);
        let b = Card::new(Rank::Six, Suit::Hearts);
        let c = Card::new(Rank::Ten, Suit::Clubs);
        state.field = Field::new();
        state.field.insert_pair(a, Some(b));
        state.field.insert_pair(c, None);
        state.field.insert_pair(b, None);

        let decoded = decode(encode(&state)).unwrap();
        assert_eq!(decoded.field.attacking_cards(), vec![a, c, b]);
    }

    #[test]
    fn test_missing_revision_defaults_to_zero() {
        let state = GameState::random();
        let mut value = serde_json::to_value(encode(&state)).unwrap();
        value.as_object_mut().unwrap().remove("revision");
        value.as_object_mut().unwrap().remove("discard");

        let encoded: EncodedState = serde_json::from_value(value).unwrap();
        assert_eq!(encoded.revision, 0);
        assert!(encoded.discard.is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_structure() {
        let state = GameState::random();

        let mut one_player = encode(&state);
        one_player.players.pop();
        assert_eq!(decode(one_player), Err(CodecError::PlayerCount(1)));

        let mut swapped = encode(&state);
        swapped.players.swap(0, 1);
        assert!(matches!(
            decode(swapped),
            Err(CodecError::PlayerIndex { .. })
        ));

        let mut bad_attacker = encode(&state);
        bad_attacker.attacker_index = 2;
        assert_eq!(decode(bad_attacker), Err(CodecError::OutOfRange(2)));

        let card = Card::new(Rank::Six, Suit::Spades);
        let mut duplicate = encode(&state);
        duplicate.field = vec![(card, None), (card, None)];
        assert_eq!(decode(duplicate), Err(CodecError::DuplicateAttack(card)));
    }
}
