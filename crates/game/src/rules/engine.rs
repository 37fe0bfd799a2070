use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::card::{Card, N_PLAYERS, Player, Rank, Suit, standard_deck};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("game is already over")]
    GameOver,
    #[error("card {0} is not in the player's hand")]
    CardNotInHand(Card),
    #[error("card {0} cannot be added to the field")]
    CannotAddToField(Card),
    #[error("card {0} is not attacking on the field")]
    NotOnField(Card),
    #[error("card {0} is already beaten")]
    AlreadyBeaten(Card),
    #[error("{defending} does not beat {attacking}")]
    CannotBeat { attacking: Card, defending: Card },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DealError {
    #[error("no card left in the deck can designate the trump")]
    NoTrumpCandidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Field was beaten off; the former defender attacks next.
    NormalTurn,
    /// Defender took the field; the attacker keeps the initiative.
    TookCards,
    GameOver,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakenCards {
    pub cards: Vec<Card>,
    pub player: usize,
}

/// Most recent mutation, kept for notification and replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LastUpdate {
    Attack { card: Card, player: usize },
    Defend {
        attacking_card: Card,
        defending_card: Card,
        player: usize,
    },
    FinishTurn {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        take_cards: Option<TakenCards>,
        #[serde(default)]
        clear_field: bool,
        from_deck: Vec<(usize, Card)>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turn_change: Option<usize>,
    },
}

/// Attack/defence pairs of the current exchange, in attack order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Field {
    pairs: Vec<(Card, Option<Card>)>,
}

impl Field {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Card, Option<Card>)> {
        self.pairs.iter()
    }

    pub fn contains_attack(&self, card: &Card) -> bool {
        self.pairs.iter().any(|(attack, _)| attack == card)
    }

    /// `None` if `attacking` is not on the field, `Some(None)` if it is unbeaten.
    pub fn get(&self, attacking: &Card) -> Option<Option<Card>> {
        self.pairs
            .iter()
            .find(|(attack, _)| attack == attacking)
            .map(|(_, defence)| *defence)
    }

    pub fn attack_at(&self, index: usize) -> Option<Card> {
        self.pairs.get(index).map(|(attack, _)| *attack)
    }

    /// Adds an unbeaten attacking card. Returns false if it is already a key.
    pub fn insert_attack(&mut self, card: Card) -> bool {
        if self.contains_attack(&card) {
            return false;
        }
        self.pairs.push((card, None));
        true
    }

    /// Inserts a pair in order, as decoding does.
    pub fn insert_pair(&mut self, attacking: Card, defending: Option<Card>) -> bool {
        if self.contains_attack(&attacking) {
            return false;
        }
        self.pairs.push((attacking, defending));
        true
    }

    fn set_defence(&mut self, attacking: &Card, defending: Card) {
        if let Some(pair) = self.pairs.iter_mut().find(|(a, _)| a == attacking) {
            pair.1 = Some(defending);
        }
    }

    pub fn attacking_cards(&self) -> Vec<Card> {
        self.pairs.iter().map(|(attack, _)| *attack).collect()
    }

    pub fn defending_cards(&self) -> Vec<Card> {
        self.pairs
            .iter()
            .filter_map(|(_, defence)| *defence)
            .collect()
    }

    pub fn unbeaten_cards(&self) -> Vec<Card> {
        self.pairs
            .iter()
            .filter(|(_, defence)| defence.is_none())
            .map(|(attack, _)| *attack)
            .collect()
    }

    /// Empties the field, attacking cards first, then defending ones.
    fn take_all(&mut self) -> Vec<Card> {
        let mut cards = self.attacking_cards();
        cards.extend(self.defending_cards());
        self.pairs.clear();
        cards
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub deck: Vec<Card>,
    pub players: [Player; N_PLAYERS],
    pub trump: Card,
    pub attacker_index: usize,
    pub field: Field,
    /// Beaten-off cards, out of play for the rest of the game.
    pub discard: Vec<Card>,
    pub winner: Option<usize>,
    pub last_update: Option<LastUpdate>,
    pub revision: u64,
}

impl GameState {
    /// Shuffles a fresh standard deck with `rng` and deals it.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = standard_deck();
        deck.shuffle(rng);

        match Self::deal(deck) {
            Ok(state) => state,
            // Only four aces exist, so the 24 undealt cards always hold a candidate.
            Err(DealError::NoTrumpCandidate) => unreachable!("standard deck always has a trump"),
        }
    }

    pub fn random() -> Self {
        Self::new(&mut rand::thread_rng())
    }

    /// Deals `deck` as given, without shuffling.
    pub fn deal(mut deck: Vec<Card>) -> Result<Self, DealError> {
        let mut players = [Player::new(0, Vec::new()), Player::new(1, Vec::new())];
        for player in &mut players {
            player.take_cards_from_deck(&mut deck);
        }

        let trump_pos = deck
            .iter()
            .position(|card| card.rank != Rank::TOP)
            .ok_or(DealError::NoTrumpCandidate)?;
        let trump = deck.remove(trump_pos);
        deck.push(trump);

        Ok(Self {
            deck,
            players,
            trump,
            attacker_index: 0,
            field: Field::new(),
            discard: Vec::new(),
            winner: None,
            last_update: None,
            revision: 0,
        })
    }

    pub fn trump_suit(&self) -> Suit {
        self.trump.suit
    }

    pub fn defender_index(&self) -> usize {
        (self.attacker_index + 1) % N_PLAYERS
    }

    pub fn attacking_player(&self) -> &Player {
        &self.players[self.attacker_index]
    }

    pub fn defending_player(&self) -> &Player {
        &self.players[self.defender_index()]
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    /// Cards in the deck, both hands, the field and the discard pile.
    /// Constant over a game.
    pub fn card_count(&self) -> usize {
        self.deck.len()
            + self.discard.len()
            + self.players.iter().map(Player::n_cards).sum::<usize>()
            + self.field.len()
            + self.field.defending_cards().len()
    }

    /// Whether `defending` beats `attacking` under the current trump.
    pub fn can_beat(&self, attacking: &Card, defending: &Card) -> bool {
        let trump = self.trump_suit();
        if defending.suit == trump {
            attacking.suit != trump || defending.rank > attacking.rank
        } else if attacking.suit == defending.suit {
            defending.rank > attacking.rank
        } else {
            false
        }
    }

    pub fn can_add_to_field(&self, card: &Card) -> bool {
        if self.field.is_empty() {
            return true;
        }
        if self.defending_player().is_empty() {
            return false;
        }
        self.field.iter().any(|(attack, defence)| {
            attack.same_rank(card) || defence.is_some_and(|d| d.same_rank(card))
        })
    }

    pub fn attacking_cards(&self) -> Vec<Card> {
        self.field.attacking_cards()
    }

    pub fn defending_cards(&self) -> Vec<Card> {
        self.field.defending_cards()
    }

    pub fn unbeaten_cards(&self) -> Vec<Card> {
        self.field.unbeaten_cards()
    }

    pub fn any_unbeaten_cards(&self) -> bool {
        self.field.iter().any(|(_, defence)| defence.is_none())
    }

    /// True iff every unbeaten card has some answer in the defender's hand.
    pub fn possible_to_beat(&self) -> bool {
        let hand = &self.defending_player().cards;
        self.unbeaten_cards()
            .iter()
            .all(|u| hand.iter().any(|c| self.can_beat(u, c)))
    }

    /// Unbeaten field cards that `card` could beat.
    pub fn defend_variants(&self, card: &Card) -> Vec<Card> {
        self.unbeaten_cards()
            .into_iter()
            .filter(|attacking| self.can_beat(attacking, card))
            .collect()
    }

    pub fn attack(&mut self, card: Card) -> Result<(), MoveError> {
        self.ensure_running()?;

        if !self.attacking_player().has_card(&card) {
            return Err(MoveError::CardNotInHand(card));
        }
        if !self.can_add_to_field(&card) {
            return Err(MoveError::CannotAddToField(card));
        }

        let attacker = self.attacker_index;
        self.players[attacker].take_card(&card);
        self.field.insert_attack(card);

        self.last_update = Some(LastUpdate::Attack {
            card,
            player: attacker,
        });
        self.revision += 1;

        Ok(())
    }

    pub fn defend(&mut self, attacking: Card, defending: Card) -> Result<(), MoveError> {
        self.ensure_running()?;

        match self.field.get(&attacking) {
            None => return Err(MoveError::NotOnField(attacking)),
            Some(Some(_)) => {
                log::warn!("Defending already beaten card {}", attacking);
                return Err(MoveError::AlreadyBeaten(attacking));
            }
            Some(None) => {}
        }

        if !self.defending_player().has_card(&defending) {
            return Err(MoveError::CardNotInHand(defending));
        }
        if !self.can_beat(&attacking, &defending) {
            return Err(MoveError::CannotBeat {
                attacking,
                defending,
            });
        }

        let defender = self.defender_index();
        self.field.set_defence(&attacking, defending);
        self.players[defender].take_card(&defending);

        self.last_update = Some(LastUpdate::Defend {
            attacking_card: attacking,
            defending_card: defending,
            player: defender,
        });
        self.revision += 1;

        Ok(())
    }

    pub fn finish_turn(&mut self) -> Result<TurnOutcome, MoveError> {
        self.ensure_running()?;

        let defender = self.defender_index();
        let took_cards = self.any_unbeaten_cards();

        let take_cards = if took_cards {
            let cards = self.field.take_all();
            self.players[defender].add_cards(cards.iter().copied());
            Some(TakenCards {
                cards,
                player: defender,
            })
        } else {
            let beaten = self.field.take_all();
            self.discard.extend(beaten);
            None
        };

        // Attacker draws first; matters when the deck runs short.
        let mut from_deck = Vec::new();
        for offset in 0..N_PLAYERS {
            let index = (self.attacker_index + offset) % N_PLAYERS;
            let drawn = self.players[index].take_cards_from_deck(&mut self.deck);
            from_deck.extend(drawn.into_iter().map(|c| (index, c)));
        }

        self.revision += 1;

        if self.deck.is_empty() {
            if let Some(winner) = self.players.iter().position(Player::is_empty) {
                self.winner = Some(winner);
                self.last_update = Some(LastUpdate::FinishTurn {
                    take_cards,
                    clear_field: !took_cards,
                    from_deck,
                    winner: Some(winner),
                    turn_change: None,
                });
                log::info!("Player {} won", winner);
                return Ok(TurnOutcome::GameOver);
            }
        }

        let turn_change = if took_cards {
            None
        } else {
            self.attacker_index = defender;
            Some(defender)
        };

        self.last_update = Some(LastUpdate::FinishTurn {
            take_cards,
            clear_field: !took_cards,
            from_deck,
            winner: None,
            turn_change,
        });

        Ok(if took_cards {
            TurnOutcome::TookCards
        } else {
            TurnOutcome::NormalTurn
        })
    }

    fn ensure_running(&self) -> Result<(), MoveError> {
        if let Some(winner) = self.winner {
            log::warn!("Move attempted after player {} already won", winner);
            return Err(MoveError::GameOver);
        }
        Ok(())
    }
}
