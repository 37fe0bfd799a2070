use std::fmt;

use serde::{Deserialize, Serialize};

pub const CARDS_IN_HAND_MAX: usize = 6;
pub const N_PLAYERS: usize = 2;
pub const DECK_SIZE: usize = Rank::ALL.len() * Suit::ALL.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "A")]
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 9] = [
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    /// The top rank. It never designates the trump.
    pub const TOP: Rank = Rank::Ace;

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        }
    }
}

// Declared in code point order of the symbols so hands sort the same way on both peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Suit {
    #[serde(rename = "♠")]
    Spades,
    #[serde(rename = "♣")]
    Clubs,
    #[serde(rename = "♥")]
    Hearts,
    #[serde(rename = "♦")]
    Diamonds,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    pub fn symbol(&self) -> char {
        match self {
            Suit::Spades => '♠',
            Suit::Clubs => '♣',
            Suit::Hearts => '♥',
            Suit::Diamonds => '♦',
        }
    }
}

/// A playing card. On the wire it is a two element array `[rank, suit]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(Rank, Suit)", into = "(Rank, Suit)")]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    pub fn same_rank(&self, other: &Card) -> bool {
        self.rank == other.rank
    }
}

impl From<(Rank, Suit)> for Card {
    fn from((rank, suit): (Rank, Suit)) -> Self {
        Self { rank, suit }
    }
}

impl From<Card> for (Rank, Suit) {
    fn from(card: Card) -> Self {
        (card.rank, card.suit)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank.as_str(), self.suit.symbol())
    }
}

/// The unshuffled 36-card deck, rank-major.
pub fn standard_deck() -> Vec<Card> {
    Rank::ALL
        .iter()
        .flat_map(|&r| Suit::ALL.iter().map(move |&s| Card::new(r, s)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub index: usize,
    pub cards: Vec<Card>,
}

impl Player {
    pub fn new(index: usize, cards: Vec<Card>) -> Self {
        let mut player = Self { index, cards };
        player.sort_hand();
        player
    }

    /// Draws from the front of `deck` until the hand holds `CARDS_IN_HAND_MAX`
    /// cards or the deck runs out. Returns the drawn cards in draw order.
    pub fn take_cards_from_deck(&mut self, deck: &mut Vec<Card>) -> Vec<Card> {
        let lack = CARDS_IN_HAND_MAX.saturating_sub(self.cards.len());
        let n = lack.min(deck.len());
        let drawn: Vec<Card> = deck.drain(..n).collect();
        self.add_cards(drawn.iter().copied());
        drawn
    }

    pub fn add_cards(&mut self, cards: impl IntoIterator<Item = Card>) {
        self.cards.extend(cards);
        self.sort_hand();
    }

    pub fn sort_hand(&mut self) {
        self.cards.sort();
    }

    pub fn has_card(&self, card: &Card) -> bool {
        self.cards.contains(card)
    }

    pub fn take_card(&mut self, card: &Card) -> bool {
        if let Some(pos) = self.cards.iter().position(|c| c == card) {
            self.cards.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn n_cards(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
