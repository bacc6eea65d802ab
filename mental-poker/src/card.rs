use crate::error::ProtocolError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SUPPORTED_DECK_SIZES: [usize; 3] = [32, 36, 52];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
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

    pub fn symbol(&self) -> &'static str {
        match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
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

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Rank {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rank::ALL
            .iter()
            .find(|rank| rank.symbol() == s)
            .copied()
            .ok_or_else(|| ProtocolError::MalformedMove(format!("unknown rank {}", s)))
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suit = match self {
            Suit::Clubs => "♣",
            Suit::Diamonds => "♦",
            Suit::Hearts => "♥",
            Suit::Spades => "♠",
        };
        write!(f, "{}", suit)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

/// A deck of `4·k` cards holds the `k` highest ranks of every suit, ordered
/// suit by suit. Returns `None` for ids or sizes outside that scheme.
pub fn card_by_id(id: usize, deck_size: usize) -> Option<Card> {
    let per_suit = deck_size / 4;
    if deck_size % 4 != 0 || per_suit == 0 || per_suit > Rank::ALL.len() || id >= deck_size {
        return None;
    }
    let first_rank = Rank::ALL.len() - per_suit;
    Some(Card::new(
        Rank::ALL[first_rank + id % per_suit],
        Suit::ALL[id / per_suit],
    ))
}

/// Inverse of [`card_by_id`].
pub fn card_id(card: &Card, deck_size: usize) -> Option<usize> {
    (0..deck_size).find(|&id| card_by_id(id, deck_size).as_ref() == Some(card))
}

/// Strongest card of a trick: the highest trump if any trump was played,
/// otherwise the highest card of the enforced suit. Without an enforced suit
/// the suit of the first card leads.
pub fn max_with_trump(cards: &[Card], trump: Option<Suit>, enforced: Option<Suit>) -> Option<Card> {
    let lead = enforced.or_else(|| cards.first().map(|card| card.suit))?;
    let highest_of = |suit: Suit| {
        cards
            .iter()
            .filter(|card| card.suit == suit)
            .max_by_key(|card| card.rank)
            .copied()
    };

    trump.and_then(highest_of).or_else(|| highest_of(lead))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Ordered deck following the [`card_by_id`] layout.
    pub fn new(deck_size: usize) -> Result<Self, ProtocolError> {
        let cards = (0..deck_size)
            .map(|id| card_by_id(id, deck_size))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                ProtocolError::InvalidConfig(format!("unsupported deck size {}", deck_size))
            })?;
        Ok(Self { cards })
    }

    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Card> {
        self.cards.get(index).copied()
    }

    pub fn position(&self, card: &Card) -> Option<usize> {
        self.cards.iter().position(|c| c == card)
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_card_ids() {
        assert_eq!(card_by_id(0, 52), Some(Card::new(Rank::Two, Suit::Clubs)));
        assert_eq!(card_by_id(51, 52), Some(Card::new(Rank::Ace, Suit::Spades)));
        assert_eq!(card_by_id(0, 32), Some(Card::new(Rank::Seven, Suit::Clubs)));
        assert_eq!(card_by_id(8, 32), Some(Card::new(Rank::Seven, Suit::Diamonds)));
        assert_eq!(card_by_id(0, 36), Some(Card::new(Rank::Six, Suit::Clubs)));
        assert_eq!(card_by_id(32, 32), None);
        assert_eq!(card_by_id(0, 6), None);

        for size in SUPPORTED_DECK_SIZES {
            for id in 0..size {
                let card = card_by_id(id, size).unwrap();
                assert_eq!(card_id(&card, size), Some(id));
            }
        }
    }

    #[test]
    fn test_deck() {
        let deck = Deck::new(36).unwrap();
        assert_eq!(deck.len(), 36);
        let queen = Card::new(Rank::Queen, Suit::Hearts);
        assert_eq!(deck.get(deck.position(&queen).unwrap()), Some(queen));
        assert!(Deck::new(30).is_err());
    }

    #[test]
    fn test_trick_winner() {
        let trick = [
            Card::new(Rank::Ten, Suit::Hearts),
            Card::new(Rank::Ace, Suit::Clubs),
            Card::new(Rank::Queen, Suit::Hearts),
        ];
        assert_eq!(
            max_with_trump(&trick, None, None),
            Some(Card::new(Rank::Queen, Suit::Hearts))
        );
        assert_eq!(
            max_with_trump(&trick, Some(Suit::Clubs), Some(Suit::Hearts)),
            Some(Card::new(Rank::Ace, Suit::Clubs))
        );
        // trump declared but not played
        assert_eq!(
            max_with_trump(&trick, Some(Suit::Spades), Some(Suit::Hearts)),
            Some(Card::new(Rank::Queen, Suit::Hearts))
        );
    }

    #[test]
    fn test_rank_tokens() {
        assert_eq!("10".parse::<Rank>().unwrap(), Rank::Ten);
        assert_eq!("A".parse::<Rank>().unwrap(), Rank::Ace);
        assert!("11".parse::<Rank>().is_err());
    }
}
