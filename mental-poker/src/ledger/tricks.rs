//! Trick-taking play log: who played what, who won each trick, and whether
//! everyone followed suit.

use crate::card::{max_with_trump, Card, Deck, Suit};
use crate::error::ProtocolError;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bet {
    Pass,
    Misere,
    Game { tricks: u8, trump: Option<Suit> },
}

impl Bet {
    pub fn trump(&self) -> Option<Suit> {
        match self {
            Bet::Game { trump, .. } => *trump,
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TrickLog {
    players: usize,
    deck: Deck,
    talon_size: usize,
    talon: Vec<Card>,
    log: Vec<(usize, Card)>,
    turns_won: Vec<usize>,
    enforced_suit: Option<Suit>,
    bet: Option<Bet>,
}

impl TrickLog {
    pub fn new(players: usize, deck: Deck, talon_size: usize) -> Result<Self, ProtocolError> {
        if players == 0 || talon_size > deck.len() {
            return Err(ProtocolError::InvalidConfig(format!(
                "{} players with a talon of {} from {} cards",
                players,
                talon_size,
                deck.len()
            )));
        }
        Ok(Self {
            players,
            deck,
            talon_size,
            talon: Vec::new(),
            log: Vec::new(),
            turns_won: vec![0; players],
            enforced_suit: None,
            bet: None,
        })
    }

    pub fn register_talon(&mut self, talon: Vec<Card>) -> Result<(), ProtocolError> {
        if talon.len() != self.talon_size {
            return Err(ProtocolError::MalformedMove(format!(
                "talon of {} cards, expected {}",
                talon.len(),
                self.talon_size
            )));
        }
        self.talon = talon;
        Ok(())
    }

    /// On a pass the first trick follows the suit of the first talon card.
    pub fn update_bet(&mut self, bet: Bet) {
        if bet == Bet::Pass {
            self.enforced_suit = self.talon.first().map(|c| c.suit);
        }
        self.bet = Some(bet);
    }

    pub fn bet(&self) -> Option<Bet> {
        self.bet
    }

    pub fn talon(&self) -> &[Card] {
        &self.talon
    }

    pub fn log(&self) -> &[(usize, Card)] {
        &self.log
    }

    pub fn enforced_suit(&self) -> Option<Suit> {
        self.enforced_suit
    }

    pub fn new_turn_started(&self) -> bool {
        self.log.len() % self.players == 0
    }

    fn trump(&self) -> Option<Suit> {
        self.bet.and_then(|b| b.trump())
    }

    fn is_pass(&self) -> bool {
        self.bet == Some(Bet::Pass)
    }

    /// Records a play and returns who moves next: the following seat, or the
    /// trick winner once everyone has played.
    pub fn register_play(&mut self, player: usize, card: Card) -> Result<usize, ProtocolError> {
        if player >= self.players {
            return Err(ProtocolError::MalformedMove(format!("no seat {}", player)));
        }
        if self.log.iter().any(|(_, c)| *c == card) {
            return Err(ProtocolError::MalformedMove(format!("{} played twice", card)));
        }

        self.log.push((player, card));
        if self.log.len() % self.players == 1 && !(self.log.len() == 1 && self.is_pass()) {
            self.enforced_suit = Some(card.suit);
        }

        if self.log.len() % self.players != 0 {
            return Ok((player + 1) % self.players);
        }

        let trick = &self.log[self.log.len() - self.players..];
        let cards: Vec<Card> = trick.iter().map(|(_, c)| *c).collect();
        let best = max_with_trump(&cards, self.trump(), self.enforced_suit)
            .ok_or_else(|| ProtocolError::MalformedMove("empty trick".to_string()))?;
        let winner = trick
            .iter()
            .find(|(_, c)| *c == best)
            .map(|(p, _)| *p)
            .ok_or_else(|| ProtocolError::MalformedMove("trick winner not found".to_string()))?;

        self.turns_won[winner] += 1;
        self.enforced_suit = None;
        Ok(winner)
    }

    /// The subset of `hand` that may legally be played now.
    pub fn filter_playable_cards(&self, hand: &[Card]) -> Vec<Card> {
        let of_suit = |suit: Suit| -> Vec<Card> {
            hand.iter().filter(|c| c.suit == suit).copied().collect()
        };

        // the leader may play anything
        let enforced = match self.enforced_suit {
            Some(suit) => suit,
            None => return hand.to_vec(),
        };
        let follow = of_suit(enforced);
        if !follow.is_empty() {
            return follow;
        }
        if let Some(trump) = self.trump() {
            let trumps = of_suit(trump);
            if !trumps.is_empty() {
                return trumps;
            }
        }
        hand.to_vec()
    }

    pub fn round_finished(&self) -> bool {
        self.talon.len() == self.talon_size && self.log.len() + self.talon_size == self.deck.len()
    }

    pub fn count_won_turns(&self, player: usize) -> usize {
        self.turns_won.get(player).copied().unwrap_or(0)
    }

    /// Replays the finished round and checks that nobody broke suit while
    /// holding the led suit, and nobody skipped a trump they held.
    pub fn verify_round_plays(&self) -> bool {
        if !self.round_finished() {
            return false;
        }

        let mut hands: Vec<Vec<Card>> = vec![Vec::new(); self.players];
        for (player, card) in &self.log {
            hands[*player].push(*card);
        }

        for (turn, trick) in self.log.chunks(self.players).enumerate() {
            let mut seats: Vec<usize> = trick.iter().map(|(p, _)| *p).collect();
            seats.sort_unstable();
            seats.dedup();
            if seats.len() != self.players {
                return false;
            }

            let enforced = match self.talon.first() {
                Some(first) if turn == 0 && self.is_pass() => first.suit,
                _ => trick[0].1.suit,
            };
            for (player, card) in trick {
                if card.suit == enforced {
                    continue;
                }
                let hand = &hands[*player];
                if hand.iter().any(|c| c.suit == enforced) {
                    return false;
                }
                if let Some(trump) = self.trump() {
                    if card.suit != trump && hand.iter().any(|c| c.suit == trump) {
                        return false;
                    }
                }
            }
            for (player, card) in trick {
                hands[*player].retain(|c| c != card);
            }
        }
        true
    }

    /// Cards never played in a finished round, i.e. what the declarer put
    /// away from the talon.
    pub fn discarded_talon(&self) -> Option<Vec<Card>> {
        if self.log.len() + self.talon_size != self.deck.len() {
            return None;
        }
        let mut rest: Vec<Card> = self
            .deck
            .cards()
            .iter()
            .filter(|card| !self.log.iter().any(|(_, c)| c == *card))
            .copied()
            .collect();
        rest.sort();
        Some(rest)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::card::Rank;

    fn card(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    /// Two players, four cards, no talon.
    fn small_deck() -> Deck {
        Deck::from_cards(vec![
            card(Rank::Ace, Suit::Hearts),
            card(Rank::King, Suit::Hearts),
            card(Rank::Queen, Suit::Spades),
            card(Rank::Jack, Suit::Clubs),
        ])
    }

    #[test]
    fn test_legal_round_verifies() {
        let mut log = TrickLog::new(2, small_deck(), 0).unwrap();
        log.register_talon(vec![]).unwrap();
        log.update_bet(Bet::Game {
            tricks: 1,
            trump: None,
        });

        // p0 holds A♥ J♣, p1 holds K♥ Q♠
        assert_eq!(log.register_play(0, card(Rank::Ace, Suit::Hearts)).unwrap(), 1);
        assert_eq!(log.enforced_suit(), Some(Suit::Hearts));
        assert_eq!(
            log.filter_playable_cards(&[card(Rank::King, Suit::Hearts), card(Rank::Queen, Suit::Spades)]),
            vec![card(Rank::King, Suit::Hearts)]
        );
        assert_eq!(log.register_play(1, card(Rank::King, Suit::Hearts)).unwrap(), 0);
        assert!(log.new_turn_started());
        assert_eq!(log.register_play(0, card(Rank::Jack, Suit::Clubs)).unwrap(), 1);
        assert_eq!(log.register_play(1, card(Rank::Queen, Suit::Spades)).unwrap(), 0);

        assert!(log.round_finished());
        assert!(log.verify_round_plays());
        assert_eq!(log.count_won_turns(0), 2);
        assert_eq!(log.count_won_turns(1), 0);
        assert_eq!(log.discarded_talon(), Some(vec![]));
    }

    #[test]
    fn test_breaking_suit_fails() {
        let mut log = TrickLog::new(2, small_deck(), 0).unwrap();
        log.register_talon(vec![]).unwrap();
        log.update_bet(Bet::Misere);

        // p1 holds K♥ but answers A♥ with Q♠
        log.register_play(0, card(Rank::Ace, Suit::Hearts)).unwrap();
        log.register_play(1, card(Rank::Queen, Suit::Spades)).unwrap();
        log.register_play(0, card(Rank::Jack, Suit::Clubs)).unwrap();
        log.register_play(1, card(Rank::King, Suit::Hearts)).unwrap();

        assert!(log.round_finished());
        assert!(!log.verify_round_plays());
    }

    #[test]
    fn test_skipping_trump_fails() {
        let mut log = TrickLog::new(2, small_deck(), 0).unwrap();
        log.register_talon(vec![]).unwrap();
        log.update_bet(Bet::Game {
            tricks: 1,
            trump: Some(Suit::Spades),
        });

        // p1 has no clubs but keeps Q♠ back
        log.register_play(0, card(Rank::Jack, Suit::Clubs)).unwrap();
        log.register_play(1, card(Rank::King, Suit::Hearts)).unwrap();
        log.register_play(0, card(Rank::Ace, Suit::Hearts)).unwrap();
        log.register_play(1, card(Rank::Queen, Suit::Spades)).unwrap();

        assert!(!log.verify_round_plays());
    }

    #[test]
    fn test_trump_wins_trick() {
        let mut log = TrickLog::new(2, small_deck(), 0).unwrap();
        log.update_bet(Bet::Game {
            tricks: 1,
            trump: Some(Suit::Spades),
        });
        log.register_play(0, card(Rank::Ace, Suit::Hearts)).unwrap();
        assert_eq!(log.register_play(1, card(Rank::Queen, Suit::Spades)).unwrap(), 1);
        assert_eq!(log.count_won_turns(1), 1);
    }

    #[test]
    fn test_pass_follows_talon_suit() {
        let deck = Deck::from_cards(vec![
            card(Rank::Ace, Suit::Hearts),
            card(Rank::King, Suit::Spades),
            card(Rank::Ten, Suit::Spades),
            card(Rank::Seven, Suit::Clubs),
            card(Rank::Nine, Suit::Spades),
        ]);
        let mut log = TrickLog::new(2, deck, 1).unwrap();
        log.register_talon(vec![card(Rank::Nine, Suit::Spades)]).unwrap();
        log.update_bet(Bet::Pass);
        assert_eq!(log.enforced_suit(), Some(Suit::Spades));

        // p0 holds A♥ 7♣, p1 holds K♠ 10♠; the first trick follows the talon
        log.register_play(0, card(Rank::Ace, Suit::Hearts)).unwrap();
        assert_eq!(log.enforced_suit(), Some(Suit::Spades));
        assert_eq!(log.register_play(1, card(Rank::King, Suit::Spades)).unwrap(), 1);

        assert_eq!(log.register_play(1, card(Rank::Ten, Suit::Spades)).unwrap(), 0);
        assert_eq!(log.register_play(0, card(Rank::Seven, Suit::Clubs)).unwrap(), 1);
        assert_eq!(log.count_won_turns(1), 2);
        assert!(log.verify_round_plays());
        assert_eq!(
            log.discarded_talon(),
            Some(vec![card(Rank::Nine, Suit::Spades)])
        );
    }

    #[test]
    fn test_leader_is_free_in_trump_contract() {
        let mut log = TrickLog::new(2, small_deck(), 0).unwrap();
        log.update_bet(Bet::Game {
            tricks: 1,
            trump: Some(Suit::Spades),
        });
        let hand = [card(Rank::Ace, Suit::Hearts), card(Rank::Queen, Suit::Spades)];

        assert!(log.new_turn_started());
        assert_eq!(log.filter_playable_cards(&hand), hand.to_vec());

        // once clubs are led, a hand without clubs must trump
        log.register_play(1, card(Rank::Jack, Suit::Clubs)).unwrap();
        assert_eq!(
            log.filter_playable_cards(&hand),
            vec![card(Rank::Queen, Suit::Spades)]
        );
    }

    #[test]
    fn test_rejects_empty_table() {
        assert!(matches!(
            TrickLog::new(0, small_deck(), 0),
            Err(ProtocolError::InvalidConfig(_))
        ));
        assert!(TrickLog::new(2, small_deck(), 5).is_err());
    }

    #[test]
    fn test_rejects_bad_plays() {
        let mut log = TrickLog::new(2, small_deck(), 0).unwrap();
        assert!(log.register_play(2, card(Rank::Ace, Suit::Hearts)).is_err());
        log.register_play(0, card(Rank::Ace, Suit::Hearts)).unwrap();
        assert!(log.register_play(1, card(Rank::Ace, Suit::Hearts)).is_err());
        assert!(log.register_talon(vec![card(Rank::Ace, Suit::Hearts)]).is_err());
        assert!(!log.round_finished());
        assert!(!log.verify_round_plays());
    }
}
