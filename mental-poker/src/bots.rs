//! Automatic players for tests and demos.

use crate::card::{Card, Rank};
use crate::ledger::stack::MAX_CARDS_PER_PLAY;
use crate::protocols::cheat::{CheatMove, CheatView, MoveSource};

use std::collections::BTreeMap;

/// Plays the claimed rank when it holds it and bluffs a single card when it
/// does not. Challenges when its hand is empty, or when the stack claims more
/// copies of a rank than its own hand leaves room for.
#[derive(Clone, Debug, Default)]
pub struct CautiousBot {
    pub preferred_deck: Option<usize>,
}

impl CautiousBot {
    pub fn new(preferred_deck: usize) -> Self {
        Self {
            preferred_deck: Some(preferred_deck),
        }
    }

    fn largest_group(hand: &[Card]) -> Option<(Rank, Vec<Card>)> {
        let mut groups: BTreeMap<Rank, Vec<Card>> = BTreeMap::new();
        for card in hand {
            groups.entry(card.rank).or_default().push(*card);
        }
        groups
            .into_iter()
            .max_by_key(|(rank, cards)| (cards.len(), std::cmp::Reverse(*rank)))
    }
}

impl MoveSource for CautiousBot {
    fn vote_deck_size(&mut self, options: &[usize]) -> usize {
        match self.preferred_deck {
            Some(size) if options.contains(&size) => size,
            _ => options.first().copied().unwrap_or_default(),
        }
    }

    fn choose_move(&mut self, view: &CheatView<'_>) -> CheatMove {
        let claim = match (view.claim, view.last_play) {
            (Some(claim), Some(_)) => claim,
            _ => {
                return match Self::largest_group(view.hand) {
                    Some((rank, mut cards)) => {
                        cards.truncate(MAX_CARDS_PER_PLAY);
                        CheatMove::Add { cards, claim: rank }
                    }
                    None => CheatMove::Check { index: 0 },
                };
            }
        };

        let matching: Vec<Card> = view
            .hand
            .iter()
            .filter(|c| c.rank == claim)
            .take(MAX_CARDS_PER_PLAY)
            .copied()
            .collect();
        let held = view.hand.iter().filter(|c| c.rank == claim).count();
        if view.hand.is_empty() || view.stack_cards + held > 4 {
            return CheatMove::Check { index: 0 };
        }
        if !matching.is_empty() {
            return CheatMove::Add {
                cards: matching,
                claim,
            };
        }
        CheatMove::Add {
            cards: vec![view.hand[0]],
            claim,
        }
    }
}
