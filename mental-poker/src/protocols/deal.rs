//! Dealing a jointly shuffled deck.
//!
//! Positions are dealt round-robin by seat; the last `talon_size` positions
//! stay face down. Every peer then reveals its keys for all positions held by
//! somebody else, so each holder can strip the last layer locally while the
//! rest of the table never sees the card.

use crate::card::{Card, Deck};
use crate::encrypted_deck::ShuffledDeck;
use crate::error::ProtocolError;
use crate::group::PeerGroup;
use crate::ledger::RoundLogger;
use crate::message::{tokens, Outbound, Response};
use crate::protocol::{Outcome, Protocol};
use crate::protocols::deck_shuffle::DeckShuffle;
use crate::protocols::random_deck::{RandomDeck, DEFAULT_SEED_BITS};
use crate::subgame::{Step, SubGame};

use ark_ec::CurveGroup;
use proof_essentials::homomorphic_encryption::sra::{Plaintext, SecretKey};
use proof_essentials::utils::encoding::{decode_all, to_hex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const LOG_TARGET: &str = "mental_poker::deal";

/// Which seat holds each position. Hands may differ by one card when the
/// dealt part of the deck does not split evenly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deal {
    players: usize,
    owners: Vec<Option<usize>>,
}

impl Deal {
    pub fn round_robin(
        deck_size: usize,
        talon_size: usize,
        players: usize,
    ) -> Result<Self, ProtocolError> {
        if players == 0 || talon_size > deck_size {
            return Err(ProtocolError::InvalidConfig(format!(
                "cannot deal {} cards with a talon of {} to {} players",
                deck_size, talon_size, players
            )));
        }
        let dealt = deck_size - talon_size;
        let owners = (0..deck_size)
            .map(|position| (position < dealt).then(|| position % players))
            .collect();
        Ok(Self { players, owners })
    }

    pub fn owners(&self) -> &[Option<usize>] {
        &self.owners
    }

    pub fn positions_of(&self, seat: usize) -> Vec<usize> {
        self.positions(|owner| owner == Some(seat))
    }

    pub fn talon(&self) -> Vec<usize> {
        self.positions(|owner| owner.is_none())
    }

    /// Positions whose keys `seat` hands out: those dealt to other seats.
    pub fn revealed_by(&self, seat: usize) -> Vec<usize> {
        self.positions(|owner| matches!(owner, Some(o) if o != seat))
    }

    fn positions<F: Fn(Option<usize>) -> bool>(&self, keep: F) -> Vec<usize> {
        (0..self.owners.len())
            .filter(|&p| keep(self.owners[p]))
            .collect()
    }

    pub fn reveal_keys<C: CurveGroup>(
        &self,
        seat: usize,
        deck: &ShuffledDeck<C>,
    ) -> Result<Outbound, ProtocolError> {
        let keys = self
            .revealed_by(seat)
            .into_iter()
            .map(|position| -> Result<String, ProtocolError> {
                let key = deck.own_key(position).ok_or(ProtocolError::IncompleteKeyReveal {
                    expected: deck.len(),
                    received: deck.keys.len(),
                })?;
                Ok(to_hex(key)?)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Outbound::text(keys.join(" ")))
    }

    /// Applies the keys `seat` revealed. A reveal with the wrong number of
    /// keys is rejected before any of them is used.
    pub fn apply_reveal<C: CurveGroup>(
        &self,
        seat: usize,
        response: &Response,
        ledger: &mut RoundLogger<C>,
    ) -> Result<(), ProtocolError> {
        let positions = self.revealed_by(seat);
        let tokens = tokens(&response.payload);
        if tokens.len() != positions.len() {
            return Err(ProtocolError::IncompleteKeyReveal {
                expected: positions.len(),
                received: tokens.len(),
            });
        }
        let keys: Vec<SecretKey<C>> = decode_all(tokens)?;
        for (position, key) in positions.into_iter().zip(keys) {
            ledger.register_card_key(seat, position, key)?;
        }
        Ok(())
    }

    /// Opens the round ledger on a freshly shuffled deck, strips the local
    /// layer everywhere and returns the keys to broadcast.
    pub fn begin<C: CurveGroup>(
        &self,
        group: &PeerGroup,
        deck: ShuffledDeck<C>,
    ) -> Result<(RoundLogger<C>, Outbound), ProtocolError> {
        let me = group.me();
        let reveal = self.reveal_keys(me, &deck)?;
        let mut ledger = RoundLogger::new(group.len(), deck, self.owners.clone())?;
        ledger.register_own_keys(me)?;
        Ok((ledger, reveal))
    }

    /// Applies every peer's reveal and reads the local hand.
    pub fn open_hand<C: CurveGroup>(
        &self,
        group: &PeerGroup,
        responses: &[Response],
        ledger: &mut RoundLogger<C>,
    ) -> Result<Vec<(usize, Card)>, ProtocolError> {
        let seats = group.check_round(responses)?;
        let me = group.me();
        for (seat, response) in seats.into_iter().zip(responses) {
            if seat != me {
                self.apply_reveal(seat, response, ledger)?;
            }
        }

        self.positions_of(me)
            .into_iter()
            .map(|position| {
                ledger
                    .card_at(position)
                    .map(|card| (position, card))
                    .ok_or_else(|| {
                        ProtocolError::ProtocolDisagreement(format!(
                            "position {} of my hand is still encrypted",
                            position
                        ))
                    })
            })
            .collect()
    }

    pub fn players(&self) -> usize {
        self.players
    }
}

/// Step of a [`DeckPipeline`].
pub enum Pipeline<C: CurveGroup> {
    Pending(Outbound),
    Ready(ShuffledDeck<C>),
    Cancelled,
}

/// Agrees on fresh card points, then shuffles them jointly. Both stages run
/// as sub-games sharing the owner's rounds.
pub struct DeckPipeline<C: CurveGroup> {
    game_id: String,
    group: PeerGroup,
    original: Deck,
    cancel: CancellationToken,
    random_deck: Option<SubGame<RandomDeck<C>>>,
    shuffle: Option<SubGame<DeckShuffle<C>>>,
}

impl<C: CurveGroup> DeckPipeline<C> {
    /// Launches the first stage and returns its opening message.
    pub fn start(
        game_id: impl Into<String>,
        group: PeerGroup,
        original: Deck,
        seed_bits: u32,
        parent: &CancellationToken,
    ) -> Result<(Self, Outbound), ProtocolError> {
        let game_id = game_id.into();
        let id = format!("{}/deck", game_id);
        let size = original.len();
        let mut random_deck = SubGame::launch(id.clone(), parent, |token| {
            Ok(RandomDeck::new(id, size, token)?.with_seed_bits(seed_bits))
        })?;
        let first = match random_deck.poll(&[]) {
            Step::Pending(outbound) => outbound,
            Step::Ready(_) => return Err(Self::ended_early(random_deck.id())),
        };

        let pipeline = Self {
            game_id,
            group,
            original,
            cancel: parent.clone(),
            random_deck: Some(random_deck),
            shuffle: None,
        };
        Ok((pipeline, first))
    }

    /// Cancels whichever stage is running.
    pub fn abort(&self) {
        if let Some(sub) = &self.random_deck {
            sub.cancel();
        }
        if let Some(sub) = &self.shuffle {
            sub.cancel();
        }
    }

    pub fn poll(&mut self, responses: &[Response]) -> Result<Pipeline<C>, ProtocolError> {
        if let Some(sub) = self.random_deck.as_mut() {
            let base = match sub.poll(responses) {
                Step::Pending(outbound) => return Ok(Pipeline::Pending(outbound)),
                Step::Ready(Outcome::Completed(base)) => base,
                Step::Ready(Outcome::Cancelled) => return Ok(Pipeline::Cancelled),
                Step::Ready(Outcome::Failed(e)) => return Err(Self::rejected(sub.id(), e)),
            };
            self.random_deck = None;
            return self.start_shuffle(base);
        }

        let sub = self
            .shuffle
            .as_mut()
            .ok_or_else(|| ProtocolError::ProtocolDisagreement("no deck stage running".into()))?;
        match sub.poll(responses) {
            Step::Pending(outbound) => Ok(Pipeline::Pending(outbound)),
            Step::Ready(Outcome::Completed(deck)) => {
                self.shuffle = None;
                Ok(Pipeline::Ready(deck))
            }
            Step::Ready(Outcome::Cancelled) => Ok(Pipeline::Cancelled),
            Step::Ready(Outcome::Failed(e)) => Err(Self::rejected(sub.id(), e)),
        }
    }

    fn start_shuffle(&mut self, base: Vec<Plaintext<C>>) -> Result<Pipeline<C>, ProtocolError> {
        let id = format!("{}/shuffle", self.game_id);
        let group = self.group.clone();
        let original = self.original.clone();
        let mut sub = SubGame::launch(id.clone(), &self.cancel, |_| {
            DeckShuffle::new(id, group, original, base)
        })?;
        let first = match sub.poll(&[]) {
            Step::Pending(outbound) => outbound,
            Step::Ready(_) => return Err(Self::ended_early(sub.id())),
        };
        self.shuffle = Some(sub);
        Ok(Pipeline::Pending(first))
    }

    fn rejected(id: &str, e: ProtocolError) -> ProtocolError {
        ProtocolError::ProtocolDisagreement(format!("{} failed: {}", id, e))
    }

    fn ended_early(id: &str) -> ProtocolError {
        ProtocolError::ProtocolDisagreement(format!("{} ended before it started", id))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DealState {
    Init,
    GenerateDeck,
    DecryptHand,
    End,
}

/// What a peer knows after the deal.
pub struct DealtRound<C: CurveGroup> {
    pub deal: Deal,
    pub ledger: RoundLogger<C>,
    /// `(position, card)` for every position dealt to this peer.
    pub hand: Vec<(usize, Card)>,
}

/// A standalone deal: deck agreement, shuffle, key reveal, hand decryption.
pub struct DealProtocol<C: CurveGroup> {
    game_id: String,
    group: PeerGroup,
    original: Deck,
    deal: Deal,
    seed_bits: u32,
    state: DealState,
    cancel: CancellationToken,
    pipeline: Option<DeckPipeline<C>>,
    ledger: Option<RoundLogger<C>>,
    hand: Vec<(usize, Card)>,
    cancelled: bool,
}

impl<C: CurveGroup> DealProtocol<C> {
    pub fn new(
        game_id: impl Into<String>,
        group: PeerGroup,
        original: Deck,
        talon_size: usize,
        cancel: CancellationToken,
    ) -> Result<Self, ProtocolError> {
        let deal = Deal::round_robin(original.len(), talon_size, group.len())?;
        Ok(Self {
            game_id: game_id.into(),
            group,
            original,
            deal,
            seed_bits: DEFAULT_SEED_BITS,
            state: DealState::Init,
            cancel,
            pipeline: None,
            ledger: None,
            hand: Vec::new(),
            cancelled: false,
        })
    }

    pub fn with_seed_bits(mut self, bits: u32) -> Self {
        self.seed_bits = bits;
        self
    }

    /// Cancels the running deck sub-game. The deal then ends without a
    /// result.
    pub fn abort_deck_generation(&self) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.abort();
        }
    }

    fn poll_pipeline(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        let pipeline = self
            .pipeline
            .as_mut()
            .ok_or_else(|| ProtocolError::ProtocolDisagreement("no deck being generated".into()))?;

        match pipeline.poll(responses)? {
            Pipeline::Pending(outbound) => Ok(outbound),
            Pipeline::Cancelled => {
                info!(target: LOG_TARGET, game = %self.game_id, "deal cancelled");
                self.pipeline = None;
                self.cancelled = true;
                self.state = DealState::End;
                Ok(Outbound::empty())
            }
            Pipeline::Ready(deck) => {
                self.pipeline = None;
                let (ledger, reveal) = self.deal.begin(&self.group, deck)?;
                self.ledger = Some(ledger);
                self.state = DealState::DecryptHand;
                debug!(target: LOG_TARGET, game = %self.game_id, "revealing keys for other hands");
                Ok(reveal)
            }
        }
    }
}

impl<C: CurveGroup> Protocol for DealProtocol<C> {
    type State = DealState;
    type Output = DealtRound<C>;

    fn name(&self) -> &'static str {
        "deal"
    }

    fn state(&self) -> DealState {
        self.state
    }

    fn evaluate(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        match self.state {
            DealState::Init => {
                let (pipeline, first) = DeckPipeline::start(
                    self.game_id.clone(),
                    self.group.clone(),
                    self.original.clone(),
                    self.seed_bits,
                    &self.cancel,
                )?;
                self.pipeline = Some(pipeline);
                self.state = DealState::GenerateDeck;
                Ok(first)
            }
            DealState::GenerateDeck => self.poll_pipeline(responses),
            DealState::DecryptHand => {
                let ledger = self
                    .ledger
                    .as_mut()
                    .ok_or_else(|| ProtocolError::ProtocolDisagreement("no ledger".into()))?;
                self.hand = self.deal.open_hand(&self.group, responses, ledger)?;
                self.state = DealState::End;
                debug!(target: LOG_TARGET, game = %self.game_id, cards = self.hand.len(), "hand decrypted");
                Ok(Outbound::empty())
            }
            DealState::End => Ok(Outbound::empty()),
        }
    }

    fn is_finished(&self) -> bool {
        self.state == DealState::End
    }

    fn outcome(&mut self) -> Outcome<DealtRound<C>> {
        if self.cancelled {
            return Outcome::Cancelled;
        }
        match self.ledger.take() {
            Some(ledger) if self.state == DealState::End => Outcome::Completed(DealtRound {
                deal: self.deal.clone(),
                ledger,
                hand: std::mem::take(&mut self.hand),
            }),
            _ => Outcome::Failed(ProtocolError::ProtocolDisagreement(
                "deal not finished".to_string(),
            )),
        }
    }

    fn final_message(&self) -> String {
        if self.cancelled {
            return "Deal cancelled".to_string();
        }
        let cards: Vec<String> = self.hand.iter().map(|(_, c)| c.to_string()).collect();
        format!("Dealt {}", cards.join(" "))
    }
}
