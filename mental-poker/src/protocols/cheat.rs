//! A bluffing card game played on a jointly shuffled deck.
//!
//! Players take turns adding one to four cards face down to a stack. The
//! first play of a stack names a rank and every later play claims to follow
//! it. Each added card is a hash commitment to `position key salt`. Instead
//! of adding, the player to move may challenge one card of the previous
//! play: every contributor then opens all of its commitments, the ledger
//! checks them, and whoever was wrong takes the whole stack. A player who
//! ends a challenge with an empty hand wins.
//!
//! Move grammar:
//! - `ADD count rank|-` with one hash per card in `data`
//! - `CHECK index`
//! - `OPEN` with one opening per committed card in `data`

use crate::card::{Card, Deck, Rank};
use crate::config::GameConfig;
use crate::error::ProtocolError;
use crate::group::PeerGroup;
use crate::ledger::stack::MAX_CARDS_PER_PLAY;
use crate::ledger::{GameLogger, RoundLogger};
use crate::message::{parse_token, Outbound, PeerId, Response};
use crate::protocol::{Outcome, Protocol};
use crate::protocols::deal::{Deal, DeckPipeline, Pipeline};

use ark_ec::CurveGroup;
use proof_essentials::commitment::HashCommitment;
use proof_essentials::homomorphic_encryption::sra::Parameters;
use proof_essentials::utils::encoding::to_hex;
use proof_essentials::utils::rand::random_salt;
use rand::thread_rng;
use sha2::Sha256;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "mental_poker::cheat";

type Commitment = HashCommitment<Sha256>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheatState {
    Init,
    ValidateKeys,
    PickDeckSize,
    GenerateDeck,
    DecryptHand,
    InitRound,
    VerifyCard,
    End,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheatMove {
    Add { cards: Vec<Card>, claim: Rank },
    /// Challenge card `index` of the previous play.
    Check { index: usize },
}

/// What the local player can see when choosing a move.
pub struct CheatView<'a> {
    pub seat: usize,
    pub hand: &'a [Card],
    pub claim: Option<Rank>,
    /// Seat and card count of the previous play in this stack.
    pub last_play: Option<(usize, usize)>,
    pub stack_cards: usize,
    pub hand_sizes: &'a [usize],
}

/// Where the local player's decisions come from. The game blocks on these
/// calls.
pub trait MoveSource: Send {
    fn vote_deck_size(&mut self, options: &[usize]) -> usize;

    fn choose_move(&mut self, view: &CheatView<'_>) -> CheatMove;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheatResult {
    pub winner: PeerId,
    pub hand_sizes: Vec<usize>,
    /// Cards picked up from lost challenges, per seat.
    pub penalties: Vec<usize>,
    pub challenges: usize,
}

#[derive(Clone, Copy, Debug)]
struct Challenge {
    challenger: usize,
    challenged: usize,
    play: usize,
    card: usize,
}

/// Most voted size; ties go to the larger deck.
pub fn pick_deck_size(votes: &[usize]) -> Option<usize> {
    let mut tally: BTreeMap<usize, usize> = BTreeMap::new();
    for vote in votes {
        *tally.entry(*vote).or_default() += 1;
    }
    tally
        .into_iter()
        .max_by_key(|(size, count)| (*count, *size))
        .map(|(size, _)| size)
}

pub struct Cheat<C: CurveGroup> {
    game_id: String,
    group: PeerGroup,
    config: GameConfig,
    moves: Box<dyn MoveSource>,
    state: CheatState,
    cancel: CancellationToken,
    setup_digest: String,
    pipeline: Option<DeckPipeline<C>>,
    deal: Option<Deal>,
    log: GameLogger<C>,
    hand: Vec<(usize, Card)>,
    hand_sizes: Vec<usize>,
    penalties: Vec<usize>,
    current: usize,
    challenge: Option<Challenge>,
    stack_openings: Vec<String>,
    challenges: usize,
    winner: Option<usize>,
    cancelled: bool,
}

impl<C: CurveGroup> Cheat<C> {
    pub fn new(
        game_id: impl Into<String>,
        group: PeerGroup,
        config: GameConfig,
        moves: Box<dyn MoveSource>,
        cancel: CancellationToken,
    ) -> Result<Self, ProtocolError> {
        config.validate()?;
        if group.len() < 2 {
            return Err(ProtocolError::InvalidConfig(
                "a bluffing game needs two players".to_string(),
            ));
        }
        let players = group.len();
        Ok(Self {
            game_id: game_id.into(),
            group,
            config,
            moves,
            state: CheatState::Init,
            cancel,
            setup_digest: String::new(),
            pipeline: None,
            deal: None,
            log: GameLogger::default(),
            hand: Vec::new(),
            hand_sizes: vec![0; players],
            penalties: vec![0; players],
            current: 0,
            challenge: None,
            stack_openings: Vec::new(),
            challenges: 0,
            winner: None,
            cancelled: false,
        })
    }

    pub fn hand(&self) -> Vec<Card> {
        self.hand.iter().map(|(_, c)| *c).collect()
    }

    pub fn hand_sizes(&self) -> &[usize] {
        &self.hand_sizes
    }

    pub fn log(&self) -> &GameLogger<C> {
        &self.log
    }

    /// Cancels deck generation if it is still running.
    pub fn abort_deck_generation(&self) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.abort();
        }
    }

    fn ledger(log: &mut GameLogger<C>) -> Result<&mut RoundLogger<C>, ProtocolError> {
        log.current_mut()
            .ok_or_else(|| ProtocolError::ProtocolDisagreement("no round in progress".to_string()))
    }

    /// Everyone must agree on membership, curve and settings.
    fn setup_token(&self) -> Result<String, ProtocolError> {
        let generator = to_hex(&Parameters::<C>::default().generator)?;
        let settings = serde_json::to_string(&self.config)
            .map_err(|e| ProtocolError::InvalidConfig(e.to_string()))?;
        Ok(format!(
            "{} {} {}",
            self.group.order_digest(),
            generator,
            Commitment::commit(&settings)
        ))
    }

    fn validate_setup(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        self.group.check_round(responses)?;
        if let Some(other) = responses.iter().find(|r| r.payload != self.setup_digest) {
            return Err(ProtocolError::ProtocolDisagreement(format!(
                "{} disagrees on the table setup",
                other.sender
            )));
        }
        let vote = self.moves.vote_deck_size(&self.config.deck_sizes);
        self.state = CheatState::PickDeckSize;
        Ok(Outbound::text(vote.to_string()))
    }

    fn start_deck(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        self.group.check_round(responses)?;
        let votes = responses
            .iter()
            .map(|r| parse_token::<usize>(r.payload.trim(), "deck size"))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(bad) = votes.iter().find(|v| !self.config.deck_sizes.contains(v)) {
            return Err(ProtocolError::MalformedMove(format!(
                "vote for unsupported deck size {}",
                bad
            )));
        }
        let size = pick_deck_size(&votes)
            .ok_or_else(|| ProtocolError::ProtocolDisagreement("no deck size votes".into()))?;
        info!(target: LOG_TARGET, game = %self.game_id, size, "deck size agreed");

        self.deal = Some(Deal::round_robin(size, 0, self.group.len())?);
        let (pipeline, first) = DeckPipeline::start(
            format!("{}/deal", self.game_id),
            self.group.clone(),
            Deck::new(size)?,
            self.config.seed_bits,
            &self.cancel,
        )?;
        self.pipeline = Some(pipeline);
        self.state = CheatState::GenerateDeck;
        Ok(first)
    }

    fn poll_deck(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        let pipeline = self
            .pipeline
            .as_mut()
            .ok_or_else(|| ProtocolError::ProtocolDisagreement("no deck being generated".into()))?;

        match pipeline.poll(responses)? {
            Pipeline::Pending(outbound) => Ok(outbound),
            Pipeline::Cancelled => {
                info!(target: LOG_TARGET, game = %self.game_id, "deck generation cancelled");
                self.pipeline = None;
                self.cancelled = true;
                self.state = CheatState::End;
                Ok(Outbound::empty())
            }
            Pipeline::Ready(deck) => {
                self.pipeline = None;
                let deal = self
                    .deal
                    .as_ref()
                    .ok_or_else(|| ProtocolError::ProtocolDisagreement("no deal".into()))?;
                let (ledger, reveal) = deal.begin(&self.group, deck)?;
                self.log.new_round(ledger);
                self.state = CheatState::DecryptHand;
                Ok(reveal)
            }
        }
    }

    fn decrypt_hand(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        let deal = self
            .deal
            .as_ref()
            .ok_or_else(|| ProtocolError::ProtocolDisagreement("no deal".into()))?;
        let ledger = Self::ledger(&mut self.log)?;
        self.hand = deal.open_hand(&self.group, responses, ledger)?;
        self.hand_sizes = (0..self.group.len())
            .map(|seat| deal.positions_of(seat).len())
            .collect();

        info!(
            target: LOG_TARGET,
            game = %self.game_id,
            hand = %self.hand().iter().map(Card::to_string).collect::<Vec<_>>().join(" "),
            "hand dealt"
        );
        self.current = 0;
        self.state = CheatState::InitRound;
        self.next_move()
    }

    fn next_move(&mut self) -> Result<Outbound, ProtocolError> {
        if self.current == self.group.me() {
            self.make_move()
        } else {
            Ok(Outbound::empty())
        }
    }

    fn make_move(&mut self) -> Result<Outbound, ProtocolError> {
        let ledger = self
            .log
            .current()
            .ok_or_else(|| ProtocolError::ProtocolDisagreement("no round in progress".into()))?;
        let stack = ledger.stack();
        let cards = self.hand();
        let view = CheatView {
            seat: self.group.me(),
            hand: &cards,
            claim: stack.claim(),
            last_play: stack.last_play().map(|p| (p.player, p.hashes.len())),
            stack_cards: stack.card_count(),
            hand_sizes: &self.hand_sizes,
        };
        let choice = self.moves.choose_move(&view);

        match choice {
            CheatMove::Check { index } => {
                let count = stack.last_play().map(|p| p.hashes.len()).ok_or_else(|| {
                    ProtocolError::MalformedMove("nothing to check".to_string())
                })?;
                if index >= count {
                    return Err(ProtocolError::MalformedMove(format!(
                        "previous play has {} cards",
                        count
                    )));
                }
                Ok(Outbound::text(format!("CHECK {}", index)))
            }
            CheatMove::Add { cards, claim } => {
                if cards.is_empty() || cards.len() > MAX_CARDS_PER_PLAY {
                    return Err(ProtocolError::MalformedMove(format!(
                        "cannot play {} cards at once",
                        cards.len()
                    )));
                }
                let rng = &mut thread_rng();
                let mut hashes = Vec::with_capacity(cards.len());
                let mut openings = Vec::with_capacity(cards.len());
                for card in &cards {
                    let index = self
                        .hand
                        .iter()
                        .position(|(_, c)| c == card)
                        .ok_or_else(|| {
                            ProtocolError::MalformedMove(format!("{} is not in hand", card))
                        })?;
                    let (position, _) = self.hand.remove(index);
                    let key = ledger.deck().own_key(position).ok_or_else(|| {
                        ProtocolError::MalformedMove(format!("no key for position {}", position))
                    })?;
                    let opening = format!(
                        "{} {} {}",
                        position,
                        to_hex(key)?,
                        random_salt(rng, self.config.salt_length)
                    );
                    hashes.push(Commitment::commit(&opening).into_bytes());
                    openings.push(opening);
                }
                self.stack_openings.extend(openings);

                let claim = if stack.is_new_stack() {
                    claim.symbol()
                } else {
                    "-"
                };
                Ok(Outbound::with_data(
                    format!("ADD {} {}", cards.len(), claim),
                    hashes,
                ))
            }
        }
    }

    fn process_move(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        let current = self.current;
        let response = self.group.response_from(responses, current)?;
        let parts = response.tokens();
        let ledger = Self::ledger(&mut self.log)?;

        match parts.as_slice() {
            ["ADD", count, claim] => {
                let count: usize = parse_token(count, "count")?;
                let claim = match *claim {
                    "-" => None,
                    rank => Some(rank.parse::<Rank>()?),
                };
                if count > self.hand_sizes[current] {
                    return Err(ProtocolError::MalformedMove(format!(
                        "seat {} holds only {} cards",
                        current, self.hand_sizes[current]
                    )));
                }
                let hashes = response
                    .data
                    .iter()
                    .map(|h| {
                        String::from_utf8(h.clone())
                            .map_err(|_| ProtocolError::MalformedMove("hash is not text".into()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                ledger.register_add_play_hashes(current, count, claim, hashes)?;
                self.hand_sizes[current] -= count;
                debug!(target: LOG_TARGET, game = %self.game_id, seat = current, count, "cards added");

                self.current = (current + 1) % self.group.len();
                self.next_move()
            }
            ["CHECK", index] => {
                let index: usize = parse_token(index, "card index")?;
                let stack = ledger.stack();
                let last = stack.last_play().ok_or_else(|| {
                    ProtocolError::MalformedMove("nothing to check".to_string())
                })?;
                if index >= last.hashes.len() || last.player == current {
                    return Err(ProtocolError::MalformedMove(format!(
                        "seat {} cannot check card {}",
                        current, index
                    )));
                }
                self.challenge = Some(Challenge {
                    challenger: current,
                    challenged: last.player,
                    play: stack.plays().len() - 1,
                    card: index,
                });
                info!(
                    target: LOG_TARGET,
                    game = %self.game_id,
                    challenger = current,
                    challenged = last.player,
                    "challenge"
                );
                self.state = CheatState::VerifyCard;

                if self.stack_openings.is_empty() {
                    Ok(Outbound::empty())
                } else {
                    let data = self
                        .stack_openings
                        .iter()
                        .map(|o| o.clone().into_bytes())
                        .collect();
                    Ok(Outbound::with_data("OPEN", data))
                }
            }
            _ => Err(ProtocolError::MalformedMove(format!(
                "unexpected move from {}: {}",
                response.sender, response.payload
            ))),
        }
    }

    fn verify_card(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        let challenge = self
            .challenge
            .take()
            .ok_or_else(|| ProtocolError::ProtocolDisagreement("no challenge pending".into()))?;
        let seats = self.group.check_round(responses)?;
        let ledger = Self::ledger(&mut self.log)?;

        for (seat, response) in seats.into_iter().zip(responses) {
            let slots: Vec<(usize, usize)> = ledger
                .stack()
                .plays()
                .iter()
                .enumerate()
                .filter(|(_, p)| p.player == seat)
                .flat_map(|(i, p)| (0..p.hashes.len()).map(move |c| (i, c)))
                .collect();
            if response.data.len() != slots.len() {
                return Err(ProtocolError::IncompleteKeyReveal {
                    expected: slots.len(),
                    received: response.data.len(),
                });
            }
            for ((play, card), blob) in slots.into_iter().zip(&response.data) {
                let opening = std::str::from_utf8(blob)
                    .map_err(|_| ProtocolError::MalformedMove("opening is not text".into()))?;
                ledger.register_opening(seat, play, card, opening)?;
            }
        }

        let claim = ledger
            .stack()
            .claim()
            .ok_or_else(|| ProtocolError::ProtocolDisagreement("stack without a claim".into()))?;
        let shown = ledger
            .stack()
            .plays()
            .get(challenge.play)
            .and_then(|p| p.opened.get(challenge.card))
            .copied()
            .flatten()
            .map(|(_, card)| card)
            .ok_or_else(|| ProtocolError::ProtocolDisagreement("challenged card not opened".into()))?;

        let truthful = shown.rank == claim;
        let loser = if truthful {
            challenge.challenger
        } else {
            warn!(
                target: LOG_TARGET,
                game = %self.game_id,
                seat = challenge.challenged,
                claimed = %claim,
                shown = %shown,
                "bluff caught"
            );
            challenge.challenged
        };
        let taken = ledger.resolve_stack(loser)?;
        info!(
            target: LOG_TARGET,
            game = %self.game_id,
            card = %shown,
            truthful,
            loser,
            cards = taken.len(),
            "challenge resolved"
        );

        self.hand_sizes[loser] += taken.len();
        self.penalties[loser] += taken.len();
        if loser == self.group.me() {
            self.hand.extend(taken);
        }
        self.stack_openings.clear();
        self.challenges += 1;

        if let Some(winner) = (0..self.group.len()).find(|&s| self.hand_sizes[s] == 0) {
            return Ok(self.finish(winner));
        }
        if self.challenges >= self.config.max_challenges {
            let fewest = (0..self.group.len())
                .min_by_key(|&s| self.hand_sizes[s])
                .unwrap_or(0);
            return Ok(self.finish(fewest));
        }

        self.current = loser;
        self.state = CheatState::InitRound;
        self.next_move()
    }

    fn finish(&mut self, winner: usize) -> Outbound {
        info!(target: LOG_TARGET, game = %self.game_id, winner, "game over");
        self.winner = Some(winner);
        self.state = CheatState::End;
        Outbound::empty()
    }
}

impl<C: CurveGroup> Protocol for Cheat<C> {
    type State = CheatState;
    type Output = CheatResult;

    fn name(&self) -> &'static str {
        "cheat"
    }

    fn state(&self) -> CheatState {
        self.state
    }

    fn evaluate(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        match self.state {
            CheatState::Init => {
                self.setup_digest = self.setup_token()?;
                self.state = CheatState::ValidateKeys;
                Ok(Outbound::text(self.setup_digest.clone()))
            }
            CheatState::ValidateKeys => self.validate_setup(responses),
            CheatState::PickDeckSize => self.start_deck(responses),
            CheatState::GenerateDeck => self.poll_deck(responses),
            CheatState::DecryptHand => self.decrypt_hand(responses),
            CheatState::InitRound => self.process_move(responses),
            CheatState::VerifyCard => self.verify_card(responses),
            CheatState::End => Ok(Outbound::empty()),
        }
    }

    fn is_finished(&self) -> bool {
        self.state == CheatState::End
    }

    fn outcome(&mut self) -> Outcome<CheatResult> {
        if self.cancelled {
            return Outcome::Cancelled;
        }
        match self.winner.and_then(|w| self.group.peer(w)) {
            Some(winner) => Outcome::Completed(CheatResult {
                winner: winner.clone(),
                hand_sizes: self.hand_sizes.clone(),
                penalties: self.penalties.clone(),
                challenges: self.challenges,
            }),
            None => Outcome::Failed(ProtocolError::ProtocolDisagreement(
                "game not finished".to_string(),
            )),
        }
    }

    fn final_message(&self) -> String {
        if self.cancelled {
            return "Game cancelled".to_string();
        }
        match self.winner.and_then(|w| self.group.peer(w)) {
            Some(winner) => format!(
                "{} wins after {} challenges",
                winner, self.challenges
            ),
            None => "Game aborted".to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_deck_size_vote() {
        assert_eq!(pick_deck_size(&[36, 52, 36]), Some(36));
        assert_eq!(pick_deck_size(&[32, 52]), Some(52));
        assert_eq!(pick_deck_size(&[]), None);
    }
}
