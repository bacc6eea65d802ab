//! Agreeing on the card points of a fresh deck.
//!
//! Peers first agree on a seed by commit-reveal, then every peer derives the
//! same points from it. Nobody chooses the points, so nobody knows a discrete
//! log relation between two cards.

use crate::error::ProtocolError;
use crate::message::{Outbound, Response};
use crate::protocol::{Outcome, Protocol};
use crate::protocols::random_number::RandomNumber;
use crate::subgame::{Step, SubGame};

use ark_ec::CurveGroup;
use ark_std::UniformRand;
use blake2::Blake2s256;
use proof_essentials::homomorphic_encryption::sra::Plaintext;
use proof_essentials::utils::rand::SeededRng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const LOG_TARGET: &str = "mental_poker::random_deck";

pub const DEFAULT_SEED_BITS: u32 = 62;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RandomDeckState {
    Init,
    Seed,
    End,
}

pub struct RandomDeck<C: CurveGroup> {
    game_id: String,
    deck_size: usize,
    seed_bits: u32,
    state: RandomDeckState,
    cancel: CancellationToken,
    seed: Option<SubGame<RandomNumber>>,
    points: Option<Vec<Plaintext<C>>>,
    cancelled: bool,
}

/// Distinct points drawn from a digest-seeded rng.
pub fn derive_points<C: CurveGroup>(seed: i64, deck_size: usize) -> Vec<Plaintext<C>> {
    let mut rng = SeededRng::<Blake2s256>::from_seed(b"mental-poker/deck");
    rng.absorb(&(deck_size as u64).to_le_bytes());
    rng.absorb(&seed.to_le_bytes());
    let mut points: Vec<Plaintext<C>> = Vec::with_capacity(deck_size);
    while points.len() < deck_size {
        let point = Plaintext::rand(&mut rng);
        if !points.contains(&point) {
            points.push(point);
        }
    }
    points
}

impl<C: CurveGroup> RandomDeck<C> {
    pub fn new(
        game_id: impl Into<String>,
        deck_size: usize,
        cancel: CancellationToken,
    ) -> Result<Self, ProtocolError> {
        if deck_size == 0 {
            return Err(ProtocolError::InvalidConfig("empty deck".to_string()));
        }
        Ok(Self {
            game_id: game_id.into(),
            deck_size,
            seed_bits: DEFAULT_SEED_BITS,
            state: RandomDeckState::Init,
            cancel,
            seed: None,
            points: None,
            cancelled: false,
        })
    }

    pub fn with_seed_bits(mut self, bits: u32) -> Self {
        self.seed_bits = bits;
        self
    }

    fn poll_seed(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        let step = self
            .seed
            .as_mut()
            .ok_or_else(|| ProtocolError::ProtocolDisagreement("no seed round running".into()))?
            .poll(responses);

        match step {
            Step::Pending(outbound) => Ok(outbound),
            Step::Ready(Outcome::Completed(seed)) => {
                debug!(target: LOG_TARGET, game = %self.game_id, seed, "deriving deck");
                self.points = Some(derive_points(seed, self.deck_size));
                self.seed = None;
                self.state = RandomDeckState::End;
                Ok(Outbound::empty())
            }
            Step::Ready(Outcome::Cancelled) => {
                self.cancelled = true;
                self.seed = None;
                self.state = RandomDeckState::End;
                Ok(Outbound::empty())
            }
            Step::Ready(Outcome::Failed(e)) => Err(ProtocolError::ProtocolDisagreement(format!(
                "deck seed rejected: {}",
                e
            ))),
        }
    }
}

impl<C: CurveGroup> Protocol for RandomDeck<C> {
    type State = RandomDeckState;
    type Output = Vec<Plaintext<C>>;

    fn name(&self) -> &'static str {
        "random-deck"
    }

    fn state(&self) -> RandomDeckState {
        self.state
    }

    fn evaluate(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        match self.state {
            RandomDeckState::Init => {
                let id = format!("{}/seed", self.game_id);
                let bits = self.seed_bits;
                self.seed = Some(SubGame::launch(id.clone(), &self.cancel, |_| {
                    RandomNumber::with_bits(id, bits)
                })?);
                self.state = RandomDeckState::Seed;
                self.poll_seed(&[])
            }
            RandomDeckState::Seed => self.poll_seed(responses),
            RandomDeckState::End => Ok(Outbound::empty()),
        }
    }

    fn is_finished(&self) -> bool {
        self.state == RandomDeckState::End
    }

    fn outcome(&mut self) -> Outcome<Vec<Plaintext<C>>> {
        if self.cancelled {
            return Outcome::Cancelled;
        }
        match self.points.take() {
            Some(points) => Outcome::Completed(points),
            None => Outcome::Failed(ProtocolError::ProtocolDisagreement(
                "deck points not derived".to_string(),
            )),
        }
    }

    fn final_message(&self) -> String {
        if self.cancelled {
            "Deck generation cancelled".to_string()
        } else {
            format!("Derived {} card points", self.deck_size)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::PeerId;

    type Curve = ark_bn254::G1Projective;

    fn launch(names: &[&str], parent: &CancellationToken) -> Vec<(PeerId, SubGame<RandomDeck<Curve>>)> {
        names
            .iter()
            .map(|name| {
                let game = SubGame::launch("deck", parent, |token| RandomDeck::new("deck", 36, token))
                    .unwrap();
                (PeerId::from(*name), game)
            })
            .collect()
    }

    #[test]
    fn test_all_peers_derive_the_same_deck() {
        let parent = CancellationToken::new();
        let mut peers = launch(&["alice", "bob", "carol"], &parent);
        let mut inbox: Vec<Response> = Vec::new();
        let mut decks = Vec::new();

        for _ in 0..10 {
            let mut next = Vec::new();
            for (id, game) in peers.iter_mut() {
                match game.poll(&inbox) {
                    Step::Pending(out) => next.push(out.into_response(id.clone())),
                    Step::Ready(outcome) => decks.push(outcome.completed().unwrap()),
                }
            }
            if !decks.is_empty() {
                break;
            }
            inbox = next;
        }

        assert_eq!(decks.len(), 3);
        assert_eq!(decks[0].len(), 36);
        assert!(decks.iter().all(|d| d == &decks[0]));
        for (i, point) in decks[0].iter().enumerate() {
            assert!(!decks[0][i + 1..].contains(point));
        }
    }

    #[test]
    fn test_derivation_depends_on_seed() {
        let a = derive_points::<Curve>(7, 8);
        assert_eq!(a, derive_points::<Curve>(7, 8));
        assert_ne!(a, derive_points::<Curve>(8, 8));
    }

    #[test]
    fn test_cancelled_by_parent() {
        let parent = CancellationToken::new();
        let mut peers = launch(&["alice", "bob"], &parent);
        let inbox: Vec<Response> = peers
            .iter_mut()
            .map(|(id, game)| match game.poll(&[]) {
                Step::Pending(out) => out.into_response(id.clone()),
                Step::Ready(_) => panic!("finished too early"),
            })
            .collect();

        parent.cancel();
        for (_, game) in peers.iter_mut() {
            assert!(matches!(game.poll(&inbox), Step::Ready(Outcome::Cancelled)));
        }
    }
}
