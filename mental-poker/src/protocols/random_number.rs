//! Agreeing on a random integer by commit-reveal.
//!
//! Every peer commits to `sha256(value || salt)`, then reveals `value salt`.
//! The agreed number is the sum of all valid reveals modulo the range size,
//! shifted by the lower bound. A reveal that does not match any commitment
//! spoils the agreement and its sender is recorded.

use crate::error::ProtocolError;
use crate::message::{Outbound, PeerId, Response};
use crate::protocol::{Outcome, Protocol};

use proof_essentials::commitment::HashCommitment;
use proof_essentials::utils::rand::random_salt;
use rand::{thread_rng, Rng};
use sha2::Sha256;
use std::collections::HashSet;
use tracing::{debug, warn};

const LOG_TARGET: &str = "mental_poker::random_number";

pub const DEFAULT_SALT_LENGTH: usize = 100;
pub const MAX_BITS: u32 = 62;

type Commitment = HashCommitment<Sha256>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RandomNumberState {
    Init,
    Generate,
    Validate,
    End,
}

pub struct RandomNumber {
    game_id: String,
    state: RandomNumberState,
    offset: i64,
    modulus: u128,
    my_random: u128,
    salt: String,
    hashes: HashSet<String>,
    answer: u128,
    agreed: bool,
    inconsistent: Vec<PeerId>,
}

impl RandomNumber {
    /// A number drawn uniformly from `[min, max]`.
    pub fn new(game_id: impl Into<String>, min: i64, max: i64) -> Result<Self, ProtocolError> {
        let modulus = Self::modulus(min, max)?;
        let rng = &mut thread_rng();
        let value = rng.gen_range(0..modulus);
        let salt = random_salt(rng, DEFAULT_SALT_LENGTH);
        Self::with_contribution(game_id, min, max, value, salt)
    }

    /// A number in `[0, 2^bits]`.
    pub fn with_bits(game_id: impl Into<String>, bits: u32) -> Result<Self, ProtocolError> {
        if bits > MAX_BITS {
            return Err(ProtocolError::InvalidConfig(format!(
                "at most {} random bits, asked for {}",
                MAX_BITS, bits
            )));
        }
        Self::new(game_id, 0, 1i64 << bits)
    }

    /// Fixes the local contribution instead of drawing it.
    pub fn with_contribution(
        game_id: impl Into<String>,
        min: i64,
        max: i64,
        value: u128,
        salt: impl Into<String>,
    ) -> Result<Self, ProtocolError> {
        let modulus = Self::modulus(min, max)?;
        let salt = salt.into();
        if salt.is_empty() || salt.contains(char::is_whitespace) {
            return Err(ProtocolError::InvalidConfig(
                "salt must be a single non-empty token".to_string(),
            ));
        }

        Ok(Self {
            game_id: game_id.into(),
            state: RandomNumberState::Init,
            offset: min,
            modulus,
            my_random: value,
            salt,
            hashes: HashSet::new(),
            answer: 0,
            agreed: true,
            inconsistent: Vec::new(),
        })
    }

    pub fn with_salt_length(mut self, length: usize) -> Self {
        if self.state == RandomNumberState::Init && length > 0 {
            self.salt = random_salt(&mut thread_rng(), length);
        }
        self
    }

    pub fn agreed(&self) -> bool {
        self.agreed
    }

    /// Senders whose reveal matched no commitment.
    pub fn inconsistent_peers(&self) -> &[PeerId] {
        &self.inconsistent
    }

    pub fn value(&self) -> Option<i64> {
        (self.state == RandomNumberState::End && self.agreed).then(|| self.result())
    }

    fn modulus(min: i64, max: i64) -> Result<u128, ProtocolError> {
        if min > max {
            return Err(ProtocolError::InvalidConfig(format!(
                "empty range [{}, {}]",
                min, max
            )));
        }
        Ok((max as i128 - min as i128 + 1) as u128)
    }

    fn result(&self) -> i64 {
        // answer < modulus, so this stays inside [min, max]
        (self.offset as i128 + self.answer as i128) as i64
    }

    fn check_answer(&self, reveal: &str) -> Option<u128> {
        let opening = Commitment::open_salted(reveal).ok()?;
        if !self.hashes.contains(&opening.commitment) {
            return None;
        }
        opening.value.parse::<u128>().ok()
    }
}

impl Protocol for RandomNumber {
    type State = RandomNumberState;
    type Output = i64;

    fn name(&self) -> &'static str {
        "random-number"
    }

    fn state(&self) -> RandomNumberState {
        self.state
    }

    fn evaluate(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        match self.state {
            RandomNumberState::Init => {
                self.state = RandomNumberState::Generate;
                Ok(Outbound::text(Commitment::commit_salted(
                    &self.my_random.to_string(),
                    &self.salt,
                )))
            }
            RandomNumberState::Generate => {
                self.hashes = responses.iter().map(|r| r.payload.clone()).collect();
                self.state = RandomNumberState::Validate;
                Ok(Outbound::text(format!("{} {}", self.my_random, self.salt)))
            }
            RandomNumberState::Validate => {
                for response in responses {
                    match self.check_answer(&response.payload) {
                        Some(value) => {
                            self.answer = (self.answer + value % self.modulus) % self.modulus;
                        }
                        None => {
                            warn!(
                                target: LOG_TARGET,
                                game = %self.game_id,
                                peer = %response.sender,
                                "reveal does not match any commitment"
                            );
                            self.agreed = false;
                            self.inconsistent.push(response.sender.clone());
                        }
                    }
                }
                self.state = RandomNumberState::End;
                debug!(target: LOG_TARGET, game = %self.game_id, agreed = self.agreed, "validated");
                Ok(Outbound::empty())
            }
            RandomNumberState::End => Ok(Outbound::empty()),
        }
    }

    fn is_finished(&self) -> bool {
        self.state == RandomNumberState::End
    }

    fn outcome(&mut self) -> Outcome<i64> {
        match (self.state, self.agreed) {
            (RandomNumberState::End, true) => Outcome::Completed(self.result()),
            (RandomNumberState::End, false) => {
                Outcome::Failed(ProtocolError::ProtocolDisagreement(format!(
                    "inconsistent reveals from {}",
                    peer_list(&self.inconsistent)
                )))
            }
            _ => Outcome::Failed(ProtocolError::ProtocolDisagreement(
                "random number is not settled yet".to_string(),
            )),
        }
    }

    fn final_message(&self) -> String {
        if self.agreed {
            format!("Agreed on {}", self.result())
        } else {
            format!("Someone cheated: {}", peer_list(&self.inconsistent))
        }
    }
}

fn peer_list(peers: &[PeerId]) -> String {
    peers
        .iter()
        .map(|p| p.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod test {
    use super::*;

    fn round(peers: &mut [(PeerId, RandomNumber)], inbox: &[Response]) -> Vec<Response> {
        peers
            .iter_mut()
            .map(|(id, game)| game.evaluate(inbox).unwrap().into_response(id.clone()))
            .collect()
    }

    fn table(contributions: &[(&str, u128)], min: i64, max: i64) -> Vec<(PeerId, RandomNumber)> {
        contributions
            .iter()
            .map(|(name, value)| {
                let salt = format!("salt{}", name);
                (
                    PeerId::from(*name),
                    RandomNumber::with_contribution("rn", min, max, *value, salt).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_sum_of_contributions() {
        let mut peers = table(&[("alice", 3), ("bob", 5), ("carol", 7)], 0, 9);
        let commitments = round(&mut peers, &[]);
        let reveals = round(&mut peers, &commitments);
        round(&mut peers, &reveals);

        for (_, game) in peers.iter_mut() {
            assert!(game.is_finished());
            assert_eq!(game.value(), Some(5));
            assert_eq!(game.outcome(), Outcome::Completed(5));
            assert_eq!(game.final_message(), "Agreed on 5");
        }
    }

    #[test]
    fn test_offset_applied_once() {
        let mut peers = table(&[("alice", 4), ("bob", 4)], -3, 2);
        let commitments = round(&mut peers, &[]);
        let reveals = round(&mut peers, &commitments);
        round(&mut peers, &reveals);
        // (4 + 4) mod 6 = 2, shifted by -3
        assert_eq!(peers[0].1.value(), Some(-1));
    }

    #[test]
    fn test_tampered_reveal_is_excluded() {
        let mut peers = table(&[("alice", 3), ("bob", 5), ("carol", 7)], 0, 9);
        let commitments = round(&mut peers, &[]);
        let mut reveals = round(&mut peers, &commitments);
        reveals[1].payload = "6 saltbob".to_string();
        round(&mut peers, &reveals);

        for (_, game) in peers.iter_mut() {
            assert!(game.is_finished());
            assert!(!game.agreed());
            assert_eq!(game.inconsistent_peers(), &[PeerId::from("bob")]);
            assert_eq!(game.value(), None);
            assert!(matches!(
                game.outcome(),
                Outcome::Failed(ProtocolError::ProtocolDisagreement(_))
            ));
        }
    }

    #[test]
    fn test_malformed_reveal_does_not_stop_validation() {
        let mut peers = table(&[("alice", 1), ("bob", 2), ("carol", 3)], 0, 9);
        let commitments = round(&mut peers, &[]);
        let mut reveals = round(&mut peers, &commitments);
        reveals[0].payload = "1 salt alice".to_string();
        reveals[2].payload = "3".to_string();
        round(&mut peers, &reveals);

        assert_eq!(
            peers[1].1.inconsistent_peers(),
            &[PeerId::from("alice"), PeerId::from("carol")]
        );
    }

    #[test]
    fn test_fresh_draws_stay_in_range() {
        let names = ["alice", "bob", "carol", "dave"];
        let mut peers: Vec<_> = names
            .iter()
            .map(|n| (PeerId::from(*n), RandomNumber::new("rn", 10, 20).unwrap()))
            .collect();
        let commitments = round(&mut peers, &[]);
        let reveals = round(&mut peers, &commitments);
        round(&mut peers, &reveals);

        let value = peers[0].1.value().unwrap();
        assert!((10..=20).contains(&value));
        assert!(peers.iter().all(|(_, g)| g.value() == Some(value)));
    }

    #[test]
    fn test_configured_salt_length() {
        let mut game = RandomNumber::new("rn", 0, 9).unwrap().with_salt_length(40);
        game.evaluate(&[]).unwrap();
        let reveal = game.evaluate(&[]).unwrap();
        let salt = reveal.payload.split(' ').nth(1).unwrap();
        assert_eq!(salt.len(), 40);
    }

    #[test]
    fn test_bad_ranges() {
        assert!(RandomNumber::new("rn", 5, 4).is_err());
        assert!(RandomNumber::with_bits("rn", 63).is_err());
        assert!(RandomNumber::new("rn", i64::MIN, i64::MAX).is_ok());
        assert!(RandomNumber::with_contribution("rn", 0, 1, 0, "two words").is_err());
    }
}
