//! Audit of a secret role assignment.
//!
//! Roles are dealt like cards: one agreed point per role, locked under a
//! per-position key of every player and shuffled, so seat `i` only ever
//! learns the role at position `i`. Before play each player commits to the
//! digest of its key list (see [`keys_digest`]). Once the game is over the
//! keys are published and anyone can replay the unlocking to check that no
//! role was substituted.

use crate::encrypted_deck::EncryptedDeck;
use crate::error::ProtocolError;
use crate::ledger::keys_digest;
use crate::message::PeerId;

use ark_ec::CurveGroup;
use proof_essentials::homomorphic_encryption::sra::{Plaintext, SecretKey};
use proof_essentials::utils::permutation::Permutation;
use std::collections::BTreeMap;
use tracing::{info, warn};

const LOG_TARGET: &str = "mental_poker::roles";

/// Who got which role, as recovered from the published keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleAssignment<R> {
    roles: Vec<R>,
    permutation: Permutation,
}

impl<R: Clone + PartialEq> RoleAssignment<R> {
    /// Role dealt to the given position.
    pub fn role_at(&self, position: usize) -> Option<&R> {
        self.roles.get(position)
    }

    /// Position the role at `original` in the unshuffled list ended up at.
    pub fn position_of(&self, original: usize) -> Option<usize> {
        self.permutation.inverse().mapping.get(original).copied()
    }

    pub fn holders(&self, role: &R) -> Vec<usize> {
        self.roles
            .iter()
            .enumerate()
            .filter(|(_, r)| *r == role)
            .map(|(position, _)| position)
            .collect()
    }

    pub fn roles(&self) -> &[R] {
        &self.roles
    }
}

pub struct RoleVerifier<C: CurveGroup, R> {
    roles: Vec<R>,
    base: Vec<Plaintext<C>>,
    deck: EncryptedDeck<C>,
    key_hashes: BTreeMap<PeerId, String>,
}

impl<C: CurveGroup, R: Clone + PartialEq> RoleVerifier<C, R> {
    /// `base[i]` is the agreed point of `roles[i]`; `deck` is the role deck
    /// as it stood once every player had locked it; `key_hashes` are the
    /// commitments each player published before the roles were read.
    pub fn new(
        roles: Vec<R>,
        base: Vec<Plaintext<C>>,
        deck: EncryptedDeck<C>,
        key_hashes: BTreeMap<PeerId, String>,
    ) -> Result<Self, ProtocolError> {
        if roles.len() != base.len() || roles.len() != deck.len() {
            return Err(ProtocolError::InvalidConfig(format!(
                "{} roles, {} points and {} encrypted positions",
                roles.len(),
                base.len(),
                deck.len()
            )));
        }
        if base.iter().enumerate().any(|(i, p)| base[..i].contains(p)) {
            return Err(ProtocolError::InvalidConfig(
                "role points must be distinct".to_string(),
            ));
        }
        Ok(Self {
            roles,
            base,
            deck,
            key_hashes,
        })
    }

    /// Replay the unlocking with every player's published keys, one key per
    /// position in deck order. Fails on a key list that does not match its
    /// commitment, a key that matches no layer, or a deck that does not open
    /// to exactly the original roles.
    pub fn verify(
        &self,
        keys: &BTreeMap<PeerId, Vec<SecretKey<C>>>,
    ) -> Result<RoleAssignment<R>, ProtocolError> {
        if let Some(stranger) = keys.keys().find(|p| !self.key_hashes.contains_key(*p)) {
            return Err(ProtocolError::UnknownPeer(stranger.clone()));
        }
        if keys.len() != self.key_hashes.len() {
            return Err(ProtocolError::IncompleteKeyReveal {
                expected: self.key_hashes.len(),
                received: keys.len(),
            });
        }

        let mut deck = self.deck.clone();
        for (peer, keyset) in keys {
            if self.key_hashes.get(peer) != Some(&keys_digest::<C>(keyset)?) {
                warn!(target: LOG_TARGET, peer = %peer, "role keys do not match commitment");
                return Err(ProtocolError::ProtocolDisagreement(format!(
                    "role keys of {} do not match its commitment",
                    peer
                )));
            }
            deck.decrypt_separate(keyset)?;
        }

        let mut mapping = Vec::with_capacity(deck.len());
        for position in 0..deck.len() {
            let point = deck.plaintext(position).ok_or(ProtocolError::InvalidKey { position })?;
            let original = self.base.iter().position(|p| *p == point).ok_or_else(|| {
                ProtocolError::ProtocolDisagreement(format!(
                    "position {} opens to no known role",
                    position
                ))
            })?;
            mapping.push(original);
        }
        let permutation = Permutation::from_mapping(&mapping).map_err(|_| {
            warn!(target: LOG_TARGET, "role deck repeats a role");
            ProtocolError::ProtocolDisagreement(
                "shuffled roles are not a permutation of the original roles".to_string(),
            )
        })?;

        let roles = permutation.permute_array(&self.roles)?;
        info!(target: LOG_TARGET, players = keys.len(), "role assignment verified");
        Ok(RoleAssignment { roles, permutation })
    }
}
