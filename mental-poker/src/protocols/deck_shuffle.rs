//! Joint shuffle of an agreed deck.
//!
//! Lock pass: in seat order each peer encrypts the whole deck under one key
//! and permutes it. Unlock pass: in seat order each peer strips its
//! whole-deck key and encrypts every position under a fresh key of its own.
//! Afterwards each position carries one layer per peer, every peer can
//! reveal the key for any single position, and nobody knows the order.
//!
//! Wire grammar, hex tokens separated by spaces:
//! - lock: `image card_1 .. card_n`
//! - unlock: `card_1 .. card_n image_1 .. image_n`

use crate::card::Deck;
use crate::encrypted_deck::{EncryptedDeck, ShuffledDeck};
use crate::error::ProtocolError;
use crate::group::PeerGroup;
use crate::message::{tokens, Outbound, Response};
use crate::protocol::{Outcome, Protocol};

use ark_ec::CurveGroup;
use proof_essentials::homomorphic_encryption::{
    sra::{Ciphertext, KeyImage, Parameters, Plaintext, SecretKey, Sra},
    CommutativeEncryptionScheme,
};
use proof_essentials::utils::encoding::{decode_all, encode_all, from_hex, to_hex};
use proof_essentials::utils::permutation::Permutation;
use rand::thread_rng;
use tracing::{debug, trace};

const LOG_TARGET: &str = "mental_poker::deck_shuffle";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeckShuffleState {
    Init,
    Lock,
    Unlock,
    End,
}

pub struct DeckShuffle<C: CurveGroup> {
    game_id: String,
    group: PeerGroup,
    state: DeckShuffleState,
    turn: usize,
    params: Parameters<C>,
    original: Deck,
    base: Vec<Plaintext<C>>,
    deck: EncryptedDeck<C>,
    lock_key: Option<SecretKey<C>>,
    lock_images: Vec<Option<KeyImage<C>>>,
    card_keys: Vec<SecretKey<C>>,
}

impl<C: CurveGroup> DeckShuffle<C> {
    /// `base` holds the agreed point of each card of `original`, in order.
    pub fn new(
        game_id: impl Into<String>,
        group: PeerGroup,
        original: Deck,
        base: Vec<Plaintext<C>>,
    ) -> Result<Self, ProtocolError> {
        if original.len() != base.len() {
            return Err(ProtocolError::InvalidConfig(format!(
                "{} cards but {} points",
                original.len(),
                base.len()
            )));
        }
        let params = Sra::<C>::setup()?;
        let deck = EncryptedDeck::new(params, &base);
        let seats = group.len();

        Ok(Self {
            game_id: game_id.into(),
            group,
            state: DeckShuffleState::Init,
            turn: 0,
            params,
            original,
            base,
            deck,
            lock_key: None,
            lock_images: vec![None; seats],
            card_keys: Vec::new(),
        })
    }

    /// Whose pass the current round carries.
    pub fn turn(&self) -> usize {
        self.turn
    }

    fn lock_pass(&mut self) -> Result<Outbound, ProtocolError> {
        let rng = &mut thread_rng();
        let (_, key) = Sra::<C>::keygen(&self.params, rng)?;
        let image = self.deck.encrypt(&key)?;
        let permutation = Permutation::new(rng, self.deck.len());
        self.deck.shuffle(&permutation)?;
        self.lock_key = Some(key);
        self.lock_images[self.group.me()] = Some(image);

        let mut payload = vec![to_hex(&image)?];
        payload.extend(encode_all(self.deck.cards())?);
        trace!(target: LOG_TARGET, game = %self.game_id, "locked and shuffled");
        Ok(Outbound::text(payload.join(" ")))
    }

    fn unlock_pass(&mut self) -> Result<Outbound, ProtocolError> {
        let key = self.lock_key.take().ok_or_else(|| {
            ProtocolError::ProtocolDisagreement("unlock before lock".to_string())
        })?;
        self.deck.strip_layer(&key)?;

        let rng = &mut thread_rng();
        let keys = (0..self.deck.len())
            .map(|_| Sra::<C>::keygen(&self.params, rng).map(|(_, k)| k))
            .collect::<Result<Vec<_>, _>>()?;
        let images = self.deck.encrypt_separate(&keys)?;
        self.card_keys = keys;

        let mut payload = encode_all(self.deck.cards())?;
        payload.extend(encode_all(&images)?);
        trace!(target: LOG_TARGET, game = %self.game_id, "unlocked and relocked per card");
        Ok(Outbound::text(payload.join(" ")))
    }

    fn apply_lock(&mut self, response: &Response) -> Result<(), ProtocolError> {
        let tokens = tokens(&response.payload);
        if tokens.len() != self.deck.len() + 1 {
            return Err(ProtocolError::MalformedMove(format!(
                "lock pass from {} has {} tokens",
                response.sender,
                tokens.len()
            )));
        }
        let image: KeyImage<C> = from_hex(tokens[0])?;
        let cards: Vec<Ciphertext<C>> = decode_all(tokens[1..].iter().copied())?;
        self.deck.replace_cards(cards)?;
        self.deck.push_shared_layer(image);
        self.lock_images[self.turn] = Some(image);
        Ok(())
    }

    fn apply_unlock(&mut self, response: &Response) -> Result<(), ProtocolError> {
        let n = self.deck.len();
        let tokens = tokens(&response.payload);
        if tokens.len() != 2 * n {
            return Err(ProtocolError::MalformedMove(format!(
                "unlock pass from {} has {} tokens",
                response.sender,
                tokens.len()
            )));
        }
        let lock_image = self.lock_images[self.turn].ok_or_else(|| {
            ProtocolError::ProtocolDisagreement(format!("{} never locked", response.sender))
        })?;
        let cards: Vec<Ciphertext<C>> = decode_all(tokens[..n].iter().copied())?;
        let images: Vec<KeyImage<C>> = decode_all(tokens[n..].iter().copied())?;

        self.deck.remove_shared_layer(&lock_image)?;
        self.deck.replace_cards(cards)?;
        self.deck.push_layers(&images)?;
        Ok(())
    }

    /// Consume the pass of the peer whose turn it is and, if the next turn is
    /// ours, produce our own pass.
    fn advance(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        let response = self.group.response_from(responses, self.turn)?;
        if self.turn != self.group.me() {
            match self.state {
                DeckShuffleState::Lock => self.apply_lock(response)?,
                _ => self.apply_unlock(response)?,
            }
        }

        self.turn += 1;
        if self.turn == self.group.len() {
            self.turn = 0;
            self.state = match self.state {
                DeckShuffleState::Lock => DeckShuffleState::Unlock,
                _ => DeckShuffleState::End,
            };
            debug!(target: LOG_TARGET, game = %self.game_id, state = ?self.state, "pass complete");
        }

        match self.state {
            DeckShuffleState::Lock if self.turn == self.group.me() => self.lock_pass(),
            DeckShuffleState::Unlock if self.turn == self.group.me() => self.unlock_pass(),
            _ => Ok(Outbound::empty()),
        }
    }
}

impl<C: CurveGroup> Protocol for DeckShuffle<C> {
    type State = DeckShuffleState;
    type Output = ShuffledDeck<C>;

    fn name(&self) -> &'static str {
        "deck-shuffle"
    }

    fn state(&self) -> DeckShuffleState {
        self.state
    }

    fn evaluate(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        match self.state {
            DeckShuffleState::Init => {
                self.state = DeckShuffleState::Lock;
                self.turn = 0;
                if self.group.me() == 0 {
                    self.lock_pass()
                } else {
                    Ok(Outbound::empty())
                }
            }
            DeckShuffleState::Lock | DeckShuffleState::Unlock => self.advance(responses),
            DeckShuffleState::End => Ok(Outbound::empty()),
        }
    }

    fn is_finished(&self) -> bool {
        self.state == DeckShuffleState::End
    }

    fn outcome(&mut self) -> Outcome<ShuffledDeck<C>> {
        if self.state != DeckShuffleState::End || self.card_keys.len() != self.deck.len() {
            return Outcome::Failed(ProtocolError::ProtocolDisagreement(
                "shuffle not finished".to_string(),
            ));
        }
        Outcome::Completed(ShuffledDeck {
            original: self.original.clone(),
            base: self.base.clone(),
            encrypted: self.deck.clone(),
            keys: self.card_keys.clone(),
        })
    }

    fn final_message(&self) -> String {
        format!("Shuffled {} cards", self.deck.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::PeerId;
    use crate::protocols::random_deck::derive_points;

    type Curve = ark_bn254::G1Projective;

    fn run(names: &[&str], deck_size: usize) -> Vec<ShuffledDeck<Curve>> {
        let ids: Vec<PeerId> = names.iter().map(|n| PeerId::from(*n)).collect();
        let original = Deck::new(deck_size).unwrap();
        let base = derive_points::<Curve>(42, deck_size);
        let mut peers: Vec<_> = ids
            .iter()
            .map(|id| {
                let group = PeerGroup::new(ids.clone(), id).unwrap();
                let game = DeckShuffle::new("shuffle", group, original.clone(), base.clone()).unwrap();
                (id.clone(), game)
            })
            .collect();

        let mut inbox: Vec<Response> = Vec::new();
        let mut rounds = 0;
        while !peers.iter().all(|(_, g)| g.is_finished()) {
            inbox = peers
                .iter_mut()
                .map(|(id, g)| g.evaluate(&inbox).unwrap().into_response(id.clone()))
                .collect();
            rounds += 1;
        }
        // one round to start plus one per pass
        assert_eq!(rounds, 1 + 2 * names.len());

        peers
            .iter_mut()
            .map(|(_, g)| g.outcome().completed().unwrap())
            .collect()
    }

    #[test]
    fn test_all_keys_together_recover_a_permutation() {
        let mut decks = run(&["alice", "bob", "carol"], 32);
        let ciphertexts = decks[0].encrypted.cards().to_vec();
        assert!(decks.iter().all(|d| d.encrypted.cards() == ciphertexts.as_slice()));

        let keys: Vec<_> = decks.iter().map(|d| d.keys.clone()).collect();
        let deck = &mut decks[0];
        for position in 0..32 {
            for peer_keys in &keys {
                deck.encrypted
                    .decrypt_card_with_key(position, &peer_keys[position])
                    .unwrap();
            }
        }

        let mut seen: Vec<usize> = (0..32).map(|p| deck.original_index(p).unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn test_missing_layer_keeps_card_hidden() {
        let mut decks = run(&["alice", "bob"], 32);
        let bob_key = decks[1].keys[3];
        let deck = &mut decks[0];
        assert_eq!(deck.encrypted.decrypt_card_with_key(3, &bob_key).unwrap(), None);
        assert_eq!(deck.card_at(3), None);
        assert!(matches!(
            deck.encrypted.decrypt_card_with_key(4, &bob_key),
            Err(ProtocolError::InvalidKey { position: 4 })
        ));
    }

    #[test]
    fn test_rejects_short_pass() {
        let ids = vec![PeerId::from("alice"), PeerId::from("bob")];
        let group = PeerGroup::new(ids.clone(), &ids[1]).unwrap();
        let mut game = DeckShuffle::<Curve>::new(
            "shuffle",
            group,
            Deck::new(32).unwrap(),
            derive_points(1, 32),
        )
        .unwrap();
        game.evaluate(&[]).unwrap();

        let round = vec![
            Response::new(ids[0].clone(), "00 11"),
            Response::new(ids[1].clone(), ""),
        ];
        assert!(matches!(
            game.evaluate(&round),
            Err(ProtocolError::MalformedMove(_))
        ));
    }
}
