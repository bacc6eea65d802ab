//! A deck of encrypted card points, with the bookkeeping needed to tell
//! which layers are still on each card.

use crate::card::{Card, Deck};
use crate::error::ProtocolError;

use ark_ec::CurveGroup;
use proof_essentials::error::CryptoError;
use proof_essentials::homomorphic_encryption::{
    sra::{Ciphertext, KeyImage, Parameters, Plaintext, SecretKey, Sra},
    CommutativeEncryptionScheme,
};
use proof_essentials::utils::permutation::Permutation;

/// Per position: the current ciphertext, the images of the keys whose layers
/// are still on it, and the keys supplied so far. A card is only handed out
/// as plaintext once no layer remains.
#[derive(Clone, Debug)]
pub struct EncryptedDeck<C: CurveGroup> {
    params: Parameters<C>,
    cards: Vec<Ciphertext<C>>,
    layers: Vec<Vec<KeyImage<C>>>,
    keys: Vec<Vec<SecretKey<C>>>,
}

impl<C: CurveGroup> EncryptedDeck<C> {
    pub fn new(params: Parameters<C>, plaintexts: &[Plaintext<C>]) -> Self {
        let size = plaintexts.len();
        Self {
            params,
            cards: plaintexts.iter().map(|p| Ciphertext::from(*p)).collect(),
            layers: vec![Vec::new(); size],
            keys: vec![Vec::new(); size],
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Ciphertext<C>] {
        &self.cards
    }

    pub fn layers(&self, position: usize) -> Option<&[KeyImage<C>]> {
        self.layers.get(position).map(Vec::as_slice)
    }

    pub fn supplied_keys(&self, position: usize) -> Option<&[SecretKey<C>]> {
        self.keys.get(position).map(Vec::as_slice)
    }

    /// Lock every card under the same key.
    pub fn encrypt(&mut self, key: &SecretKey<C>) -> Result<KeyImage<C>, ProtocolError> {
        for card in self.cards.iter_mut() {
            *card = Sra::<C>::reencrypt(&self.params, key, card)?;
        }
        let image = Sra::<C>::key_image(&self.params, key);
        self.push_shared_layer(image);
        Ok(image)
    }

    /// Lock each card under its own key.
    pub fn encrypt_separate(
        &mut self,
        keys: &[SecretKey<C>],
    ) -> Result<Vec<KeyImage<C>>, ProtocolError> {
        self.check_len("Per-card keys", keys.len())?;
        let mut images = Vec::with_capacity(keys.len());
        for (position, key) in keys.iter().enumerate() {
            self.cards[position] = Sra::<C>::reencrypt(&self.params, key, &self.cards[position])?;
            let image = Sra::<C>::key_image(&self.params, key);
            self.layers[position].push(image);
            images.push(image);
        }
        Ok(images)
    }

    /// Remove a whole-deck layer this peer applied itself.
    pub fn strip_layer(&mut self, key: &SecretKey<C>) -> Result<(), ProtocolError> {
        let image = Sra::<C>::key_image(&self.params, key);
        self.remove_shared_layer(&image)?;
        for card in self.cards.iter_mut() {
            *card = Sra::<C>::decrypt(&self.params, key, card)?;
        }
        Ok(())
    }

    pub fn push_shared_layer(&mut self, image: KeyImage<C>) {
        for layers in self.layers.iter_mut() {
            layers.push(image);
        }
    }

    pub fn push_layers(&mut self, images: &[KeyImage<C>]) -> Result<(), ProtocolError> {
        self.check_len("Key images", images.len())?;
        for (layers, image) in self.layers.iter_mut().zip(images) {
            layers.push(*image);
        }
        Ok(())
    }

    /// Forget a whole-deck layer, e.g. after another peer announced it has
    /// stripped it.
    pub fn remove_shared_layer(&mut self, image: &KeyImage<C>) -> Result<(), ProtocolError> {
        let indices = self
            .layers
            .iter()
            .enumerate()
            .map(|(position, layers)| {
                layers
                    .iter()
                    .position(|l| l == image)
                    .ok_or(ProtocolError::InvalidKey { position })
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (layers, index) in self.layers.iter_mut().zip(indices) {
            layers.remove(index);
        }
        Ok(())
    }

    /// Take the ciphertexts broadcast by the peer that just worked on the deck.
    pub fn replace_cards(&mut self, cards: Vec<Ciphertext<C>>) -> Result<(), ProtocolError> {
        self.check_len("Deck", cards.len())?;
        self.cards = cards;
        Ok(())
    }

    pub fn shuffle(&mut self, permutation: &Permutation) -> Result<(), ProtocolError> {
        self.cards = permutation.permute_array(&self.cards)?;
        self.layers = permutation.permute_array(&self.layers)?;
        self.keys = permutation.permute_array(&self.keys)?;
        Ok(())
    }

    /// Peel the layer matching `key` off one card. Returns the plaintext if
    /// that was the last layer.
    pub fn decrypt_card_with_key(
        &mut self,
        position: usize,
        key: &SecretKey<C>,
    ) -> Result<Option<Plaintext<C>>, ProtocolError> {
        let image = Sra::<C>::key_image(&self.params, key);
        let layers = self
            .layers
            .get_mut(position)
            .ok_or(ProtocolError::InvalidKey { position })?;
        let index = layers
            .iter()
            .position(|l| *l == image)
            .ok_or(ProtocolError::InvalidKey { position })?;

        self.cards[position] = Sra::<C>::decrypt(&self.params, key, &self.cards[position])?;
        layers.remove(index);
        self.keys[position].push(*key);

        Ok(self.plaintext(position))
    }

    /// One key per position, in deck order. Every key is checked against
    /// its card's layers first, so a rejected batch leaves the deck as it was.
    pub fn decrypt_separate(
        &mut self,
        keys: &[SecretKey<C>],
    ) -> Result<Vec<Option<Plaintext<C>>>, ProtocolError> {
        if keys.len() != self.len() {
            return Err(ProtocolError::IncompleteKeyReveal {
                expected: self.len(),
                received: keys.len(),
            });
        }
        for (position, (key, layers)) in keys.iter().zip(&self.layers).enumerate() {
            if !layers.contains(&Sra::<C>::key_image(&self.params, key)) {
                return Err(ProtocolError::InvalidKey { position });
            }
        }
        keys.iter()
            .enumerate()
            .map(|(position, key)| self.decrypt_card_with_key(position, key))
            .collect()
    }

    pub fn plaintext(&self, position: usize) -> Option<Plaintext<C>> {
        match self.layers.get(position) {
            Some(layers) if layers.is_empty() => Some(self.cards[position].into_plaintext()),
            _ => None,
        }
    }

    fn check_len(&self, what: &str, received: usize) -> Result<(), ProtocolError> {
        if received != self.len() {
            return Err(CryptoError::LengthError(what.to_string(), self.len(), received).into());
        }
        Ok(())
    }
}

/// A jointly shuffled deck together with the table that maps plaintext
/// points back to cards, and this peer's own per-position keys.
#[derive(Clone, Debug)]
pub struct ShuffledDeck<C: CurveGroup> {
    pub original: Deck,
    pub base: Vec<Plaintext<C>>,
    pub encrypted: EncryptedDeck<C>,
    pub keys: Vec<SecretKey<C>>,
}

impl<C: CurveGroup> ShuffledDeck<C> {
    pub fn len(&self) -> usize {
        self.encrypted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encrypted.is_empty()
    }

    /// Index into `original` of the fully decrypted card at `position`.
    pub fn original_index(&self, position: usize) -> Option<usize> {
        let point = self.encrypted.plaintext(position)?;
        self.base.iter().position(|p| *p == point)
    }

    pub fn card_at(&self, position: usize) -> Option<Card> {
        self.original_index(position)
            .and_then(|index| self.original.get(index))
    }

    pub fn own_key(&self, position: usize) -> Option<&SecretKey<C>> {
        self.keys.get(position)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ark_std::UniformRand;
    use rand::thread_rng;

    type Curve = ark_bn254::G1Projective;

    fn setup(size: usize) -> (Parameters<Curve>, Vec<Plaintext<Curve>>) {
        let rng = &mut thread_rng();
        let params = Sra::<Curve>::setup().unwrap();
        let base = (0..size).map(|_| Plaintext::rand(rng)).collect();
        (params, base)
    }

    #[test]
    fn test_layers_removed_in_any_order() {
        let rng = &mut thread_rng();
        let (params, base) = setup(4);
        let mut deck = EncryptedDeck::new(params, &base);

        let (_, whole) = Sra::<Curve>::keygen(&params, rng).unwrap();
        deck.encrypt(&whole).unwrap();
        let keys_a: Vec<_> = (0..4).map(|_| Sra::<Curve>::keygen(&params, rng).unwrap().1).collect();
        let keys_b: Vec<_> = (0..4).map(|_| Sra::<Curve>::keygen(&params, rng).unwrap().1).collect();
        deck.encrypt_separate(&keys_a).unwrap();
        deck.strip_layer(&whole).unwrap();
        deck.encrypt_separate(&keys_b).unwrap();

        assert_eq!(deck.decrypt_card_with_key(2, &keys_a[2]).unwrap(), None);
        assert_eq!(deck.plaintext(2), None);
        assert_eq!(deck.decrypt_card_with_key(2, &keys_b[2]).unwrap(), Some(base[2]));
        assert_eq!(deck.supplied_keys(2).unwrap().len(), 2);

        // b first this time
        assert_eq!(deck.decrypt_card_with_key(1, &keys_b[1]).unwrap(), None);
        assert_eq!(deck.decrypt_card_with_key(1, &keys_a[1]).unwrap(), Some(base[1]));
    }

    #[test]
    fn test_foreign_key_is_rejected() {
        let rng = &mut thread_rng();
        let (params, base) = setup(3);
        let mut deck = EncryptedDeck::new(params, &base);
        let keys: Vec<_> = (0..3).map(|_| Sra::<Curve>::keygen(&params, rng).unwrap().1).collect();
        deck.encrypt_separate(&keys).unwrap();

        let before = deck.cards().to_vec();
        assert_eq!(
            deck.decrypt_card_with_key(0, &keys[1]),
            Err(ProtocolError::InvalidKey { position: 0 })
        );
        assert_eq!(deck.cards(), before.as_slice());
        assert_eq!(deck.plaintext(0), None);
    }

    #[test]
    fn test_incomplete_reveal() {
        let rng = &mut thread_rng();
        let (params, base) = setup(3);
        let mut deck = EncryptedDeck::new(params, &base);
        let keys: Vec<_> = (0..3).map(|_| Sra::<Curve>::keygen(&params, rng).unwrap().1).collect();
        deck.encrypt_separate(&keys).unwrap();

        assert_eq!(
            deck.decrypt_separate(&keys[..2]),
            Err(ProtocolError::IncompleteKeyReveal {
                expected: 3,
                received: 2
            })
        );
        let plain = deck.decrypt_separate(&keys).unwrap();
        assert_eq!(plain, base.into_iter().map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn test_rejected_batch_leaves_deck_untouched() {
        let rng = &mut thread_rng();
        let (params, base) = setup(3);
        let mut deck = EncryptedDeck::new(params, &base);
        let keys: Vec<_> = (0..3).map(|_| Sra::<Curve>::keygen(&params, rng).unwrap().1).collect();
        deck.encrypt_separate(&keys).unwrap();

        let mut forged = keys.clone();
        forged[2] = keys[0];
        let before = deck.cards().to_vec();
        assert_eq!(
            deck.decrypt_separate(&forged),
            Err(ProtocolError::InvalidKey { position: 2 })
        );
        assert_eq!(deck.cards(), before.as_slice());
        assert_eq!(deck.layers(0).unwrap().len(), 1);
        assert!(deck.supplied_keys(0).unwrap().is_empty());

        // the honest batch still opens everything afterwards
        let plain = deck.decrypt_separate(&keys).unwrap();
        assert_eq!(plain, base.into_iter().map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_moves_layers_with_cards() {
        let rng = &mut thread_rng();
        let (params, base) = setup(3);
        let mut deck = EncryptedDeck::new(params, &base);
        let keys: Vec<_> = (0..3).map(|_| Sra::<Curve>::keygen(&params, rng).unwrap().1).collect();
        deck.encrypt_separate(&keys).unwrap();

        let permutation = Permutation::from_mapping(&[2, 0, 1]).unwrap();
        deck.shuffle(&permutation).unwrap();
        assert_eq!(deck.decrypt_card_with_key(0, &keys[2]).unwrap(), Some(base[2]));
        assert!(deck.decrypt_card_with_key(1, &keys[2]).is_err());
    }
}
