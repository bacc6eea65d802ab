//! Hash commitments over the text grammar used on the wire.

use crate::error::CryptoError;

use ark_std::marker::PhantomData;
use digest::Digest;
use sha2::Sha256;

mod tests;

/// A revealed `value salt` pair together with the commitment it hashes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaltedOpening {
    pub value: String,
    pub salt: String,
    pub commitment: String,
}

/// Hex-encoded digest commitments. Defaults to SHA-256.
pub struct HashCommitment<D: Digest = Sha256> {
    _digest: PhantomData<D>,
}

impl<D: Digest> HashCommitment<D> {
    pub fn commit(message: &str) -> String {
        hex::encode(D::digest(message.as_bytes()))
    }

    /// Commitment to `value || salt`, with no separator.
    pub fn commit_salted(value: &str, salt: &str) -> String {
        Self::commit(&format!("{}{}", value, salt))
    }

    pub fn verify(commitment: &str, message: &str) -> bool {
        Self::commit(message) == commitment
    }

    /// Parse a reveal of the form `value salt`. Exactly two tokens are
    /// accepted; the commitment is recomputed over their concatenation.
    pub fn open_salted(reveal: &str) -> Result<SaltedOpening, CryptoError> {
        let tokens: Vec<&str> = reveal.split(' ').collect();
        if tokens.len() != 2 {
            return Err(CryptoError::MalformedOpening(format!(
                "expected 2 tokens, got {}",
                tokens.len()
            )));
        }

        let commitment = Self::commit(&tokens.concat());
        Ok(SaltedOpening {
            value: tokens[0].to_string(),
            salt: tokens[1].to_string(),
            commitment,
        })
    }
}
