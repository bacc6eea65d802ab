use crate::error::CryptoError;

use ark_ff::Field;

pub mod sra;

/// An encryption scheme whose layers can be applied and removed in any order:
/// `dec(k1, dec(k2, enc(k2, enc(k1, m)))) == m`.
pub trait CommutativeEncryptionScheme<Scalar: Field> {
    type Parameters;
    type SecretKey;
    type KeyImage;
    type Plaintext;
    type Ciphertext;

    fn setup() -> Result<Self::Parameters, CryptoError>;

    fn keygen<R: ark_std::rand::Rng>(
        pp: &Self::Parameters,
        rng: &mut R,
    ) -> Result<(Self::KeyImage, Self::SecretKey), CryptoError>;

    /// Public image of a secret key. Lets other parties recognise which
    /// layer a revealed key belongs to.
    fn key_image(pp: &Self::Parameters, sk: &Self::SecretKey) -> Self::KeyImage;

    /// Wrap a plaintext in one layer.
    fn encrypt(
        pp: &Self::Parameters,
        sk: &Self::SecretKey,
        message: &Self::Plaintext,
    ) -> Result<Self::Ciphertext, CryptoError>;

    /// Add one more layer on top of an existing ciphertext.
    fn reencrypt(
        pp: &Self::Parameters,
        sk: &Self::SecretKey,
        ciphertext: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, CryptoError>;

    /// Remove one layer. The result is the plaintext once no layer remains.
    fn decrypt(
        pp: &Self::Parameters,
        sk: &Self::SecretKey,
        ciphertext: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, CryptoError>;
}
