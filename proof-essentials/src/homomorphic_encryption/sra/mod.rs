//! Pohlig-Hellman / SRA encryption over an elliptic curve group.
//!
//! A card is a curve point `P`; encrypting under a scalar `k` gives `k·P` and
//! decrypting multiplies by `k⁻¹`. Scalar multiplication commutes, so layers
//! added by different players may be peeled off in any order.

use crate::error::CryptoError;
use crate::homomorphic_encryption::CommutativeEncryptionScheme;

use ark_ec::{CurveGroup, Group};
use ark_ff::{Field, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::ops::Mul;
use ark_std::{marker::PhantomData, rand::Rng};

pub mod arithmetic_definitions;
mod tests;

#[derive(Clone)]
pub struct Sra<C: CurveGroup> {
    _group: PhantomData<C>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Parameters<C: CurveGroup> {
    pub generator: C::Affine,
}

impl<C: CurveGroup> Default for Parameters<C> {
    fn default() -> Self {
        Self {
            generator: C::generator().into_affine(),
        }
    }
}

pub type SecretKey<C> = <C as Group>::ScalarField;

/// `k·G` for a secret key `k`.
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug, CanonicalSerialize, CanonicalDeserialize)]
pub struct KeyImage<C: CurveGroup>(pub C::Affine);

#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug, CanonicalSerialize, CanonicalDeserialize)]
pub struct Plaintext<C: CurveGroup>(pub C::Affine);

#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug, CanonicalSerialize, CanonicalDeserialize)]
pub struct Ciphertext<C: CurveGroup>(pub C::Affine);

impl<C: CurveGroup> CommutativeEncryptionScheme<C::ScalarField> for Sra<C> {
    type Parameters = Parameters<C>;
    type SecretKey = SecretKey<C>;
    type KeyImage = KeyImage<C>;
    type Plaintext = Plaintext<C>;
    type Ciphertext = Ciphertext<C>;

    fn setup() -> Result<Self::Parameters, CryptoError> {
        Ok(Parameters::default())
    }

    fn keygen<R: Rng>(
        pp: &Self::Parameters,
        rng: &mut R,
    ) -> Result<(Self::KeyImage, Self::SecretKey), CryptoError> {
        // a zero key would erase the card
        let mut secret_key = C::ScalarField::rand(rng);
        while secret_key.is_zero() {
            secret_key = C::ScalarField::rand(rng);
        }

        Ok((Self::key_image(pp, &secret_key), secret_key))
    }

    fn key_image(pp: &Self::Parameters, sk: &Self::SecretKey) -> Self::KeyImage {
        KeyImage(pp.generator.mul(*sk).into_affine())
    }

    fn encrypt(
        pp: &Self::Parameters,
        sk: &Self::SecretKey,
        message: &Self::Plaintext,
    ) -> Result<Self::Ciphertext, CryptoError> {
        Self::reencrypt(pp, sk, &Ciphertext::from(*message))
    }

    fn reencrypt(
        _pp: &Self::Parameters,
        sk: &Self::SecretKey,
        ciphertext: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, CryptoError> {
        if sk.is_zero() {
            return Err(CryptoError::ZeroKey);
        }

        Ok(*ciphertext * *sk)
    }

    fn decrypt(
        _pp: &Self::Parameters,
        sk: &Self::SecretKey,
        ciphertext: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, CryptoError> {
        let sk_inv = sk.inverse().ok_or(CryptoError::ZeroKey)?;

        Ok(*ciphertext * sk_inv)
    }
}
