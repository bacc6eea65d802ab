use super::{Ciphertext, Plaintext};

use ark_ec::CurveGroup;
use ark_std::ops::Mul;
use ark_std::{rand::Rng, UniformRand};

impl<C: CurveGroup> Mul<C::ScalarField> for Ciphertext<C> {
    type Output = Self;
    fn mul(self, x: C::ScalarField) -> Self::Output {
        Self(self.0.mul(x).into_affine())
    }
}

impl<C: CurveGroup> Mul<C::ScalarField> for Plaintext<C> {
    type Output = Self;
    fn mul(self, x: C::ScalarField) -> Self::Output {
        Self(self.0.mul(x).into_affine())
    }
}

impl<C: CurveGroup> From<Plaintext<C>> for Ciphertext<C> {
    fn from(plaintext: Plaintext<C>) -> Self {
        Self(plaintext.0)
    }
}

impl<C: CurveGroup> Ciphertext<C> {
    /// Reinterpret the point as a plaintext. Only meaningful once every
    /// layer has been removed.
    pub fn into_plaintext(self) -> Plaintext<C> {
        Plaintext(self.0)
    }
}

impl<C: CurveGroup> UniformRand for Plaintext<C> {
    fn rand<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(C::rand(rng).into_affine())
    }
}
