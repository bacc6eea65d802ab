use ark_std::marker::PhantomData;
use ark_std::rand::{distributions::Alphanumeric, Rng, RngCore, SeedableRng};
use ark_std::UniformRand;
use digest::{Digest, Output};
use rand_chacha::ChaChaRng;

/// Sample a vector of random elements of type T
pub fn sample_vector<T: UniformRand, R: Rng>(seed: &mut R, length: usize) -> Vec<T> {
    (0..length).map(|_| T::rand(seed)).collect::<Vec<_>>()
}

/// Random alphanumeric string, used as commitment salt.
pub fn random_salt<R: Rng>(rng: &mut R, length: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Deterministic rng keyed by a digest of public material. Every party that
/// feeds it the same bytes draws the same values.
pub struct SeededRng<D: Digest> {
    r: ChaChaRng,
    seed: Output<D>,
    #[doc(hidden)]
    digest: PhantomData<D>,
}

impl<D: Digest> RngCore for SeededRng<D> {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.r.next_u32()
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.r.next_u64()
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.r.fill_bytes(dest);
    }

    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), ark_std::rand::Error> {
        self.r.fill_bytes(dest);
        Ok(())
    }
}

impl<D: Digest> SeededRng<D> {
    /// `self.seed = H(seed)`.
    pub fn from_seed(seed: &[u8]) -> Self {
        let seed = D::digest(seed);
        let r = ChaChaRng::from_seed(Self::chacha_seed(&seed));
        Self {
            r,
            seed,
            digest: PhantomData,
        }
    }

    /// Refresh `self.seed` with new material: `self.seed = H(bytes || self.seed)`.
    pub fn absorb(&mut self, bytes: &[u8]) {
        let mut buffer = bytes.to_vec();
        buffer.extend_from_slice(&self.seed);
        self.seed = D::digest(&buffer);
        self.r = ChaChaRng::from_seed(Self::chacha_seed(&self.seed));
    }

    fn chacha_seed(digest: &[u8]) -> [u8; 32] {
        let mut seed = [0u8; 32];
        let len = digest.len().min(32);
        seed[..len].copy_from_slice(&digest[..len]);
        seed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use blake2::Blake2s256;
    use rand::thread_rng;

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let mut a = SeededRng::<Blake2s256>::from_seed(b"deck");
        let mut b = SeededRng::<Blake2s256>::from_seed(b"deck");
        assert_eq!(a.next_u64(), b.next_u64());

        a.absorb(b"round 2");
        b.absorb(b"round 2");
        assert_eq!(a.next_u64(), b.next_u64());

        let mut c = SeededRng::<Blake2s256>::from_seed(b"other deck");
        assert_ne!(
            SeededRng::<Blake2s256>::from_seed(b"deck").next_u64(),
            c.next_u64()
        );
    }

    #[test]
    fn test_random_salt() {
        let rng = &mut thread_rng();
        let salt = random_salt(rng, 100);
        assert_eq!(salt.len(), 100);
        assert!(salt.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(salt, random_salt(rng, 100));
    }
}
