#[cfg(test)]
mod test {
    use crate::error::CryptoError;
    use crate::homomorphic_encryption::{sra, CommutativeEncryptionScheme};
    use ark_ff::Zero;
    use ark_std::rand::SeedableRng;
    use ark_std::UniformRand;
    use proptest::prelude::*;
    use rand::thread_rng;
    use rand_chacha::ChaChaRng;

    type Curve = ark_bn254::G1Projective;
    type Scalar = ark_bn254::Fr;
    type Sra = sra::Sra<Curve>;
    type Plaintext = sra::Plaintext<Curve>;

    #[test]
    fn test_encrypt_decrypt() {
        let rng = &mut thread_rng();
        let pp = Sra::setup().unwrap();
        let (_, sk) = Sra::keygen(&pp, rng).unwrap();

        let message = Plaintext::rand(rng);
        let cipher = Sra::encrypt(&pp, &sk, &message).unwrap();
        assert_ne!(cipher.into_plaintext(), message);

        let recovered = Sra::decrypt(&pp, &sk, &cipher).unwrap();
        assert_eq!(recovered.into_plaintext(), message);
    }

    #[test]
    fn test_wrong_key_does_not_decrypt() {
        let rng = &mut thread_rng();
        let pp = Sra::setup().unwrap();
        let (_, sk) = Sra::keygen(&pp, rng).unwrap();
        let (_, other) = Sra::keygen(&pp, rng).unwrap();

        let message = Plaintext::rand(rng);
        let cipher = Sra::encrypt(&pp, &sk, &message).unwrap();
        let garbage = Sra::decrypt(&pp, &other, &cipher).unwrap();
        assert_ne!(garbage.into_plaintext(), message);
    }

    #[test]
    fn test_zero_key_rejected() {
        let rng = &mut thread_rng();
        let pp = Sra::setup().unwrap();
        let message = Plaintext::rand(rng);

        assert_eq!(
            Sra::encrypt(&pp, &Scalar::zero(), &message),
            Err(CryptoError::ZeroKey)
        );
        assert_eq!(
            Sra::decrypt(&pp, &Scalar::zero(), &message.into()),
            Err(CryptoError::ZeroKey)
        );
    }

    #[test]
    fn test_key_image_matches_keygen() {
        let rng = &mut thread_rng();
        let pp = Sra::setup().unwrap();
        let (image, sk) = Sra::keygen(&pp, rng).unwrap();
        assert_eq!(Sra::key_image(&pp, &sk), image);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn layers_commute(seed in any::<u64>()) {
            let rng = &mut ChaChaRng::seed_from_u64(seed);
            let pp = Sra::setup().unwrap();
            let (_, k1) = Sra::keygen(&pp, rng).unwrap();
            let (_, k2) = Sra::keygen(&pp, rng).unwrap();
            let card = Plaintext::rand(rng);

            let a_then_b = Sra::reencrypt(&pp, &k2, &Sra::encrypt(&pp, &k1, &card).unwrap()).unwrap();
            let b_then_a = Sra::reencrypt(&pp, &k1, &Sra::encrypt(&pp, &k2, &card).unwrap()).unwrap();
            prop_assert_eq!(a_then_b, b_then_a);

            // peel in encryption order and in reverse order
            let first = Sra::decrypt(&pp, &k2, &Sra::decrypt(&pp, &k1, &a_then_b).unwrap()).unwrap();
            let second = Sra::decrypt(&pp, &k1, &Sra::decrypt(&pp, &k2, &a_then_b).unwrap()).unwrap();
            prop_assert_eq!(first.into_plaintext(), card);
            prop_assert_eq!(second.into_plaintext(), card);
        }
    }
}
