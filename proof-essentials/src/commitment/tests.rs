#[cfg(test)]
mod test {
    use crate::commitment::HashCommitment;
    use crate::error::CryptoError;
    use blake2::Blake2s256;

    type Sha = HashCommitment;

    #[test]
    fn test_commit_is_sha256_hex() {
        assert_eq!(
            Sha::commit("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_salted_opening_round_trip() {
        let commitment = Sha::commit_salted("42", "pepper");
        let opening = Sha::open_salted("42 pepper").unwrap();

        assert_eq!(opening.value, "42");
        assert_eq!(opening.salt, "pepper");
        assert_eq!(opening.commitment, commitment);
        assert!(Sha::verify(&commitment, "42pepper"));
    }

    #[test]
    fn test_opening_needs_two_tokens() {
        assert!(matches!(
            Sha::open_salted("42"),
            Err(CryptoError::MalformedOpening(_))
        ));
        assert!(matches!(
            Sha::open_salted("42 pepper salt"),
            Err(CryptoError::MalformedOpening(_))
        ));
    }

    #[test]
    fn test_digest_is_pluggable() {
        let sha = Sha::commit("card");
        let blake = HashCommitment::<Blake2s256>::commit("card");
        assert_ne!(sha, blake);
        assert_eq!(blake.len(), 64);
    }
}
