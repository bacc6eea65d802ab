use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum CryptoError {
    #[error("Secret key is zero and cannot be inverted")]
    ZeroKey,

    #[error("{0}: expected {1} elements, got {2}")]
    LengthError(String, usize, usize),

    #[error("Invalid permutation mapping of size {0}")]
    InvalidPermutation(usize),

    #[error("Malformed commitment opening: {0}")]
    MalformedOpening(String),

    #[error("Commitment opening does not match: {0}")]
    CommitmentMismatch(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
