use crate::message::PeerId;

use proof_essentials::error::CryptoError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed move: {0}")]
    MalformedMove(String),

    #[error("Revealed key does not match any layer of the card at position {position}")]
    InvalidKey { position: usize },

    #[error("Expected {expected} keys, received {received}")]
    IncompleteKeyReveal { expected: usize, received: usize },

    #[error("Protocol disagreement: {0}")]
    ProtocolDisagreement(String),

    #[error("Unknown peer {0}")]
    UnknownPeer(PeerId),

    #[error("Unknown game {0}")]
    UnknownGame(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
