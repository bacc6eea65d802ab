//! Wire types exchanged between peers.
//!
//! A state payload is a space-separated text line. Curve points and scalars
//! travel as hex of their compressed serialization; opaque blobs such as
//! commitment hashes go in `data`.

use crate::error::ProtocolError;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameId(pub String);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GameId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One peer's message for the current round, as seen by every recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub sender: PeerId,
    pub payload: String,
    pub data: Vec<Vec<u8>>,
}

impl Response {
    pub fn new(sender: PeerId, payload: impl Into<String>) -> Self {
        Self {
            sender,
            payload: payload.into(),
            data: Vec::new(),
        }
    }

    pub fn tokens(&self) -> Vec<&str> {
        tokens(&self.payload)
    }
}

/// What a protocol wants broadcast after a round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbound {
    pub payload: String,
    pub data: Vec<Vec<u8>>,
}

impl Outbound {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            data: Vec::new(),
        }
    }

    pub fn with_data(payload: impl Into<String>, data: Vec<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty() && self.data.is_empty()
    }

    pub fn into_response(self, sender: PeerId) -> Response {
        Response {
            sender,
            payload: self.payload,
            data: self.data,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
    Init {
        game_id: GameId,
        game_type: String,
        sender: PeerId,
        participants: Vec<PeerId>,
    },
    State {
        game_id: GameId,
        response: Response,
    },
    End {
        game_id: GameId,
        sender: PeerId,
        reason: String,
    },
}

impl Envelope {
    pub fn game_id(&self) -> &GameId {
        match self {
            Envelope::Init { game_id, .. }
            | Envelope::State { game_id, .. }
            | Envelope::End { game_id, .. } => game_id,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

pub fn tokens(payload: &str) -> Vec<&str> {
    payload.split_whitespace().collect()
}

pub fn parse_token<T: std::str::FromStr>(token: &str, what: &str) -> Result<T, ProtocolError> {
    token
        .parse()
        .map_err(|_| ProtocolError::MalformedMove(format!("bad {}: {}", what, token)))
}
