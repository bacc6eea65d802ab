//! The round-driven state machine contract shared by every game.

use crate::error::ProtocolError;
use crate::message::{Outbound, Response};

use std::fmt::Debug;

/// How a game ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
    Failed(ProtocolError),
}

impl<T> Outcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Cancelled => Outcome::Cancelled,
            Outcome::Failed(e) => Outcome::Failed(e),
        }
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// A game as a state machine advanced one round at a time.
///
/// Each call to [`Protocol::evaluate`] consumes the messages every
/// participant broadcast in the previous round (one per peer, including the
/// local one) and returns what the local peer broadcasts next. The first call
/// is made with an empty slice and must not look at its input. Transitions
/// depend only on the current state and the inputs, so all peers walk the
/// same path.
pub trait Protocol: Send {
    type State: Copy + Debug + PartialEq;
    type Output;

    fn name(&self) -> &'static str;

    fn state(&self) -> Self::State;

    fn evaluate(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError>;

    fn is_finished(&self) -> bool;

    /// Hands out the result. Only meaningful once finished; later calls may
    /// find it already taken.
    fn outcome(&mut self) -> Outcome<Self::Output>;

    fn final_message(&self) -> String;
}

/// Object-safe view of a [`Protocol`], for registries that hold games of
/// different kinds.
pub trait Game: Send {
    fn name(&self) -> &'static str;

    fn state_name(&self) -> String;

    fn evaluate(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError>;

    fn is_finished(&self) -> bool;

    fn final_message(&self) -> String;
}

impl<P: Protocol> Game for P {
    fn name(&self) -> &'static str {
        Protocol::name(self)
    }

    fn state_name(&self) -> String {
        format!("{:?}", self.state())
    }

    fn evaluate(&mut self, responses: &[Response]) -> Result<Outbound, ProtocolError> {
        Protocol::evaluate(self, responses)
    }

    fn is_finished(&self) -> bool {
        Protocol::is_finished(self)
    }

    fn final_message(&self) -> String {
        Protocol::final_message(self)
    }
}
