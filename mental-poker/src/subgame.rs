//! Running one protocol inside another.
//!
//! A parent keeps the child in a [`SubGame`] and forwards each round's
//! messages to it while in the state that waits on the child. The child
//! shares the parent's rounds, so every peer launches and finishes it in the
//! same round. When the child completes, the parent carries on within that
//! same round and sends its own message.

use crate::error::ProtocolError;
use crate::message::{Outbound, Response};
use crate::protocol::{Outcome, Protocol};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const LOG_TARGET: &str = "mental_poker::subgame";

pub enum Step<T> {
    Pending(Outbound),
    Ready(Outcome<T>),
}

pub struct SubGame<P: Protocol> {
    id: String,
    protocol: P,
    cancel: CancellationToken,
}

impl<P: Protocol> SubGame<P> {
    /// `build` receives the child's own cancellation token, derived from the
    /// parent's, so cancelling the parent cancels every descendant.
    pub fn launch<F>(
        id: impl Into<String>,
        parent: &CancellationToken,
        build: F,
    ) -> Result<Self, ProtocolError>
    where
        F: FnOnce(CancellationToken) -> Result<P, ProtocolError>,
    {
        let id = id.into();
        let cancel = parent.child_token();
        let protocol = build(cancel.clone())?;
        debug!(target: LOG_TARGET, sub_game = %id, name = protocol.name(), "launching");
        Ok(Self {
            id,
            protocol,
            cancel,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Advance the child by one round. A finishing round never produces a
    /// message of its own; the parent speaks instead.
    pub fn poll(&mut self, responses: &[Response]) -> Step<P::Output> {
        if self.cancel.is_cancelled() {
            info!(target: LOG_TARGET, sub_game = %self.id, "cancelled");
            return Step::Ready(Outcome::Cancelled);
        }

        match self.protocol.evaluate(responses) {
            Err(e) => {
                info!(target: LOG_TARGET, sub_game = %self.id, error = %e, "failed");
                Step::Ready(Outcome::Failed(e))
            }
            Ok(outbound) if !self.protocol.is_finished() => Step::Pending(outbound),
            Ok(_) => {
                debug!(
                    target: LOG_TARGET,
                    sub_game = %self.id,
                    result = %self.protocol.final_message(),
                    "finished"
                );
                Step::Ready(self.protocol.outcome())
            }
        }
    }
}
