//! Driving games round by round.
//!
//! A [`GameRunner`] wraps one local game instance: it feeds each complete
//! round to the game, wraps the reply in an [`Envelope`], and turns any
//! error into an `End` broadcast. [`LocalTable`] runs several peers' runners
//! against each other in memory, in lockstep.

use crate::error::ProtocolError;
use crate::message::{Envelope, GameId, PeerId, Response};
use crate::protocol::Game;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "mental_poker::runner";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunnerStatus {
    Running,
    /// Reached END; carries the game's final message.
    Finished(String),
    /// Stopped by an error, ours or a peer's.
    Aborted(String),
    Cancelled,
}

pub struct GameRunner<G: Game + ?Sized> {
    game_id: GameId,
    me: PeerId,
    cancel: CancellationToken,
    status: RunnerStatus,
    rounds: usize,
    game: Box<G>,
}

impl<G: Game + ?Sized> GameRunner<G> {
    /// `cancel` should be the token the game was built with, so cancelling
    /// the runner reaches every sub-game.
    pub fn new(game_id: GameId, me: PeerId, game: Box<G>, cancel: CancellationToken) -> Self {
        Self {
            game_id,
            me,
            cancel,
            status: RunnerStatus::Running,
            rounds: 0,
            game,
        }
    }

    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn me(&self) -> &PeerId {
        &self.me
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }

    pub fn status(&self) -> &RunnerStatus {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == RunnerStatus::Running
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Feeds one complete round. Returns what to broadcast, if anything.
    pub fn step(&mut self, responses: &[Response]) -> Option<Envelope> {
        if !self.is_running() {
            return None;
        }
        if self.cancel.is_cancelled() {
            info!(target: LOG_TARGET, game = %self.game_id, peer = %self.me, "cancelled");
            self.status = RunnerStatus::Cancelled;
            return None;
        }

        self.rounds += 1;
        let before = self.game.state_name();
        match self.game.evaluate(responses) {
            Ok(outbound) => {
                let after = self.game.state_name();
                if before != after {
                    debug!(
                        target: LOG_TARGET,
                        game = %self.game_id,
                        peer = %self.me,
                        from = %before,
                        to = %after,
                        "state changed"
                    );
                }
                if self.game.is_finished() {
                    let message = self.game.final_message();
                    info!(target: LOG_TARGET, game = %self.game_id, peer = %self.me, %message, "finished");
                    self.status = RunnerStatus::Finished(message);
                }
                Some(Envelope::State {
                    game_id: self.game_id.clone(),
                    response: outbound.into_response(self.me.clone()),
                })
            }
            Err(e) => {
                warn!(target: LOG_TARGET, game = %self.game_id, peer = %self.me, error = %e, "aborting");
                self.status = RunnerStatus::Aborted(e.to_string());
                self.cancel.cancel();
                Some(Envelope::End {
                    game_id: self.game_id.clone(),
                    sender: self.me.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// A peer gave up on the game.
    pub fn receive_end(&mut self, sender: &PeerId, reason: &str) {
        if !self.is_running() {
            return;
        }
        info!(target: LOG_TARGET, game = %self.game_id, peer = %self.me, %sender, reason, "ended by peer");
        self.status = RunnerStatus::Aborted(format!("{}: {}", sender, reason));
        self.cancel.cancel();
    }

    pub fn cancel(&mut self) {
        self.cancel.cancel();
    }
}

/// Every peer of one game, exchanging messages in memory.
pub struct LocalTable<G: Game + ?Sized> {
    runners: Vec<GameRunner<G>>,
    inbox: Vec<Response>,
}

impl<G: Game + ?Sized> LocalTable<G> {
    pub fn new(runners: Vec<GameRunner<G>>) -> Self {
        Self {
            runners,
            inbox: Vec::new(),
        }
    }

    pub fn runners(&self) -> &[GameRunner<G>] {
        &self.runners
    }

    pub fn runners_mut(&mut self) -> &mut [GameRunner<G>] {
        &mut self.runners
    }

    pub fn runner(&self, peer: &PeerId) -> Option<&GameRunner<G>> {
        self.runners.iter().find(|r| r.me() == peer)
    }

    /// Runs until no runner is left running. Returns the number of rounds.
    pub fn run(&mut self, max_rounds: usize) -> Result<usize, ProtocolError> {
        self.run_with(max_rounds, |_, _| {})
    }

    /// Like [`LocalTable::run`], letting `intercept` rewrite each round's
    /// messages before delivery.
    pub fn run_with<F>(&mut self, max_rounds: usize, mut intercept: F) -> Result<usize, ProtocolError>
    where
        F: FnMut(usize, &mut Vec<Response>),
    {
        for round in 0..max_rounds {
            if !self.runners.iter().any(GameRunner::is_running) {
                return Ok(round);
            }

            let mut next = Vec::with_capacity(self.runners.len());
            let mut ends = Vec::new();
            for runner in self.runners.iter_mut() {
                match runner.step(&self.inbox) {
                    Some(Envelope::State { response, .. }) => next.push(response),
                    Some(Envelope::End { sender, reason, .. }) => ends.push((sender, reason)),
                    _ => {}
                }
            }
            for (sender, reason) in &ends {
                for runner in self.runners.iter_mut().filter(|r| r.me() != sender) {
                    runner.receive_end(sender, reason);
                }
            }

            intercept(round, &mut next);
            self.inbox = next;
        }

        Err(ProtocolError::ProtocolDisagreement(format!(
            "still running after {} rounds",
            max_rounds
        )))
    }
}
