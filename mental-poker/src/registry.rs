//! Local bookkeeping for every game a peer takes part in.
//!
//! The registry turns routed [`Envelope`]s into rounds: a game is stepped
//! once a response from each participant is queued. Outgoing envelopes must
//! be delivered to every participant, the sender included.

use crate::card::Deck;
use crate::config::GameConfig;
use crate::error::ProtocolError;
use crate::group::PeerGroup;
use crate::message::{Envelope, GameId, PeerId, Response};
use crate::protocol::Game;
use crate::protocols::cheat::{Cheat, MoveSource};
use crate::protocols::deal::DealProtocol;
use crate::protocols::random_number::RandomNumber;
use crate::runner::{GameRunner, RunnerStatus};

use ark_ec::CurveGroup;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const LOG_TARGET: &str = "mental_poker::registry";

pub const RANDOM_NUMBER: &str = "random-number";
pub const DEAL: &str = "deal";
pub const CHEAT: &str = "cheat";

type MoveProvider = Arc<dyn Fn(&PeerId) -> Box<dyn MoveSource> + Send + Sync>;

/// Builds games by type name.
pub struct GameFactory<C: CurveGroup> {
    config: GameConfig,
    moves: MoveProvider,
    _curve: PhantomData<C>,
}

impl<C: CurveGroup> GameFactory<C> {
    pub fn new<F>(config: GameConfig, moves: F) -> Result<Self, ProtocolError>
    where
        F: Fn(&PeerId) -> Box<dyn MoveSource> + Send + Sync + 'static,
    {
        config.validate()?;
        Ok(Self {
            config,
            moves: Arc::new(moves),
            _curve: PhantomData,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn build(
        &self,
        game_type: &str,
        game_id: &GameId,
        group: PeerGroup,
        cancel: CancellationToken,
    ) -> Result<Box<dyn Game>, ProtocolError> {
        let id = game_id.0.clone();
        match game_type {
            RANDOM_NUMBER => Ok(Box::new(
                RandomNumber::new(id, self.config.random_min, self.config.random_max)?
                    .with_salt_length(self.config.salt_length),
            )),
            DEAL => {
                let size = self.config.deck_sizes.first().copied().ok_or_else(|| {
                    ProtocolError::InvalidConfig("no deck sizes".to_string())
                })?;
                let game = DealProtocol::<C>::new(
                    id,
                    group,
                    Deck::new(size)?,
                    self.config.talon_size,
                    cancel,
                )?
                .with_seed_bits(self.config.seed_bits);
                Ok(Box::new(game))
            }
            CHEAT => {
                let moves = (self.moves)(group.my_id());
                Ok(Box::new(Cheat::<C>::new(
                    id,
                    group,
                    self.config.clone(),
                    moves,
                    cancel,
                )?))
            }
            other => Err(ProtocolError::InvalidConfig(format!(
                "unknown game type {}",
                other
            ))),
        }
    }
}

struct Table {
    runner: GameRunner<dyn Game>,
    participants: BTreeSet<PeerId>,
    pending: BTreeMap<PeerId, Response>,
    opening: bool,
}

impl Table {
    fn is_ready(&self) -> bool {
        self.runner.is_running()
            && (self.opening || self.pending.len() == self.participants.len())
    }

    fn step(&mut self) -> Option<Envelope> {
        let round: Vec<Response> = std::mem::take(&mut self.pending).into_values().collect();
        self.opening = false;
        self.runner.step(&round)
    }
}

pub struct GameRegistry<C: CurveGroup> {
    me: PeerId,
    factory: GameFactory<C>,
    cancel: CancellationToken,
    games: HashMap<GameId, Table>,
}

impl<C: CurveGroup> GameRegistry<C> {
    pub fn new(me: PeerId, factory: GameFactory<C>) -> Self {
        Self {
            me,
            factory,
            cancel: CancellationToken::new(),
            games: HashMap::new(),
        }
    }

    pub fn me(&self) -> &PeerId {
        &self.me
    }

    /// The announcement that starts a game on every participant.
    pub fn open(
        &self,
        game_id: impl Into<GameId>,
        game_type: &str,
        participants: Vec<PeerId>,
    ) -> Envelope {
        Envelope::Init {
            game_id: game_id.into(),
            game_type: game_type.to_string(),
            sender: self.me.clone(),
            participants,
        }
    }

    pub fn handle(&mut self, envelope: Envelope) -> Result<(), ProtocolError> {
        match envelope {
            Envelope::Init {
                game_id,
                game_type,
                sender,
                participants,
            } => {
                if self.games.contains_key(&game_id) {
                    return Err(ProtocolError::ProtocolDisagreement(format!(
                        "game {} already running",
                        game_id
                    )));
                }
                if !participants.contains(&sender) {
                    return Err(ProtocolError::UnknownPeer(sender));
                }
                let group = PeerGroup::new(participants, &self.me)?;
                let cancel = self.cancel.child_token();
                let game = self
                    .factory
                    .build(&game_type, &game_id, group.clone(), cancel.clone())?;
                info!(
                    target: LOG_TARGET,
                    game = %game_id,
                    kind = %game_type,
                    players = group.len(),
                    "game started"
                );
                let runner = GameRunner::new(game_id.clone(), self.me.clone(), game, cancel);
                self.games.insert(
                    game_id,
                    Table {
                        runner,
                        participants: group.peers().iter().cloned().collect(),
                        pending: BTreeMap::new(),
                        opening: true,
                    },
                );
                Ok(())
            }
            Envelope::State { game_id, response } => {
                let table = self
                    .games
                    .get_mut(&game_id)
                    .ok_or_else(|| ProtocolError::UnknownGame(game_id.0.clone()))?;
                if !table.participants.contains(&response.sender) {
                    return Err(ProtocolError::UnknownPeer(response.sender));
                }
                if table.pending.contains_key(&response.sender) {
                    return Err(ProtocolError::MalformedMove(format!(
                        "{} sent twice in one round of {}",
                        response.sender, game_id
                    )));
                }
                debug!(target: LOG_TARGET, game = %game_id, sender = %response.sender, "queued");
                table.pending.insert(response.sender.clone(), response);
                Ok(())
            }
            Envelope::End {
                game_id,
                sender,
                reason,
            } => {
                let table = self
                    .games
                    .get_mut(&game_id)
                    .ok_or_else(|| ProtocolError::UnknownGame(game_id.0.clone()))?;
                if sender != self.me {
                    table.runner.receive_end(&sender, &reason);
                }
                Ok(())
            }
        }
    }

    /// Steps every game with a complete round, independent games in
    /// parallel. Returns the envelopes to broadcast.
    pub fn step_all(&mut self) -> Vec<Envelope> {
        self.games
            .par_iter_mut()
            .filter(|(_, table)| table.is_ready())
            .filter_map(|(_, table)| table.step())
            .collect()
    }

    pub fn status(&self, game_id: &GameId) -> Option<&RunnerStatus> {
        self.games.get(game_id).map(|t| t.runner.status())
    }

    pub fn game(&self, game_id: &GameId) -> Option<&dyn Game> {
        self.games.get(game_id).map(|t| t.runner.game())
    }

    pub fn is_idle(&self) -> bool {
        self.games.values().all(|t| !t.runner.is_running())
    }

    /// Drops games that are no longer running and reports how they ended.
    pub fn remove_finished(&mut self) -> Vec<(GameId, RunnerStatus)> {
        let done: Vec<GameId> = self
            .games
            .iter()
            .filter(|(_, t)| !t.runner.is_running())
            .map(|(id, _)| id.clone())
            .collect();
        done.into_iter()
            .filter_map(|id| {
                self.games
                    .remove(&id)
                    .map(|t| (id, t.runner.status().clone()))
            })
            .collect()
    }

    /// Cancels every game.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
    }
}
