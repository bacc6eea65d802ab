use crate::card::{Card, Rank};
use crate::error::ProtocolError;

pub const MAX_CARDS_PER_PLAY: usize = 4;

/// One face-down play: the hashes committed to, and what each opened to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackPlay {
    pub player: usize,
    pub hashes: Vec<String>,
    pub opened: Vec<Option<(usize, Card)>>,
}

/// The pile of face-down plays since the last challenge.
#[derive(Clone, Debug, Default)]
pub struct PlayStack {
    claim: Option<Rank>,
    plays: Vec<StackPlay>,
}

impl PlayStack {
    pub fn is_new_stack(&self) -> bool {
        self.plays.is_empty()
    }

    pub fn claim(&self) -> Option<Rank> {
        self.claim
    }

    pub fn plays(&self) -> &[StackPlay] {
        &self.plays
    }

    pub fn last_play(&self) -> Option<&StackPlay> {
        self.plays.last()
    }

    pub fn card_count(&self) -> usize {
        self.plays.iter().map(|p| p.hashes.len()).sum()
    }

    /// The claimed rank is taken only from the play that opens the stack.
    pub fn register_add_play_hashes(
        &mut self,
        player: usize,
        count: usize,
        claim: Option<Rank>,
        hashes: Vec<String>,
    ) -> Result<(), ProtocolError> {
        if count == 0 || count > MAX_CARDS_PER_PLAY {
            return Err(ProtocolError::MalformedMove(format!(
                "cannot play {} cards at once",
                count
            )));
        }
        if hashes.len() != count {
            return Err(ProtocolError::MalformedMove(format!(
                "{} cards announced, {} hashes sent",
                count,
                hashes.len()
            )));
        }
        if self.is_new_stack() {
            self.claim = Some(claim.ok_or_else(|| {
                ProtocolError::MalformedMove("a new stack needs a claimed rank".to_string())
            })?);
        }

        self.plays.push(StackPlay {
            player,
            opened: vec![None; count],
            hashes,
        });
        Ok(())
    }

    pub fn hash(&self, play: usize, card: usize) -> Result<(usize, &str), ProtocolError> {
        let entry = self
            .plays
            .get(play)
            .ok_or_else(|| ProtocolError::MalformedMove(format!("no play {} in stack", play)))?;
        let hash = entry.hashes.get(card).ok_or_else(|| {
            ProtocolError::MalformedMove(format!("play {} has no card {}", play, card))
        })?;
        Ok((entry.player, hash))
    }

    /// A position may sit in the stack only once.
    pub fn mark_opened(
        &mut self,
        play: usize,
        card: usize,
        position: usize,
        value: Card,
    ) -> Result<(), ProtocolError> {
        let duplicate = self
            .plays
            .iter()
            .flat_map(|p| p.opened.iter().flatten())
            .any(|(pos, _)| *pos == position);
        let slot = self
            .plays
            .get_mut(play)
            .and_then(|p| p.opened.get_mut(card))
            .ok_or_else(|| ProtocolError::MalformedMove(format!("no card {}/{}", play, card)))?;

        match slot {
            Some(existing) if *existing == (position, value) => Ok(()),
            Some(_) => Err(ProtocolError::ProtocolDisagreement(format!(
                "card {}/{} opened twice",
                play, card
            ))),
            None if duplicate => Err(ProtocolError::ProtocolDisagreement(format!(
                "position {} committed twice",
                position
            ))),
            None => {
                *slot = Some((position, value));
                Ok(())
            }
        }
    }

    pub fn is_fully_opened(&self) -> bool {
        self.plays
            .iter()
            .all(|p| p.opened.iter().all(Option::is_some))
    }

    /// Empties the stack, returning every opened card.
    pub fn take(&mut self) -> Result<Vec<(usize, Card)>, ProtocolError> {
        if !self.is_fully_opened() {
            return Err(ProtocolError::ProtocolDisagreement(
                "stack resolved before every card was opened".to_string(),
            ));
        }
        self.claim = None;
        Ok(self
            .plays
            .drain(..)
            .flat_map(|p| p.opened.into_iter().flatten())
            .collect())
    }
}
