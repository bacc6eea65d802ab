//! Per-round record of keys and plays, kept by every peer.
//!
//! The ledger holds the key matrix (which key each peer revealed for each
//! position), the trick log for trick-taking games and the face-down stack
//! for bluffing games. Card values are only ever read from fully decrypted
//! positions.

use crate::card::{Card, Rank};
use crate::encrypted_deck::ShuffledDeck;
use crate::error::ProtocolError;
use crate::message::tokens;

use ark_ec::CurveGroup;
use proof_essentials::commitment::HashCommitment;
use proof_essentials::homomorphic_encryption::sra::SecretKey;
use proof_essentials::utils::encoding::{from_hex, to_hex};
use sha2::Sha256;

pub mod stack;
pub mod tricks;

mod tests;

pub use stack::{PlayStack, StackPlay};
pub use tricks::{Bet, TrickLog};

type Commitment = HashCommitment<Sha256>;

/// Commitment to a key list: the digest of the hex keys joined by spaces.
pub fn keys_digest<C: CurveGroup>(keys: &[SecretKey<C>]) -> Result<String, ProtocolError> {
    let encoded = keys
        .iter()
        .map(to_hex)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Commitment::commit(&encoded.join(" ")))
}

pub struct RoundLogger<C: CurveGroup> {
    players: usize,
    deck: ShuffledDeck<C>,
    key_map: Vec<Vec<Option<SecretKey<C>>>>,
    owners: Vec<Option<usize>>,
    tricks: TrickLog,
    stack: PlayStack,
}

impl<C: CurveGroup> RoundLogger<C> {
    /// `owners[position]` is the seat dealt that position, `None` for the
    /// talon.
    pub fn new(
        players: usize,
        deck: ShuffledDeck<C>,
        owners: Vec<Option<usize>>,
    ) -> Result<Self, ProtocolError> {
        if players == 0 {
            return Err(ProtocolError::InvalidConfig("round without players".into()));
        }
        if owners.len() != deck.len() {
            return Err(ProtocolError::InvalidConfig(format!(
                "{} owners for {} positions",
                owners.len(),
                deck.len()
            )));
        }
        if let Some(seat) = owners.iter().flatten().find(|&&s| s >= players) {
            return Err(ProtocolError::InvalidConfig(format!(
                "position dealt to seat {} of {}",
                seat, players
            )));
        }
        let talon_size = owners.iter().filter(|o| o.is_none()).count();
        let tricks = TrickLog::new(players, deck.original.clone(), talon_size)?;

        Ok(Self {
            players,
            key_map: vec![vec![None; deck.len()]; players],
            deck,
            owners,
            tricks,
            stack: PlayStack::default(),
        })
    }

    pub fn players(&self) -> usize {
        self.players
    }

    pub fn deck(&self) -> &ShuffledDeck<C> {
        &self.deck
    }

    pub fn card_at(&self, position: usize) -> Option<Card> {
        self.deck.card_at(position)
    }

    pub fn owner(&self, position: usize) -> Option<usize> {
        self.owners.get(position).copied().flatten()
    }

    pub fn positions_of(&self, player: usize) -> Vec<usize> {
        (0..self.owners.len())
            .filter(|&p| self.owners[p] == Some(player))
            .collect()
    }

    /// Applies `player`'s key for `position`. A key already on record must
    /// be repeated exactly. Returns the card once the position is fully
    /// decrypted.
    pub fn register_card_key(
        &mut self,
        player: usize,
        position: usize,
        key: SecretKey<C>,
    ) -> Result<Option<Card>, ProtocolError> {
        let slot = self
            .key_map
            .get(player)
            .and_then(|keys| keys.get(position))
            .copied()
            .ok_or_else(|| {
                ProtocolError::MalformedMove(format!(
                    "no key slot for seat {} at position {}",
                    player, position
                ))
            })?;

        match slot {
            Some(known) if known == key => {}
            Some(_) => return Err(ProtocolError::InvalidKey { position }),
            None => {
                self.deck.encrypted.decrypt_card_with_key(position, &key)?;
                self.key_map[player][position] = Some(key);
            }
        }
        Ok(self.deck.card_at(position))
    }

    /// Removes the local peer's layer from every position.
    pub fn register_own_keys(&mut self, me: usize) -> Result<(), ProtocolError> {
        for position in 0..self.deck.len() {
            let key = *self.deck.own_key(position).ok_or_else(|| {
                ProtocolError::IncompleteKeyReveal {
                    expected: self.deck.len(),
                    received: self.deck.keys.len(),
                }
            })?;
            self.register_card_key(me, position, key)?;
        }
        Ok(())
    }

    pub fn user_keys(&self, player: usize) -> Option<Vec<SecretKey<C>>> {
        self.key_map.get(player)?.iter().copied().collect()
    }

    /// Digest of every key `player` used, once all of them are known.
    pub fn user_keys_hash(&self, player: usize) -> Result<Option<String>, ProtocolError> {
        let keys = match self.user_keys(player) {
            Some(keys) => keys,
            None => return Ok(None),
        };
        keys_digest::<C>(&keys).map(Some)
    }

    pub fn tricks(&self) -> &TrickLog {
        &self.tricks
    }

    pub fn register_talon(&mut self, talon: Vec<Card>) -> Result<(), ProtocolError> {
        self.tricks.register_talon(talon)
    }

    pub fn update_bet(&mut self, bet: Bet) {
        self.tricks.update_bet(bet)
    }

    /// Records a face-up play after checking `player` owns a position holding
    /// `card`.
    pub fn register_play(&mut self, player: usize, card: Card) -> Result<usize, ProtocolError> {
        let owned = self
            .positions_of(player)
            .into_iter()
            .any(|p| self.card_at(p) == Some(card));
        if !owned {
            return Err(ProtocolError::MalformedMove(format!(
                "seat {} does not hold {}",
                player, card
            )));
        }
        self.tricks.register_play(player, card)
    }

    pub fn new_turn_started(&self) -> bool {
        self.tricks.new_turn_started()
    }

    pub fn filter_playable_cards(&self, hand: &[Card]) -> Vec<Card> {
        self.tricks.filter_playable_cards(hand)
    }

    pub fn round_finished(&self) -> bool {
        self.tricks.round_finished()
    }

    pub fn count_won_turns(&self, player: usize) -> usize {
        self.tricks.count_won_turns(player)
    }

    pub fn verify_round_plays(&self) -> bool {
        self.tricks.verify_round_plays()
    }

    pub fn discarded_talon(&self) -> Option<Vec<Card>> {
        self.tricks.discarded_talon()
    }

    pub fn stack(&self) -> &PlayStack {
        &self.stack
    }

    pub fn is_new_stack(&self) -> bool {
        self.stack.is_new_stack()
    }

    pub fn register_add_play_hashes(
        &mut self,
        player: usize,
        count: usize,
        claim: Option<Rank>,
        hashes: Vec<String>,
    ) -> Result<(), ProtocolError> {
        if player >= self.players {
            return Err(ProtocolError::MalformedMove(format!("no seat {}", player)));
        }
        self.stack
            .register_add_play_hashes(player, count, claim, hashes)
    }

    /// Checks an opening `position key salt` against the hash committed for
    /// card `card` of stack play `play`, then decrypts the position with the
    /// revealed key. The position must belong to the player.
    pub fn register_opening(
        &mut self,
        player: usize,
        play: usize,
        card: usize,
        opening: &str,
    ) -> Result<Card, ProtocolError> {
        let (committer, hash) = self.stack.hash(play, card)?;
        if committer != player {
            return Err(ProtocolError::MalformedMove(format!(
                "seat {} opened a card of seat {}",
                player, committer
            )));
        }
        if !Commitment::verify(hash, opening) {
            return Err(ProtocolError::ProtocolDisagreement(format!(
                "opening of {}/{} does not match its commitment",
                play, card
            )));
        }

        let parts = tokens(opening);
        if parts.len() != 3 {
            return Err(ProtocolError::MalformedMove(format!(
                "opening has {} tokens",
                parts.len()
            )));
        }
        let position: usize = parts[0]
            .parse()
            .map_err(|_| ProtocolError::MalformedMove(format!("bad position {}", parts[0])))?;
        let key: SecretKey<C> = from_hex(parts[1])?;

        if self.owner(position) != Some(player) {
            return Err(ProtocolError::ProtocolDisagreement(format!(
                "seat {} committed to position {} it does not hold",
                player, position
            )));
        }
        let value = self.register_card_key(player, position, key)?.ok_or_else(|| {
            ProtocolError::ProtocolDisagreement(format!("position {} is still encrypted", position))
        })?;
        self.stack.mark_opened(play, card, position, value)?;
        Ok(value)
    }

    /// Hands every card of the stack to `loser` and starts a new stack.
    pub fn resolve_stack(&mut self, loser: usize) -> Result<Vec<(usize, Card)>, ProtocolError> {
        if loser >= self.players {
            return Err(ProtocolError::MalformedMove(format!("no seat {}", loser)));
        }
        let cards = self.stack.take()?;
        for (position, _) in &cards {
            self.owners[*position] = Some(loser);
        }
        Ok(cards)
    }

    pub fn format_log(&self) -> String {
        let status = if self.verify_round_plays() { "OK" } else { "FAIL" };
        let mut lines = vec![format!("Round status: {}", status)];

        let talon: Vec<String> = self.tricks.talon().iter().map(Card::to_string).collect();
        lines.push(format!("Talon: {}", talon.join(" ")));
        for player in 0..self.players {
            let known = self.key_map[player].iter().filter(|k| k.is_some()).count();
            lines.push(format!(
                "Seat {}: {}/{} keys known",
                player,
                known,
                self.deck.len()
            ));
        }
        lines.push("Plays:".to_string());
        for (player, card) in self.tricks.log() {
            lines.push(format!("  seat {}: {}", player, card));
        }
        lines.join("\n")
    }
}

/// Every round played within one game.
pub struct GameLogger<C: CurveGroup> {
    rounds: Vec<RoundLogger<C>>,
}

impl<C: CurveGroup> Default for GameLogger<C> {
    fn default() -> Self {
        Self { rounds: Vec::new() }
    }
}

impl<C: CurveGroup> GameLogger<C> {
    pub fn new_round(&mut self, round: RoundLogger<C>) {
        self.rounds.push(round);
    }

    pub fn current(&self) -> Option<&RoundLogger<C>> {
        self.rounds.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut RoundLogger<C>> {
        self.rounds.last_mut()
    }

    pub fn rounds(&self) -> &[RoundLogger<C>] {
        &self.rounds
    }

    pub fn format_log(&self) -> String {
        self.rounds
            .iter()
            .map(RoundLogger::format_log)
            .collect::<Vec<_>>()
            .join("\n=================\n")
    }
}
