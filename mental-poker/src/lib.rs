//! Card games between mutually distrusting peers without a dealer.
//!
//! Cards are curve points under commutative encryption: every peer adds a
//! layer and shuffles, and a card is read only by whoever collects the keys of
//! all other peers for its position. Shared randomness comes from hash
//! commit-reveal rounds. Games are state machines advanced in lockstep rounds
//! (see [`protocol::Protocol`]), driven by [`runner::GameRunner`] and routed
//! by [`registry::GameRegistry`].

pub mod bots;
pub mod card;
pub mod config;
pub mod encrypted_deck;
pub mod error;
pub mod group;
pub mod ledger;
pub mod message;
pub mod protocol;
pub mod protocols;
pub mod registry;
pub mod roles;
pub mod runner;
pub mod subgame;
