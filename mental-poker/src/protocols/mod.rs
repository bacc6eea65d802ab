pub mod cheat;
pub mod deal;
pub mod deck_shuffle;
pub mod random_deck;
pub mod random_number;
