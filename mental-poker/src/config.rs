use crate::card::SUPPORTED_DECK_SIZES;
use crate::error::ProtocolError;
use crate::protocols::random_deck::DEFAULT_SEED_BITS;
use crate::protocols::random_number::{DEFAULT_SALT_LENGTH, MAX_BITS};

use serde::{Deserialize, Serialize};

/// Table-wide settings. Every peer of a game must use the same values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Deck sizes peers may vote for.
    pub deck_sizes: Vec<usize>,
    pub talon_size: usize,
    pub salt_length: usize,
    pub random_min: i64,
    pub random_max: i64,
    pub seed_bits: u32,
    /// Resolved challenges after which a bluffing game is scored as is.
    pub max_challenges: usize,
    /// Rounds the in-memory driver runs before giving up.
    pub max_rounds: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            deck_sizes: SUPPORTED_DECK_SIZES.to_vec(),
            talon_size: 0,
            salt_length: DEFAULT_SALT_LENGTH,
            random_min: i32::MIN as i64,
            random_max: i32::MAX as i64,
            seed_bits: DEFAULT_SEED_BITS,
            max_challenges: 64,
            max_rounds: 10_000,
        }
    }
}

impl GameConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ProtocolError> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| ProtocolError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.deck_sizes.is_empty() {
            return Err(ProtocolError::InvalidConfig("no deck sizes".to_string()));
        }
        if let Some(size) = self
            .deck_sizes
            .iter()
            .find(|s| !SUPPORTED_DECK_SIZES.contains(s))
        {
            return Err(ProtocolError::InvalidConfig(format!(
                "unsupported deck size {}",
                size
            )));
        }
        if self.random_min > self.random_max {
            return Err(ProtocolError::InvalidConfig(format!(
                "empty random range [{}, {}]",
                self.random_min, self.random_max
            )));
        }
        if self.seed_bits > MAX_BITS {
            return Err(ProtocolError::InvalidConfig(format!(
                "at most {} seed bits",
                MAX_BITS
            )));
        }
        if self.salt_length == 0 || self.max_rounds == 0 || self.max_challenges == 0 {
            return Err(ProtocolError::InvalidConfig("zero limit".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_and_overrides() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.deck_sizes, vec![32, 36, 52]);

        let config = GameConfig::from_json_str(r#"{"talon_size": 2, "deck_sizes": [32]}"#).unwrap();
        assert_eq!(config.talon_size, 2);
        assert_eq!(config.deck_sizes, vec![32]);
        assert_eq!(config.salt_length, DEFAULT_SALT_LENGTH);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(GameConfig::from_json_str(r#"{"deck_sizes": [30]}"#).is_err());
        assert!(GameConfig::from_json_str(r#"{"random_min": 5, "random_max": 1}"#).is_err());
        assert!(GameConfig::from_json_str(r#"{"seed_bits": 80}"#).is_err());
        assert!(GameConfig::from_json_str("not json").is_err());
    }
}
