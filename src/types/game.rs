//! Game identifier

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message_store::{StoreError, StoreResult};

/// Partition key of the message log.
///
/// Any non-empty string is a valid game; games come into existence with
/// their first message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    /// Validate and wrap a raw game identifier
    pub fn parse(raw: &str) -> StoreResult<Self> {
        if raw.is_empty() {
            return Err(StoreError::InvalidInput(
                "game must not be empty".to_string(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GameId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_empty() {
        let err = GameId::parse("").unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn test_parse_keeps_identifier_verbatim() {
        let game = GameId::parse(" go-game 42/α ").unwrap();
        assert_eq!(game.as_str(), " go-game 42/α ");
        assert_eq!(game.to_string(), " go-game 42/α ");
    }
}
