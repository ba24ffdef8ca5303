//! Record keys and the file names derived from them.

use crate::error::StoreError;
use mod_api::PlayerId;
use std::fmt;
use std::str::FromStr;

/// Identifies one record: an owner and one of the owner's numbered slots.
///
/// The text form is `<owner>:<slot>`, e.g. `42:1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    owner: String,
    slot: u8,
}

impl RecordKey {
    /// Owners become part of a file name, so only ASCII letters, digits,
    /// `-` and `_` are accepted.
    pub fn new(owner: impl Into<String>, slot: u8) -> Result<Self, StoreError> {
        let owner = owner.into();
        let valid = !owner.is_empty()
            && owner
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(format!("{owner}:{slot}")));
        }
        Ok(Self { owner, slot })
    }

    pub fn for_player(player: PlayerId, slot: u8) -> Self {
        Self {
            owner: player.to_string(),
            slot,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// The owning player, when the owner is a numeric player id.
    pub fn player(&self) -> Option<PlayerId> {
        self.owner.parse().ok()
    }

    /// `<owner>.vb<slot>.json`
    pub fn file_name(&self) -> String {
        format!("{}.vb{}.json", self.owner, self.slot)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.slot)
    }
}

impl FromStr for RecordKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::InvalidKey(s.to_string());
        let (owner, slot) = s.trim().split_once(':').ok_or_else(invalid)?;
        let slot = slot.parse::<u8>().map_err(|_| invalid())?;
        Self::new(owner, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let key: RecordKey = "42:1".parse().unwrap();
        assert_eq!(key.owner(), "42");
        assert_eq!(key.slot(), 1);
        assert_eq!(key.player(), Some(PlayerId(42)));
        assert_eq!(key.to_string(), "42:1");
        assert_eq!(key.file_name(), "42.vb1.json");
    }

    #[test]
    fn test_rejects_path_like_owners() {
        assert!("../etc:1".parse::<RecordKey>().is_err());
        assert!(":1".parse::<RecordKey>().is_err());
        assert!("42".parse::<RecordKey>().is_err());
        assert!("42:x".parse::<RecordKey>().is_err());
        assert!("42:300".parse::<RecordKey>().is_err());
        assert!(RecordKey::new("guild_7-a", 2).is_ok());
    }

    #[test]
    fn test_for_player_matches_parse() {
        assert_eq!(RecordKey::for_player(PlayerId(7), 6), "7:6".parse().unwrap());
    }
}
