//! Core identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity id of a player as reported by the host game.
///
/// This is a wrapper around the host's numeric id so it cannot be confused
/// with slot numbers, question indices or credit amounts.
///
/// # Examples
///
/// ```rust
/// use mod_api::PlayerId;
///
/// let player: PlayerId = "1042".parse().unwrap();
/// assert_eq!(player, PlayerId(1042));
/// assert_eq!(player.to_string(), "1042");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlayerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(PlayerId)
    }
}

impl From<u32> for PlayerId {
    fn from(id: u32) -> Self {
        PlayerId(id)
    }
}
