//! Outbound collaborators: chat messaging and reward delivery.

use crate::types::PlayerId;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Chat output towards players.
///
/// Both calls are fire-and-forget. Implementations log their own failures
/// and never report them back to the mod.
pub trait Messenger: Send + Sync {
    fn broadcast(&self, text: &str);
    fn send_private(&self, player: PlayerId, text: &str);
}

/// Something a player can be given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reward {
    Credits(u64),
}

impl fmt::Display for Reward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reward::Credits(amount) => write!(f, "{amount} credits"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GrantError {
    #[error("Reward delivery is not configured: {0}")]
    NotConfigured(String),

    #[error("Host rejected the reward request: {0}")]
    Rejected(String),

    #[error("Reward delivery failed: {0}")]
    Transport(String),
}

/// Delivers rewards to players.
///
/// Grants are not idempotent: a caller must only record a grant as done
/// after `Ok(())` came back.
#[async_trait]
pub trait RewardGrantor: Send + Sync {
    async fn grant(&self, player: PlayerId, reward: Reward) -> Result<(), GrantError>;
}

/// Replaces every `{name}` in `template` with its value.
///
/// Unknown placeholders are left untouched.
///
/// ```rust
/// use mod_api::render_template;
///
/// let text = render_template("{player} claimed {credits} cr.", &[("player", "Ana"), ("credits", "500")]);
/// assert_eq!(text, "Ana claimed 500 cr.");
/// ```
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in values {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}
