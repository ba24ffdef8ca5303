//! Chat command parsing.
//!
//! Matching is case-insensitive. Text that is not one of these commands is
//! ordinary chat and parses to `None`.

use mod_api::PlayerId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    TriviaJoin,
    TriviaStart,
    TriviaDryRun,
    TriviaStop,
    TriviaStatus,
    TriviaReload,
    TriviaReward(u64),
    /// `/a <letter>`; the letter is validated by the scheduler.
    Answer(String),
    Claim,
    OpenBackpack(u8),
    AdminOpenBackpack { target: PlayerId, slot: u8 },
}

/// A recognised command with bad arguments. The message is shown to the
/// sender as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("[TRIVIA] Usage: /trivia reward <credits>")]
    RewardUsage,

    #[error("[Backpack] Usage: /vbopen <playerId> <slot>")]
    AdminOpenUsage,
}

impl CommandError {
    /// Usage help only goes to players allowed to run the command.
    pub fn admin_only(&self) -> bool {
        matches!(self, CommandError::AdminOpenUsage)
    }
}

pub fn parse(text: &str) -> Option<Result<ChatCommand, CommandError>> {
    let msg = text.trim().to_lowercase();
    let words: Vec<&str> = msg.split_whitespace().collect();

    // `/trivia join` also accepts trailing text
    if msg.starts_with("/trivia join") {
        return Some(Ok(ChatCommand::TriviaJoin));
    }

    let command = match words.as_slice() {
        ["/a"] => ChatCommand::Answer(String::new()),
        ["/a", letter, ..] => ChatCommand::Answer(letter.to_string()),
        ["/claim"] => ChatCommand::Claim,
        ["/trivia", "start"] => ChatCommand::TriviaStart,
        ["/trivia", "dryrun"] => ChatCommand::TriviaDryRun,
        ["/trivia", "stop"] => ChatCommand::TriviaStop,
        ["/trivia", "status"] => ChatCommand::TriviaStatus,
        ["/trivia", "reload"] => ChatCommand::TriviaReload,
        ["/trivia", "reward", rest @ ..] => {
            return Some(match rest {
                [credits] => credits
                    .parse()
                    .map(ChatCommand::TriviaReward)
                    .map_err(|_| CommandError::RewardUsage),
                _ => Err(CommandError::RewardUsage),
            })
        }
        ["/vbopen", rest @ ..] => {
            return Some(match rest {
                [target, slot] => match (target.parse(), slot.parse()) {
                    (Ok(target), Ok(slot)) => Ok(ChatCommand::AdminOpenBackpack { target, slot }),
                    _ => Err(CommandError::AdminOpenUsage),
                },
                _ => Err(CommandError::AdminOpenUsage),
            })
        }
        [word] => {
            let slot = word.strip_prefix("/vb")?.parse().ok()?;
            ChatCommand::OpenBackpack(slot)
        }
        _ => return None,
    };
    Some(Ok(command))
}
