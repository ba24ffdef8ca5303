//! Turns host event lines into mod calls.
//!
//! Lines look like:
//!
//! ```text
//! connect <playerId> <name>
//! disconnect <playerId>
//! chat <playerId> <text>
//! close <playerId> <items as JSON>
//! ```

use crate::commands::{self, ChatCommand, CommandError};
use crate::config::load_config;
use crate::console::ConnectedPlayers;
use mod_api::{Messenger, NameCache, PlayerId};
use plugin_backpack::{BackpackError, BackpackService, ItemStack, OpenedBackpack, StoredRecord};
use plugin_trivia::{QuestionBank, TriviaService};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Unknown host event '{0}'")]
    UnknownEvent(String),

    #[error("Missing {0} in host event")]
    MissingArgument(&'static str),

    #[error("Invalid player id '{0}'")]
    InvalidPlayerId(String),

    #[error("Invalid item list: {0}")]
    InvalidItems(#[from] serde_json::Error),
}

pub type HostResult<T> = Result<T, HostError>;

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Connect { player: PlayerId, name: String },
    Disconnect(PlayerId),
    Chat { player: PlayerId, text: String },
    Close { player: PlayerId, items: Vec<ItemStack> },
}

impl HostEvent {
    pub fn parse(line: &str) -> HostResult<Self> {
        let line = line.trim();
        let (kind, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim_start();
        let (id, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let tail = tail.trim();

        let player = || -> HostResult<PlayerId> {
            if id.is_empty() {
                return Err(HostError::MissingArgument("player id"));
            }
            id.parse()
                .map_err(|_| HostError::InvalidPlayerId(id.to_string()))
        };

        match kind {
            "connect" => Ok(HostEvent::Connect {
                player: player()?,
                name: tail.to_string(),
            }),
            "disconnect" => Ok(HostEvent::Disconnect(player()?)),
            "chat" => Ok(HostEvent::Chat {
                player: player()?,
                text: tail.to_string(),
            }),
            "close" => {
                let player = player()?;
                if tail.is_empty() {
                    return Err(HostError::MissingArgument("item list"));
                }
                Ok(HostEvent::Close {
                    player,
                    items: serde_json::from_str(tail)?,
                })
            }
            other => Err(HostError::UnknownEvent(other.to_string())),
        }
    }
}

/// Where `/trivia reload` reads from.
#[derive(Debug, Clone)]
pub struct ReloadSource {
    pub config_path: PathBuf,
    pub questions_path: PathBuf,
}

pub struct Dispatcher {
    trivia: TriviaService,
    backpack: Arc<BackpackService>,
    names: NameCache,
    players: Arc<ConnectedPlayers>,
    messenger: Arc<dyn Messenger>,
    reload: ReloadSource,
}

impl Dispatcher {
    pub fn new(
        trivia: TriviaService,
        backpack: Arc<BackpackService>,
        names: NameCache,
        players: Arc<ConnectedPlayers>,
        messenger: Arc<dyn Messenger>,
        reload: ReloadSource,
    ) -> Self {
        Self {
            trivia,
            backpack,
            names,
            players,
            messenger,
            reload,
        }
    }

    pub async fn handle_line(&self, line: &str) -> HostResult<()> {
        if line.trim().is_empty() {
            return Ok(());
        }
        let event = HostEvent::parse(line)?;
        self.handle(event).await;
        Ok(())
    }

    pub async fn handle(&self, event: HostEvent) {
        match event {
            HostEvent::Connect { player, name } => {
                self.players.connect(player, &name);
                info!("Player {} connected ({} online)", player, self.players.count());
            }
            HostEvent::Disconnect(player) => {
                self.players.disconnect(player);
                self.names.forget(player);
                self.backpack.abandon(player);
                info!("Player {} disconnected", player);
            }
            HostEvent::Chat { player, text } => self.on_chat(player, &text).await,
            HostEvent::Close { player, items } => {
                match self.backpack.close(player, items).await {
                    Ok(outcome) => debug!("Player {} closed backpack: {:?}", player, outcome),
                    Err(BackpackError::NoOpenBackpack(_)) => {
                        warn!("Player {} closed a backpack that was not open", player)
                    }
                    Err(e) => error!("Closing backpack for player {} failed: {}", player, e),
                }
            }
        }
    }

    async fn on_chat(&self, player: PlayerId, text: &str) {
        let command = match commands::parse(text) {
            None => return,
            Some(Ok(command)) => command,
            Some(Err(e)) => return self.reject(player, e),
        };
        debug!("Player {} issued {:?}", player, command);

        match command {
            ChatCommand::TriviaJoin => {
                self.trivia.join(player).await;
            }
            ChatCommand::Answer(letter) => {
                self.trivia.answer(player, &letter).await;
            }
            ChatCommand::Claim => {
                self.trivia.claim(player).await;
            }
            ChatCommand::TriviaStart => {
                if !self.trivia.force_start().await {
                    self.tell(player, "[TRIVIA] A round is already running.");
                }
            }
            ChatCommand::TriviaDryRun => {
                if !self.trivia.force_dry_run(player).await {
                    self.tell(player, "[TRIVIA] A round is already running.");
                }
            }
            ChatCommand::TriviaStop => self.trivia.force_stop().await,
            ChatCommand::TriviaStatus => {
                let status = self.trivia.status_line().await;
                self.tell(player, &status);
            }
            ChatCommand::TriviaReload => self.reload_trivia(player).await,
            ChatCommand::TriviaReward(credits) => {
                self.trivia.set_reward_credits(credits).await;
                self.tell(player, &format!("[TRIVIA] Reward set to {credits} cr."));
            }
            ChatCommand::OpenBackpack(slot) => {
                if let Ok(opened) = self.backpack.open(player, slot).await {
                    self.show(player, &opened);
                }
            }
            ChatCommand::AdminOpenBackpack { target, slot } => {
                if let Ok(opened) = self.backpack.admin_open(player, target, slot).await {
                    self.show(player, &opened);
                }
            }
        }
    }

    fn reject(&self, player: PlayerId, error: CommandError) {
        if error.admin_only() && !self.backpack.is_admin(player) {
            self.tell(player, "[Backpack] You do not have permission to use /vbopen.");
        } else {
            self.tell(player, &error.to_string());
        }
    }

    async fn reload_trivia(&self, player: PlayerId) {
        let config = match load_config(&self.reload.config_path).await {
            Ok(config) => config.trivia,
            Err(e) => {
                error!("Trivia reload failed: {:#}", e);
                self.tell(player, "[TRIVIA] Reload failed. Check the server log.");
                return;
            }
        };
        if let Err(e) = config.validate() {
            error!("Trivia reload rejected: {}", e);
            self.tell(player, "[TRIVIA] Reload failed. Check the server log.");
            return;
        }
        let bank = match QuestionBank::load_or_seed(&self.reload.questions_path).await {
            Ok(bank) => bank,
            Err(e) => {
                error!("Question reload failed: {}", e);
                self.tell(player, "[TRIVIA] Reload failed. Check the server log.");
                return;
            }
        };
        self.trivia.reload(config, bank).await;
        self.tell(player, "[TRIVIA] Config & questions reloaded.");
    }

    fn show(&self, viewer: PlayerId, opened: &OpenedBackpack) {
        self.tell(
            viewer,
            &format!(
                "[Backpack] {}: {} of {} slots used.",
                opened.title,
                opened.backpack.occupied(),
                opened.backpack.slot_count()
            ),
        );
    }

    fn tell(&self, player: PlayerId, text: &str) {
        self.messenger.send_private(player, text);
    }
}
