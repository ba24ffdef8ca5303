//! Console-backed collaborators.
//!
//! The host has no game connection: chat output, reward commands and the
//! player roster all go through stdout and the event lines read from stdin.

use async_trait::async_trait;
use dashmap::DashMap;
use mod_api::{render_template, GrantError, Messenger, PlayerDirectory, PlayerId, Reward, RewardGrantor};
use std::io::Write;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One line of host output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    Broadcast(String),
    Private(PlayerId, String),
    /// A command for the game server's admin console.
    Command(String),
}

impl ConsoleLine {
    /// Prefixes every line of the text, so multi-line chat stays attributable.
    pub fn render(&self) -> String {
        let (prefix, text) = match self {
            ConsoleLine::Broadcast(text) => ("[all]".to_string(), text.as_str()),
            ConsoleLine::Private(player, text) => (format!("[to {player}]"), text.as_str()),
            ConsoleLine::Command(command) => ("[console]".to_string(), command.as_str()),
        };
        text.lines()
            .map(|line| format!("{prefix} {line}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub type ConsoleSender = mpsc::UnboundedSender<ConsoleLine>;
pub type ConsoleReceiver = mpsc::UnboundedReceiver<ConsoleLine>;

pub fn console_channel() -> (ConsoleSender, ConsoleReceiver) {
    mpsc::unbounded_channel()
}

/// Writes console lines to stdout until every sender is gone.
pub fn spawn_console_writer(mut rx: ConsoleReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{}", line.render()) {
                warn!("Failed to write console output: {}", e);
            }
        }
        debug!("Console writer stopped");
    })
}

#[derive(Debug, Clone)]
pub struct ConsoleMessenger {
    tx: ConsoleSender,
}

impl ConsoleMessenger {
    pub fn new(tx: ConsoleSender) -> Self {
        Self { tx }
    }

    fn push(&self, line: ConsoleLine) {
        if self.tx.send(line).is_err() {
            warn!("Console output closed; message dropped");
        }
    }
}

impl Messenger for ConsoleMessenger {
    fn broadcast(&self, text: &str) {
        self.push(ConsoleLine::Broadcast(text.to_string()));
    }

    fn send_private(&self, player: PlayerId, text: &str) {
        self.push(ConsoleLine::Private(player, text.to_string()));
    }
}

/// Pays credits by issuing a templated admin console command.
///
/// The template uses `{playerId}` and `{amount}`.
#[derive(Debug, Clone)]
pub struct ConsoleCommandGrantor {
    template: String,
    tx: ConsoleSender,
}

impl ConsoleCommandGrantor {
    pub fn new(template: impl Into<String>, tx: ConsoleSender) -> Self {
        Self {
            template: template.into(),
            tx,
        }
    }

    pub fn command_for(&self, player: PlayerId, reward: Reward) -> String {
        let Reward::Credits(amount) = reward;
        render_template(
            &self.template,
            &[("playerId", &player.to_string()), ("amount", &amount.to_string())],
        )
    }
}

#[async_trait]
impl RewardGrantor for ConsoleCommandGrantor {
    async fn grant(&self, player: PlayerId, reward: Reward) -> Result<(), GrantError> {
        if self.template.trim().is_empty() {
            return Err(GrantError::NotConfigured(
                "console command template is empty".to_string(),
            ));
        }
        let command = self.command_for(player, reward);
        self.tx
            .send(ConsoleLine::Command(command.clone()))
            .map_err(|_| GrantError::Transport("console output closed".to_string()))?;
        info!("Granted {} to player {} via '{}'", reward, player, command);
        Ok(())
    }
}

/// Players the host has seen connect, with the names they connected under.
#[derive(Debug, Default)]
pub struct ConnectedPlayers {
    names: DashMap<PlayerId, String>,
}

impl ConnectedPlayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, player: PlayerId, name: &str) {
        self.names.insert(player, name.trim().to_string());
    }

    pub fn disconnect(&self, player: PlayerId) -> bool {
        self.names.remove(&player).is_some()
    }

    pub fn is_connected(&self, player: PlayerId) -> bool {
        self.names.contains_key(&player)
    }

    pub fn count(&self) -> usize {
        self.names.len()
    }
}

#[async_trait]
impl PlayerDirectory for ConnectedPlayers {
    async fn lookup_name(&self, player: PlayerId) -> Option<String> {
        self.names
            .get(&player)
            .map(|entry| entry.value().clone())
            .filter(|name| !name.is_empty())
    }
}
