//! # Mod host
//!
//! Runs the trivia and backpack mods against a console: host events are
//! read line by line from stdin and everything the mods say or pay out is
//! written to stdout.

pub mod args;
pub mod commands;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod signals;

pub use args::Args;
pub use commands::{ChatCommand, CommandError};
pub use config::{load_config, HostConfig, LoggingSettings};
pub use console::{
    console_channel, spawn_console_writer, ConnectedPlayers, ConsoleCommandGrantor, ConsoleLine,
    ConsoleMessenger, ConsoleReceiver, ConsoleSender,
};
pub use dispatcher::{Dispatcher, HostError, HostEvent, HostResult, ReloadSource};

use anyhow::{Context, Result};
use mod_api::{Clock, Messenger, NameCache, RandomPicker, RewardGrantor};
use plugin_backpack::{
    Backpack, BackpackService, RecordStore, StarterKitPolicy, TokioFileSystem,
};
use plugin_trivia::{Collaborators, QuestionBank, ResultStore, TriviaScheduler, TriviaService};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Everything the host runs, wired together.
pub struct Host {
    pub dispatcher: Dispatcher,
    pub trivia: TriviaService,
    pub backpack: Arc<BackpackService>,
    pub players: Arc<ConnectedPlayers>,
}

/// Builds both mods on top of the console collaborators.
///
/// Creates the data directories, seeds the question bank if needed and
/// restores the last trivia result.
pub async fn build_host(
    config: &HostConfig,
    config_path: &Path,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomPicker>,
    console: ConsoleSender,
) -> Result<Host> {
    let backpack_dir = config.backpack_dir();
    tokio::fs::create_dir_all(&backpack_dir)
        .await
        .with_context(|| format!("Failed to create {}", backpack_dir.display()))?;

    let players = Arc::new(ConnectedPlayers::new());
    let names = NameCache::with_directory(players.clone());
    let messenger: Arc<dyn Messenger> = Arc::new(ConsoleMessenger::new(console.clone()));
    let grantor: Arc<dyn RewardGrantor> = Arc::new(ConsoleCommandGrantor::new(
        config.trivia.reward.console_command_template.clone(),
        console,
    ));

    // Trivia
    let questions_path = config.questions_path();
    let bank = QuestionBank::load_or_seed(&questions_path)
        .await
        .with_context(|| format!("Failed to load questions from {}", questions_path.display()))?;
    let deps = Collaborators {
        clock: clock.clone(),
        random,
        messenger: messenger.clone(),
        grantor: grantor.clone(),
        names: names.clone(),
    };
    let scheduler = TriviaScheduler::restore(
        config.trivia.clone(),
        bank,
        ResultStore::new(config.trivia_state_path()),
        deps,
    )
    .await;
    let trivia = TriviaService::new(scheduler, clock.clone());

    // Backpacks
    let mut store = RecordStore::<Backpack>::new(&backpack_dir, Arc::new(TokioFileSystem), clock);
    if config.backpack.starter_slot > 0 {
        store = store.with_initial_records(Arc::new(StarterKitPolicy::new(
            config.starter_kit_path(),
            config.backpack.starter_slot,
        )));
    }
    let backpack = Arc::new(BackpackService::new(
        config.backpack.clone(),
        Arc::new(store),
        messenger.clone(),
        grantor,
    ));

    let dispatcher = Dispatcher::new(
        trivia.clone(),
        backpack.clone(),
        names,
        players.clone(),
        messenger,
        ReloadSource {
            config_path: config_path.to_path_buf(),
            questions_path,
        },
    );

    info!(
        "Mods ready: data in {}, {} backpack slots",
        config.data_dir.display(),
        config.backpack.player_slots
    );
    Ok(Host {
        dispatcher,
        trivia,
        backpack,
        players,
    })
}
