//! End-to-end routing of host event lines through both mods.

use mod_api::{ManualClock, PlayerId, RandomPicker};
use mod_host::{build_host, console_channel, ConsoleLine, ConsoleReceiver, Host, HostConfig};
use plugin_trivia::{Phase, ScheduleMode};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const ADMIN: PlayerId = PlayerId(99);
const OWNER: PlayerId = PlayerId(42);

struct Identity;

impl RandomPicker for Identity {
    fn permutation(&self, len: usize) -> Vec<usize> {
        (0..len).collect()
    }

    fn pick(&self, _n: usize) -> usize {
        0
    }
}

struct Fixture {
    _dir: TempDir,
    config_path: PathBuf,
    data_dir: PathBuf,
    clock: Arc<ManualClock>,
    host: Host,
    console: ConsoleReceiver,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let data_dir = dir.path().join("data");

        let mut config = HostConfig::default();
        config.data_dir = data_dir.clone();
        config.trivia.schedule.mode = ScheduleMode::Manual;
        config.trivia.min_players = 1;
        config.trivia.question_count = 1;
        config.backpack.admin_ids = vec![ADMIN];
        tokio::fs::write(&config_path, toml::to_string_pretty(&config).unwrap())
            .await
            .unwrap();

        let clock = Arc::new(ManualClock::at(2025, 1, 1, 10, 0, 0));
        let (tx, console) = console_channel();
        let host = build_host(&config, &config_path, clock.clone(), Arc::new(Identity), tx)
            .await
            .unwrap();

        Self {
            _dir: dir,
            config_path,
            data_dir,
            clock,
            host,
            console,
        }
    }

    async fn send(&self, line: &str) {
        self.host.dispatcher.handle_line(line).await.unwrap();
    }

    async fn chat(&self, player: PlayerId, text: &str) {
        self.send(&format!("chat {} {}", player, text)).await;
    }

    async fn advance(&self, secs: i64) {
        self.clock.advance_secs(secs);
        self.host.trivia.tick().await;
    }

    fn drain(&mut self) -> Vec<ConsoleLine> {
        let mut lines = Vec::new();
        while let Ok(line) = self.console.try_recv() {
            lines.push(line);
        }
        lines
    }

    fn privates_to(&mut self, player: PlayerId) -> Vec<String> {
        self.drain()
            .into_iter()
            .filter_map(|line| match line {
                ConsoleLine::Private(to, text) if to == player => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[tokio::test]
async fn test_plain_chat_is_ignored() {
    let mut fx = Fixture::new().await;
    fx.send("connect 1 Ana").await;
    fx.chat(PlayerId(1), "anyone up for trivia?").await;
    fx.send("").await;
    assert!(fx.drain().is_empty());
}

#[tokio::test]
async fn test_malformed_lines_are_errors() {
    let fx = Fixture::new().await;
    assert!(fx.host.dispatcher.handle_line("wave 1").await.is_err());
    assert!(fx.host.dispatcher.handle_line("chat abc /claim").await.is_err());
}

#[tokio::test]
async fn test_trivia_admin_commands() {
    let mut fx = Fixture::new().await;
    let ana = PlayerId(1);

    fx.chat(ana, "/trivia status").await;
    let status = fx.privates_to(ana);
    assert_eq!(status.len(), 1);
    assert!(status[0].starts_with("[TRIVIA] Idle"));

    fx.chat(ana, "/trivia start").await;
    assert!(fx.drain().iter().any(|l| matches!(l, ConsoleLine::Broadcast(_))));
    assert_eq!(fx.host.trivia.snapshot().await.phase, Phase::Joining);

    fx.chat(ana, "/trivia start").await;
    assert_eq!(fx.privates_to(ana), vec!["[TRIVIA] A round is already running."]);

    fx.chat(ana, "/TRIVIA JOIN").await;
    assert_eq!(fx.privates_to(ana).len(), 1);
    assert_eq!(fx.host.trivia.snapshot().await.joined, vec![ana]);

    fx.chat(ana, "/trivia stop").await;
    assert_eq!(fx.host.trivia.snapshot().await.phase, Phase::Idle);

    fx.chat(ana, "/trivia reward 10").await;
    assert_eq!(fx.privates_to(ana), vec!["[TRIVIA] Reward set to 10 cr."]);

    fx.chat(ana, "/trivia reward lots").await;
    assert_eq!(
        fx.privates_to(ana),
        vec!["[TRIVIA] Usage: /trivia reward <credits>"]
    );
}

#[tokio::test]
async fn test_round_claim_pays_through_console() {
    let mut fx = Fixture::new().await;
    let ana = PlayerId(1);
    fx.send("connect 1 Ana").await;

    fx.chat(ana, "/trivia start").await;
    fx.chat(ana, "/trivia join").await;
    fx.advance(60).await;
    assert_eq!(fx.host.trivia.snapshot().await.phase, Phase::Asking);

    // the first seed question's answer is its first choice
    fx.chat(ana, "/a a").await;
    fx.advance(1).await;
    fx.advance(2).await;
    fx.advance(1).await;
    assert_eq!(fx.host.trivia.snapshot().await.phase, Phase::Claimable);
    fx.drain();

    fx.chat(ana, "/claim").await;
    let lines = fx.drain();
    assert!(lines.contains(&ConsoleLine::Command("credits add 1 50000".to_string())));
    assert!(lines.iter().any(|l| matches!(l, ConsoleLine::Broadcast(_))));

    let result = fx.host.trivia.snapshot().await.last_result.unwrap();
    assert!(result.has_claimed(ana));
    assert!(fx.data_dir.join("trivia_state.json").exists());
}

#[tokio::test]
async fn test_reload_reads_config_file() {
    let mut fx = Fixture::new().await;
    let ana = PlayerId(1);

    let mut config = HostConfig::default();
    config.trivia.reward.credits = 777;
    tokio::fs::write(&fx.config_path, toml::to_string_pretty(&config).unwrap())
        .await
        .unwrap();

    fx.chat(ana, "/trivia reload").await;
    assert_eq!(fx.privates_to(ana), vec!["[TRIVIA] Config & questions reloaded."]);

    tokio::fs::write(&fx.config_path, "trivia = 3").await.unwrap();
    fx.chat(ana, "/trivia reload").await;
    assert_eq!(
        fx.privates_to(ana),
        vec!["[TRIVIA] Reload failed. Check the server log."]
    );
}

#[tokio::test]
async fn test_backpack_open_close_reopen() {
    let mut fx = Fixture::new().await;
    fx.send("connect 42 Rook").await;

    fx.chat(OWNER, "/vb1").await;
    assert_eq!(
        fx.privates_to(OWNER),
        vec!["[Backpack] Virtual Backpack 1: 0 of 40 slots used."]
    );

    fx.send(r#"close 42 [{"id":12,"count":3,"slotIdx":0}]"#).await;
    assert!(fx.data_dir.join("backpacks").join("42.vb1.json").exists());

    fx.chat(OWNER, "/vb1").await;
    assert_eq!(
        fx.privates_to(OWNER),
        vec!["[Backpack] Virtual Backpack 1: 1 of 40 slots used."]
    );

    fx.chat(OWNER, "/vb9").await;
    assert_eq!(fx.privates_to(OWNER), vec!["[Backpack] Backpack slots are 1-6."]);
}

#[tokio::test]
async fn test_vbopen_permissions() {
    let mut fx = Fixture::new().await;
    let intruder = PlayerId(5);

    fx.chat(intruder, "/vbopen 42 1").await;
    assert_eq!(
        fx.privates_to(intruder),
        vec!["[Backpack] You do not have permission to use /vbopen."]
    );

    fx.chat(intruder, "/vbopen 42").await;
    assert_eq!(
        fx.privates_to(intruder),
        vec!["[Backpack] You do not have permission to use /vbopen."]
    );

    fx.chat(ADMIN, "/vbopen 42").await;
    assert_eq!(
        fx.privates_to(ADMIN),
        vec!["[Backpack] Usage: /vbopen <playerId> <slot>"]
    );
}

#[tokio::test]
async fn test_disconnect_releases_backpack() {
    let mut fx = Fixture::new().await;
    fx.send("connect 42 Rook").await;
    fx.chat(OWNER, "/vb2").await;
    fx.drain();

    fx.chat(ADMIN, "/vbopen 42 2").await;
    assert_eq!(
        fx.privates_to(ADMIN),
        vec!["[Backpack] Backpack 42:2 is already in use."]
    );

    fx.send("disconnect 42").await;
    assert!(fx.host.backpack.open_key(OWNER).is_none());
    assert!(!fx.host.players.is_connected(OWNER));

    fx.chat(ADMIN, "/vbopen 42 2").await;
    assert_eq!(
        fx.privates_to(ADMIN),
        vec!["[Backpack] Virtual Backpack 2 (player 42): 0 of 40 slots used."]
    );
}
