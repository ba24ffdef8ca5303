//! Shared handle around the scheduler.
//!
//! Ticks and chat commands arrive on different tasks; [`TriviaService`]
//! funnels both through one async mutex so they are applied one at a time.

use crate::bank::QuestionBank;
use crate::config::TriviaConfig;
use crate::result_store::PersistedRoundResult;
use crate::round::Phase;
use crate::scheduler::{AnswerOutcome, ClaimOutcome, JoinOutcome, TriviaScheduler};
use mod_api::{Clock, PlayerId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Point-in-time view of the scheduler for status displays and tests.
#[derive(Debug, Clone)]
pub struct TriviaSnapshot {
    pub phase: Phase,
    pub dry_run: bool,
    pub joined: Vec<PlayerId>,
    pub question_number: Option<usize>,
    pub question_total: usize,
    pub last_result: Option<PersistedRoundResult>,
}

#[derive(Clone)]
pub struct TriviaService {
    scheduler: Arc<Mutex<TriviaScheduler>>,
    clock: Arc<dyn Clock>,
}

impl TriviaService {
    pub fn new(scheduler: TriviaScheduler, clock: Arc<dyn Clock>) -> Self {
        Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            clock,
        }
    }

    /// Runs one scheduler tick at the clock's current time.
    pub async fn tick(&self) {
        let now = self.clock.now();
        self.scheduler.lock().await.on_tick(now).await;
    }

    /// Ticks every `period` until the returned task is aborted.
    pub fn spawn_ticker(&self, period: Duration) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!("Trivia ticker running every {:?}", period);
            loop {
                interval.tick().await;
                service.tick().await;
            }
        })
    }

    pub async fn join(&self, player: PlayerId) -> JoinOutcome {
        self.scheduler.lock().await.on_join(player)
    }

    pub async fn answer(&self, player: PlayerId, letter: &str) -> AnswerOutcome {
        self.scheduler.lock().await.on_answer(player, letter)
    }

    pub async fn claim(&self, player: PlayerId) -> ClaimOutcome {
        self.scheduler.lock().await.on_claim(player).await
    }

    pub async fn force_start(&self) -> bool {
        self.scheduler.lock().await.force_start()
    }

    pub async fn force_dry_run(&self, starter: PlayerId) -> bool {
        self.scheduler.lock().await.force_dry_run(starter)
    }

    pub async fn force_stop(&self) {
        self.scheduler.lock().await.force_stop();
    }

    pub async fn set_reward_credits(&self, credits: u64) {
        self.scheduler.lock().await.set_reward_credits(credits);
    }

    pub async fn reload(&self, config: TriviaConfig, bank: QuestionBank) {
        self.scheduler.lock().await.reload(config, bank);
    }

    pub async fn status_line(&self) -> String {
        self.scheduler.lock().await.status_line()
    }

    pub async fn snapshot(&self) -> TriviaSnapshot {
        let scheduler = self.scheduler.lock().await;
        let round = scheduler.round();
        TriviaSnapshot {
            phase: round.phase,
            dry_run: round.dry_run,
            joined: round.joined.iter().copied().collect(),
            question_number: round.question_index.map(|i| i + 1),
            question_total: round.questions.len(),
            last_result: scheduler.last_result().cloned(),
        }
    }
}
