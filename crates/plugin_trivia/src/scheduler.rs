//! The trivia round state machine.
//!
//! [`TriviaScheduler`] owns the live [`Round`] and is the only thing that
//! mutates it. Time only moves forward through [`TriviaScheduler::on_tick`];
//! command handlers may shorten a deadline but never change phase
//! themselves, so every transition happens on the tick.
//!
//! The scheduler is not internally synchronised. Callers put it behind one
//! lock (see [`crate::service::TriviaService`]) so ticks and player commands
//! never interleave.

use crate::bank::{Letter, QuestionBank, RecencySet};
use crate::config::{ScheduleMode, TriviaConfig};
use crate::result_store::{PersistedRoundResult, ResultStore};
use crate::round::{Phase, Recorded, Round};
use chrono::{DateTime, Duration, Timelike, Utc};
use mod_api::{
    render_template, Clock, Messenger, NameCache, PlayerId, RandomPicker, Reward, RewardGrantor,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Collaborators the scheduler talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub random: Arc<dyn RandomPicker>,
    pub messenger: Arc<dyn Messenger>,
    pub grantor: Arc<dyn RewardGrantor>,
    pub names: NameCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined,
    NoJoinWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Correct,
    Incorrect,
    /// Dropped silently by the resubmission cooldown.
    Throttled,
    NoActiveQuestion,
    NotJoined,
    InvalidLetter,
    AlreadyAnswered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Granted,
    NothingToClaim,
    DryRunDenied,
    NotWinner,
    AlreadyClaimed,
    GrantFailed,
}

pub struct TriviaScheduler {
    config: TriviaConfig,
    bank: QuestionBank,
    recent: RecencySet,
    round: Round,
    result: Option<PersistedRoundResult>,
    result_store: ResultStore,
    answer_cooldowns: HashMap<PlayerId, DateTime<Utc>>,
    /// Hour slot (hours since the epoch) of the last scheduled start.
    last_scheduled_slot: Option<i64>,
    deps: Collaborators,
}

impl TriviaScheduler {
    /// Builds an idle scheduler. `result` is the previously persisted round,
    /// if any, so its winners can still claim.
    pub fn new(
        config: TriviaConfig,
        bank: QuestionBank,
        result_store: ResultStore,
        result: Option<PersistedRoundResult>,
        deps: Collaborators,
    ) -> Self {
        let now = deps.clock.now();
        let recent = RecencySet::new(config.recency_capacity());
        Self {
            config,
            bank,
            recent,
            round: Round::idle(now),
            result,
            result_store,
            answer_cooldowns: HashMap::new(),
            last_scheduled_slot: None,
            deps,
        }
    }

    /// Builds an idle scheduler, reading the last round result from
    /// `result_store`. An unreadable result is logged and ignored.
    pub async fn restore(
        config: TriviaConfig,
        bank: QuestionBank,
        result_store: ResultStore,
        deps: Collaborators,
    ) -> Self {
        let result = match result_store.load().await {
            Ok(result) => result,
            Err(e) => {
                error!("Ignoring unreadable round result: {}", e);
                None
            }
        };
        Self::new(config, bank, result_store, result, deps)
    }

    pub fn phase(&self) -> Phase {
        self.round.phase
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn last_result(&self) -> Option<&PersistedRoundResult> {
        self.result.as_ref()
    }

    pub fn config(&self) -> &TriviaConfig {
        &self.config
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    // ========================================================================
    // Tick driver
    // ========================================================================

    /// Drives every time-based transition. Call at least once a second.
    pub async fn on_tick(&mut self, now: DateTime<Utc>) {
        if self.round.phase == Phase::Idle {
            if self.should_start(now) {
                self.last_scheduled_slot = Some(hour_slot(now));
                self.begin_joining(now, false, None);
            }
            return;
        }

        if self.config.tick_every_seconds > 0 && now >= self.round.next_tick {
            self.progress(now);
            self.round.next_tick = now + seconds(self.config.tick_every_seconds);
        }

        if now >= self.round.phase_deadline {
            self.on_deadline(now).await;
        }
    }

    fn should_start(&self, now: DateTime<Utc>) -> bool {
        match self.config.schedule.mode {
            ScheduleMode::Hourly => {
                now.minute() == self.config.schedule.minute
                    && self.last_scheduled_slot != Some(hour_slot(now))
            }
            ScheduleMode::Manual => false,
        }
    }

    async fn on_deadline(&mut self, now: DateTime<Utc>) {
        match self.round.phase {
            Phase::Idle => {}
            Phase::Joining => self.start_round_or_abort(now),
            Phase::Asking => self.begin_reveal(now),
            Phase::Reveal => self.next_or_finish(now),
            Phase::Finished => {
                self.announce_winners(now).await;
                self.begin_claimable(now);
            }
            Phase::Claimable => {
                self.round = Round::idle(now);
                info!("Claim window closed -> Idle");
            }
        }
    }

    /// Countdown broadcast while joining or asking.
    fn progress(&self, now: DateTime<Utc>) {
        let secs_left = seconds_left(now, self.round.phase_deadline);
        if secs_left == 0 {
            return;
        }
        let messages = &self.config.messages;
        let secs = secs_left.to_string();
        match self.round.phase {
            Phase::Joining => {
                let count = self.round.joined.len().to_string();
                self.broadcast(render_template(
                    &messages.join_tick,
                    &[("secs", &secs), ("count", &count)],
                ));
            }
            Phase::Asking => {
                self.broadcast(render_template(&messages.tick, &[("secs", &secs)]));
            }
            _ => {}
        }
    }

    // ========================================================================
    // Phase transitions
    // ========================================================================

    /// Opens a fresh join window, discarding any previous round state.
    pub fn begin_joining(&mut self, now: DateTime<Utc>, dry_run: bool, starter: Option<PlayerId>) {
        let join_seconds = self.config.effective_join_window();

        let mut round = Round::idle(now);
        round.dry_run = dry_run;
        round.starter = starter;
        round.enter(Phase::Joining, now, now + seconds(join_seconds));
        round.next_tick = now;
        self.round = round;
        self.answer_cooldowns.clear();

        let announce = render_template(
            &self.config.messages.announce,
            &[("join", &join_seconds.to_string())],
        );
        self.broadcast(self.tagged(announce));

        if let (true, Some(starter)) = (dry_run, starter) {
            self.round.join(starter);
            self.send_private(starter, &self.config.messages.dry_run_auto_joined);
        }

        info!("Join window open {}s (dry_run={})", join_seconds, dry_run);
    }

    fn start_round_or_abort(&mut self, now: DateTime<Utc>) {
        let joined = self.round.joined.len();
        let min_players = self.config.min_players;
        if !self.round.dry_run && joined < min_players {
            let text = render_template(
                &self.config.messages.not_enough_players,
                &[("need", &min_players.to_string()), ("got", &joined.to_string())],
            );
            self.broadcast(text);
            self.round = Round::idle(now);
            info!("Round canceled: {} < {} players", joined, min_players);
            return;
        }

        let picked = self.bank.select(
            self.config.question_count,
            &mut self.recent,
            self.deps.random.as_ref(),
        );
        if picked.is_empty() {
            self.broadcast(self.config.messages.no_questions.clone());
            self.round = Round::idle(now);
            warn!("Round canceled: question bank is empty");
            return;
        }
        if picked.len() < self.config.question_count {
            warn!(
                "Only {} of {} questions available; asking a shorter round",
                picked.len(),
                self.config.question_count
            );
        }

        self.round.questions = picked;
        self.begin_question(now, 0);
    }

    fn begin_question(&mut self, now: DateTime<Utc>, index: usize) {
        self.round.question_index = Some(index);
        self.round.answered.clear();

        let Some(rq) = self.round.current_question() else {
            error!("Question {} missing from round of {}", index, self.round.questions.len());
            self.round = Round::idle(now);
            return;
        };

        let messages = &self.config.messages;
        let question = render_template(
            &messages.question,
            &[
                ("n", &(index + 1).to_string()),
                ("total", &self.round.questions.len().to_string()),
                ("question", &rq.question.text),
            ],
        );
        let options = render_template(
            &messages.options,
            &[
                ("A", rq.choice(Letter::A)),
                ("B", rq.choice(Letter::B)),
                ("C", rq.choice(Letter::C)),
                ("D", rq.choice(Letter::D)),
            ],
        );
        self.broadcast(format!("{question}\n{options}"));

        let deadline = now + seconds(self.config.question_time_seconds);
        self.round.enter(Phase::Asking, now, deadline);
        self.round.next_tick = now + seconds(self.config.tick_every_seconds);
        debug!(
            "Q{}/{} ends at {}",
            index + 1,
            self.round.questions.len(),
            self.round.phase_deadline.to_rfc3339()
        );
    }

    fn begin_reveal(&mut self, now: DateTime<Utc>) {
        if let Some(rq) = self.round.current_question() {
            let text = render_template(
                &self.config.messages.reveal,
                &[("letter", &rq.correct.to_string()), ("text", rq.correct_text())],
            );
            self.broadcast(text);
        }
        let deadline = now + seconds(self.config.reveal_pause_seconds);
        self.round.enter(Phase::Reveal, now, deadline);
    }

    fn next_or_finish(&mut self, now: DateTime<Utc>) {
        match self.round.question_index {
            Some(index) if self.round.has_next_question() => self.begin_question(now, index + 1),
            _ => {
                let deadline = now + seconds(self.config.finish_pause_seconds);
                self.round.enter(Phase::Finished, now, deadline);
            }
        }
    }

    async fn announce_winners(&mut self, now: DateTime<Utc>) {
        let (top, winners) = self.round.winners(self.config.allow_zero_score_winners);
        let dry_run = self.round.dry_run;
        let messages = &self.config.messages;

        let text = if winners.is_empty() {
            self.tagged(messages.round_no_win.clone())
        } else {
            let names: Vec<String> = winners
                .iter()
                .map(|p| self.deps.names.display_name(*p))
                .collect();
            let announcement = render_template(
                &messages.round_win,
                &[
                    ("score", &top.to_string()),
                    ("total", &self.round.questions.len().to_string()),
                    ("winners", &names.join(", ")),
                ],
            );
            let follow_up = if dry_run {
                messages.dry_run_claim_notice.clone()
            } else {
                render_template(
                    &messages.claimable,
                    &[("credits", &self.config.reward.credits.to_string())],
                )
            };
            format!("{}\n{}", self.tagged(announcement), follow_up)
        };
        self.broadcast(text);

        info!("Round finished: {} winner(s) with {} point(s)", winners.len(), top);
        self.result = Some(PersistedRoundResult::new(now, dry_run, winners));
        self.persist_result().await;
    }

    fn begin_claimable(&mut self, now: DateTime<Utc>) {
        let minutes = self.config.effective_claim_window();
        let deadline = now + Duration::minutes(i64::from(minutes));
        self.round.enter(Phase::Claimable, now, deadline);
        info!("Claims open for ~{} minutes (dry_run={})", minutes, self.round.dry_run);
    }

    // ========================================================================
    // Player commands
    // ========================================================================

    pub fn on_join(&mut self, player: PlayerId) -> JoinOutcome {
        if self.round.phase != Phase::Joining {
            self.send_private(player, &self.config.messages.no_join_window);
            return JoinOutcome::NoJoinWindow;
        }
        if !self.round.join(player) {
            return JoinOutcome::AlreadyJoined;
        }
        let confirm = self.tagged(self.config.messages.join_confirm.clone());
        self.send_private(player, &confirm);
        debug!("Player {} joined ({} total)", player, self.round.joined.len());
        JoinOutcome::Joined
    }

    pub fn on_answer(&mut self, player: PlayerId, raw_letter: &str) -> AnswerOutcome {
        let messages = &self.config.messages;
        if self.round.phase != Phase::Asking {
            self.send_private(player, &messages.no_active_question);
            return AnswerOutcome::NoActiveQuestion;
        }
        if !self.round.is_joined(player) {
            self.send_private(player, &messages.not_joined);
            return AnswerOutcome::NotJoined;
        }
        let Some(letter) = Letter::parse(raw_letter) else {
            self.send_private(player, &messages.invalid_letter);
            return AnswerOutcome::InvalidLetter;
        };

        let now = self.deps.clock.now();
        if let Some(until) = self.answer_cooldowns.get(&player) {
            if now < *until {
                debug!("Dropping answer spam from player {}", player);
                return AnswerOutcome::Throttled;
            }
        }
        self.answer_cooldowns
            .insert(player, now + seconds(self.config.answer_cooldown_seconds));

        let outcome = match self.round.record_answer(player, letter) {
            Recorded::Correct => AnswerOutcome::Correct,
            Recorded::Incorrect => AnswerOutcome::Incorrect,
            Recorded::AlreadyAnswered => {
                self.send_private(player, &self.config.messages.already_answered);
                return AnswerOutcome::AlreadyAnswered;
            }
            Recorded::NoQuestion => {
                error!("Asking phase without a current question");
                self.send_private(player, &self.config.messages.no_active_question);
                return AnswerOutcome::NoActiveQuestion;
            }
        };

        if self.round.everyone_answered() {
            // Fast-forward: the next tick performs the reveal.
            self.round.phase_deadline = now.max(self.round.phase_started);
            debug!("Everyone answered; question ends on next tick");
        }
        outcome
    }

    pub async fn on_claim(&mut self, player: PlayerId) -> ClaimOutcome {
        let messages = &self.config.messages;
        let Some(result) = self.result.as_ref() else {
            self.send_private(player, &messages.nothing_to_claim);
            return ClaimOutcome::NothingToClaim;
        };
        if result.dry_run || self.round.dry_run {
            self.send_private(player, &messages.dry_run_claim_denied);
            return ClaimOutcome::DryRunDenied;
        }
        if !result.is_winner(player) {
            self.send_private(player, &messages.not_winner);
            return ClaimOutcome::NotWinner;
        }
        if result.has_claimed(player) {
            self.send_private(player, &messages.already_claimed);
            return ClaimOutcome::AlreadyClaimed;
        }

        let round_id = result.round_id.clone();
        let credits = self.config.reward.credits;
        let granted = if credits == 0 {
            Ok(())
        } else {
            self.deps.grantor.grant(player, Reward::Credits(credits)).await
        };
        if let Err(e) = granted {
            warn!("Failed to pay player {} for round {}: {}", player, round_id, e);
            self.send_private(player, &self.config.messages.grant_failed);
            return ClaimOutcome::GrantFailed;
        }

        if let Some(result) = self.result.as_mut() {
            result.record_claim(player);
        }
        self.persist_result().await;

        let text = render_template(
            &self.config.messages.claimed,
            &[
                ("player", &self.deps.names.display_name(player)),
                ("credits", &credits.to_string()),
            ],
        );
        self.broadcast(text);
        info!("Player {} claimed {} credits for round {}", player, credits, round_id);
        ClaimOutcome::Granted
    }

    // ========================================================================
    // Admin controls
    // ========================================================================

    /// Starts a normal round now. No-op unless idle.
    pub fn force_start(&mut self) -> bool {
        if self.round.phase != Phase::Idle {
            return false;
        }
        let now = self.deps.clock.now();
        self.begin_joining(now, false, None);
        true
    }

    /// Starts a payout-free test round with `starter` auto-joined. No-op
    /// unless idle.
    pub fn force_dry_run(&mut self, starter: PlayerId) -> bool {
        if self.round.phase != Phase::Idle {
            return false;
        }
        let now = self.deps.clock.now();
        self.begin_joining(now, true, Some(starter));
        true
    }

    /// Aborts whatever is running.
    pub fn force_stop(&mut self) {
        let now = self.deps.clock.now();
        let was = self.round.phase;
        self.round = Round::idle(now);
        self.answer_cooldowns.clear();
        self.broadcast(self.config.messages.aborted.clone());
        info!("Round aborted by admin (was {})", was);
    }

    pub fn set_reward_credits(&mut self, credits: u64) {
        self.config.reward.credits = credits;
        info!("Reward set to {} credits", credits);
    }

    /// Swaps in new settings and questions. The live round keeps the
    /// questions it already selected.
    pub fn reload(&mut self, config: TriviaConfig, bank: QuestionBank) {
        self.recent.set_capacity(config.recency_capacity());
        self.config = config;
        self.bank = bank;
        info!("Config & questions reloaded ({} questions)", self.bank.len());
    }

    pub fn status_line(&self) -> String {
        let tag = if self.round.dry_run { " (dry-run)" } else { "" };
        let round = &self.round;
        let number = round.question_index.map(|i| i + 1).unwrap_or(0);
        match round.phase {
            Phase::Idle => match self.config.schedule.mode {
                ScheduleMode::Hourly => format!(
                    "[TRIVIA] Idle. Next start: minute {:02} of the hour.",
                    self.config.schedule.minute
                ),
                ScheduleMode::Manual => "[TRIVIA] Idle. Rounds start on admin request.".to_string(),
            },
            Phase::Joining => format!("[TRIVIA] Joining{tag}: {} joined.", round.joined.len()),
            Phase::Asking => format!(
                "[TRIVIA] Question {}/{}{tag}. Players: {}.",
                number,
                round.questions.len(),
                round.joined.len()
            ),
            Phase::Reveal => format!("[TRIVIA] Revealing Q{number}{tag}."),
            Phase::Finished => format!("[TRIVIA] Computing winners{tag}..."),
            Phase::Claimable => format!("[TRIVIA] Winners may /claim{tag}."),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn tagged(&self, text: String) -> String {
        if self.round.dry_run {
            format!("{}{}", text, self.config.messages.dry_run_tag)
        } else {
            text
        }
    }

    fn broadcast(&self, text: String) {
        self.deps.messenger.broadcast(&text);
    }

    fn send_private(&self, player: PlayerId, text: &str) {
        self.deps.messenger.send_private(player, text);
    }

    async fn persist_result(&self) {
        let Some(result) = self.result.as_ref() else {
            return;
        };
        if let Err(e) = self.result_store.save(result).await {
            error!("Failed to persist round result {}: {}", result.round_id, e);
        }
    }
}

fn seconds(secs: u32) -> Duration {
    Duration::seconds(i64::from(secs))
}

fn hour_slot(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(3600)
}

/// Whole seconds until `deadline`, rounded up; zero once it has passed.
fn seconds_left(now: DateTime<Utc>, deadline: DateTime<Utc>) -> i64 {
    let millis = (deadline - now).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis + 999) / 1000
    }
}
