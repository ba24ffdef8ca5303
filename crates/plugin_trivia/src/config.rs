//! Trivia configuration.
//!
//! Every field has a default, so a partial `[trivia]` section in the host's
//! TOML file only overrides what it names.

use serde::{Deserialize, Serialize};

/// Shortest join window the scheduler will open, whatever the configuration says.
pub const MIN_JOIN_WINDOW_SECONDS: u32 = 5;

/// Shortest claim window, in minutes.
pub const MIN_CLAIM_WINDOW_MINUTES: u32 = 5;

/// When rounds start on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    /// Once per hour at `minute`.
    Hourly,
    /// Only through admin commands.
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub mode: ScheduleMode,
    /// Minute of the hour (0-59) at which an hourly round opens.
    pub minute: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            mode: ScheduleMode::Hourly,
            minute: 0,
        }
    }
}

/// Payout for each winner who claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardSettings {
    pub credits: u64,
    /// Host console command used to pay out, with `{playerId}` and `{amount}`.
    pub console_command_template: String,
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            credits: 50_000,
            console_command_template: "credits add {playerId} {amount}".to_string(),
        }
    }
}

/// Chat templates. Placeholders are written `{name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageTemplates {
    /// `{join}`
    pub announce: String,
    pub join_confirm: String,
    /// `{secs}`, `{count}`
    pub join_tick: String,
    /// `{n}`, `{total}`, `{question}`
    pub question: String,
    /// `{A}`, `{B}`, `{C}`, `{D}`
    pub options: String,
    /// `{secs}`
    pub tick: String,
    /// `{letter}`, `{text}`
    pub reveal: String,
    /// `{score}`, `{total}`, `{winners}`
    pub round_win: String,
    pub round_no_win: String,
    /// `{credits}`
    pub claimable: String,
    /// `{player}`, `{credits}`
    pub claimed: String,
    pub already_claimed: String,
    pub not_winner: String,
    pub nothing_to_claim: String,
    pub grant_failed: String,
    pub no_join_window: String,
    pub no_active_question: String,
    pub not_joined: String,
    pub already_answered: String,
    pub invalid_letter: String,
    /// `{need}`, `{got}`
    pub not_enough_players: String,
    pub no_questions: String,
    pub aborted: String,
    pub dry_run_tag: String,
    pub dry_run_auto_joined: String,
    pub dry_run_claim_notice: String,
    pub dry_run_claim_denied: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            announce: "[TRIVIA] New challenge in {join}s! Type /trivia join to participate.".into(),
            join_confirm: "[TRIVIA] You're in. Get ready.".into(),
            join_tick: "[TRIVIA] Starting in {secs}s... ({count} joined)".into(),
            question: "[TRIVIA Q{n}/{total}] {question}".into(),
            options: "A) {A}  B) {B}  C) {C}  D) {D} -- answer with /a <letter>".into(),
            tick: "[TRIVIA] {secs}s left...".into(),
            reveal: "[TRIVIA] Time! Correct: {letter}) {text}".into(),
            round_win: "[TRIVIA] Winners with {score}/{total}: {winners}".into(),
            round_no_win: "[TRIVIA] No winners this time.".into(),
            claimable: "[TRIVIA] Winners: use /claim to receive {credits} credits.".into(),
            claimed: "[TRIVIA] {player} claimed {credits} cr.".into(),
            already_claimed: "[TRIVIA] You already claimed this round.".into(),
            not_winner: "[TRIVIA] You're not on the winners list this round.".into(),
            nothing_to_claim: "[TRIVIA] Nothing to claim right now.".into(),
            grant_failed: "[TRIVIA] Failed to grant credits. Contact admin.".into(),
            no_join_window: "[TRIVIA] No active join window.".into(),
            no_active_question: "[TRIVIA] No active question.".into(),
            not_joined: "[TRIVIA] You are not joined. Use /trivia join during the window.".into(),
            already_answered: "[TRIVIA] You already answered this question.".into(),
            invalid_letter: "[TRIVIA] Use /a <A|B|C|D>.".into(),
            not_enough_players: "[TRIVIA] Not enough players (need {need}, got {got}). Round canceled.".into(),
            no_questions: "[TRIVIA] No questions available - contact admin.".into(),
            aborted: "[TRIVIA] Round aborted by admin.".into(),
            dry_run_tag: " [DRY-RUN: no payouts]".into(),
            dry_run_auto_joined: "[TRIVIA] Dry-run: you are auto-joined.".into(),
            dry_run_claim_notice: "[TRIVIA] Dry-run complete. No payouts in test mode.".into(),
            dry_run_claim_denied: "[TRIVIA] Dry-run: payouts are disabled.".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriviaConfig {
    pub schedule: Schedule,
    pub join_window_seconds: u32,
    pub question_count: usize,
    pub question_time_seconds: u32,
    /// Period of countdown broadcasts; 0 disables them.
    pub tick_every_seconds: u32,
    /// How many recently asked question ids are avoided.
    pub no_repeat_window: usize,
    pub allow_zero_score_winners: bool,
    pub min_players: usize,
    pub reveal_pause_seconds: u32,
    pub finish_pause_seconds: u32,
    pub claim_window_minutes: u32,
    pub answer_cooldown_seconds: u32,
    pub reward: RewardSettings,
    pub messages: MessageTemplates,
}

impl Default for TriviaConfig {
    fn default() -> Self {
        Self {
            schedule: Schedule::default(),
            join_window_seconds: 60,
            question_count: 5,
            question_time_seconds: 30,
            tick_every_seconds: 5,
            no_repeat_window: 40,
            allow_zero_score_winners: false,
            min_players: 3,
            reveal_pause_seconds: 2,
            finish_pause_seconds: 1,
            claim_window_minutes: 55,
            answer_cooldown_seconds: 2,
            reward: RewardSettings::default(),
            messages: MessageTemplates::default(),
        }
    }
}

impl TriviaConfig {
    pub fn effective_join_window(&self) -> u32 {
        self.join_window_seconds.max(MIN_JOIN_WINDOW_SECONDS)
    }

    pub fn effective_claim_window(&self) -> u32 {
        self.claim_window_minutes.max(MIN_CLAIM_WINDOW_MINUTES)
    }

    /// Capacity of the recently-asked set. Always holds at least two rounds.
    pub fn recency_capacity(&self) -> usize {
        self.no_repeat_window.max(self.question_count * 2).max(1)
    }

    /// Checks the values the scheduler cannot work around.
    pub fn validate(&self) -> Result<(), String> {
        if self.schedule.minute > 59 {
            return Err(format!(
                "trivia.schedule.minute must be 0-59, got {}",
                self.schedule.minute
            ));
        }
        if self.question_count == 0 {
            return Err("trivia.question_count must be at least 1".to_string());
        }
        if self.question_time_seconds == 0 {
            return Err("trivia.question_time_seconds must be at least 1".to_string());
        }
        if self.min_players == 0 {
            return Err("trivia.min_players must be at least 1".to_string());
        }
        Ok(())
    }
}
