//! In-memory state of the live round.

use crate::bank::{Letter, RoundQuestion};
use chrono::{DateTime, Utc};
use mod_api::PlayerId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Named state of the round state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Joining,
    Asking,
    Reveal,
    Finished,
    Claimable,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "Idle",
            Phase::Joining => "Joining",
            Phase::Asking => "Asking",
            Phase::Reveal => "Reveal",
            Phase::Finished => "Finished",
            Phase::Claimable => "Claimable",
        };
        f.write_str(name)
    }
}

/// Result of recording an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Correct,
    Incorrect,
    AlreadyAnswered,
    NoQuestion,
}

/// One run of the trivia activity, from the join window to the end of the
/// claim window.
#[derive(Debug, Clone)]
pub struct Round {
    pub phase: Phase,
    pub phase_started: DateTime<Utc>,
    pub phase_deadline: DateTime<Utc>,
    pub next_tick: DateTime<Utc>,
    pub dry_run: bool,
    pub starter: Option<PlayerId>,
    pub joined: BTreeSet<PlayerId>,
    pub scores: BTreeMap<PlayerId, u32>,
    /// `None` until the first question is asked.
    pub question_index: Option<usize>,
    pub questions: Vec<RoundQuestion>,
    pub answered: BTreeSet<PlayerId>,
}

impl Round {
    pub fn idle(now: DateTime<Utc>) -> Self {
        Self {
            phase: Phase::Idle,
            phase_started: now,
            phase_deadline: now,
            next_tick: now,
            dry_run: false,
            starter: None,
            joined: BTreeSet::new(),
            scores: BTreeMap::new(),
            question_index: None,
            questions: Vec::new(),
            answered: BTreeSet::new(),
        }
    }

    /// Moves to `phase` until `deadline`. A deadline before `now` is clamped.
    pub fn enter(&mut self, phase: Phase, now: DateTime<Utc>, deadline: DateTime<Utc>) {
        self.phase = phase;
        self.phase_started = now;
        self.phase_deadline = deadline.max(now);
    }

    /// Adds a player with a zero score. Returns false if already joined.
    pub fn join(&mut self, player: PlayerId) -> bool {
        if !self.joined.insert(player) {
            return false;
        }
        self.scores.insert(player, 0);
        true
    }

    pub fn is_joined(&self, player: PlayerId) -> bool {
        self.joined.contains(&player)
    }

    pub fn score(&self, player: PlayerId) -> u32 {
        self.scores.get(&player).copied().unwrap_or(0)
    }

    pub fn current_question(&self) -> Option<&RoundQuestion> {
        self.question_index.and_then(|i| self.questions.get(i))
    }

    pub fn has_next_question(&self) -> bool {
        self.question_index
            .map(|i| i + 1 < self.questions.len())
            .unwrap_or(false)
    }

    /// Records a joined player's answer to the current question.
    pub fn record_answer(&mut self, player: PlayerId, letter: Letter) -> Recorded {
        let Some(correct) = self.current_question().map(|q| q.correct) else {
            return Recorded::NoQuestion;
        };
        if !self.answered.insert(player) {
            return Recorded::AlreadyAnswered;
        }
        if letter == correct {
            *self.scores.entry(player).or_insert(0) += 1;
            Recorded::Correct
        } else {
            Recorded::Incorrect
        }
    }

    pub fn everyone_answered(&self) -> bool {
        !self.joined.is_empty() && self.joined.iter().all(|p| self.answered.contains(p))
    }

    /// Top score and the players holding it.
    ///
    /// A top score of zero only produces winners when `allow_zero` is set.
    pub fn winners(&self, allow_zero: bool) -> (u32, BTreeSet<PlayerId>) {
        let max = self
            .joined
            .iter()
            .map(|p| self.score(*p))
            .max()
            .unwrap_or(0);
        if max == 0 && !allow_zero {
            return (0, BTreeSet::new());
        }
        let winners = self
            .joined
            .iter()
            .filter(|p| self.score(**p) == max)
            .copied()
            .collect();
        (max, winners)
    }
}
