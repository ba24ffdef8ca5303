//! # Trivia
//!
//! A recurring multiple-choice quiz. Each round opens a join window, asks a
//! handful of questions with a fixed answer time, reveals the answers and
//! then lets the top scorers claim a credit reward until the claim window
//! closes.
//!
//! The round advances only on ticks from a 1 Hz driver; chat commands record
//! intent (join, answer, claim) and at most pull a deadline forward.
//!
//! ```text
//! Idle -> Joining -> Asking <-> Reveal -> Finished -> Claimable -> Idle
//! ```
//!
//! A join window that closes with too few players goes straight back to
//! `Idle`, as does an admin stop from any phase.

pub mod bank;
pub mod config;
pub mod error;
pub mod result_store;
pub mod round;
pub mod scheduler;
pub mod service;

pub use bank::{Letter, Question, QuestionBank, QuestionFile, RecencySet, RoundQuestion};
pub use config::{MessageTemplates, RewardSettings, Schedule, ScheduleMode, TriviaConfig};
pub use error::{BankError, BankResult, ResultStoreError, ResultStoreResult};
pub use result_store::{PersistedRoundResult, ResultStore};
pub use round::{Phase, Round};
pub use scheduler::{AnswerOutcome, ClaimOutcome, Collaborators, JoinOutcome, TriviaScheduler};
pub use service::{TriviaService, TriviaSnapshot};
