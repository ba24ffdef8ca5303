//! Question bank, recency tracking and per-round question selection.

use crate::error::{BankError, BankResult};
use mod_api::{shuffle, RandomPicker};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Every question offers exactly this many choices.
pub const CHOICE_COUNT: usize = 4;

// ============================================================================
// Letters
// ============================================================================

/// Answer letter shown next to a shuffled choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Letter {
    A,
    B,
    C,
    D,
}

impl Letter {
    pub const ALL: [Letter; CHOICE_COUNT] = [Letter::A, Letter::B, Letter::C, Letter::D];

    /// Case-insensitive parse of a single letter, surrounding whitespace allowed.
    pub fn parse(raw: &str) -> Option<Letter> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Letter::A),
            "B" => Some(Letter::B),
            "C" => Some(Letter::C),
            "D" => Some(Letter::D),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Letter> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Letter::A => "A",
            Letter::B => "B",
            Letter::C => "C",
            Letter::D => "D",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Questions
// ============================================================================

fn default_category() -> String {
    "gaming".to_string()
}

fn default_difficulty() -> u8 {
    1
}

fn default_version() -> u32 {
    1
}

/// A question as stored in `questions.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "cat", default = "default_category")]
    pub category: String,
    #[serde(rename = "q")]
    pub text: String,
    pub choices: Vec<String>,
    /// Index of the correct entry in `choices`.
    pub answer: usize,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
}

impl Question {
    fn new(id: &str, text: &str, choices: [&str; CHOICE_COUNT], answer: usize) -> Self {
        Self {
            id: id.to_string(),
            category: default_category(),
            text: text.to_string(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
            answer,
            difficulty: 1,
        }
    }

    /// Why this question cannot be asked, if it cannot.
    fn defect(&self) -> Option<String> {
        if self.id.trim().is_empty() {
            return Some("empty id".to_string());
        }
        if self.choices.len() != CHOICE_COUNT {
            return Some(format!("{} choices instead of {}", self.choices.len(), CHOICE_COUNT));
        }
        if self.answer >= CHOICE_COUNT {
            return Some(format!("answer index {} out of range", self.answer));
        }
        None
    }
}

/// On-disk layout of the question file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuestionFile {
    /// Starter questions written when no question file exists yet.
    pub fn seed() -> Self {
        Self {
            version: 1,
            questions: vec![
                Question::new(
                    "g-001",
                    "Which company developed the original Half-Life (1998)?",
                    ["Valve", "id Software", "Epic Games", "3D Realms"],
                    0,
                ),
                Question::new(
                    "g-002",
                    "In Minecraft, which ore requires an iron pickaxe or better to mine?",
                    ["Diamond Ore", "Coal Ore", "Copper Ore", "Redstone Ore"],
                    0,
                ),
                Question::new(
                    "g-003",
                    "The Konami Code starts with:",
                    ["Up, Up, Down, Down", "Left, Left, Right, Right", "A, B, A, B", "Down, Down, Up, Up"],
                    0,
                ),
                Question::new(
                    "g-004",
                    "Which game popularized the phrase 'The Cake is a Lie'?",
                    ["Portal", "BioShock", "Mass Effect", "GLaDOS Quest"],
                    0,
                ),
                Question::new(
                    "g-005",
                    "In The Witcher 3, what is Geralt's last name?",
                    ["of Rivia", "of Kaer Morhen", "the White", "Wolf"],
                    0,
                ),
            ],
        }
    }
}

/// A question prepared for one round: choices shuffled, correct letter known.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundQuestion {
    pub question: Question,
    pub choices: [String; CHOICE_COUNT],
    pub correct: Letter,
}

impl RoundQuestion {
    fn prepare(question: &Question, random: &dyn RandomPicker) -> Self {
        let order = choice_order(random);
        let choices = order.map(|src| question.choices[src].clone());
        let correct = order
            .iter()
            .position(|&src| src == question.answer)
            .and_then(Letter::from_index)
            .unwrap_or(Letter::A);

        Self {
            question: question.clone(),
            choices,
            correct,
        }
    }

    /// Text of the correct choice.
    pub fn correct_text(&self) -> &str {
        &self.choices[self.correct.index()]
    }

    pub fn choice(&self, letter: Letter) -> &str {
        &self.choices[letter.index()]
    }
}

/// A permutation of the four choice positions. A malformed permutation from
/// the picker leaves the canonical order in place.
fn choice_order(random: &dyn RandomPicker) -> [usize; CHOICE_COUNT] {
    let order = random.permutation(CHOICE_COUNT);
    let mut seen = [false; CHOICE_COUNT];
    let valid = order.len() == CHOICE_COUNT
        && order
            .iter()
            .all(|&i| i < CHOICE_COUNT && !std::mem::replace(&mut seen[i], true));
    if !valid {
        warn!("Random picker returned an invalid choice order {:?}", order);
        return [0, 1, 2, 3];
    }
    [order[0], order[1], order[2], order[3]]
}

// ============================================================================
// Recency
// ============================================================================

/// Bounded least-recently-used set of question ids.
#[derive(Debug, Clone)]
pub struct RecencySet {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl RecencySet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Marks `id` as the most recently used, evicting the oldest beyond capacity.
    pub fn push(&mut self, id: &str) {
        if self.members.contains(id) {
            self.order.retain(|existing| existing != id);
        } else {
            self.members.insert(id.to_string());
        }
        self.order.push_front(id.to_string());
        self.evict();
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.evict();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn evict(&mut self) {
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_back() {
                self.members.remove(&oldest);
            }
        }
    }
}

// ============================================================================
// Bank
// ============================================================================

/// All askable questions.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Builds a bank, skipping questions that cannot be asked.
    pub fn new(file: QuestionFile) -> Self {
        let mut seen = HashSet::new();
        let mut questions = Vec::with_capacity(file.questions.len());
        for question in file.questions {
            if let Some(defect) = question.defect() {
                warn!("Skipping question '{}': {}", question.id, defect);
                continue;
            }
            if !seen.insert(question.id.clone()) {
                warn!("Skipping duplicate question id '{}'", question.id);
                continue;
            }
            questions.push(question);
        }
        Self { questions }
    }

    /// Loads the bank from `path`, writing the seed questions there first if
    /// the file does not exist.
    pub async fn load_or_seed(path: &Path) -> BankResult<Self> {
        if !path.exists() {
            let seed = QuestionFile::seed();
            let json = serde_json::to_string_pretty(&seed).map_err(BankError::Serialization)?;
            tokio::fs::write(path, json)
                .await
                .map_err(|e| BankError::FileWrite(path.to_path_buf(), e))?;
            info!("Seeded {} with {} questions", path.display(), seed.questions.len());
            return Ok(Self::new(seed));
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BankError::FileRead(path.to_path_buf(), e))?;
        let file: QuestionFile = serde_json::from_str(&contents)
            .map_err(|e| BankError::Deserialization(path.to_path_buf(), e))?;
        let bank = Self::new(file);
        info!("Loaded {} questions from {}", bank.len(), path.display());
        Ok(bank)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Picks up to `count` questions for a round.
    ///
    /// Questions in `recent` are avoided unless that leaves fewer than
    /// `count` candidates, in which case the whole bank is used. The picked
    /// ids are pushed into `recent`.
    pub fn select(
        &self,
        count: usize,
        recent: &mut RecencySet,
        random: &dyn RandomPicker,
    ) -> Vec<RoundQuestion> {
        let mut candidates: Vec<&Question> = self
            .questions
            .iter()
            .filter(|q| !recent.contains(&q.id))
            .collect();
        if candidates.len() < count {
            candidates = self.questions.iter().collect();
        }

        shuffle(random, &mut candidates);
        let picked: Vec<RoundQuestion> = candidates
            .into_iter()
            .take(count)
            .map(|q| RoundQuestion::prepare(q, random))
            .collect();

        for rq in &picked {
            recent.push(&rq.question.id);
        }
        picked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Keeps every sequence in its original order.
    struct Identity;

    impl RandomPicker for Identity {
        fn permutation(&self, len: usize) -> Vec<usize> {
            (0..len).collect()
        }

        fn pick(&self, _n: usize) -> usize {
            0
        }
    }

    /// Reverses every sequence.
    struct Reverse;

    impl RandomPicker for Reverse {
        fn permutation(&self, len: usize) -> Vec<usize> {
            (0..len).rev().collect()
        }

        fn pick(&self, n: usize) -> usize {
            n.saturating_sub(1)
        }
    }

    fn bank_of(n: usize) -> QuestionBank {
        let questions = (0..n)
            .map(|i| Question::new(&format!("q{i}"), &format!("Question {i}?"), ["w", "x", "y", "z"], i % 4))
            .collect();
        QuestionBank::new(QuestionFile { version: 1, questions })
    }

    #[test]
    fn test_letter_parse() {
        assert_eq!(Letter::parse(" b "), Some(Letter::B));
        assert_eq!(Letter::parse("D"), Some(Letter::D));
        assert_eq!(Letter::parse("E"), None);
        assert_eq!(Letter::parse("AB"), None);
        assert_eq!(Letter::parse(""), None);
        assert_eq!(Letter::from_index(2), Some(Letter::C));
        assert_eq!(Letter::from_index(4), None);
    }

    #[test]
    fn test_bank_skips_malformed_questions() {
        let mut questions = vec![
            Question::new("ok", "Fine?", ["a", "b", "c", "d"], 1),
            Question::new("ok", "Duplicate?", ["a", "b", "c", "d"], 1),
            Question::new("bad-answer", "Out of range?", ["a", "b", "c", "d"], 4),
        ];
        let mut three = Question::new("three", "Short?", ["a", "b", "c", "d"], 0);
        three.choices.pop();
        questions.push(three);

        let bank = QuestionBank::new(QuestionFile { version: 1, questions });
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.questions()[0].text, "Fine?");
    }

    #[test]
    fn test_question_file_uses_short_field_names() {
        let json = r#"{"questions":[{"id":"x","q":"Why?","choices":["1","2","3","4"],"answer":2}]}"#;
        let file: QuestionFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.version, 1);
        assert_eq!(file.questions[0].category, "gaming");
        assert_eq!(file.questions[0].difficulty, 1);
        assert_eq!(file.questions[0].text, "Why?");
    }

    #[test]
    fn test_prepare_recomputes_correct_letter() {
        let q = Question::new("q", "Pick y", ["w", "x", "y", "z"], 2);

        let same = RoundQuestion::prepare(&q, &Identity);
        assert_eq!(same.correct, Letter::C);
        assert_eq!(same.correct_text(), "y");

        let reversed = RoundQuestion::prepare(&q, &Reverse);
        assert_eq!(reversed.choices, ["z", "y", "x", "w"].map(String::from));
        assert_eq!(reversed.correct, Letter::B);
        assert_eq!(reversed.correct_text(), "y");
    }

    #[test]
    fn test_recency_set_evicts_oldest() {
        let mut recent = RecencySet::new(2);
        recent.push("a");
        recent.push("b");
        recent.push("c");
        assert!(!recent.contains("a"));
        assert!(recent.contains("b"));
        assert!(recent.contains("c"));
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_recency_set_refreshes_on_repeat_push() {
        let mut recent = RecencySet::new(2);
        recent.push("a");
        recent.push("b");
        recent.push("a");
        recent.push("c");
        assert!(recent.contains("a"));
        assert!(!recent.contains("b"));
    }

    #[test]
    fn test_select_avoids_recent_questions() {
        let bank = bank_of(6);
        let mut recent = RecencySet::new(10);

        let first = bank.select(3, &mut recent, &Identity);
        let second = bank.select(3, &mut recent, &Identity);

        let first_ids: HashSet<_> = first.iter().map(|q| q.question.id.clone()).collect();
        let second_ids: HashSet<_> = second.iter().map(|q| q.question.id.clone()).collect();
        assert_eq!(first_ids.len(), 3);
        assert!(first_ids.is_disjoint(&second_ids));
        assert_eq!(recent.len(), 6);
    }

    #[test]
    fn test_select_falls_back_to_whole_bank() {
        let bank = bank_of(4);
        let mut recent = RecencySet::new(10);
        bank.select(3, &mut recent, &Identity);

        // Only one fresh question is left, so repeats are accepted.
        let again = bank.select(3, &mut recent, &Identity);
        assert_eq!(again.len(), 3);
    }

    #[test]
    fn test_select_from_small_bank_returns_what_exists() {
        let bank = bank_of(2);
        let mut recent = RecencySet::new(10);
        assert_eq!(bank.select(5, &mut recent, &Identity).len(), 2);
        assert!(QuestionBank::default().select(5, &mut recent, &Identity).is_empty());
    }

    #[tokio::test]
    async fn test_load_or_seed_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.json");

        let bank = QuestionBank::load_or_seed(&path).await.unwrap();
        assert_eq!(bank.len(), 5);
        assert!(path.exists());

        let reloaded = QuestionBank::load_or_seed(&path).await.unwrap();
        assert_eq!(reloaded.questions(), bank.questions());
    }

    #[tokio::test]
    async fn test_load_or_seed_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = QuestionBank::load_or_seed(&path).await.unwrap_err();
        assert!(matches!(err, BankError::Deserialization(_, _)));
    }
}
