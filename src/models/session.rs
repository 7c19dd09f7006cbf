// src/models/session.rs

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::question::{OptionTag, PublicQuestion};

/// Why a session is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// Connectivity was lost. Cleared automatically when it returns.
    Offline,
    /// Paused by a session manager. Only a manual resume clears it.
    Manual,
}

/// Lifecycle phase of a test session. Exactly one holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum SessionPhase {
    Running,
    Paused(PauseReason),
    Submitting,
    Terminated,
}

/// Persisted progress of a session. The JSON shape is the storage contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub session_id: String,
    pub test_id: String,
    pub user_id: i64,
    pub current_index: usize,
    pub answers: BTreeMap<usize, OptionTag>,
    pub marked_for_review: BTreeSet<usize>,
    pub remaining_seconds: u64,
    pub saved_at: DateTime<Utc>,
}

/// Correct/total breakdown for one question section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionScore {
    pub total: usize,
    pub correct: usize,
}

/// Graded outcome of a submitted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub session_id: String,
    pub test_id: String,
    pub total_questions: usize,
    pub attempted: usize,
    pub correct: usize,
    pub total_marks: u32,
    pub obtained_marks: u32,
    pub percentage: u32,
    pub passed: bool,
    pub time_taken_seconds: u64,
    pub section_scores: BTreeMap<String, SectionScore>,
    pub generated_at: DateTime<Utc>,
}

/// Payload handed to the submission service.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub session_id: String,
    pub test_id: String,
    pub user_id: i64,
    pub answers: BTreeMap<usize, OptionTag>,
    /// Result graded locally against the session's question set.
    pub graded: TestResult,
}

/// Navigator status of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionStatus {
    Answered,
    Marked,
    NotAttempted,
}

/// Read model of a live session returned to the test taker.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub test_id: String,
    pub phase: SessionPhase,
    pub online: bool,
    pub current_index: usize,
    pub total_questions: usize,
    pub current_question: Option<PublicQuestion>,
    pub selected_answer: Option<OptionTag>,
    pub statuses: Vec<QuestionStatus>,
    pub answered: usize,
    pub marked: usize,
    pub not_attempted: usize,
    pub remaining_seconds: u64,
    /// Remaining time as `MM:SS`.
    pub remaining_display: String,
    pub low_time: bool,
}
