// src/engine/session.rs

//! Synchronous state machine of a single test attempt.
//!
//! Nothing here performs I/O or reads a clock; [`super::runtime::SessionHandle`]
//! feeds it timer ticks and connectivity events and carries snapshots to storage.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use chrono::Utc;

use crate::models::{
    question::{OptionTag, PublicQuestion, Question},
    session::{
        PauseReason, ProgressSnapshot, QuestionStatus, SessionPhase, SessionView, Submission,
    },
    survey::Survey,
};

use super::{
    error::SessionError,
    scoring::{Grading, grade},
};

/// Remaining time below which the session is flagged as running low.
pub const LOW_TIME_SECONDS: u64 = 300;

/// Everything needed to open a session.
pub struct SessionStart {
    pub session_id: String,
    pub user_id: i64,
    pub survey: Survey,
    pub questions: Vec<Question>,
    pub online: bool,
}

/// Result of a timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running; nothing changed.
    Idle,
    /// One second elapsed; carries the new remaining time.
    Decremented(u64),
    /// Time ran out on this tick. The session is now `Submitting`.
    Expired,
}

#[derive(Debug)]
pub struct TestSession {
    session_id: String,
    test_id: String,
    user_id: i64,
    questions: Arc<[Question]>,
    passing_percentage: u32,
    duration_seconds: u64,
    current_index: usize,
    answers: BTreeMap<usize, OptionTag>,
    marked: BTreeSet<usize>,
    visited: BTreeSet<usize>,
    remaining_seconds: u64,
    online: bool,
    phase: SessionPhase,
    submit_in_flight: bool,
}

impl TestSession {
    /// Opens a session, restoring from `prior` when it belongs to the same test.
    ///
    /// Restored indices outside the question list are dropped and the remaining time is
    /// capped at the survey duration. A snapshot with no time left opens in `Submitting`.
    pub fn start(
        start: SessionStart,
        prior: Option<ProgressSnapshot>,
    ) -> Result<Self, SessionError> {
        if start.questions.is_empty() {
            return Err(SessionError::EmptyQuestionSet);
        }

        let count = start.questions.len();
        let duration_seconds = start.survey.duration_seconds();
        let mut session = TestSession {
            session_id: start.session_id,
            test_id: start.survey.id.clone(),
            user_id: start.user_id,
            questions: start.questions.into(),
            passing_percentage: start.survey.passing_percentage,
            duration_seconds,
            current_index: 0,
            answers: BTreeMap::new(),
            marked: BTreeSet::new(),
            visited: BTreeSet::from([0]),
            remaining_seconds: duration_seconds,
            online: start.online,
            phase: if start.online {
                SessionPhase::Running
            } else {
                SessionPhase::Paused(PauseReason::Offline)
            },
            submit_in_flight: false,
        };

        match prior {
            Some(snapshot) if snapshot.test_id == session.test_id => {
                session.current_index = snapshot.current_index.min(count - 1);
                session.answers = snapshot
                    .answers
                    .into_iter()
                    .filter(|(index, _)| *index < count)
                    .collect();
                session.marked = snapshot
                    .marked_for_review
                    .into_iter()
                    .filter(|index| *index < count)
                    .collect();
                session.visited = session.answers.keys().copied().collect();
                session.visited.insert(session.current_index);
                session.remaining_seconds = snapshot.remaining_seconds.min(duration_seconds);
                if session.remaining_seconds == 0 {
                    session.phase = SessionPhase::Submitting;
                }
            }
            Some(snapshot) => {
                tracing::warn!(
                    "Ignoring progress of session {} saved for test {} while starting test {}",
                    snapshot.session_id,
                    snapshot.test_id,
                    session.test_id
                );
            }
            None => {}
        }

        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == SessionPhase::Terminated
    }

    pub fn submit_in_flight(&self) -> bool {
        self.submit_in_flight
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn answer(&self, index: usize) -> Option<OptionTag> {
        self.answers.get(&index).copied()
    }

    pub fn answers(&self) -> &BTreeMap<usize, OptionTag> {
        &self.answers
    }

    pub fn is_marked(&self, index: usize) -> bool {
        self.marked.contains(&index)
    }

    pub fn is_visited(&self, index: usize) -> bool {
        self.visited.contains(&index)
    }

    fn phase_name(&self) -> &'static str {
        match self.phase {
            SessionPhase::Running => "running",
            SessionPhase::Paused(PauseReason::Offline) => "paused offline",
            SessionPhase::Paused(PauseReason::Manual) => "paused by a manager",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Terminated => "terminated",
        }
    }

    fn ensure_not_terminated(&self) -> Result<(), SessionError> {
        if self.is_terminated() {
            Err(SessionError::Terminated)
        } else {
            Ok(())
        }
    }

    fn ensure_index(&self, index: usize) -> Result<(), SessionError> {
        if index < self.questions.len() {
            Ok(())
        } else {
            Err(SessionError::InvalidQuestion {
                index,
                count: self.questions.len(),
            })
        }
    }

    /// Records `option` for question `index`, replacing any earlier choice.
    ///
    /// Rejected while a submission is in flight so the recorded attempt matches the
    /// answers the session holds afterwards.
    pub fn select_answer(&mut self, index: usize, option: OptionTag) -> Result<(), SessionError> {
        self.ensure_not_terminated()?;
        if self.submit_in_flight {
            return Err(SessionError::SubmissionInFlight);
        }
        self.ensure_index(index)?;
        self.visited.insert(index);
        self.answers.insert(index, option);
        Ok(())
    }

    /// Flips the review mark of `index` and returns whether it is now marked.
    pub fn toggle_review(&mut self, index: usize) -> Result<bool, SessionError> {
        self.ensure_not_terminated()?;
        self.ensure_index(index)?;
        if self.marked.remove(&index) {
            Ok(false)
        } else {
            self.marked.insert(index);
            Ok(true)
        }
    }

    /// Moves to `target`, clamped into the question list. Returns the new index.
    pub fn navigate(&mut self, target: i64) -> Result<usize, SessionError> {
        self.ensure_not_terminated()?;
        let last = self.questions.len() - 1;
        let index = usize::try_from(target).unwrap_or(0).min(last);
        self.current_index = index;
        self.visited.insert(index);
        Ok(index)
    }

    pub fn next(&mut self) -> Result<usize, SessionError> {
        self.navigate(self.current_index as i64 + 1)
    }

    pub fn previous(&mut self) -> Result<usize, SessionError> {
        self.navigate(self.current_index as i64 - 1)
    }

    /// Advances the countdown by one second. Only a running session counts down.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != SessionPhase::Running {
            return TickOutcome::Idle;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.phase = SessionPhase::Submitting;
            TickOutcome::Expired
        } else {
            TickOutcome::Decremented(self.remaining_seconds)
        }
    }

    /// Returns true when this pauses a running session.
    pub fn connectivity_lost(&mut self) -> bool {
        self.online = false;
        if self.phase == SessionPhase::Running {
            self.phase = SessionPhase::Paused(PauseReason::Offline);
            true
        } else {
            false
        }
    }

    /// Returns true when this resumes a session paused for connectivity.
    /// A manual pause survives reconnection.
    pub fn connectivity_restored(&mut self) -> bool {
        self.online = true;
        if self.phase == SessionPhase::Paused(PauseReason::Offline) {
            self.phase = SessionPhase::Running;
            true
        } else {
            false
        }
    }

    /// Administrative pause. Replaces an offline pause so reconnection won't resume it.
    pub fn pause_manual(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Running | SessionPhase::Paused(_) => {
                self.phase = SessionPhase::Paused(PauseReason::Manual);
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition {
                action: "pause",
                phase: self.phase_name(),
            }),
        }
    }

    /// Lifts a manual pause. Without connectivity the session stays paused offline.
    pub fn resume_manual(&mut self) -> Result<SessionPhase, SessionError> {
        if self.phase != SessionPhase::Paused(PauseReason::Manual) {
            return Err(SessionError::InvalidTransition {
                action: "resume",
                phase: self.phase_name(),
            });
        }
        self.phase = if self.online {
            SessionPhase::Running
        } else {
            SessionPhase::Paused(PauseReason::Offline)
        };
        Ok(self.phase)
    }

    /// Enters `Submitting`, marks the submission in flight and grades the answers.
    ///
    /// Allowed from `Running`, and from `Submitting` when no attempt is in flight
    /// (time-out path or a retry after a failed attempt).
    pub fn begin_submit(&mut self) -> Result<Submission, SessionError> {
        match self.phase {
            SessionPhase::Terminated => return Err(SessionError::Terminated),
            SessionPhase::Submitting if self.submit_in_flight => {
                return Err(SessionError::SubmissionInFlight);
            }
            SessionPhase::Running | SessionPhase::Submitting => {}
            SessionPhase::Paused(_) => {
                return Err(SessionError::InvalidTransition {
                    action: "submit",
                    phase: self.phase_name(),
                });
            }
        }

        self.phase = SessionPhase::Submitting;
        self.submit_in_flight = true;

        let graded = grade(Grading {
            session_id: &self.session_id,
            test_id: &self.test_id,
            questions: &self.questions,
            answers: &self.answers,
            passing_percentage: self.passing_percentage,
            time_taken_seconds: self.duration_seconds - self.remaining_seconds,
        });

        Ok(Submission {
            session_id: self.session_id.clone(),
            test_id: self.test_id.clone(),
            user_id: self.user_id,
            answers: self.answers.clone(),
            graded,
        })
    }

    /// The submission attempt failed. The session stays in `Submitting`, answers intact.
    pub fn submit_failed(&mut self) {
        self.submit_in_flight = false;
    }

    pub fn submit_succeeded(&mut self) {
        self.submit_in_flight = false;
        self.phase = SessionPhase::Terminated;
    }

    /// Ends the session without a result.
    pub fn exit(&mut self) -> Result<(), SessionError> {
        self.ensure_not_terminated()?;
        if self.submit_in_flight {
            return Err(SessionError::SubmissionInFlight);
        }
        self.phase = SessionPhase::Terminated;
        Ok(())
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            session_id: self.session_id.clone(),
            test_id: self.test_id.clone(),
            user_id: self.user_id,
            current_index: self.current_index,
            answers: self.answers.clone(),
            marked_for_review: self.marked.clone(),
            remaining_seconds: self.remaining_seconds,
            saved_at: Utc::now(),
        }
    }

    /// Answered wins over marked.
    pub fn question_status(&self, index: usize) -> QuestionStatus {
        if self.answers.contains_key(&index) {
            QuestionStatus::Answered
        } else if self.marked.contains(&index) {
            QuestionStatus::Marked
        } else {
            QuestionStatus::NotAttempted
        }
    }

    pub fn view(&self) -> SessionView {
        let total = self.questions.len();
        let answered = self.answers.len();
        SessionView {
            session_id: self.session_id.clone(),
            test_id: self.test_id.clone(),
            phase: self.phase,
            online: self.online,
            current_index: self.current_index,
            total_questions: total,
            current_question: self.questions.get(self.current_index).map(PublicQuestion::from),
            selected_answer: self.answer(self.current_index),
            statuses: (0..total).map(|i| self.question_status(i)).collect(),
            answered,
            marked: self.marked.len(),
            not_attempted: total - answered,
            remaining_seconds: self.remaining_seconds,
            remaining_display: format_clock(self.remaining_seconds),
            low_time: self.remaining_seconds < LOW_TIME_SECONDS,
        }
    }
}

/// Formats seconds as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
