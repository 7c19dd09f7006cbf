// src/engine/scoring.rs

use std::collections::BTreeMap;

use chrono::Utc;

use crate::models::{
    question::{OptionTag, Question},
    session::{SectionScore, TestResult},
};

/// Rounded percentage of `correct` out of `total`, halves rounded up.
/// An empty test scores 0.
pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let correct = correct.min(total) as u64;
    let total = total as u64;
    ((200 * correct + total) / (2 * total)) as u32
}

/// Pass threshold is inclusive.
pub fn is_passing(percentage: u32, passing_percentage: u32) -> bool {
    percentage >= passing_percentage
}

/// Input for [`grade`].
pub struct Grading<'a> {
    pub session_id: &'a str,
    pub test_id: &'a str,
    pub questions: &'a [Question],
    pub answers: &'a BTreeMap<usize, OptionTag>,
    pub passing_percentage: u32,
    pub time_taken_seconds: u64,
}

/// Grades an answer map against the session's question list.
///
/// Every question counts in the denominator; an unanswered question is incorrect.
/// Answers keyed outside the question list are ignored.
pub fn grade(input: Grading<'_>) -> TestResult {
    let mut correct = 0;
    let mut attempted = 0;
    let mut total_marks = 0;
    let mut obtained_marks = 0;
    let mut section_scores: BTreeMap<String, SectionScore> = BTreeMap::new();

    for (index, question) in input.questions.iter().enumerate() {
        total_marks += question.marks;
        let section = section_scores.entry(question.section_id.clone()).or_default();
        section.total += 1;

        let Some(selected) = input.answers.get(&index) else {
            continue;
        };
        attempted += 1;
        if question.is_correct(*selected) {
            correct += 1;
            obtained_marks += question.marks;
            section.correct += 1;
        }
    }

    let total_questions = input.questions.len();
    let percentage = percentage(correct, total_questions);

    TestResult {
        session_id: input.session_id.to_string(),
        test_id: input.test_id.to_string(),
        total_questions,
        attempted,
        correct,
        total_marks,
        obtained_marks,
        percentage,
        passed: is_passing(percentage, input.passing_percentage),
        time_taken_seconds: input.time_taken_seconds,
        section_scores,
        generated_at: Utc::now(),
    }
}
