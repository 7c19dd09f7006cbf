// src/models/survey.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
    Draft,
    Active,
    Inactive,
    Archived,
}

/// Survey (test) metadata read once when a session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: u32,
    pub total_questions: u32,
    /// Minimum percentage (inclusive) needed to pass.
    pub passing_percentage: u32,
    pub max_attempts: u32,
    pub status: SurveyStatus,
}

impl Survey {
    pub fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    pub fn is_open(&self) -> bool {
        self.status == SurveyStatus::Active
    }
}
