// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four answer options of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptionTag {
    A,
    B,
    C,
    D,
}

impl OptionTag {
    pub const ALL: [OptionTag; 4] = [OptionTag::A, OptionTag::B, OptionTag::C, OptionTag::D];

    pub fn parse(tag: &str) -> Option<OptionTag> {
        match tag.trim() {
            "A" | "a" => Some(OptionTag::A),
            "B" | "b" => Some(OptionTag::B),
            "C" | "c" => Some(OptionTag::C),
            "D" | "d" => Some(OptionTag::D),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptionTag::A => "A",
            OptionTag::B => "B",
            OptionTag::C => "C",
            OptionTag::D => "D",
        }
    }
}

impl fmt::Display for OptionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A multiple-choice question of a survey's question bank.
/// Read-only for the lifetime of a test session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub survey_id: String,
    pub section_id: String,

    pub question_text: String,

    /// Option texts for A, B, C and D, in that order.
    pub options: [String; 4],

    pub correct_answer: OptionTag,

    pub complexity: Difficulty,

    /// Points awarded for a correct answer.
    pub marks: u32,

    pub explanation: Option<String>,
    pub topic: Option<String>,
    pub is_active: bool,
}

impl Question {
    pub fn option_text(&self, tag: OptionTag) -> &str {
        &self.options[tag as usize]
    }

    pub fn is_correct(&self, selected: OptionTag) -> bool {
        self.correct_answer == selected
    }
}

/// DTO for sending a question to a test taker (excludes answer and explanation).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: String,
    pub section_id: String,
    pub question_text: String,
    pub options: [String; 4],
    pub marks: u32,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        PublicQuestion {
            id: q.id.clone(),
            section_id: q.section_id.clone(),
            question_text: q.question_text.clone(),
            options: q.options.clone(),
            marks: q.marks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_tag_parse() {
        assert_eq!(OptionTag::parse("B"), Some(OptionTag::B));
        assert_eq!(OptionTag::parse(" d "), Some(OptionTag::D));
        assert_eq!(OptionTag::parse("E"), None);
        assert_eq!(OptionTag::parse(""), None);
    }

    #[test]
    fn test_option_text_lookup() {
        let q = Question {
            id: "q1".to_string(),
            survey_id: "s1".to_string(),
            section_id: "A".to_string(),
            question_text: "Standard deviation for variance 16?".to_string(),
            options: ["2".into(), "4".into(), "8".into(), "16".into()],
            correct_answer: OptionTag::B,
            complexity: Difficulty::Easy,
            marks: 1,
            explanation: None,
            topic: Some("Statistics".to_string()),
            is_active: true,
        };
        assert_eq!(q.option_text(OptionTag::C), "8");
        assert!(q.is_correct(OptionTag::B));
        assert!(!q.is_correct(OptionTag::A));

        let public = PublicQuestion::from(&q);
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("correct_answer").is_none());
        assert!(json.get("explanation").is_none());
    }
}
