//! Read-only stage catalog and question store types.
//!
//! Journeys copy these templates by value at creation time, so later catalog
//! edits never reach an existing journey.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Lowest accepted score on the 0-100 scale.
pub const MIN_SCORE_BOUND: f64 = 0.0;

/// Highest accepted score on the 0-100 scale.
pub const MAX_SCORE_BOUND: f64 = 100.0;

/// A catalog stage: score window plus its ordered practice days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTemplate {
    pub id: DbId,
    pub name: String,
    /// Final-test accuracy required to pass the stage.
    pub min_score: f64,
    pub target_score: f64,
    pub days: Vec<DayTemplate>,
}

/// One day of practice content inside a catalog stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayTemplate {
    pub day_number: i32,
    #[serde(default)]
    pub question_ids: Vec<DbId>,
}

/// A question resolved from the question store.
///
/// `correct_answer` is the grading key and is never serialized back to
/// learners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: DbId,
    pub prompt: String,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default, skip_serializing)]
    pub correct_answer: Option<serde_json::Value>,
}

/// Validate a stage template before it is bound into a journey.
///
/// Scores must sit in `[0, 100]` with `target_score >= min_score`, and the
/// days must be numbered densely from 1 once sorted.
pub fn validate_template(template: &StageTemplate) -> Result<(), CoreError> {
    let id = template.id;
    for (label, value) in [
        ("min_score", template.min_score),
        ("target_score", template.target_score),
    ] {
        if !value.is_finite() || !(MIN_SCORE_BOUND..=MAX_SCORE_BOUND).contains(&value) {
            return Err(CoreError::Validation(format!(
                "Stage {id}: {label} must be between {MIN_SCORE_BOUND} and {MAX_SCORE_BOUND}, got {value}"
            )));
        }
    }
    if template.target_score < template.min_score {
        return Err(CoreError::Validation(format!(
            "Stage {id}: target_score ({}) must be >= min_score ({})",
            template.target_score, template.min_score
        )));
    }
    if template.days.is_empty() {
        return Err(CoreError::Validation(format!(
            "Stage {id} has no days"
        )));
    }

    let mut numbers: Vec<i32> = template.days.iter().map(|d| d.day_number).collect();
    numbers.sort_unstable();
    for (expected, actual) in (1..).zip(numbers.iter()) {
        if *actual != expected {
            return Err(CoreError::Validation(format!(
                "Stage {id}: day numbers must run 1..={} without gaps or repeats",
                numbers.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(days: &[i32]) -> StageTemplate {
        StageTemplate {
            id: 7,
            name: "Basics".into(),
            min_score: 80.0,
            target_score: 90.0,
            days: days
                .iter()
                .map(|&n| DayTemplate {
                    day_number: n,
                    question_ids: vec![],
                })
                .collect(),
        }
    }

    #[test]
    fn dense_days_in_any_order_are_valid() {
        assert!(validate_template(&template(&[2, 1, 3])).is_ok());
    }

    #[test]
    fn gaps_and_repeats_are_rejected() {
        assert!(validate_template(&template(&[1, 3])).is_err());
        assert!(validate_template(&template(&[1, 1])).is_err());
        assert!(validate_template(&template(&[0, 1])).is_err());
    }

    #[test]
    fn empty_stage_is_rejected() {
        assert!(validate_template(&template(&[])).is_err());
    }

    #[test]
    fn score_window_is_checked() {
        let mut t = template(&[1]);
        t.min_score = 95.0;
        assert!(validate_template(&t).is_err());

        let mut t = template(&[1]);
        t.target_score = 120.0;
        assert!(validate_template(&t).is_err());

        let mut t = template(&[1]);
        t.min_score = f64::NAN;
        assert!(validate_template(&t).is_err());
    }

    #[test]
    fn correct_answer_is_not_serialized() {
        let q = Question {
            id: 1,
            prompt: "2 + 2".into(),
            content: serde_json::json!({ "choices": ["3", "4"] }),
            correct_answer: Some(serde_json::json!("4")),
        };
        let json = serde_json::to_value(&q).unwrap();
        assert!(json.get("correct_answer").is_none());
        assert_eq!(json["prompt"], "2 + 2");
    }
}
