//! Accuracy scoring for day submissions and final tests.
//!
//! Final-test answers arrive in one of two shapes and are normalized into a
//! single [`Answer`] list before any counting happens.

use serde::{Deserialize, Deserializer};

use crate::catalog::{Question, MAX_SCORE_BOUND, MIN_SCORE_BOUND};
use crate::error::CoreError;
use crate::types::DbId;

/// Score recorded for a force-passed (skipped) final test.
pub const SKIPPED_STAGE_SCORE: f64 = 100.0;

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

/// Round to two decimal places.
pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `correct / total * 100`, rounded to two decimals.
pub fn accuracy_rate(correct: usize, total: usize) -> Result<f64, CoreError> {
    if total == 0 {
        return Err(CoreError::Validation(
            "Cannot score a submission with zero questions".to_string(),
        ));
    }
    if correct > total {
        return Err(CoreError::Validation(format!(
            "Correct count {correct} exceeds total questions {total}"
        )));
    }
    Ok(round_to_hundredths(correct as f64 / total as f64 * 100.0))
}

/// Reject scores outside `[0, 100]` or non-finite values.
pub fn validate_score(score: f64) -> Result<(), CoreError> {
    if !score.is_finite() || !(MIN_SCORE_BOUND..=MAX_SCORE_BOUND).contains(&score) {
        return Err(CoreError::Validation(format!(
            "Score must be a number between {MIN_SCORE_BOUND} and {MAX_SCORE_BOUND}, got {score}"
        )));
    }
    Ok(())
}

pub fn is_passing(score: f64, min_score: f64) -> bool {
    score >= min_score
}

// ---------------------------------------------------------------------------
// Day submissions
// ---------------------------------------------------------------------------

/// A practice-day result: an explicit score, or raw counts to derive one from.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaySubmission {
    pub score: Option<f64>,
    #[serde(alias = "correctCount")]
    pub correct_count: Option<usize>,
    #[serde(alias = "totalQuestions")]
    pub total_questions: Option<usize>,
}

impl DaySubmission {
    /// Resolve the submission to a validated accuracy score.
    pub fn resolve_score(&self) -> Result<f64, CoreError> {
        match (self.score, self.correct_count, self.total_questions) {
            (Some(score), _, _) => {
                validate_score(score)?;
                Ok(round_to_hundredths(score))
            }
            (None, Some(correct), Some(total)) => accuracy_rate(correct, total),
            _ => Err(CoreError::Validation(
                "Provide either 'score' or both 'correct_count' and 'total_questions'".to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Final-test answers
// ---------------------------------------------------------------------------

/// An answer object that carries its own correctness flag.
#[derive(Debug, Clone, Deserialize)]
pub struct GradedAnswer {
    #[serde(default, alias = "questionId")]
    pub question_id: Option<DbId>,
    /// `None` when the field is absent; `Some(Null)` when sent as null.
    #[serde(default, deserialize_with = "present_value")]
    pub answer: Option<serde_json::Value>,
    #[serde(alias = "isCorrect")]
    pub is_correct: bool,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// The two payload shapes clients submit for a final test.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AnswerSubmission {
    /// One object per question with an `is_correct` flag.
    Graded(Vec<GradedAnswer>),
    /// Raw answers keyed by position in the test's question order.
    Positional(Vec<Option<serde_json::Value>>),
}

/// Canonical per-question answer used for counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub position: usize,
    pub question_id: Option<DbId>,
    pub answered: bool,
    pub correct: bool,
}

impl AnswerSubmission {
    /// Normalize to canonical answers.
    ///
    /// `answer_key` is the test's questions in their stored order. Positional
    /// answers are graded against it; a slot with no key entry, or whose
    /// question has no `correct_answer`, counts as incorrect.
    pub fn normalize(&self, answer_key: &[Question]) -> Vec<Answer> {
        match self {
            Self::Graded(items) => items
                .iter()
                .enumerate()
                .map(|(position, item)| {
                    let answered = item.answer.as_ref().map_or(true, is_filled);
                    Answer {
                        position,
                        question_id: item.question_id,
                        answered,
                        correct: answered && item.is_correct,
                    }
                })
                .collect(),
            Self::Positional(slots) => slots
                .iter()
                .enumerate()
                .map(|(position, slot)| {
                    let question = answer_key.get(position);
                    let answered = slot.as_ref().is_some_and(is_filled);
                    let correct = answered
                        && matches!(
                            (slot, question.and_then(|q| q.correct_answer.as_ref())),
                            (Some(given), Some(expected)) if answers_match(given, expected)
                        );
                    Answer {
                        position,
                        question_id: question.map(|q| q.id),
                        answered,
                        correct,
                    }
                })
                .collect(),
        }
    }
}

/// Result of grading a final-test submission.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ScoreCard {
    pub correct: usize,
    pub answered: usize,
    pub total: usize,
    pub accuracy_rate: f64,
}

/// Count normalized answers against the test's question count.
///
/// `total_questions` of zero falls back to the number of answers supplied.
pub fn grade(answers: &[Answer], total_questions: usize) -> Result<ScoreCard, CoreError> {
    let total = if total_questions == 0 {
        answers.len()
    } else {
        total_questions
    };
    let correct = answers.iter().filter(|a| a.correct).count().min(total);
    let answered = answers.iter().filter(|a| a.answered).count().min(total);
    Ok(ScoreCard {
        correct,
        answered,
        total,
        accuracy_rate: accuracy_rate(correct, total)?,
    })
}

/// A slot counts as answered when it is non-null and non-empty.
pub fn is_filled(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Strings compare trimmed and case-insensitively; everything else exactly.
fn answers_match(given: &serde_json::Value, expected: &serde_json::Value) -> bool {
    match (given.as_str(), expected.as_str()) {
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        _ => given == expected,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
