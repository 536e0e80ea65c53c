//! Catalog rows (`stage_templates`, `questions`).

use sqlx::types::Json;
use sqlx::FromRow;

use journey_core::catalog::{DayTemplate, Question, StageTemplate};
use journey_core::types::DbId;

/// A row from the `stage_templates` table.
#[derive(Debug, Clone, FromRow)]
pub struct StageTemplateRow {
    pub id: DbId,
    pub name: String,
    pub min_score: f64,
    pub target_score: f64,
    pub days: Json<Vec<DayTemplate>>,
}

impl From<StageTemplateRow> for StageTemplate {
    fn from(row: StageTemplateRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            min_score: row.min_score,
            target_score: row.target_score,
            days: row.days.0,
        }
    }
}

/// A row from the `questions` table.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: DbId,
    pub prompt: String,
    pub content: serde_json::Value,
    pub correct_answer: Option<serde_json::Value>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Self {
            id: row.id,
            prompt: row.prompt,
            content: row.content,
            correct_answer: row.correct_answer,
        }
    }
}
