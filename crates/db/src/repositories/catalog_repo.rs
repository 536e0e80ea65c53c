//! Read-only queries over `stage_templates` and `questions`.

use sqlx::PgPool;

use journey_core::types::DbId;

use crate::models::catalog::{QuestionRow, StageTemplateRow};

const STAGE_COLUMNS: &str = "id, name, min_score, target_score, days";

const QUESTION_COLUMNS: &str = "id, prompt, content, correct_answer";

pub struct StageCatalogRepo;

impl StageCatalogRepo {
    /// Templates whose id is in `ids`. Order is unspecified.
    pub async fn find_many(pool: &PgPool, ids: &[DbId]) -> Result<Vec<StageTemplateRow>, sqlx::Error> {
        let query = format!("SELECT {STAGE_COLUMNS} FROM stage_templates WHERE id = ANY($1)");
        sqlx::query_as::<_, StageTemplateRow>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }
}

pub struct QuestionRepo;

impl QuestionRepo {
    /// Questions whose id is in `ids`. Order is unspecified.
    pub async fn find_many(pool: &PgPool, ids: &[DbId]) -> Result<Vec<QuestionRow>, sqlx::Error> {
        let query = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ANY($1)");
        sqlx::query_as::<_, QuestionRow>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }
}
