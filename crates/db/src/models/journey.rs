//! Journey rows and request DTOs.

use serde::Deserialize;
use sqlx::types::Json;
use sqlx::FromRow;
use validator::Validate;

use journey_core::error::CoreError;
use journey_core::journey::{Journey, JourneyState, StageProgress};
use journey_core::scoring::AnswerSubmission;
use journey_core::types::{DbId, Timestamp};

/// A row from the `journeys` table.
#[derive(Debug, Clone, FromRow)]
pub struct JourneyRow {
    pub id: DbId,
    pub user_id: DbId,
    pub stages: Json<Vec<StageProgress>>,
    pub current_stage_index: i32,
    pub state: String,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub replaced_at: Option<Timestamp>,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl JourneyRow {
    pub fn into_domain(self) -> Result<Journey, CoreError> {
        let current_stage_index = usize::try_from(self.current_stage_index).map_err(|_| {
            CoreError::Internal(format!(
                "Journey {} has negative current_stage_index {}",
                self.id, self.current_stage_index
            ))
        })?;
        Ok(Journey {
            id: self.id,
            user_id: self.user_id,
            stages: self.stages.0,
            current_stage_index,
            state: JourneyState::from_str_db(&self.state)?,
            started_at: self.started_at,
            completed_at: self.completed_at,
            replaced_at: self.replaced_at,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Body of `POST /journeys`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateJourneyRequest {
    #[serde(alias = "stageIds")]
    #[validate(length(min = 1, message = "at least one stage id is required"))]
    pub stage_ids: Vec<String>,
}

impl CreateJourneyRequest {
    /// Parse the string ids, rejecting blanks, non-numeric values and repeats.
    pub fn parsed_ids(&self) -> Result<Vec<DbId>, CoreError> {
        let mut ids = Vec::with_capacity(self.stage_ids.len());
        for raw in &self.stage_ids {
            let id: DbId = raw
                .trim()
                .parse()
                .map_err(|_| CoreError::Validation(format!("Invalid stage id '{raw}'")))?;
            if ids.contains(&id) {
                return Err(CoreError::Validation(format!(
                    "Stage id {id} is listed more than once"
                )));
            }
            ids.push(id);
        }
        Ok(ids)
    }
}

/// Body of `PUT /journeys/submit-final-test/{stageIndex}`.
///
/// `answers` takes precedence over `score` when both are present.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitFinalTestRequest {
    pub score: Option<f64>,
    pub answers: Option<AnswerSubmission>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    #[test]
    fn create_request_accepts_camel_case_and_parses_ids() {
        let req: CreateJourneyRequest =
            serde_json::from_value(serde_json::json!({ "stageIds": ["3", " 1 "] })).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.parsed_ids().unwrap(), vec![3, 1]);
    }

    #[test]
    fn create_request_rejects_bad_ids() {
        let empty = CreateJourneyRequest { stage_ids: vec![] };
        assert!(empty.validate().is_err());

        let junk = CreateJourneyRequest {
            stage_ids: vec!["abc".into()],
        };
        assert_matches!(junk.parsed_ids(), Err(CoreError::Validation(_)));

        let repeated = CreateJourneyRequest {
            stage_ids: vec!["1".into(), "1".into()],
        };
        assert_matches!(repeated.parsed_ids(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn submit_request_decodes_both_answer_shapes() {
        let graded: SubmitFinalTestRequest = serde_json::from_value(serde_json::json!({
            "answers": [{ "questionId": 1, "answer": "a", "isCorrect": true }]
        }))
        .unwrap();
        assert_matches!(graded.answers, Some(AnswerSubmission::Graded(_)));

        let positional: SubmitFinalTestRequest =
            serde_json::from_value(serde_json::json!({ "score": 50, "answers": ["a", null] }))
                .unwrap();
        assert_matches!(positional.answers, Some(AnswerSubmission::Positional(_)));
        assert_eq!(positional.score, Some(50.0));
    }

    #[test]
    fn row_converts_to_domain() {
        let now = Utc::now();
        let row = JourneyRow {
            id: 4,
            user_id: 9,
            stages: Json(vec![]),
            current_stage_index: 0,
            state: "replaced".into(),
            started_at: Some(now),
            completed_at: None,
            replaced_at: Some(now),
            version: 3,
            created_at: now,
            updated_at: now,
        };
        let journey = row.clone().into_domain().unwrap();
        assert_eq!(journey.state, JourneyState::Replaced);
        assert_eq!(journey.version, 3);

        let broken = JourneyRow {
            current_stage_index: -1,
            ..row
        };
        assert_matches!(broken.into_domain(), Err(CoreError::Internal(_)));
    }
}
