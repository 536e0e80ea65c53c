//! Handlers for the learner's journey.
//!
//! Every endpoint acts on the authenticated caller's own journey, except
//! `progress/{userId}` (self or admin) and the admin reset.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use validator::Validate;

use journey_core::journey::JourneyView;
use journey_core::progression::Outcome;
use journey_core::scoring::DaySubmission;
use journey_core::types::DbId;
use journey_db::models::journey::{CreateJourneyRequest, SubmitFinalTestRequest};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::response::{DataResponse, TransitionResponse};
use crate::state::AppState;

fn transition_response(outcome: Outcome) -> Json<TransitionResponse<JourneyView>> {
    Json(TransitionResponse {
        data: JourneyView::from(outcome.journey),
        effects: outcome.effects,
    })
}

// ---------------------------------------------------------------------------
// Create / read
// ---------------------------------------------------------------------------

/// POST /api/v1/journeys
///
/// Create a journey from catalog stage ids, replacing any active one.
pub async fn create_journey(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateJourneyRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    input.validate()?;
    let stage_ids = input.parsed_ids()?;

    let journey = state.journeys.create(auth.user_id, &stage_ids).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: JourneyView::from(journey),
        }),
    ))
}

/// GET /api/v1/journeys/current
pub async fn get_current(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let journey = state.journeys.current(auth.user_id).await?;
    Ok(Json(DataResponse { data: journey }))
}

/// GET /api/v1/journeys/history
pub async fn get_history(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let journeys = state.journeys.history(auth.user_id).await?;
    Ok(Json(DataResponse { data: journeys }))
}

/// GET /api/v1/journeys/progress/{userId}
pub async fn get_progress(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<DbId>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(user_id) = path?;
    auth.ensure_can_read(user_id)?;

    let summary = state.journeys.progress(user_id).await?;
    Ok(Json(DataResponse { data: summary }))
}

// ---------------------------------------------------------------------------
// Days and stages
// ---------------------------------------------------------------------------

/// PUT /api/v1/journeys/complete-day/{stageIndex}/{dayNumber}
pub async fn complete_day(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<(usize, i32)>, PathRejection>,
    payload: Result<Json<DaySubmission>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Path((stage_index, day_number)) = path?;
    let Json(submission) = payload?;

    let outcome = state
        .journeys
        .complete_day(auth.user_id, stage_index, day_number, &submission)
        .await?;
    Ok(transition_response(outcome))
}

/// PUT /api/v1/journeys/start-next-day/{stageIndex}/{dayNumber}
pub async fn start_next_day(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<(usize, i32)>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let Path((stage_index, day_number)) = path?;

    let outcome = state
        .journeys
        .start_day(auth.user_id, stage_index, day_number)
        .await?;
    Ok(transition_response(outcome))
}

/// POST /api/v1/journeys/skip-stage/{stageIndex}
pub async fn skip_stage(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<usize>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(stage_index) = path?;

    let outcome = state.journeys.skip_stage(auth.user_id, stage_index).await?;
    Ok(transition_response(outcome))
}

// ---------------------------------------------------------------------------
// Final test
// ---------------------------------------------------------------------------

/// GET /api/v1/journeys/final-test/{stageIndex}
pub async fn get_final_test(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<usize>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(stage_index) = path?;

    let status = state
        .journeys
        .final_test_status(auth.user_id, stage_index)
        .await?;
    Ok(Json(DataResponse { data: status }))
}

/// POST /api/v1/journeys/start-stage-final-test/{stageIndex}
pub async fn start_final_test(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<usize>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(stage_index) = path?;

    let (test, effects) = state
        .journeys
        .start_final_test(auth.user_id, stage_index)
        .await?;
    Ok(Json(TransitionResponse {
        data: test,
        effects,
    }))
}

/// PUT /api/v1/journeys/submit-final-test/{stageIndex}
pub async fn submit_final_test(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<usize>, PathRejection>,
    payload: Result<Json<SubmitFinalTestRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(stage_index) = path?;
    let Json(input) = payload?;

    let (result, effects) = state
        .journeys
        .submit_final_test(auth.user_id, stage_index, &input)
        .await?;
    tracing::info!(
        user_id = auth.user_id,
        stage_index,
        score = result.score,
        passed = result.passed,
        "Final test submitted",
    );
    Ok(Json(TransitionResponse {
        data: result,
        effects,
    }))
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/journeys/{journeyId}/reset-final-test/{stageIndex}
///
/// Clear a failed final test so the learner can retake it.
pub async fn reset_final_test(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    path: Result<Path<(DbId, usize)>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let Path((journey_id, stage_index)) = path?;

    let outcome = state
        .journeys
        .reset_final_test(journey_id, stage_index)
        .await?;
    tracing::info!(
        admin_id = admin.user_id,
        journey_id,
        stage_index,
        "Final test reset",
    );
    Ok(transition_response(outcome))
}
