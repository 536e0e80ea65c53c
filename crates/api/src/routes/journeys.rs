//! Route definitions for journeys.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::journeys;
use crate::state::AppState;

/// Routes mounted under `/journeys`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(journeys::create_journey))
        .route("/current", get(journeys::get_current))
        .route("/history", get(journeys::get_history))
        .route("/progress/{user_id}", get(journeys::get_progress))
        .route(
            "/complete-day/{stage_index}/{day_number}",
            put(journeys::complete_day),
        )
        .route(
            "/start-next-day/{stage_index}/{day_number}",
            put(journeys::start_next_day),
        )
        .route("/skip-stage/{stage_index}", post(journeys::skip_stage))
        .route("/final-test/{stage_index}", get(journeys::get_final_test))
        .route(
            "/start-stage-final-test/{stage_index}",
            post(journeys::start_final_test),
        )
        .route(
            "/submit-final-test/{stage_index}",
            put(journeys::submit_final_test),
        )
}

/// Routes mounted under `/admin/journeys` (admin only).
pub fn admin_router() -> Router<AppState> {
    Router::new().route(
        "/{journey_id}/reset-final-test/{stage_index}",
        post(journeys::reset_final_test),
    )
}
