pub mod health;
pub mod journeys;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /journeys                                         create (POST)
/// /journeys/current                                 active or latest completed
/// /journeys/history                                 every journey, newest first
/// /journeys/progress/{userId}                       summary (self or admin)
/// /journeys/complete-day/{stageIndex}/{dayNumber}   complete a day (PUT)
/// /journeys/start-next-day/{stageIndex}/{dayNumber} start a day (PUT)
/// /journeys/skip-stage/{stageIndex}                 skip a stage (POST)
/// /journeys/final-test/{stageIndex}                 test status + questions
/// /journeys/start-stage-final-test/{stageIndex}     start the test (POST)
/// /journeys/submit-final-test/{stageIndex}          submit answers (PUT)
///
/// /admin/journeys/{journeyId}/reset-final-test/{stageIndex}   reset (admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/journeys", journeys::router())
        .nest("/admin/journeys", journeys::admin_router())
}
