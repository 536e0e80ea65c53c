//! Repository for the `journeys` table.
//!
//! The stage tree lives in the `stages` JSONB column and is always written
//! whole. Updates are compare-and-swap on `version`.

use sqlx::types::Json;
use sqlx::PgPool;

use journey_core::journey::{Journey, JourneyState, NewJourney};
use journey_core::types::{DbId, Timestamp};

use crate::models::journey::JourneyRow;

/// Column list for `journeys` queries.
const COLUMNS: &str = "\
    id, user_id, stages, current_stage_index, state, \
    started_at, completed_at, replaced_at, version, created_at, updated_at";

/// SQL predicate matching an active journey.
const ACTIVE: &str = "state IN ('not_started', 'in_progress')";

pub struct JourneyRepo;

impl JourneyRepo {
    /// The user's active journey. The partial unique index guarantees at
    /// most one.
    pub async fn find_active(pool: &PgPool, user_id: DbId) -> Result<Option<JourneyRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM journeys WHERE user_id = $1 AND {ACTIVE}");
        sqlx::query_as::<_, JourneyRow>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_latest_completed(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<JourneyRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM journeys \
             WHERE user_id = $1 AND state = $2 \
             ORDER BY completed_at DESC NULLS LAST, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, JourneyRow>(&query)
            .bind(user_id)
            .bind(JourneyState::Completed.as_str())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<JourneyRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM journeys WHERE id = $1");
        sqlx::query_as::<_, JourneyRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Every journey of the user, newest first.
    pub async fn list_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<JourneyRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM journeys \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, JourneyRow>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Flip the user's active journey (if any) to `replaced` and insert
    /// `new`, in one transaction.
    ///
    /// Returns the inserted row and the id of the replaced journey. A
    /// concurrent create that commits first makes the insert trip
    /// `uq_journeys_active_user`.
    pub async fn create_replacing_active(
        pool: &PgPool,
        new: &NewJourney,
        now: Timestamp,
    ) -> Result<(JourneyRow, Option<DbId>), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let replace_query = format!(
            "UPDATE journeys SET \
                 state = $2, replaced_at = $3, updated_at = $3, version = version + 1 \
             WHERE user_id = $1 AND {ACTIVE} \
             RETURNING id"
        );
        let replaced: Option<DbId> = sqlx::query_scalar(&replace_query)
            .bind(new.user_id)
            .bind(JourneyState::Replaced.as_str())
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;

        let insert_query = format!(
            "INSERT INTO journeys \
                 (user_id, stages, current_stage_index, state, started_at, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 1, $6, $6) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JourneyRow>(&insert_query)
            .bind(new.user_id)
            .bind(Json(&new.stages))
            .bind(stage_index_column(new.current_stage_index)?)
            .bind(new.state.as_str())
            .bind(new.started_at)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((row, replaced))
    }

    /// Write the whole journey if `version` still matches.
    ///
    /// Returns `None` when another writer bumped the version first.
    pub async fn update_if_version(
        pool: &PgPool,
        journey: &Journey,
    ) -> Result<Option<JourneyRow>, sqlx::Error> {
        let query = format!(
            "UPDATE journeys SET \
                 stages = $3, current_stage_index = $4, state = $5, \
                 started_at = $6, completed_at = $7, replaced_at = $8, \
                 version = version + 1, updated_at = $9 \
             WHERE id = $1 AND version = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JourneyRow>(&query)
            .bind(journey.id)
            .bind(journey.version)
            .bind(Json(&journey.stages))
            .bind(stage_index_column(journey.current_stage_index)?)
            .bind(journey.state.as_str())
            .bind(journey.started_at)
            .bind(journey.completed_at)
            .bind(journey.replaced_at)
            .bind(journey.updated_at)
            .fetch_optional(pool)
            .await
    }
}

fn stage_index_column(index: usize) -> Result<i32, sqlx::Error> {
    i32::try_from(index).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}
