//! PostgreSQL adapters for the journey and catalog ports.

use async_trait::async_trait;

use journey_core::catalog::{Question, StageTemplate};
use journey_core::journey::{Journey, NewJourney};
use journey_core::ports::{CreatedJourney, JourneyStore, QuestionResolver, StageCatalog, StoreError};
use journey_core::types::{DbId, Timestamp};

use crate::models::journey::JourneyRow;
use crate::repositories::{JourneyRepo, QuestionRepo, StageCatalogRepo};
use crate::retry::{to_store_error, RetryPolicy};
use crate::DbPool;

fn decode(row: JourneyRow) -> Result<Journey, StoreError> {
    row.into_domain()
        .map_err(|e| StoreError::Backend(e.to_string()))
}

/// [`JourneyStore`] over the `journeys` table.
#[derive(Clone)]
pub struct PgJourneyStore {
    pool: DbPool,
    retry: RetryPolicy,
}

impl PgJourneyStore {
    pub fn new(pool: DbPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl JourneyStore for PgJourneyStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.retry
            .run("ping", || crate::health_check(&self.pool))
            .await
            .map_err(to_store_error)
    }

    async fn find_active(&self, user_id: DbId) -> Result<Option<Journey>, StoreError> {
        self.retry
            .run("find_active", || JourneyRepo::find_active(&self.pool, user_id))
            .await
            .map_err(to_store_error)?
            .map(decode)
            .transpose()
    }

    async fn find_latest_completed(&self, user_id: DbId) -> Result<Option<Journey>, StoreError> {
        self.retry
            .run("find_latest_completed", || {
                JourneyRepo::find_latest_completed(&self.pool, user_id)
            })
            .await
            .map_err(to_store_error)?
            .map(decode)
            .transpose()
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Journey>, StoreError> {
        self.retry
            .run("find_by_id", || JourneyRepo::find_by_id(&self.pool, id))
            .await
            .map_err(to_store_error)?
            .map(decode)
            .transpose()
    }

    async fn list_for_user(&self, user_id: DbId) -> Result<Vec<Journey>, StoreError> {
        self.retry
            .run("list_for_user", || JourneyRepo::list_for_user(&self.pool, user_id))
            .await
            .map_err(to_store_error)?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn create_replacing_active(
        &self,
        new: &NewJourney,
        now: Timestamp,
    ) -> Result<CreatedJourney, StoreError> {
        let (row, replaced) = self
            .retry
            .run("create_replacing_active", || {
                JourneyRepo::create_replacing_active(&self.pool, new, now)
            })
            .await
            .map_err(to_store_error)?;
        Ok(CreatedJourney {
            journey: decode(row)?,
            replaced,
        })
    }

    async fn save(&self, journey: &Journey) -> Result<Journey, StoreError> {
        let row = self
            .retry
            .run("save", || JourneyRepo::update_if_version(&self.pool, journey))
            .await
            .map_err(to_store_error)?
            .ok_or_else(|| {
                StoreError::Conflict(format!(
                    "Journey {} changed since version {}",
                    journey.id, journey.version
                ))
            })?;
        decode(row)
    }
}

/// [`StageCatalog`] and [`QuestionResolver`] over the catalog tables.
#[derive(Clone)]
pub struct PgCatalog {
    pool: DbPool,
    retry: RetryPolicy,
}

impl PgCatalog {
    pub fn new(pool: DbPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl StageCatalog for PgCatalog {
    async fn find_stages(&self, ids: &[DbId]) -> Result<Vec<StageTemplate>, StoreError> {
        let rows = self
            .retry
            .run("find_stages", || StageCatalogRepo::find_many(&self.pool, ids))
            .await
            .map_err(to_store_error)?;
        Ok(rows.into_iter().map(StageTemplate::from).collect())
    }
}

#[async_trait]
impl QuestionResolver for PgCatalog {
    async fn resolve(&self, ids: &[DbId]) -> Result<Vec<Question>, StoreError> {
        let rows = self
            .retry
            .run("resolve_questions", || QuestionRepo::find_many(&self.pool, ids))
            .await
            .map_err(to_store_error)?;
        Ok(rows.into_iter().map(Question::from).collect())
    }
}
