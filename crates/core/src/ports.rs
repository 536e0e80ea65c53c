//! Boundaries the journey service talks through.
//!
//! `journey-db` provides PostgreSQL and in-memory implementations.

use async_trait::async_trait;

use crate::catalog::{Question, StageTemplate};
use crate::error::CoreError;
use crate::journey::{Journey, NewJourney};
use crate::types::{DbId, Timestamp};

/// Persistence-port failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Stale version on save, or a concurrent create won the race.
    #[error("Storage conflict: {0}")]
    Conflict(String),

    /// Transient I/O failure that survived every retry.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Backend(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => CoreError::Conflict(msg),
            StoreError::Unavailable(msg) => CoreError::ServiceUnavailable(msg),
            StoreError::Backend(msg) => CoreError::Internal(msg),
        }
    }
}

/// Result of inserting a new journey.
#[derive(Debug, Clone)]
pub struct CreatedJourney {
    pub journey: Journey,
    /// Id of the journey flipped to `replaced`, if there was one.
    pub replaced: Option<DbId>,
}

/// One document per journey, read and written as a unit.
#[async_trait]
pub trait JourneyStore: Send + Sync {
    /// Cheap reachability probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;

    /// The user's journey in `not_started` or `in_progress`, if any.
    async fn find_active(&self, user_id: DbId) -> Result<Option<Journey>, StoreError>;

    /// The user's most recently completed journey.
    async fn find_latest_completed(&self, user_id: DbId) -> Result<Option<Journey>, StoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<Journey>, StoreError>;

    /// Every journey of the user, newest first.
    async fn list_for_user(&self, user_id: DbId) -> Result<Vec<Journey>, StoreError>;

    /// Atomically flip any active journey of the user to `replaced` and
    /// insert `new`.
    async fn create_replacing_active(
        &self,
        new: &NewJourney,
        now: Timestamp,
    ) -> Result<CreatedJourney, StoreError>;

    /// Write the whole journey if its `version` still matches storage.
    ///
    /// Returns the stored journey with the bumped version, or
    /// [`StoreError::Conflict`] when another writer got there first.
    async fn save(&self, journey: &Journey) -> Result<Journey, StoreError>;
}

/// Read-only stage templates.
#[async_trait]
pub trait StageCatalog: Send + Sync {
    /// Templates for the given ids, in any order. Unknown ids are omitted.
    async fn find_stages(&self, ids: &[DbId]) -> Result<Vec<StageTemplate>, StoreError>;
}

/// Resolves question ids to content for test assembly.
#[async_trait]
pub trait QuestionResolver: Send + Sync {
    /// Questions for the given ids, in any order. Unknown ids are omitted.
    async fn resolve(&self, ids: &[DbId]) -> Result<Vec<Question>, StoreError>;
}
