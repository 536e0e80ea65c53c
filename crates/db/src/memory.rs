//! In-process port implementations with the same semantics as the
//! PostgreSQL adapters: one active journey per user, compare-and-swap saves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use journey_core::catalog::{Question, StageTemplate};
use journey_core::journey::{Journey, JourneyState, NewJourney};
use journey_core::ports::{CreatedJourney, JourneyStore, QuestionResolver, StageCatalog, StoreError};
use journey_core::types::{DbId, Timestamp};

#[derive(Default)]
struct Journeys {
    rows: Vec<Journey>,
    last_id: DbId,
}

/// [`JourneyStore`] backed by a mutex-guarded vector.
#[derive(Default)]
pub struct MemoryJourneyStore {
    journeys: Mutex<Journeys>,
    unavailable: AtomicBool,
}

impl MemoryJourneyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every stored journey, in insertion order.
    pub async fn all(&self) -> Vec<Journey> {
        self.journeys.lock().await.rows.clone()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl JourneyStore for MemoryJourneyStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn find_active(&self, user_id: DbId) -> Result<Option<Journey>, StoreError> {
        self.check_available()?;
        let journeys = self.journeys.lock().await;
        Ok(journeys
            .rows
            .iter()
            .find(|j| j.user_id == user_id && j.state.is_active())
            .cloned())
    }

    async fn find_latest_completed(&self, user_id: DbId) -> Result<Option<Journey>, StoreError> {
        self.check_available()?;
        let journeys = self.journeys.lock().await;
        Ok(journeys
            .rows
            .iter()
            .filter(|j| j.user_id == user_id && j.state == JourneyState::Completed)
            .max_by_key(|j| (j.completed_at, j.id))
            .cloned())
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Journey>, StoreError> {
        self.check_available()?;
        let journeys = self.journeys.lock().await;
        Ok(journeys.rows.iter().find(|j| j.id == id).cloned())
    }

    async fn list_for_user(&self, user_id: DbId) -> Result<Vec<Journey>, StoreError> {
        self.check_available()?;
        let journeys = self.journeys.lock().await;
        let mut list: Vec<Journey> = journeys
            .rows
            .iter()
            .filter(|j| j.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn create_replacing_active(
        &self,
        new: &NewJourney,
        now: Timestamp,
    ) -> Result<CreatedJourney, StoreError> {
        self.check_available()?;
        let mut journeys = self.journeys.lock().await;

        let mut replaced = None;
        for journey in journeys
            .rows
            .iter_mut()
            .filter(|j| j.user_id == new.user_id && j.state.is_active())
        {
            journey.state = JourneyState::Replaced;
            journey.replaced_at = Some(now);
            journey.updated_at = now;
            journey.version += 1;
            replaced = Some(journey.id);
        }

        journeys.last_id += 1;
        let journey = Journey {
            id: journeys.last_id,
            user_id: new.user_id,
            stages: new.stages.clone(),
            current_stage_index: new.current_stage_index,
            state: new.state,
            started_at: new.started_at,
            completed_at: None,
            replaced_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        journeys.rows.push(journey.clone());

        Ok(CreatedJourney { journey, replaced })
    }

    async fn save(&self, journey: &Journey) -> Result<Journey, StoreError> {
        self.check_available()?;
        let mut journeys = self.journeys.lock().await;
        let stored = journeys
            .rows
            .iter_mut()
            .find(|j| j.id == journey.id)
            .ok_or_else(|| StoreError::Backend(format!("Journey {} does not exist", journey.id)))?;
        if stored.version != journey.version {
            return Err(StoreError::Conflict(format!(
                "Journey {} changed since version {}",
                journey.id, journey.version
            )));
        }

        *stored = Journey {
            version: journey.version + 1,
            created_at: stored.created_at,
            ..journey.clone()
        };
        Ok(stored.clone())
    }
}

/// Stage templates and questions held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
    stages: HashMap<DbId, StageTemplate>,
    questions: HashMap<DbId, Question>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: StageTemplate) -> Self {
        self.stages.insert(stage.id, stage);
        self
    }

    pub fn with_question(mut self, question: Question) -> Self {
        self.questions.insert(question.id, question);
        self
    }
}

#[async_trait]
impl StageCatalog for MemoryCatalog {
    async fn find_stages(&self, ids: &[DbId]) -> Result<Vec<StageTemplate>, StoreError> {
        Ok(ids.iter().filter_map(|id| self.stages.get(id).cloned()).collect())
    }
}

#[async_trait]
impl QuestionResolver for MemoryCatalog {
    async fn resolve(&self, ids: &[DbId]) -> Result<Vec<Question>, StoreError> {
        Ok(ids.iter().filter_map(|id| self.questions.get(id).cloned()).collect())
    }
}
