//! Journey orchestration: load the journey, run the progression engine,
//! persist the whole snapshot, return the projection.
//!
//! Saves are compare-and-swap on the journey version. A save that loses the
//! race reloads and re-applies the transition against the fresh snapshot, up
//! to `transition_attempts` times; the engine then re-checks every
//! precondition so a double submit cannot double-advance.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use journey_core::catalog::StageTemplate;
use journey_core::error::CoreError;
use journey_core::final_test::{
    collect_question_ids, order_questions, shuffled_question_order, test_question_ids,
    AssembledTest, FinalTestStatus,
};
use journey_core::journey::{verify_invariants, Journey, JourneyView, NewJourney, ProgressSummary};
use journey_core::ports::{JourneyStore, QuestionResolver, StageCatalog, StoreError};
use journey_core::progression::{self, Effect, Outcome, Transition};
use journey_core::scoring::{grade, validate_score, DaySubmission, ScoreCard};
use journey_core::types::DbId;
use journey_db::models::journey::SubmitFinalTestRequest;

/// Which journey a transition targets.
#[derive(Debug, Clone, Copy)]
enum Target {
    ActiveFor(DbId),
    ById(DbId),
}

/// Result of `PUT /journeys/submit-final-test/{stageIndex}`.
#[derive(Debug, Serialize)]
pub struct FinalTestResult {
    pub stage_index: usize,
    pub score: f64,
    pub passed: bool,
    pub min_score: f64,
    /// Present when the score was computed from submitted answers.
    pub score_card: Option<ScoreCard>,
    pub journey: JourneyView,
}

pub struct JourneyService {
    store: Arc<dyn JourneyStore>,
    catalog: Arc<dyn StageCatalog>,
    questions: Arc<dyn QuestionResolver>,
    transition_attempts: u32,
}

impl JourneyService {
    pub fn new(
        store: Arc<dyn JourneyStore>,
        catalog: Arc<dyn StageCatalog>,
        questions: Arc<dyn QuestionResolver>,
        transition_attempts: u32,
    ) -> Self {
        Self {
            store,
            catalog,
            questions,
            transition_attempts: transition_attempts.max(1),
        }
    }

    /// Storage reachability for the health endpoint.
    pub async fn ping(&self) -> Result<(), CoreError> {
        Ok(self.store.ping().await?)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The active journey, or else the most recently completed one.
    pub async fn current(&self, user_id: DbId) -> Result<JourneyView, CoreError> {
        self.find_current(user_id)
            .await?
            .map(JourneyView::from)
            .ok_or_else(|| CoreError::not_found("Journey", format!("for user {user_id}")))
    }

    /// Every journey of the user, replaced ones included, newest first.
    pub async fn history(&self, user_id: DbId) -> Result<Vec<JourneyView>, CoreError> {
        let journeys = self.store.list_for_user(user_id).await?;
        Ok(journeys.into_iter().map(JourneyView::from).collect())
    }

    /// Progress summary; empty when the user has no journey yet.
    pub async fn progress(&self, user_id: DbId) -> Result<ProgressSummary, CoreError> {
        Ok(self
            .find_current(user_id)
            .await?
            .as_ref()
            .map_or_else(ProgressSummary::empty, ProgressSummary::from))
    }

    /// Final-test status with its questions in the stored (or day) order.
    pub async fn final_test_status(
        &self,
        user_id: DbId,
        stage_index: usize,
    ) -> Result<FinalTestStatus, CoreError> {
        let journey = self
            .find_current(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Journey", format!("for user {user_id}")))?;
        let stage = journey.stage(stage_index)?;

        let ids = test_question_ids(stage);
        let questions = order_questions(&ids, self.questions.resolve(&ids).await?);
        if questions.is_empty() {
            return Err(CoreError::not_found(
                "Questions",
                format!("for the stage {stage_index} final test"),
            ));
        }
        Ok(FinalTestStatus::new(stage_index, stage, questions))
    }

    async fn find_current(&self, user_id: DbId) -> Result<Option<Journey>, CoreError> {
        if let Some(active) = self.store.find_active(user_id).await? {
            return Ok(Some(active));
        }
        Ok(self.store.find_latest_completed(user_id).await?)
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Build a journey from catalog stages in the given order, replacing the
    /// user's active journey if there is one.
    pub async fn create(&self, user_id: DbId, stage_ids: &[DbId]) -> Result<Journey, CoreError> {
        let templates = self.ordered_templates(stage_ids).await?;

        let mut attempt = 1;
        loop {
            let now = Utc::now();
            let new = NewJourney::from_templates(user_id, &templates, now)?;
            match self.store.create_replacing_active(&new, now).await {
                Ok(created) => {
                    if let Some(replaced_id) = created.replaced {
                        tracing::info!(
                            user_id,
                            journey_id = replaced_id,
                            "Active journey replaced",
                        );
                    }
                    tracing::info!(
                        user_id,
                        journey_id = created.journey.id,
                        stages = templates.len(),
                        "Journey created",
                    );
                    return Ok(created.journey);
                }
                Err(StoreError::Conflict(msg)) if attempt < self.transition_attempts => {
                    tracing::warn!(user_id, attempt, error = %msg, "Concurrent journey create, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Fetch templates and put them in request order; unknown ids are a
    /// validation error.
    async fn ordered_templates(&self, stage_ids: &[DbId]) -> Result<Vec<StageTemplate>, CoreError> {
        if stage_ids.is_empty() {
            return Err(CoreError::Validation(
                "At least one stage id is required".to_string(),
            ));
        }
        let mut by_id: HashMap<DbId, StageTemplate> = self
            .catalog
            .find_stages(stage_ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        let unknown: Vec<String> = stage_ids
            .iter()
            .filter(|id| !by_id.contains_key(*id))
            .map(ToString::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(CoreError::Validation(format!(
                "Unknown stage ids: {}",
                unknown.join(", ")
            )));
        }

        Ok(stage_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    pub async fn complete_day(
        &self,
        user_id: DbId,
        stage_index: usize,
        day_number: i32,
        submission: &DaySubmission,
    ) -> Result<Outcome, CoreError> {
        let score = submission.resolve_score()?;
        self.run(Target::ActiveFor(user_id), |_| {
            Ok(Transition::CompleteDay {
                stage_index,
                day_number,
                score,
            })
        })
        .await
    }

    pub async fn start_day(
        &self,
        user_id: DbId,
        stage_index: usize,
        day_number: i32,
    ) -> Result<Outcome, CoreError> {
        self.run(Target::ActiveFor(user_id), |_| {
            Ok(Transition::StartDay {
                stage_index,
                day_number,
            })
        })
        .await
    }

    pub async fn skip_stage(&self, user_id: DbId, stage_index: usize) -> Result<Outcome, CoreError> {
        self.run(Target::ActiveFor(user_id), |_| {
            Ok(Transition::SkipStage { stage_index })
        })
        .await
    }

    /// Start the test (storing a shuffled, deduplicated question order) and
    /// return its questions. Starting an already started test returns the
    /// stored order.
    pub async fn start_final_test(
        &self,
        user_id: DbId,
        stage_index: usize,
    ) -> Result<(AssembledTest, Vec<Effect>), CoreError> {
        let outcome = self
            .run(Target::ActiveFor(user_id), |journey| {
                let stage = journey.stage(stage_index)?;
                let question_ids = if stage.final_test.started {
                    stage.final_test.question_ids.clone()
                } else {
                    shuffled_question_order(stage)
                };
                if question_ids.is_empty() && stage.final_test.unlocked && !stage.final_test.completed {
                    return Err(CoreError::not_found(
                        "Questions",
                        format!("for the stage {stage_index} final test"),
                    ));
                }
                Ok(Transition::StartFinalTest {
                    stage_index,
                    question_ids,
                })
            })
            .await?;

        let stage = outcome.journey.stage(stage_index)?;
        let ids = test_question_ids(stage);
        let questions = order_questions(&ids, self.questions.resolve(&ids).await?);
        Ok((AssembledTest::new(stage_index, stage, questions), outcome.effects))
    }

    /// Grade the submission (answers take precedence over a bare score) and
    /// record the result.
    ///
    /// Answers are graded inside the transition so a retry after a lost
    /// race grades against the stored order of the snapshot it applies to.
    pub async fn submit_final_test(
        &self,
        user_id: DbId,
        stage_index: usize,
        request: &SubmitFinalTestRequest,
    ) -> Result<(FinalTestResult, Vec<Effect>), CoreError> {
        if request.answers.is_none() && request.score.is_none() {
            return Err(CoreError::Validation(
                "Provide either 'answers' or 'score'".to_string(),
            ));
        }

        let journey = self.load(Target::ActiveFor(user_id)).await?;
        progression::ensure_final_test_submittable(&journey, stage_index)?;

        // Every order a test can be stored in is drawn from the stage's days.
        let answer_key = match &request.answers {
            Some(_) => {
                let stage = journey.stage(stage_index)?;
                let mut ids = collect_question_ids(stage);
                ids.extend(test_question_ids(stage));
                ids.sort_unstable();
                ids.dedup();
                self.questions.resolve(&ids).await?
            }
            None => Vec::new(),
        };

        let mut score_card = None;
        let outcome = self
            .run(Target::ActiveFor(user_id), |journey| {
                progression::ensure_final_test_submittable(journey, stage_index)?;
                let score = match (&request.answers, request.score) {
                    (Some(answers), _) => {
                        let ids = test_question_ids(journey.stage(stage_index)?);
                        let key = order_questions(&ids, answer_key.clone());
                        let card = grade(&answers.normalize(&key), key.len())?;
                        score_card = Some(card);
                        card.accuracy_rate
                    }
                    (None, Some(score)) => {
                        validate_score(score)?;
                        score
                    }
                    (None, None) => {
                        return Err(CoreError::Validation(
                            "Provide either 'answers' or 'score'".to_string(),
                        ))
                    }
                };
                Ok(Transition::CompleteFinalTest { stage_index, score })
            })
            .await?;

        let stage = outcome.journey.stage(stage_index)?;
        let result = FinalTestResult {
            stage_index,
            score: stage.final_test.score.unwrap_or_default(),
            passed: stage.final_test.passed,
            min_score: stage.min_score,
            score_card,
            journey: JourneyView::from(outcome.journey.clone()),
        };
        Ok((result, outcome.effects))
    }

    /// Administrative reset of a failed final test.
    pub async fn reset_final_test(
        &self,
        journey_id: DbId,
        stage_index: usize,
    ) -> Result<Outcome, CoreError> {
        self.run(Target::ById(journey_id), |_| {
            Ok(Transition::ResetFinalTest { stage_index })
        })
        .await
    }

    async fn load(&self, target: Target) -> Result<Journey, CoreError> {
        match target {
            Target::ActiveFor(user_id) => self
                .store
                .find_active(user_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Active journey", format!("for user {user_id}"))),
            Target::ById(id) => self
                .store
                .find_by_id(id)
                .await?
                .ok_or_else(|| CoreError::not_found("Journey", id)),
        }
    }

    /// Load, apply, verify, save; retried on a lost compare-and-swap.
    ///
    /// `build` sees the freshly loaded journey on every attempt. When the
    /// engine reports no effects nothing is written.
    async fn run<F>(&self, target: Target, mut build: F) -> Result<Outcome, CoreError>
    where
        F: FnMut(&Journey) -> Result<Transition, CoreError> + Send,
    {
        let mut attempt = 1;
        loop {
            let journey = self.load(target).await?;
            let transition = build(&journey)?;
            let outcome = progression::apply(journey, &transition, Utc::now())?;

            if outcome.effects.is_empty() {
                return Ok(outcome);
            }
            verify_invariants(&outcome.journey)?;

            match self.store.save(&outcome.journey).await {
                Ok(saved) => {
                    tracing::info!(
                        user_id = saved.user_id,
                        journey_id = saved.id,
                        transition = transition.name(),
                        stage_index = transition.stage_index(),
                        current_stage_index = saved.current_stage_index,
                        state = saved.state.as_str(),
                        effects = outcome.effects.len(),
                        "Journey transition applied",
                    );
                    return Ok(Outcome {
                        journey: saved,
                        effects: outcome.effects,
                    });
                }
                Err(StoreError::Conflict(msg)) if attempt < self.transition_attempts => {
                    tracing::warn!(
                        journey_id = outcome.journey.id,
                        transition = transition.name(),
                        attempt,
                        error = %msg,
                        "Journey changed concurrently, reloading",
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
