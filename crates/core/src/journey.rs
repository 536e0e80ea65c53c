//! Journey aggregate: one learner's progression through an ordered list of
//! stages, each split into sequential days and gated by a final test.
//!
//! The whole tree (stages, days, final tests) is one owned value. It is
//! loaded, mutated, and saved as a unit; nothing below the journey is
//! independently addressable.

use serde::{Deserialize, Serialize};

use crate::catalog::{validate_template, StageTemplate};
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Lifecycle of a whole journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyState {
    NotStarted,
    InProgress,
    Completed,
    Skipped,
    Replaced,
}

impl JourneyState {
    /// Parse a state string from the database.
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            "replaced" => Ok(Self::Replaced),
            _ => Err(CoreError::Validation(format!(
                "Invalid journey state '{s}'. Must be one of: \
                 not_started, in_progress, completed, skipped, replaced"
            ))),
        }
    }

    /// Convert to a database-compatible string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Replaced => "replaced",
        }
    }

    /// At most one journey per user may be in an active state.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::NotStarted | Self::InProgress)
    }
}

/// Lifecycle of one stage inside a journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    NotStarted,
    InProgress,
    Completed,
    Skipped,
}

impl StageState {
    /// `Completed` and `Skipped` never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// One day of practice inside a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayProgress {
    pub day_number: i32,
    pub started: bool,
    pub started_at: Option<Timestamp>,
    pub completed: bool,
    pub completed_at: Option<Timestamp>,
    pub score: Option<f64>,
    pub question_ids: Vec<DbId>,
}

/// The gating assessment at the end of a stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalTestProgress {
    pub unlocked: bool,
    pub started: bool,
    pub started_at: Option<Timestamp>,
    pub completed: bool,
    pub completed_at: Option<Timestamp>,
    pub score: Option<f64>,
    pub passed: bool,
    /// Question order fixed when the test was started.
    #[serde(default)]
    pub question_ids: Vec<DbId>,
}

/// A catalog stage bound into a journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProgress {
    pub stage_id: DbId,
    pub name: String,
    pub min_score: f64,
    pub target_score: f64,
    pub days: Vec<DayProgress>,
    pub final_test: FinalTestProgress,
    pub started: bool,
    pub started_at: Option<Timestamp>,
    pub state: StageState,
    pub completed_at: Option<Timestamp>,
}

impl StageProgress {
    /// Bind a catalog template. Days are sorted by `day_number`.
    pub fn from_template(template: &StageTemplate) -> Self {
        let mut days: Vec<DayProgress> = template
            .days
            .iter()
            .map(|d| DayProgress {
                day_number: d.day_number,
                started: false,
                started_at: None,
                completed: false,
                completed_at: None,
                score: None,
                question_ids: d.question_ids.clone(),
            })
            .collect();
        days.sort_by_key(|d| d.day_number);

        Self {
            stage_id: template.id,
            name: template.name.clone(),
            min_score: template.min_score,
            target_score: template.target_score,
            days,
            final_test: FinalTestProgress::default(),
            started: false,
            started_at: None,
            state: StageState::NotStarted,
            completed_at: None,
        }
    }

    /// Position of `day_number` within `days`.
    pub fn day_position(&self, day_number: i32) -> Option<usize> {
        self.days.iter().position(|d| d.day_number == day_number)
    }

    /// The lowest-numbered day that is not yet completed.
    pub fn first_incomplete_day(&self) -> Option<i32> {
        self.days.iter().find(|d| !d.completed).map(|d| d.day_number)
    }

    pub fn all_days_completed(&self) -> bool {
        self.days.iter().all(|d| d.completed)
    }

    pub fn completed_day_count(&self) -> usize {
        self.days.iter().filter(|d| d.completed).count()
    }
}

/// A persisted journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub id: DbId,
    pub user_id: DbId,
    pub stages: Vec<StageProgress>,
    pub current_stage_index: usize,
    pub state: JourneyState,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub replaced_at: Option<Timestamp>,
    /// Optimistic-concurrency revision, bumped on every save.
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Journey {
    /// Look up a stage by index, or `NotFound`.
    pub fn stage(&self, index: usize) -> Result<&StageProgress, CoreError> {
        self.stages
            .get(index)
            .ok_or_else(|| CoreError::not_found("Stage", format!("at index {index}")))
    }

    pub fn total_days(&self) -> usize {
        self.stages.iter().map(|s| s.days.len()).sum()
    }

    pub fn completed_days(&self) -> usize {
        self.stages.iter().map(StageProgress::completed_day_count).sum()
    }

    /// Stages that are `Completed` or `Skipped`.
    pub fn finished_stage_count(&self) -> usize {
        self.stages.iter().filter(|s| s.state.is_terminal()).count()
    }

    /// `completed_days / total_days * 100`, rounded to two decimals.
    pub fn completion_rate(&self) -> f64 {
        let total = self.total_days();
        if total == 0 {
            return 0.0;
        }
        crate::scoring::round_to_hundredths(self.completed_days() as f64 / total as f64 * 100.0)
    }
}

/// A journey that has not been inserted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJourney {
    pub user_id: DbId,
    pub stages: Vec<StageProgress>,
    pub current_stage_index: usize,
    pub state: JourneyState,
    pub started_at: Option<Timestamp>,
}

impl NewJourney {
    /// Build a journey from catalog templates in the given order.
    ///
    /// Stage 0 and its first day start immediately and the journey begins
    /// `InProgress` at index 0.
    pub fn from_templates(
        user_id: DbId,
        templates: &[StageTemplate],
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        if templates.is_empty() {
            return Err(CoreError::Validation(
                "A journey needs at least one stage".to_string(),
            ));
        }
        for template in templates {
            validate_template(template)?;
        }

        let mut stages: Vec<StageProgress> =
            templates.iter().map(StageProgress::from_template).collect();

        let first = &mut stages[0];
        first.started = true;
        first.started_at = Some(now);
        first.state = StageState::InProgress;
        if let Some(day) = first.days.first_mut() {
            day.started = true;
            day.started_at = Some(now);
        }

        Ok(Self {
            user_id,
            stages,
            current_stage_index: 0,
            state: JourneyState::InProgress,
            started_at: Some(now),
        })
    }
}

// ---------------------------------------------------------------------------
// Read projections
// ---------------------------------------------------------------------------

/// A journey plus the derived fields returned by read endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JourneyView {
    #[serde(flatten)]
    pub journey: Journey,
    pub total_days: usize,
    pub completed_days: usize,
    pub completion_rate: f64,
}

impl From<Journey> for JourneyView {
    fn from(journey: Journey) -> Self {
        Self {
            total_days: journey.total_days(),
            completed_days: journey.completed_days(),
            completion_rate: journey.completion_rate(),
            journey,
        }
    }
}

/// Compact progress summary for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub total_stages: usize,
    pub completed_stages: usize,
    pub current_stage: usize,
    pub completion_rate: f64,
}

impl ProgressSummary {
    /// Summary for a user who has no journey yet.
    pub fn empty() -> Self {
        Self {
            total_stages: 0,
            completed_stages: 0,
            current_stage: 0,
            completion_rate: 0.0,
        }
    }
}

impl From<&Journey> for ProgressSummary {
    fn from(journey: &Journey) -> Self {
        Self {
            total_stages: journey.stages.len(),
            completed_stages: journey.finished_stage_count(),
            current_stage: journey.current_stage_index,
            completion_rate: journey.completion_rate(),
        }
    }
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

/// Check the structural invariants of a journey snapshot.
///
/// - days are numbered 1..=n in order
/// - a completed day is never preceded by an incomplete one (unless skipped)
/// - `final_test.unlocked` iff every day is completed, or the stage was skipped
/// - a `Completed` stage has a passed final test
/// - every stage before `current_stage_index` is terminal
/// - a `Completed` journey has only terminal stages
pub fn verify_invariants(journey: &Journey) -> Result<(), CoreError> {
    let broken = |msg: String| -> Result<(), CoreError> {
        Err(CoreError::Internal(format!(
            "Journey {} invariant violated: {msg}",
            journey.id
        )))
    };

    if journey.stages.is_empty() {
        return broken("journey has no stages".into());
    }
    if journey.current_stage_index >= journey.stages.len() {
        return broken(format!(
            "current_stage_index {} out of range",
            journey.current_stage_index
        ));
    }

    for (index, stage) in journey.stages.iter().enumerate() {
        for (expected, day) in (1..).zip(stage.days.iter()) {
            if day.day_number != expected {
                return broken(format!("stage {index} day numbering is not dense"));
            }
        }

        if stage.state == StageState::Skipped {
            if !(stage.final_test.unlocked && stage.final_test.passed) {
                return broken(format!("skipped stage {index} final test not force-passed"));
            }
        } else {
            let mut seen_incomplete = false;
            for day in &stage.days {
                if day.completed && seen_incomplete {
                    return broken(format!(
                        "stage {index} day {} completed out of order",
                        day.day_number
                    ));
                }
                seen_incomplete |= !day.completed;
            }
            if stage.final_test.unlocked != stage.all_days_completed() {
                return broken(format!("stage {index} final test unlock flag out of sync"));
            }
        }

        if stage.state == StageState::Completed && !stage.final_test.passed {
            return broken(format!("stage {index} completed without a passed final test"));
        }
        if index < journey.current_stage_index && !stage.state.is_terminal() {
            return broken(format!("stage {index} is behind the current stage but unfinished"));
        }
    }

    if journey.state == JourneyState::Completed
        && journey.stages.iter().any(|s| !s.state.is_terminal())
    {
        return broken("completed journey has unfinished stages".into());
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DayTemplate;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn template(id: DbId, days: i32) -> StageTemplate {
        StageTemplate {
            id,
            name: format!("Stage {id}"),
            min_score: 80.0,
            target_score: 90.0,
            days: (1..=days)
                .rev()
                .map(|n| DayTemplate {
                    day_number: n,
                    question_ids: vec![n as DbId],
                })
                .collect(),
        }
    }

    fn persisted(new: NewJourney) -> Journey {
        let now = Utc::now();
        Journey {
            id: 1,
            user_id: new.user_id,
            stages: new.stages,
            current_stage_index: new.current_stage_index,
            state: new.state,
            started_at: new.started_at,
            completed_at: None,
            replaced_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn first_incomplete_day_follows_day_order() {
        let mut stage = StageProgress::from_template(&template(1, 3));
        assert_eq!(stage.first_incomplete_day(), Some(1));

        stage.days[0].completed = true;
        assert_eq!(stage.first_incomplete_day(), Some(2));

        stage.days.iter_mut().for_each(|d| d.completed = true);
        assert_eq!(stage.first_incomplete_day(), None);
    }

    // -- JourneyState --

    #[test]
    fn state_db_roundtrip() {
        for state in [
            JourneyState::NotStarted,
            JourneyState::InProgress,
            JourneyState::Completed,
            JourneyState::Skipped,
            JourneyState::Replaced,
        ] {
            assert_eq!(JourneyState::from_str_db(state.as_str()).unwrap(), state);
        }
        assert!(JourneyState::from_str_db("active").is_err());
    }

    #[test]
    fn only_not_started_and_in_progress_are_active() {
        assert!(JourneyState::NotStarted.is_active());
        assert!(JourneyState::InProgress.is_active());
        assert!(!JourneyState::Completed.is_active());
        assert!(!JourneyState::Replaced.is_active());
    }

    // -- NewJourney::from_templates --

    #[test]
    fn new_journey_starts_first_stage_and_day() {
        let now = Utc::now();
        let new = NewJourney::from_templates(9, &[template(1, 2), template(2, 1)], now).unwrap();

        assert_eq!(new.state, JourneyState::InProgress);
        assert_eq!(new.current_stage_index, 0);
        assert_eq!(new.started_at, Some(now));

        let first = &new.stages[0];
        assert_eq!(first.state, StageState::InProgress);
        assert!(first.days[0].started);
        assert!(!first.days[1].started);
        assert_eq!(first.days[0].day_number, 1);

        let second = &new.stages[1];
        assert_eq!(second.state, StageState::NotStarted);
        assert!(!second.days[0].started);
    }

    #[test]
    fn new_journey_copies_scores_and_questions() {
        let new = NewJourney::from_templates(9, &[template(4, 2)], Utc::now()).unwrap();
        let stage = &new.stages[0];
        assert_eq!(stage.stage_id, 4);
        assert_eq!(stage.min_score, 80.0);
        assert_eq!(stage.target_score, 90.0);
        assert_eq!(stage.days[1].question_ids, vec![2]);
    }

    #[test]
    fn new_journey_requires_stages() {
        assert_matches!(
            NewJourney::from_templates(9, &[], Utc::now()),
            Err(CoreError::Validation(_))
        );
    }

    // -- projections --

    #[test]
    fn completion_rate_counts_days_across_stages() {
        let mut journey = persisted(
            NewJourney::from_templates(9, &[template(1, 2), template(2, 1)], Utc::now()).unwrap(),
        );
        assert_eq!(journey.completion_rate(), 0.0);

        journey.stages[0].days[0].completed = true;
        assert_eq!(journey.completion_rate(), 33.33);

        let view = JourneyView::from(journey.clone());
        assert_eq!(view.total_days, 3);
        assert_eq!(view.completed_days, 1);

        let summary = ProgressSummary::from(&journey);
        assert_eq!(summary.total_stages, 2);
        assert_eq!(summary.completed_stages, 0);
    }

    // -- verify_invariants --

    #[test]
    fn fresh_journey_satisfies_invariants() {
        let journey =
            persisted(NewJourney::from_templates(9, &[template(1, 3)], Utc::now()).unwrap());
        assert!(verify_invariants(&journey).is_ok());
    }

    #[test]
    fn out_of_order_completion_is_detected() {
        let mut journey =
            persisted(NewJourney::from_templates(9, &[template(1, 3)], Utc::now()).unwrap());
        journey.stages[0].days[1].completed = true;
        assert_matches!(verify_invariants(&journey), Err(CoreError::Internal(_)));
    }

    #[test]
    fn unlock_flag_must_track_days() {
        let mut journey =
            persisted(NewJourney::from_templates(9, &[template(1, 1)], Utc::now()).unwrap());
        journey.stages[0].final_test.unlocked = true;
        assert!(verify_invariants(&journey).is_err());

        journey.stages[0].days[0].completed = true;
        assert!(verify_invariants(&journey).is_ok());
    }

    #[test]
    fn completed_stage_needs_passed_test() {
        let mut journey =
            persisted(NewJourney::from_templates(9, &[template(1, 1)], Utc::now()).unwrap());
        journey.stages[0].days[0].completed = true;
        journey.stages[0].final_test.unlocked = true;
        journey.stages[0].state = StageState::Completed;
        assert!(verify_invariants(&journey).is_err());

        journey.stages[0].final_test.passed = true;
        assert!(verify_invariants(&journey).is_ok());
    }
}
