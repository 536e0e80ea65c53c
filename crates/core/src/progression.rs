//! Progression engine: validates a requested transition against one journey
//! snapshot and describes the result as an explicit list of [`Effect`]s.
//!
//! [`plan`] is pure and never mutates. [`apply_effects`] folds the effects
//! into the snapshot. [`apply`] does both. Nothing here performs I/O; the
//! journey service persists the resulting snapshot as one unit.

use serde::Serialize;

use crate::error::CoreError;
use crate::journey::{
    DayProgress, FinalTestProgress, Journey, JourneyState, StageProgress, StageState,
};
use crate::scoring::{is_passing, validate_score, SKIPPED_STAGE_SCORE};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Transitions and effects
// ---------------------------------------------------------------------------

/// A learner (or admin) request against a journey.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    CompleteDay {
        stage_index: usize,
        day_number: i32,
        score: f64,
    },
    StartDay {
        stage_index: usize,
        day_number: i32,
    },
    /// `question_ids` is the assembled order to store with the test.
    StartFinalTest {
        stage_index: usize,
        question_ids: Vec<DbId>,
    },
    CompleteFinalTest {
        stage_index: usize,
        score: f64,
    },
    SkipStage {
        stage_index: usize,
    },
    /// Administrative: allow a failed final test to be retaken.
    ResetFinalTest {
        stage_index: usize,
    },
}

impl Transition {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CompleteDay { .. } => "complete_day",
            Self::StartDay { .. } => "start_day",
            Self::StartFinalTest { .. } => "start_final_test",
            Self::CompleteFinalTest { .. } => "complete_final_test",
            Self::SkipStage { .. } => "skip_stage",
            Self::ResetFinalTest { .. } => "reset_final_test",
        }
    }

    pub fn stage_index(&self) -> usize {
        match *self {
            Self::CompleteDay { stage_index, .. }
            | Self::StartDay { stage_index, .. }
            | Self::StartFinalTest { stage_index, .. }
            | Self::CompleteFinalTest { stage_index, .. }
            | Self::SkipStage { stage_index }
            | Self::ResetFinalTest { stage_index } => stage_index,
        }
    }
}

/// One state change produced by a transition, including every cascade.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    StartJourney,
    StartStage {
        stage_index: usize,
    },
    StartDay {
        stage_index: usize,
        day_number: i32,
    },
    CompleteDay {
        stage_index: usize,
        day_number: i32,
        score: f64,
    },
    UnlockFinalTest {
        stage_index: usize,
    },
    StartFinalTest {
        stage_index: usize,
        #[serde(skip_serializing)]
        question_ids: Vec<DbId>,
    },
    RecordFinalTest {
        stage_index: usize,
        score: f64,
        passed: bool,
    },
    ResetFinalTest {
        stage_index: usize,
    },
    CompleteStage {
        stage_index: usize,
    },
    SkipStage {
        stage_index: usize,
    },
    AdvanceStage {
        to: usize,
    },
    CompleteJourney,
}

/// A transition's result: the new snapshot plus what changed.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub journey: Journey,
    pub effects: Vec<Effect>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Validate `transition` and apply it to an owned snapshot.
pub fn apply(journey: Journey, transition: &Transition, now: Timestamp) -> Result<Outcome, CoreError> {
    let effects = plan(&journey, transition)?;
    let mut journey = journey;
    apply_effects(&mut journey, &effects, now)?;
    Ok(Outcome { journey, effects })
}

/// Validate `transition` and compute its effects without mutating anything.
///
/// An empty list means the request was already satisfied.
pub fn plan(journey: &Journey, transition: &Transition) -> Result<Vec<Effect>, CoreError> {
    ensure_mutable(journey)?;

    match *transition {
        Transition::CompleteDay {
            stage_index,
            day_number,
            score,
        } => plan_complete_day(journey, stage_index, day_number, score),
        Transition::StartDay {
            stage_index,
            day_number,
        } => plan_start_day(journey, stage_index, day_number),
        Transition::StartFinalTest {
            stage_index,
            ref question_ids,
        } => plan_start_final_test(journey, stage_index, question_ids),
        Transition::CompleteFinalTest { stage_index, score } => {
            plan_complete_final_test(journey, stage_index, score)
        }
        Transition::SkipStage { stage_index } => plan_skip_stage(journey, stage_index),
        Transition::ResetFinalTest { stage_index } => plan_reset_final_test(journey, stage_index),
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

fn ensure_mutable(journey: &Journey) -> Result<(), CoreError> {
    match journey.state {
        JourneyState::NotStarted | JourneyState::InProgress => Ok(()),
        JourneyState::Completed | JourneyState::Skipped => Err(CoreError::AlreadyCompleted(
            format!("Journey {} is finished and can no longer change", journey.id),
        )),
        JourneyState::Replaced => Err(CoreError::Conflict(format!(
            "Journey {} has been replaced by a newer journey",
            journey.id
        ))),
    }
}

/// Stage lookup for day-level transitions: must be reached and unfinished.
fn open_stage(journey: &Journey, stage_index: usize) -> Result<&StageProgress, CoreError> {
    let stage = journey.stage(stage_index)?;
    if stage_index > journey.current_stage_index {
        return Err(CoreError::SequenceViolation {
            message: format!(
                "Stage {stage_index} has not been reached; the current stage is {}",
                journey.current_stage_index
            ),
            next_available_day: None,
        });
    }
    if stage.state.is_terminal() {
        return Err(CoreError::AlreadyCompleted(format!(
            "Stage {stage_index} is already finished"
        )));
    }
    Ok(stage)
}

/// Position of `day_number`, after checking every earlier day is complete.
fn reachable_day(
    stage: &StageProgress,
    stage_index: usize,
    day_number: i32,
) -> Result<usize, CoreError> {
    let position = stage.day_position(day_number).ok_or_else(|| {
        CoreError::not_found("Day", format!("{day_number} in stage {stage_index}"))
    })?;
    if let Some(next) = stage.first_incomplete_day().filter(|&n| n < day_number) {
        return Err(CoreError::SequenceViolation {
            message: format!("Day {next} must be completed before day {day_number}"),
            next_available_day: Some(next),
        });
    }
    Ok(position)
}

/// Promote a not-yet-started journey and stage before touching their days.
fn start_if_needed(journey: &Journey, stage_index: usize, effects: &mut Vec<Effect>) {
    if journey.state == JourneyState::NotStarted {
        effects.push(Effect::StartJourney);
    }
    if journey.stages[stage_index].state == StageState::NotStarted {
        effects.push(Effect::StartStage { stage_index });
    }
}

/// After a stage finishes: move to the next stage and open its first day,
/// or complete the journey when it was the last one.
fn cascade(journey: &Journey, stage_index: usize, effects: &mut Vec<Effect>) {
    if stage_index != journey.current_stage_index {
        return;
    }
    let next = stage_index + 1;
    match journey.stages.get(next) {
        Some(stage) => {
            effects.push(Effect::AdvanceStage { to: next });
            if stage.state == StageState::NotStarted {
                effects.push(Effect::StartStage { stage_index: next });
            }
            if let Some(day) = stage.days.first().filter(|d| !d.started) {
                effects.push(Effect::StartDay {
                    stage_index: next,
                    day_number: day.day_number,
                });
            }
        }
        None => effects.push(Effect::CompleteJourney),
    }
}

fn plan_complete_day(
    journey: &Journey,
    stage_index: usize,
    day_number: i32,
    score: f64,
) -> Result<Vec<Effect>, CoreError> {
    validate_score(score)?;
    let stage = open_stage(journey, stage_index)?;
    let position = reachable_day(stage, stage_index, day_number)?;
    let day = &stage.days[position];

    let complete = Effect::CompleteDay {
        stage_index,
        day_number,
        score,
    };

    // A retake only rewrites the recorded score.
    if day.completed {
        return Ok(vec![complete]);
    }

    let mut effects = Vec::new();
    start_if_needed(journey, stage_index, &mut effects);
    if !day.started {
        effects.push(Effect::StartDay {
            stage_index,
            day_number,
        });
    }
    effects.push(complete);

    if let Some(next) = stage.days.get(position + 1).filter(|d| !d.started) {
        effects.push(Effect::StartDay {
            stage_index,
            day_number: next.day_number,
        });
    }

    let rest_completed = stage
        .days
        .iter()
        .enumerate()
        .all(|(i, d)| i == position || d.completed);
    if rest_completed {
        if !stage.final_test.unlocked {
            effects.push(Effect::UnlockFinalTest { stage_index });
        }
        if stage.final_test.passed {
            effects.push(Effect::CompleteStage { stage_index });
            cascade(journey, stage_index, &mut effects);
        }
    }

    Ok(effects)
}

fn plan_start_day(
    journey: &Journey,
    stage_index: usize,
    day_number: i32,
) -> Result<Vec<Effect>, CoreError> {
    let stage = open_stage(journey, stage_index)?;
    let position = reachable_day(stage, stage_index, day_number)?;
    if stage.days[position].started {
        return Ok(Vec::new());
    }

    let mut effects = Vec::new();
    start_if_needed(journey, stage_index, &mut effects);
    effects.push(Effect::StartDay {
        stage_index,
        day_number,
    });
    Ok(effects)
}

fn plan_start_final_test(
    journey: &Journey,
    stage_index: usize,
    question_ids: &[DbId],
) -> Result<Vec<Effect>, CoreError> {
    let test = &journey.stage(stage_index)?.final_test;
    if !test.unlocked {
        return Err(CoreError::NotUnlocked(format!(
            "Final test for stage {stage_index} unlocks once every day is completed"
        )));
    }
    if test.completed {
        return Err(CoreError::AlreadyCompleted(format!(
            "Final test for stage {stage_index} has already been submitted"
        )));
    }
    if test.started {
        return Ok(Vec::new());
    }
    Ok(vec![Effect::StartFinalTest {
        stage_index,
        question_ids: question_ids.to_vec(),
    }])
}

fn plan_complete_final_test(
    journey: &Journey,
    stage_index: usize,
    score: f64,
) -> Result<Vec<Effect>, CoreError> {
    validate_score(score)?;
    let stage = submittable_stage(journey, stage_index)?;

    let passed = is_passing(score, stage.min_score);
    let mut effects = vec![Effect::RecordFinalTest {
        stage_index,
        score,
        passed,
    }];
    if passed {
        effects.push(Effect::CompleteStage { stage_index });
        cascade(journey, stage_index, &mut effects);
    }
    Ok(effects)
}

fn submittable_stage(journey: &Journey, stage_index: usize) -> Result<&StageProgress, CoreError> {
    let stage = journey.stage(stage_index)?;
    if stage.final_test.completed {
        return Err(CoreError::AlreadyCompleted(format!(
            "Final test for stage {stage_index} has already been submitted"
        )));
    }
    if !stage.final_test.started {
        return Err(CoreError::NotUnlocked(format!(
            "Final test for stage {stage_index} has not been started"
        )));
    }
    Ok(stage)
}

/// Check that the stage's final test is open for a submission, so answers
/// can be graded before the transition is planned.
pub fn ensure_final_test_submittable(journey: &Journey, stage_index: usize) -> Result<(), CoreError> {
    ensure_mutable(journey)?;
    submittable_stage(journey, stage_index).map(|_| ())
}

fn plan_skip_stage(journey: &Journey, stage_index: usize) -> Result<Vec<Effect>, CoreError> {
    let stage = journey.stage(stage_index)?;
    if stage_index > journey.current_stage_index {
        return Err(CoreError::Forbidden(format!(
            "Stage {stage_index} has not been reached yet"
        )));
    }
    match stage.state {
        StageState::Completed => {
            return Err(CoreError::AlreadyCompleted(format!(
                "Stage {stage_index} is already completed and cannot be skipped"
            )))
        }
        StageState::Skipped => {
            return Err(CoreError::AlreadyCompleted(format!(
                "Stage {stage_index} has already been skipped"
            )))
        }
        StageState::NotStarted | StageState::InProgress => {}
    }

    let mut effects = Vec::new();
    if journey.state == JourneyState::NotStarted {
        effects.push(Effect::StartJourney);
    }
    effects.push(Effect::SkipStage { stage_index });
    cascade(journey, stage_index, &mut effects);
    Ok(effects)
}

fn plan_reset_final_test(journey: &Journey, stage_index: usize) -> Result<Vec<Effect>, CoreError> {
    let stage = journey.stage(stage_index)?;
    if stage.state.is_terminal() {
        return Err(CoreError::AlreadyCompleted(format!(
            "Stage {stage_index} is already finished"
        )));
    }
    if !stage.final_test.completed {
        return Err(CoreError::Validation(format!(
            "Final test for stage {stage_index} has no failed attempt to reset"
        )));
    }
    Ok(vec![Effect::ResetFinalTest { stage_index }])
}

// ---------------------------------------------------------------------------
// Applying
// ---------------------------------------------------------------------------

/// Fold planned effects into the snapshot.
///
/// Timestamps already set are kept, so replaying an effect never moves them.
pub fn apply_effects(
    journey: &mut Journey,
    effects: &[Effect],
    now: Timestamp,
) -> Result<(), CoreError> {
    for effect in effects {
        match effect {
            Effect::StartJourney => {
                journey.state = JourneyState::InProgress;
                journey.started_at.get_or_insert(now);
            }
            Effect::StartStage { stage_index } => {
                let stage = stage_mut(journey, *stage_index)?;
                stage.started = true;
                stage.started_at.get_or_insert(now);
                if stage.state == StageState::NotStarted {
                    stage.state = StageState::InProgress;
                }
            }
            Effect::StartDay {
                stage_index,
                day_number,
            } => {
                let day = day_mut(journey, *stage_index, *day_number)?;
                day.started = true;
                day.started_at.get_or_insert(now);
            }
            Effect::CompleteDay {
                stage_index,
                day_number,
                score,
            } => {
                let day = day_mut(journey, *stage_index, *day_number)?;
                day.started = true;
                day.started_at.get_or_insert(now);
                day.completed = true;
                day.completed_at.get_or_insert(now);
                day.score = Some(*score);
            }
            Effect::UnlockFinalTest { stage_index } => {
                stage_mut(journey, *stage_index)?.final_test.unlocked = true;
            }
            Effect::StartFinalTest {
                stage_index,
                question_ids,
            } => {
                let test = &mut stage_mut(journey, *stage_index)?.final_test;
                test.started = true;
                test.started_at.get_or_insert(now);
                test.question_ids = question_ids.clone();
            }
            Effect::RecordFinalTest {
                stage_index,
                score,
                passed,
            } => {
                let test = &mut stage_mut(journey, *stage_index)?.final_test;
                test.completed = true;
                test.completed_at.get_or_insert(now);
                test.score = Some(*score);
                test.passed = *passed;
            }
            Effect::ResetFinalTest { stage_index } => {
                let test = &mut stage_mut(journey, *stage_index)?.final_test;
                *test = FinalTestProgress {
                    unlocked: test.unlocked,
                    ..FinalTestProgress::default()
                };
            }
            Effect::CompleteStage { stage_index } => {
                let stage = stage_mut(journey, *stage_index)?;
                stage.state = StageState::Completed;
                stage.completed_at.get_or_insert(now);
            }
            Effect::SkipStage { stage_index } => {
                force_pass(stage_mut(journey, *stage_index)?, now);
            }
            Effect::AdvanceStage { to } => {
                journey.current_stage_index = journey.current_stage_index.max(*to);
            }
            Effect::CompleteJourney => {
                journey.state = JourneyState::Completed;
                journey.completed_at.get_or_insert(now);
            }
        }
    }
    journey.updated_at = now;
    Ok(())
}

/// Complete every day and force-pass the final test of a skipped stage.
fn force_pass(stage: &mut StageProgress, now: Timestamp) {
    for day in &mut stage.days {
        day.started = true;
        day.started_at.get_or_insert(now);
        day.completed = true;
        day.completed_at.get_or_insert(now);
    }

    let test = &mut stage.final_test;
    test.unlocked = true;
    test.started = true;
    test.started_at.get_or_insert(now);
    test.completed = true;
    test.completed_at.get_or_insert(now);
    test.score = Some(SKIPPED_STAGE_SCORE);
    test.passed = true;

    stage.started = true;
    stage.started_at.get_or_insert(now);
    stage.state = StageState::Skipped;
    stage.completed_at.get_or_insert(now);
}

fn stage_mut(journey: &mut Journey, index: usize) -> Result<&mut StageProgress, CoreError> {
    journey
        .stages
        .get_mut(index)
        .ok_or_else(|| CoreError::not_found("Stage", format!("at index {index}")))
}

fn day_mut(
    journey: &mut Journey,
    stage_index: usize,
    day_number: i32,
) -> Result<&mut DayProgress, CoreError> {
    stage_mut(journey, stage_index)?
        .days
        .iter_mut()
        .find(|d| d.day_number == day_number)
        .ok_or_else(|| CoreError::not_found("Day", format!("{day_number} in stage {stage_index}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
