//! Stage controllers — bind a stage's domain counters into the clock slots.
//!
//! RULE: Every stage implements StageController.
//! A controller registers its predicate and behavior with `attach` at setup
//! and must `detach` on teardown. It never resets the clock itself; the
//! owning level resets both.

use crate::{
    clock::{CompletionBehavior, CompletionPredicate, CountdownClock},
    config::{StageConfig, StageKind},
    error::{StageError, StageResult},
    event::StageEvent,
    tally::{
        CollectionTally, SavedCollection, SavedVerification, TxKind, VerificationTally,
        VerifyOutcome,
    },
};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Domain signals delivered to a stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum StageInput {
    Collected { kind: TxKind },
    Spawned { count: u32 },
    CrateVerified,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    /// The stage does not handle this input, or refused it.
    Ignored,
    Recorded,
    /// The stage goal was met outside the predicate path; the clock must stop.
    StopClock(StageEvent),
}

/// The contract every stage type must fulfill.
pub trait StageController {
    /// Unique stable name for this stage type.
    fn name(&self) -> &'static str;

    /// Stage progress in [0, 1]; 0 when there is nothing to do.
    fn progress(&self) -> f64;

    fn completion_predicate(&self) -> Option<Box<dyn CompletionPredicate>>;

    /// `None` leaves the clock default: every timeout is a failure.
    fn completion_behavior(&self) -> Option<Box<dyn CompletionBehavior>>;

    fn reset_stage_data(&mut self);

    fn apply_input(&mut self, input: StageInput) -> InputOutcome;

    fn saved_state(&self) -> StageResult<serde_json::Value>;

    fn restore_state(&mut self, state: &serde_json::Value) -> StageResult<()>;

    /// For downcasting in tests and tooling only.
    fn as_any(&self) -> &dyn Any;

    fn attach(&self, clock: &mut CountdownClock) {
        match self.completion_predicate() {
            Some(p) => clock.set_predicate(p),
            None => clock.clear_predicate(),
        }
        match self.completion_behavior() {
            Some(b) => clock.set_behavior(b),
            None => clock.clear_behavior(),
        }
        log::debug!("{}: attached to clock", self.name());
    }

    fn detach(&self, clock: &mut CountdownClock) {
        clock.clear_predicate();
        clock.clear_behavior();
        log::debug!("{}: detached from clock", self.name());
    }

    fn force_complete(&self, clock: &mut CountdownClock) -> Vec<StageEvent> {
        clock.force_complete()
    }
}

/// Build the controller a stage config asks for.
pub fn build_controller(config: &StageConfig) -> Box<dyn StageController> {
    match config.kind {
        StageKind::Collection => {
            let tally = CollectionTally::new();
            tally.add_spawned(config.spawn_count);
            Box::new(CollectionStage::with_tally(tally))
        }
        StageKind::Verification => Box::new(VerificationStage::new(
            config.required_verifications,
            config.verification_slots,
        )),
    }
}

// ── Collection stage ───────────────────────────────────────────

/// Stage 1: collect every spawned transaction before time runs out.
/// A timeout is always a failure.
pub struct CollectionStage {
    tally: CollectionTally,
    /// Spawn count configured at setup, restored by `reset_stage_data`.
    initial_spawned: u32,
}

struct AllCollected(CollectionTally);

impl CompletionPredicate for AllCollected {
    fn is_met(&self) -> bool {
        let met = self.0.all_collected();
        if met {
            log::debug!("collection: {}", self.0.summary());
        }
        met
    }
}

impl CollectionStage {
    pub fn new() -> Self {
        Self::with_tally(CollectionTally::new())
    }

    /// Use an existing counter source, e.g. one shared with a spawner.
    pub fn with_tally(tally: CollectionTally) -> Self {
        Self {
            initial_spawned: tally.to_collect(),
            tally,
        }
    }

    pub fn tally(&self) -> &CollectionTally {
        &self.tally
    }

    pub fn remaining(&self) -> u32 {
        self.tally.remaining()
    }
}

impl Default for CollectionStage {
    fn default() -> Self { Self::new() }
}

impl StageController for CollectionStage {
    fn name(&self) -> &'static str { "collection" }

    fn progress(&self) -> f64 {
        let required = self.tally.to_collect();
        if required == 0 {
            return 0.0;
        }
        (self.tally.collected() as f64 / required as f64).min(1.0)
    }

    fn completion_predicate(&self) -> Option<Box<dyn CompletionPredicate>> {
        Some(Box::new(AllCollected(self.tally.clone())))
    }

    fn completion_behavior(&self) -> Option<Box<dyn CompletionBehavior>> {
        Some(Box::new(|| true))
    }

    fn reset_stage_data(&mut self) {
        self.tally.reset();
        self.tally.add_spawned(self.initial_spawned);
        log::debug!("collection: stage data reset");
    }

    fn apply_input(&mut self, input: StageInput) -> InputOutcome {
        match input {
            StageInput::Collected { kind } => {
                self.tally.record(kind);
                InputOutcome::Recorded
            }
            StageInput::Spawned { count } => {
                self.tally.add_spawned(count);
                InputOutcome::Recorded
            }
            StageInput::CrateVerified => InputOutcome::Ignored,
        }
    }

    fn saved_state(&self) -> StageResult<serde_json::Value> {
        Ok(serde_json::to_value(self.tally.save())?)
    }

    fn restore_state(&mut self, state: &serde_json::Value) -> StageResult<()> {
        let saved: SavedCollection =
            serde_json::from_value(state.clone()).map_err(|e| StageError::InvalidSavedState {
                stage_id: self.name().to_string(),
                reason: e.to_string(),
            })?;
        self.tally.restore(&saved);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }
}

// ── Verification stage ─────────────────────────────────────────

/// Stage 2: place every valid crate into a verification slot.
/// Completing verification stops the clock (no early-completion event);
/// the player then leaves through the end zone.
pub struct VerificationStage {
    tally: VerificationTally,
}

struct FailUnlessVerified(VerificationTally);

impl CompletionBehavior for FailUnlessVerified {
    fn should_fail(&self) -> bool {
        !self.0.is_complete()
    }
}

impl VerificationStage {
    pub fn new(required: u32, slot_capacity: u32) -> Self {
        Self {
            tally: VerificationTally::new(required, slot_capacity),
        }
    }

    pub fn tally(&self) -> &VerificationTally {
        &self.tally
    }
}

impl StageController for VerificationStage {
    fn name(&self) -> &'static str { "verification" }

    fn progress(&self) -> f64 {
        let required = self.tally.required();
        if required == 0 {
            return 0.0;
        }
        (self.tally.verified() as f64 / required as f64).min(1.0)
    }

    fn completion_predicate(&self) -> Option<Box<dyn CompletionPredicate>> {
        None
    }

    fn completion_behavior(&self) -> Option<Box<dyn CompletionBehavior>> {
        Some(Box::new(FailUnlessVerified(self.tally.clone())))
    }

    fn reset_stage_data(&mut self) {
        self.tally.reset();
        log::debug!("verification: stage data reset");
    }

    fn apply_input(&mut self, input: StageInput) -> InputOutcome {
        match input {
            StageInput::CrateVerified => match self.tally.verify() {
                VerifyOutcome::Accepted => InputOutcome::Recorded,
                VerifyOutcome::Completed => {
                    log::info!(
                        "verification: all {} crates verified",
                        self.tally.required()
                    );
                    InputOutcome::StopClock(StageEvent::StageGoalReached {
                        stage: self.name().to_string(),
                    })
                }
                VerifyOutcome::Rejected => InputOutcome::Ignored,
            },
            StageInput::Collected { .. } | StageInput::Spawned { .. } => InputOutcome::Ignored,
        }
    }

    fn saved_state(&self) -> StageResult<serde_json::Value> {
        Ok(serde_json::to_value(self.tally.save())?)
    }

    fn restore_state(&mut self, state: &serde_json::Value) -> StageResult<()> {
        let saved: SavedVerification =
            serde_json::from_value(state.clone()).map_err(|e| StageError::InvalidSavedState {
                stage_id: self.name().to_string(),
                reason: e.to_string(),
            })?;
        self.tally.restore(&saved);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }
}
