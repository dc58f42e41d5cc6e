//! Level state machine — one per stage session.
//!
//! PHASES: Playing → Completed | Failed. Both are terminal until `reset()`.
//! Pause is a separate flag; it freezes ticking but never blocks a
//! transition.
//!
//! ROUTING (clock → level):
//!   - ClockEarlyCompleted                         → complete()
//!   - ClockTimedOut { failure_signaled: true }    → fail(Timeout)
//!   - ClockTimedOut { failure_signaled: false }   → no transition

use crate::{
    clock::{ClockConfig, CountdownClock},
    config::StageConfig,
    event::{FailCause, StageEvent},
    stage::{InputOutcome, StageController, StageInput},
    trigger::{Delay, EndZone, EndZoneEntry, StartZone},
    types::{EntityKind, Seconds, StageId},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LevelPhase {
    Playing,
    Completed,
    Failed,
}

/// UI and scene collaborators. Every method defaults to a no-op.
pub trait StageSink {
    /// Remaining display value, already formatted.
    fn timer_text(&mut self, _text: &str) {}
    /// Fraction of clock time elapsed.
    fn progress(&mut self, _fraction: f64) {}
    /// Fraction of the stage goal achieved.
    fn stage_progress(&mut self, _fraction: f64) {}
    fn level_completed(&mut self) {}
    fn level_failed(&mut self, _cause: FailCause) {}
    fn level_reset(&mut self) {}
    /// Scene collaborators load the next stage from here.
    fn transition_ready(&mut self) {}
}

/// A sink that ignores everything.
pub struct NullSink;

impl StageSink for NullSink {}

pub struct Level {
    stage_id: StageId,
    phase: LevelPhase,
    paused: bool,
    clock: CountdownClock,
    controller: Box<dyn StageController>,
    sink: Box<dyn StageSink>,
    start_zone: StartZone,
    end_zone: EndZone,
    /// Start the clock at construction and after every reset.
    auto_start: bool,
    transition: Delay,
    pending: Vec<StageEvent>,
}

impl Level {
    pub fn new(
        stage_id: impl Into<StageId>,
        clock_config: ClockConfig,
        controller: Box<dyn StageController>,
        sink: Box<dyn StageSink>,
    ) -> Self {
        let mut clock = CountdownClock::new(clock_config);
        controller.attach(&mut clock);
        let mut level = Self {
            stage_id: stage_id.into(),
            phase: LevelPhase::Playing,
            paused: false,
            clock,
            controller,
            sink,
            start_zone: StartZone::new(true),
            end_zone: EndZone::new(&Default::default()),
            auto_start: false,
            transition: Delay::new(0.0),
            pending: Vec::new(),
        };
        level.refresh_hud();
        level
    }

    /// Build a level from stage configuration. Auto-start stages start here.
    pub fn from_config(
        config: &StageConfig,
        controller: Box<dyn StageController>,
        sink: Box<dyn StageSink>,
    ) -> Self {
        let mut level = Self::new(
            config.stage_id.clone(),
            config.timer.clock_config(),
            controller,
            sink,
        );
        level.start_zone = StartZone::new(config.timer.start_on_player_trigger);
        level.end_zone = EndZone::new(&config.end_trigger);
        level.transition = Delay::new(config.transition_delay_secs);
        level.auto_start = config.timer.auto_start;
        if level.auto_start {
            level.start_clock();
        }
        level
    }

    // ── Frame loop ─────────────────────────────────────────────

    /// Advance one frame. Returns every event produced since the last call.
    pub fn tick(&mut self, dt: Seconds) -> Vec<StageEvent> {
        if self.paused {
            return self.drain_events();
        }
        let completed_before = self.phase == LevelPhase::Completed;

        if self.end_zone.advance(dt) {
            log::debug!("{}: end zone delay elapsed", self.stage_id);
            self.complete();
        }

        let clock_events = self.clock.tick(dt);
        if !clock_events.is_empty() {
            self.refresh_hud();
        }
        for event in clock_events {
            let early = event == StageEvent::ClockEarlyCompleted;
            let failing = event == StageEvent::ClockTimedOut { failure_signaled: true };
            self.pending.push(event);
            if early {
                self.complete();
            } else if failing {
                self.fail(FailCause::Timeout);
            }
        }

        if completed_before && self.transition.advance(dt) {
            log::info!("{}: ready to transition", self.stage_id);
            self.sink.transition_ready();
            self.pending.push(StageEvent::TransitionReady {
                after: self.transition.duration(),
            });
        }

        self.drain_events()
    }

    pub fn drain_events(&mut self) -> Vec<StageEvent> {
        std::mem::take(&mut self.pending)
    }

    // ── Transitions ────────────────────────────────────────────

    /// Returns false (and logs) when the level is not playing.
    pub fn complete(&mut self) -> bool {
        if self.phase != LevelPhase::Playing {
            log::warn!(
                "{}: level complete called but phase is {:?}",
                self.stage_id,
                self.phase
            );
            return false;
        }

        self.phase = LevelPhase::Completed;
        if self.clock.is_running() {
            let stopped = self.clock.stop();
            self.pending.extend(stopped);
        }
        self.transition.arm();
        self.sink.level_completed();
        self.pending.push(StageEvent::LevelCompleted);
        log::info!("{}: level completed", self.stage_id);
        true
    }

    /// Returns false (and logs) when the level is not playing.
    pub fn fail(&mut self, cause: FailCause) -> bool {
        if self.phase != LevelPhase::Playing {
            log::warn!(
                "{}: level failed ({cause:?}) called but phase is {:?}",
                self.stage_id,
                self.phase
            );
            return false;
        }

        self.phase = LevelPhase::Failed;
        self.sink.level_failed(cause);
        self.pending.push(StageEvent::LevelFailed { cause });
        log::info!("{}: level failed ({cause:?})", self.stage_id);
        true
    }

    /// Back to Playing with fresh stage data, clock and triggers.
    pub fn reset(&mut self) {
        self.phase = LevelPhase::Playing;
        self.paused = false;
        self.controller.reset_stage_data();
        let reset = self.clock.reset();
        self.pending.extend(reset);
        self.start_zone.reset();
        self.end_zone.reset();
        self.transition.reset();
        self.sink.level_reset();
        self.refresh_hud();
        self.pending.push(StageEvent::LevelReset);
        log::info!("{}: level reset", self.stage_id);
        if self.auto_start {
            self.start_clock();
        }
    }

    pub fn pause(&mut self) -> bool {
        if self.paused || self.phase != LevelPhase::Playing {
            log::debug!("{}: pause ignored", self.stage_id);
            return false;
        }
        self.paused = true;
        self.pending.push(StageEvent::LevelPaused);
        true
    }

    pub fn resume(&mut self) -> bool {
        if !self.paused {
            log::debug!("{}: resume ignored, not paused", self.stage_id);
            return false;
        }
        self.paused = false;
        self.pending.push(StageEvent::LevelResumed);
        true
    }

    // ── Clock control ──────────────────────────────────────────

    pub fn start_clock(&mut self) -> bool {
        if self.phase != LevelPhase::Playing {
            log::debug!("{}: start ignored, level has ended", self.stage_id);
            return false;
        }
        let started = self.clock.start();
        let ok = !started.is_empty();
        self.pending.extend(started);
        if ok {
            self.start_zone.disarm();
            self.refresh_hud();
        }
        ok
    }

    pub fn stop_clock(&mut self) -> bool {
        let stopped = self.clock.stop();
        let ok = !stopped.is_empty();
        self.pending.extend(stopped);
        ok
    }

    /// Early-complete the clock; routes to `complete()` like the predicate path.
    pub fn force_complete(&mut self) -> bool {
        let events = self.controller.force_complete(&mut self.clock);
        if events.is_empty() {
            return false;
        }
        let early = events.contains(&StageEvent::ClockEarlyCompleted);
        self.pending.extend(events);
        if early {
            self.complete();
        }
        true
    }

    // ── External signals ───────────────────────────────────────

    pub fn enter_start_zone(&mut self, kind: EntityKind) -> bool {
        if !self.start_zone.should_start(kind) {
            if kind == EntityKind::Player && !self.start_zone.is_armed() {
                log::debug!("{}: start zone is disarmed", self.stage_id);
            }
            return false;
        }
        if self.clock.is_completed() {
            log::debug!("{}: clock already completed, player entered start zone", self.stage_id);
            return false;
        }
        if self.clock.is_running() {
            log::debug!("{}: clock already running, player entered start zone", self.stage_id);
            return false;
        }
        self.start_clock()
    }

    pub fn enter_end_zone(&mut self, kind: EntityKind) -> bool {
        match self.end_zone.enter(kind) {
            EndZoneEntry::Ignored => false,
            EndZoneEntry::Scheduled => true,
            EndZoneEntry::CompleteNow => self.complete(),
        }
    }

    /// Player death fails the level regardless of the clock.
    pub fn player_died(&mut self) -> bool {
        self.fail(FailCause::PlayerDeath)
    }

    pub fn apply_input(&mut self, input: StageInput) -> InputOutcome {
        let outcome = self.controller.apply_input(input);
        if let InputOutcome::StopClock(event) = &outcome {
            self.pending.push(event.clone());
            self.stop_clock();
        }
        self.sink.stage_progress(self.controller.progress());
        outcome
    }

    /// Detach the controller from the clock and hand it back.
    pub fn teardown(mut self) -> Box<dyn StageController> {
        self.controller.detach(&mut self.clock);
        self.controller
    }

    fn refresh_hud(&mut self) {
        let text = self.clock.display_text();
        self.sink.timer_text(&text);
        self.sink.progress(self.clock.progress());
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn stage_id(&self) -> &str { &self.stage_id }
    pub fn phase(&self) -> LevelPhase { self.phase }
    pub fn is_active(&self) -> bool { self.phase == LevelPhase::Playing }
    pub fn is_paused(&self) -> bool { self.paused }
    pub fn clock(&self) -> &CountdownClock { &self.clock }
    pub fn controller(&self) -> &dyn StageController { self.controller.as_ref() }
    pub fn stage_progress(&self) -> f64 { self.controller.progress() }

    /// Mutable controller access, e.g. for restoring saved counters.
    pub fn controller_mut(&mut self) -> &mut dyn StageController {
        self.controller.as_mut()
    }
}
