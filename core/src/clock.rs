//! Countdown clock — owns real and display time, early completion and timeout.
//!
//! Two time scales run in parallel:
//!   - `real_remaining`    — authoritative seconds, decremented by `tick(dt)`.
//!   - `display_remaining` — cosmetic value shown to the player, always
//!     `display_total * real_remaining / real_total`.
//!
//! ORDER WITHIN ONE TICK (never reordered):
//!   1. Poll the completion predicate (early completion ends the tick).
//!   2. Decrement real time, recompute display time, emit `ClockUpdated`.
//!   3. Timeout check.

use crate::{event::StageEvent, types::Seconds};
use serde::{Deserialize, Serialize};

/// Replacement for non-positive or non-finite configured durations.
pub const FALLBACK_DURATION: Seconds = 10.0;

/// Checked once per tick while running. `true` ends the clock early.
pub trait CompletionPredicate {
    fn is_met(&self) -> bool;
}

/// Consulted once on timeout. `true` means the owning level should fail.
pub trait CompletionBehavior {
    fn should_fail(&self) -> bool;
}

impl<F: Fn() -> bool> CompletionPredicate for F {
    fn is_met(&self) -> bool {
        self()
    }
}

impl<F: Fn() -> bool> CompletionBehavior for F {
    fn should_fail(&self) -> bool {
        self()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClockState {
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ClockConfig {
    pub real_total: Seconds,
    pub display_total: f64,
    /// When false the predicate slot is never polled.
    pub allow_external_completion: bool,
}

impl ClockConfig {
    /// Build a config, clamping degenerate totals to `FALLBACK_DURATION`.
    pub fn new(real_total: Seconds, display_total: f64) -> Self {
        Self {
            real_total: sanitize_total("real_total", real_total),
            display_total: sanitize_total("display_total", display_total),
            allow_external_completion: true,
        }
    }

    pub fn with_external_completion(mut self, allow: bool) -> Self {
        self.allow_external_completion = allow;
        self
    }
}

fn sanitize_total(field: &str, value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        log::warn!("clock: {field}={value} is not a positive duration, using {FALLBACK_DURATION}");
        FALLBACK_DURATION
    }
}

/// Serializable view of the clock, used by session snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClockSnapshot {
    pub config: ClockConfig,
    pub real_remaining: Seconds,
    pub display_remaining: f64,
    pub state: ClockState,
}

pub struct CountdownClock {
    config: ClockConfig,
    real_remaining: Seconds,
    display_remaining: f64,
    state: ClockState,
    predicate: Option<Box<dyn CompletionPredicate>>,
    behavior: Option<Box<dyn CompletionBehavior>>,
}

impl CountdownClock {
    pub fn new(config: ClockConfig) -> Self {
        // Totals may arrive through a struct literal; clamp them here as well.
        let config = ClockConfig {
            real_total: sanitize_total("real_total", config.real_total),
            display_total: sanitize_total("display_total", config.display_total),
            ..config
        };
        Self {
            real_remaining: config.real_total,
            display_remaining: config.display_total,
            state: ClockState::Idle,
            predicate: None,
            behavior: None,
            config,
        }
    }

    // ── Slots ──────────────────────────────────────────────────

    pub fn set_predicate(&mut self, predicate: Box<dyn CompletionPredicate>) {
        self.predicate = Some(predicate);
    }

    pub fn clear_predicate(&mut self) {
        self.predicate = None;
    }

    pub fn set_behavior(&mut self, behavior: Box<dyn CompletionBehavior>) {
        self.behavior = Some(behavior);
    }

    pub fn clear_behavior(&mut self) {
        self.behavior = None;
    }

    pub fn has_predicate(&self) -> bool {
        self.predicate.is_some()
    }

    pub fn has_behavior(&self) -> bool {
        self.behavior.is_some()
    }

    // ── Control ────────────────────────────────────────────────

    pub fn start(&mut self) -> Vec<StageEvent> {
        match self.state {
            ClockState::Running => {
                log::debug!("clock: start ignored, already running");
                vec![]
            }
            ClockState::Completed => {
                log::debug!("clock: start ignored, already completed");
                vec![]
            }
            ClockState::Idle => {
                self.real_remaining = self.config.real_total;
                self.display_remaining = self.config.display_total;
                self.state = ClockState::Running;
                log::info!(
                    "clock: started real={}s display={}",
                    self.config.real_total,
                    self.config.display_total
                );
                vec![StageEvent::ClockStarted {
                    real_total: self.config.real_total,
                    display_total: self.config.display_total,
                }]
            }
        }
    }

    /// Advance by `dt` seconds. No-op unless running.
    pub fn tick(&mut self, dt: Seconds) -> Vec<StageEvent> {
        if self.state != ClockState::Running {
            return vec![];
        }

        if self.config.allow_external_completion
            && self.predicate.as_ref().is_some_and(|p| p.is_met())
        {
            log::info!("clock: completion predicate met, completing early");
            return self.complete_early();
        }

        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        self.real_remaining = (self.real_remaining - dt).max(0.0);
        self.display_remaining = self.proportional_display();

        let mut events = vec![StageEvent::ClockUpdated {
            progress: self.progress(),
            real_remaining: self.real_remaining,
            display_remaining: self.display_remaining,
        }];

        if self.real_remaining <= 0.0 {
            events.extend(self.time_out());
        }
        events
    }

    pub fn stop(&mut self) -> Vec<StageEvent> {
        if self.state != ClockState::Running {
            return vec![];
        }
        self.state = ClockState::Idle;
        log::info!("clock: stopped with {:.2}s left", self.real_remaining);
        vec![StageEvent::ClockStopped {
            real_remaining: self.real_remaining,
        }]
    }

    pub fn reset(&mut self) -> Vec<StageEvent> {
        self.state = ClockState::Idle;
        self.real_remaining = self.config.real_total;
        self.display_remaining = self.config.display_total;
        log::debug!("clock: reset");
        vec![StageEvent::ClockReset]
    }

    /// Complete immediately as if the predicate had just become true.
    pub fn force_complete(&mut self) -> Vec<StageEvent> {
        if self.state != ClockState::Running {
            log::debug!("clock: force_complete ignored in state {:?}", self.state);
            return vec![];
        }
        self.complete_early()
    }

    /// Replace the totals. A running or completed clock keeps its progress.
    pub fn reconfigure(&mut self, config: ClockConfig) {
        let progress = self.progress();
        let config = ClockConfig {
            real_total: sanitize_total("real_total", config.real_total),
            display_total: sanitize_total("display_total", config.display_total),
            ..config
        };
        self.config = config;
        match self.state {
            ClockState::Running | ClockState::Completed => {
                self.real_remaining = config.real_total * (1.0 - progress);
                self.display_remaining = self.proportional_display();
            }
            ClockState::Idle => {
                self.real_remaining = config.real_total;
                self.display_remaining = config.display_total;
            }
        }
    }

    // ── Terminal paths ─────────────────────────────────────────

    fn complete_early(&mut self) -> Vec<StageEvent> {
        self.state = ClockState::Completed;
        vec![StageEvent::ClockCompleted, StageEvent::ClockEarlyCompleted]
    }

    fn time_out(&mut self) -> Vec<StageEvent> {
        self.state = ClockState::Completed;
        self.real_remaining = 0.0;
        self.display_remaining = 0.0;

        let failure_signaled = self.behavior.as_ref().map_or(true, |b| b.should_fail());
        log::info!("clock: timed out, failure_signaled={failure_signaled}");
        vec![
            StageEvent::ClockCompleted,
            StageEvent::ClockTimedOut { failure_signaled },
        ]
    }

    fn proportional_display(&self) -> f64 {
        self.config.display_total * (self.real_remaining / self.config.real_total)
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn is_completed(&self) -> bool {
        self.state == ClockState::Completed
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    pub fn real_remaining(&self) -> Seconds {
        self.real_remaining
    }

    pub fn display_remaining(&self) -> f64 {
        self.display_remaining
    }

    /// Fraction of real time elapsed, in [0, 1].
    pub fn progress(&self) -> f64 {
        (1.0 - self.real_remaining / self.config.real_total).clamp(0.0, 1.0)
    }

    /// The display value as shown in the HUD, e.g. "400 ms".
    pub fn display_text(&self) -> String {
        format!("{:.0} ms", self.display_remaining)
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            config: self.config,
            real_remaining: self.real_remaining,
            display_remaining: self.display_remaining,
            state: self.state,
        }
    }
}

impl std::fmt::Debug for CountdownClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownClock")
            .field("config", &self.config)
            .field("real_remaining", &self.real_remaining)
            .field("display_remaining", &self.display_remaining)
            .field("state", &self.state)
            .field("has_predicate", &self.predicate.is_some())
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}
