//! Zone triggers and frame-accumulated delays.
//!
//! Delays never sleep: they accumulate the `dt` passed to `advance` and fire
//! on the first tick that crosses the threshold.

use crate::{
    config::EndTriggerConfig,
    types::{EntityKind, Seconds},
};

/// Counts elapsed frame time toward a fixed delay. Fires once until reset.
#[derive(Debug, Clone, PartialEq)]
pub struct Delay {
    duration: Seconds,
    elapsed: Seconds,
    armed: bool,
    fired: bool,
}

impl Delay {
    pub fn new(duration: Seconds) -> Self {
        Self {
            duration: duration.max(0.0),
            elapsed: 0.0,
            armed: false,
            fired: false,
        }
    }

    pub fn arm(&mut self) {
        if !self.armed && !self.fired {
            self.armed = true;
            self.elapsed = 0.0;
        }
    }

    /// Returns true on the single tick the delay elapses.
    pub fn advance(&mut self, dt: Seconds) -> bool {
        if !self.armed || self.fired {
            return false;
        }
        if dt.is_finite() && dt > 0.0 {
            self.elapsed += dt;
        }
        if self.elapsed >= self.duration {
            self.fired = true;
            self.armed = false;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.armed = false;
        self.fired = false;
    }

    pub fn is_armed(&self) -> bool { self.armed }
    pub fn has_fired(&self) -> bool { self.fired }
    pub fn duration(&self) -> Seconds { self.duration }
}

/// The zone that starts the stage clock when the player walks in.
/// It disarms once the clock has started and stays disarmed until reset.
#[derive(Debug, Clone)]
pub struct StartZone {
    enabled: bool,
    triggered: bool,
}

impl StartZone {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, triggered: false }
    }

    /// Whether this entry should start the clock.
    pub fn should_start(&self, kind: EntityKind) -> bool {
        self.enabled && !self.triggered && kind == EntityKind::Player
    }

    pub fn disarm(&mut self) {
        self.triggered = true;
    }

    pub fn reset(&mut self) {
        self.triggered = false;
    }

    pub fn is_armed(&self) -> bool {
        self.enabled && !self.triggered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndZoneEntry {
    Ignored,
    /// Complete the level now.
    CompleteNow,
    /// Completion was scheduled behind the configured delay.
    Scheduled,
}

/// The exit zone. Completes the level, optionally after a delay.
#[derive(Debug, Clone)]
pub struct EndZone {
    trigger_once: bool,
    triggered: bool,
    delay: Delay,
}

impl EndZone {
    pub fn new(config: &EndTriggerConfig) -> Self {
        Self {
            trigger_once: config.trigger_once,
            triggered: false,
            delay: Delay::new(config.delay_secs),
        }
    }

    pub fn enter(&mut self, kind: EntityKind) -> EndZoneEntry {
        if kind != EntityKind::Player {
            return EndZoneEntry::Ignored;
        }
        if self.trigger_once && self.triggered {
            log::debug!("end zone: player entered but already triggered once");
            return EndZoneEntry::Ignored;
        }
        self.triggered = true;

        if self.delay.duration() > 0.0 {
            // A repeat entry restarts the wait.
            self.delay.reset();
            self.delay.arm();
            log::debug!("end zone: completing in {}s", self.delay.duration());
            EndZoneEntry::Scheduled
        } else {
            EndZoneEntry::CompleteNow
        }
    }

    /// Returns true on the tick the scheduled completion is due.
    pub fn advance(&mut self, dt: Seconds) -> bool {
        self.delay.advance(dt)
    }

    pub fn reset(&mut self) {
        self.triggered = false;
        self.delay.reset();
    }

    pub fn is_pending(&self) -> bool {
        self.delay.is_armed()
    }
}
