//! The event bus — every observable state change of a stage.
//!
//! RULE: The clock never calls the level directly.
//! It reports terminal events and the level routes them.
//! Listeners observe events in emission order within a frame.

use crate::types::{Frame, Seconds, SessionId};
use serde::{Deserialize, Serialize};

/// Every event emitted during a stage session.
/// Variants are appended — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageEvent {
    // ── Clock events ───────────────────────────────
    ClockStarted {
        real_total: Seconds,
        display_total: f64,
    },
    ClockUpdated {
        progress: f64,
        real_remaining: Seconds,
        display_remaining: f64,
    },
    /// Emitted on both terminal paths, before the path-specific event.
    ClockCompleted,
    ClockEarlyCompleted,
    ClockTimedOut {
        failure_signaled: bool,
    },
    ClockStopped {
        real_remaining: Seconds,
    },
    ClockReset,

    // ── Level events ───────────────────────────────
    LevelCompleted,
    LevelFailed {
        cause: FailCause,
    },
    LevelReset,
    LevelPaused,
    LevelResumed,
    TransitionReady {
        after: Seconds,
    },

    // ── Domain events ──────────────────────────────
    StageGoalReached {
        stage: String,
    },
}

impl StageEvent {
    /// Stable string name, used for the event_type column in event_log.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ClockStarted { .. }      => "clock_started",
            Self::ClockUpdated { .. }      => "clock_updated",
            Self::ClockCompleted           => "clock_completed",
            Self::ClockEarlyCompleted      => "clock_early_completed",
            Self::ClockTimedOut { .. }     => "clock_timed_out",
            Self::ClockStopped { .. }      => "clock_stopped",
            Self::ClockReset               => "clock_reset",
            Self::LevelCompleted           => "level_completed",
            Self::LevelFailed { .. }       => "level_failed",
            Self::LevelReset               => "level_reset",
            Self::LevelPaused              => "level_paused",
            Self::LevelResumed             => "level_resumed",
            Self::TransitionReady { .. }   => "transition_ready",
            Self::StageGoalReached { .. }  => "stage_goal_reached",
        }
    }

    /// Which component produced the event.
    pub fn source(&self) -> &'static str {
        match self {
            Self::ClockStarted { .. }
            | Self::ClockUpdated { .. }
            | Self::ClockCompleted
            | Self::ClockEarlyCompleted
            | Self::ClockTimedOut { .. }
            | Self::ClockStopped { .. }
            | Self::ClockReset => "clock",
            Self::StageGoalReached { .. } => "stage",
            _ => "level",
        }
    }
}

/// Why a level ended in failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailCause {
    /// The clock ran out and the stage behavior asked for failure.
    Timeout,
    /// Player-death trigger, independent of the clock.
    PlayerDeath,
    External,
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub session_id: SessionId,
    pub frame: Frame,
    pub source: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized StageEvent
}
