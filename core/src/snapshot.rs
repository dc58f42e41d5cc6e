//! Snapshot serialization — session state to/from JSON.
//!
//! A snapshot is taken every SNAPSHOT_INTERVAL frames and on every
//! terminal level transition. It captures what a viewer needs to show
//! the stage without replaying the event log.

use crate::{
    clock::ClockSnapshot,
    level::{Level, LevelPhase},
    types::{Frame, SessionId, StageId},
};
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_INTERVAL: Frame = 600; // ten seconds at 60 fps

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub stage_id: StageId,
    pub frame: Frame,
    pub phase: LevelPhase,
    pub paused: bool,
    pub clock: ClockSnapshot,
    pub stage_progress: f64,
    pub stage_state: serde_json::Value,
}

impl SessionSnapshot {
    pub fn capture(
        session_id: &str,
        frame: Frame,
        level: &Level,
    ) -> crate::error::StageResult<Self> {
        Ok(Self {
            session_id: session_id.to_string(),
            stage_id: level.stage_id().to_string(),
            frame,
            phase: level.phase(),
            paused: level.is_paused(),
            clock: level.clock().snapshot(),
            stage_progress: level.stage_progress(),
            stage_state: level.controller().saved_state()?,
        })
    }
}
