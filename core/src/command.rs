use serde::{Deserialize, Serialize};
use crate::{
    event::FailCause,
    stage::StageInput,
    types::EntityKind,
};

/// Every input a host can send to a stage session.
/// Variants are appended — never removed or reordered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum StageCommand {
    // ── Clock control ─────────────────────────────
    StartClock,
    StopClock,
    ForceComplete,

    // ── Level control ─────────────────────────────
    Pause,
    Resume,
    Reset,
    Complete,
    Fail { cause: FailCause },

    // ── Trigger zones ─────────────────────────────
    EnterStartZone { entity: EntityKind },
    EnterEndZone { entity: EntityKind },

    // ── Stage domain ──────────────────────────────
    Input { input: StageInput },
}
