//! Shared primitive types used across the stage clock.

/// Elapsed or remaining time in seconds.
pub type Seconds = f64;

/// A frame counter. One frame = one `tick(dt)` from the host loop.
pub type Frame = u64;

/// A stable identifier for one stage session.
pub type SessionId = String;

/// The configured stage identifier (e.g. "stage1").
pub type StageId = String;

/// What kind of entity entered a trigger zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Crate,
    Other,
}
