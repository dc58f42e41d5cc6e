//! Stage clock core: countdown clock, stage controllers and the level
//! state machine, plus session persistence.

pub mod autoplay;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod level;
pub mod rng;
pub mod session;
pub mod snapshot;
pub mod stage;
pub mod store;
pub mod tally;
pub mod trigger;
pub mod types;
