//! Scripted player — drives a session without a human at the controls.
//!
//! Used by the headless runner and by determinism tests. All decisions
//! come from a ScriptRng, so a seed fully determines the command stream.

use crate::{
    command::StageCommand,
    level::Level,
    rng::ScriptRng,
    stage::{CollectionStage, StageInput, VerificationStage},
    tally::TxKind,
    types::{EntityKind, Frame},
};

/// Stream index for the scripted player. Never reassign.
const AUTOPLAY_STREAM: u64 = 1;

#[derive(Debug, Clone)]
pub struct AutoPlayProfile {
    /// Probability per frame of doing something useful.
    pub action_chance: f64,
    /// Relative odds of grabbing a valid, fake or invalid transaction.
    pub tx_weights: [f64; 3],
    /// Frames before the player walks into the start zone.
    pub start_delay_frames: Frame,
}

impl Default for AutoPlayProfile {
    fn default() -> Self {
        Self {
            action_chance: 0.02,
            tx_weights: [0.6, 0.2, 0.2],
            start_delay_frames: 30,
        }
    }
}

pub struct AutoPlayer {
    rng: ScriptRng,
    profile: AutoPlayProfile,
    frames_seen: Frame,
    entered_start: bool,
    headed_out: bool,
}

impl AutoPlayer {
    pub fn new(seed: u64, profile: AutoPlayProfile) -> Self {
        Self {
            rng: ScriptRng::new(seed, AUTOPLAY_STREAM),
            profile,
            frames_seen: 0,
            entered_start: false,
            headed_out: false,
        }
    }

    /// Decide this frame's commands from the level's current state.
    pub fn next_commands(&mut self, level: &Level) -> Vec<StageCommand> {
        if !level.is_active() || level.is_paused() {
            return vec![];
        }
        self.frames_seen += 1;

        let mut commands = Vec::new();
        if !self.entered_start && self.frames_seen >= self.profile.start_delay_frames {
            self.entered_start = true;
            commands.push(StageCommand::EnterStartZone { entity: EntityKind::Player });
            return commands;
        }

        if level.clock().is_running() && self.rng.chance(self.profile.action_chance) {
            let stage = level.controller().as_any();
            if stage.is::<CollectionStage>() {
                let kind = match self.rng.pick_weighted(&self.profile.tx_weights) {
                    0 => TxKind::Valid,
                    1 => TxKind::Fake,
                    _ => TxKind::Invalid,
                };
                commands.push(StageCommand::Input {
                    input: StageInput::Collected { kind },
                });
            } else if stage.is::<VerificationStage>() {
                commands.push(StageCommand::Input {
                    input: StageInput::CrateVerified,
                });
            } else {
                log::debug!("autoplay: no script for stage {}", level.controller().name());
            }
        }

        // Goal met and clock stopped: walk to the exit.
        if !self.headed_out
            && self.entered_start
            && !level.clock().is_running()
            && level.stage_progress() >= 1.0
        {
            self.headed_out = true;
            commands.push(StageCommand::EnterEndZone { entity: EntityKind::Player });
        }

        commands
    }

    pub fn reset(&mut self) {
        self.frames_seen = 0;
        self.entered_start = false;
        self.headed_out = false;
    }
}
