//! The stage session — owns one level and its persistence.
//!
//! EXECUTION ORDER per frame (fixed, never reordered):
//!   1. Commands queued by the host for this frame (`apply`).
//!   2. Level tick (end-zone delay, clock, routing, transition delay).
//!   3. Event log append, in emission order.
//!   4. Snapshot on interval boundaries and terminal transitions.
//!
//! RULES:
//!   - Every event the level emits is recorded in the event log.
//!   - All randomness flows through the seeded ScriptRng.

use crate::{
    autoplay::AutoPlayer,
    command::StageCommand,
    config::{GameConfig, StageConfig},
    error::{StageError, StageResult},
    event::{EventLogEntry, StageEvent},
    level::{Level, NullSink, StageSink},
    snapshot::{SessionSnapshot, SNAPSHOT_INTERVAL},
    stage::build_controller,
    store::StageStore,
    types::{Frame, Seconds, SessionId},
};

pub struct StageSession {
    pub session_id: SessionId,
    seed: u64,
    frame: Frame,
    level: Level,
    store: StageStore,
}

impl StageSession {
    /// Wrap an already built level. The session row must exist.
    pub fn new(session_id: SessionId, seed: u64, level: Level, store: StageStore) -> StageResult<Self> {
        if !store.session_exists(&session_id)? {
            return Err(StageError::SessionNotInitialized);
        }
        let mut session = Self {
            session_id,
            seed,
            frame: 0,
            level,
            store,
        };
        // Auto-start stages emit their start before the first frame.
        let setup = session.level.drain_events();
        session.record(&setup)?;
        Ok(session)
    }

    /// Build a fully wired session for one configured stage.
    pub fn build(
        session_id: SessionId,
        seed: u64,
        config: &StageConfig,
        store: StageStore,
        sink: Box<dyn StageSink>,
    ) -> StageResult<Self> {
        store.insert_session(&session_id, &config.stage_id, seed, env!("CARGO_PKG_VERSION"))?;
        let level = Level::from_config(config, build_controller(config), sink);
        log::info!("session {session_id}: built stage {} ({:?})", config.stage_id, config.kind);
        Self::new(session_id, seed, level, store)
    }

    /// In-memory session over `GameConfig::default_test()`.
    pub fn build_test(session_id: &str, stage_id: &str, seed: u64) -> StageResult<Self> {
        let store = StageStore::in_memory()?;
        store.migrate()?;
        let config = GameConfig::default_test();
        let stage = config.stage(stage_id)?;
        Self::build(session_id.to_string(), seed, stage, store, Box::new(NullSink))
    }

    // ── Frame loop ─────────────────────────────────────────────

    /// Advance one frame of `dt` seconds.
    pub fn advance(&mut self, dt: Seconds) -> StageResult<Vec<StageEvent>> {
        self.frame += 1;
        let events = self.level.tick(dt);
        self.record(&events)?;
        self.snapshot_if_due(&events)?;
        Ok(events)
    }

    /// Run n frames in a loop. Used for testing and headless runs.
    pub fn run_frames(&mut self, n: u64, dt: Seconds) -> StageResult<()> {
        for _ in 0..n {
            self.advance(dt)?;
        }
        Ok(())
    }

    /// Run n frames with a scripted player issuing commands before each tick.
    pub fn run_autoplay(&mut self, player: &mut AutoPlayer, n: u64, dt: Seconds) -> StageResult<()> {
        for _ in 0..n {
            for command in player.next_commands(&self.level) {
                self.apply(command)?;
            }
            self.advance(dt)?;
        }
        Ok(())
    }

    /// Execute a host command at the current frame.
    pub fn apply(&mut self, command: StageCommand) -> StageResult<Vec<StageEvent>> {
        let level = &mut self.level;
        let accepted = match command {
            StageCommand::StartClock => level.start_clock(),
            StageCommand::StopClock => level.stop_clock(),
            StageCommand::ForceComplete => level.force_complete(),
            StageCommand::Pause => level.pause(),
            StageCommand::Resume => level.resume(),
            StageCommand::Reset => {
                level.reset();
                true
            }
            StageCommand::Complete => level.complete(),
            StageCommand::Fail { cause } => level.fail(cause),
            StageCommand::EnterStartZone { entity } => level.enter_start_zone(entity),
            StageCommand::EnterEndZone { entity } => level.enter_end_zone(entity),
            StageCommand::Input { input } => {
                level.apply_input(input);
                true
            }
        };
        if !accepted {
            log::debug!("session {}: {command:?} had no effect", self.session_id);
        }

        let events = self.level.drain_events();
        self.record(&events)?;
        self.snapshot_if_due(&events)?;
        Ok(events)
    }

    fn record(&self, events: &[StageEvent]) -> StageResult<()> {
        for event in events {
            let entry = EventLogEntry {
                id:         None,
                session_id: self.session_id.clone(),
                frame:      self.frame,
                source:     event.source().to_string(),
                event_type: event.type_name().to_string(),
                payload:    serde_json::to_string(event)?,
            };
            self.store.append_event(&entry)?;
        }
        Ok(())
    }

    /// Snapshot on interval boundaries and on any terminal transition,
    /// whether it came from a tick or a command.
    fn snapshot_if_due(&self, events: &[StageEvent]) -> StageResult<()> {
        let terminal = events.iter().any(|e| {
            matches!(e, StageEvent::LevelCompleted | StageEvent::LevelFailed { .. })
        });
        let interval = self.frame > 0 && self.frame % SNAPSHOT_INTERVAL == 0;
        if terminal || interval {
            self.take_snapshot()?;
        }
        Ok(())
    }

    fn take_snapshot(&self) -> StageResult<()> {
        let snapshot = SessionSnapshot::capture(&self.session_id, self.frame, &self.level)?;
        let json = serde_json::to_string(&snapshot)?;
        self.store.save_snapshot(&self.session_id, self.frame, &json)?;
        log::debug!("Snapshot saved at frame {}", self.frame);
        Ok(())
    }

    // ── Saved progress ─────────────────────────────────────────

    /// Persist the stage's domain counters under its stage id.
    pub fn save_progress(&self) -> StageResult<()> {
        let state = self.level.controller().saved_state()?;
        self.store
            .save_stage_state(self.level.stage_id(), &serde_json::to_string(&state)?)?;
        Ok(())
    }

    /// Restore saved counters, if any. Returns whether a save was found.
    pub fn load_progress(&mut self) -> StageResult<bool> {
        let Some(payload) = self.store.load_stage_state(self.level.stage_id())? else {
            return Ok(false);
        };
        let state: serde_json::Value = serde_json::from_str(&payload)?;
        self.level.controller_mut().restore_state(&state)?;
        Ok(true)
    }

    pub fn clear_progress(&self) -> StageResult<()> {
        self.store.clear_stage_state(self.level.stage_id())
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn events(&self) -> StageResult<Vec<EventLogEntry>> {
        self.store.events_for_session(&self.session_id)
    }

    pub fn event_count(&self, event_type: &str) -> StageResult<i64> {
        self.store.event_count(&self.session_id, event_type)
    }

    pub fn latest_snapshot(&self) -> StageResult<Option<SessionSnapshot>> {
        match self.store.latest_snapshot_before(&self.session_id, self.frame)? {
            Some((_, json)) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn frame(&self) -> Frame { self.frame }
    pub fn seed(&self) -> u64 { self.seed }
    pub fn level(&self) -> &Level { &self.level }
    pub fn level_mut(&mut self) -> &mut Level { &mut self.level }
}
