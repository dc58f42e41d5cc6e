//! Level state machine tests.
//!
//! Tests cover: clock → level routing, guarded transitions, reset,
//! pause, trigger zones, the scene-transition delay and sink callbacks.

use stage_clock_core::{
    clock::{ClockConfig, ClockState, CompletionBehavior, CompletionPredicate},
    config::GameConfig,
    error::StageResult,
    event::{FailCause, StageEvent},
    level::{Level, LevelPhase, NullSink, StageSink},
    stage::{build_controller, CollectionStage, InputOutcome, StageController, StageInput},
    tally::{CollectionTally, TxKind},
    types::EntityKind,
};
use std::{any::Any, cell::RefCell, rc::Rc};

/// A stage with no counters: no predicate, no behavior.
struct Bare;

impl StageController for Bare {
    fn name(&self) -> &'static str { "bare" }
    fn progress(&self) -> f64 { 0.0 }
    fn completion_predicate(&self) -> Option<Box<dyn CompletionPredicate>> { None }
    fn completion_behavior(&self) -> Option<Box<dyn CompletionBehavior>> { None }
    fn reset_stage_data(&mut self) {}
    fn apply_input(&mut self, _input: StageInput) -> InputOutcome { InputOutcome::Ignored }
    fn saved_state(&self) -> StageResult<serde_json::Value> { Ok(serde_json::Value::Null) }
    fn restore_state(&mut self, _state: &serde_json::Value) -> StageResult<()> { Ok(()) }
    fn as_any(&self) -> &dyn Any { self }
}

/// Records every sink callback by name.
#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<String>>>);

impl Recorder {
    fn count(&self, name: &str) -> usize {
        self.0.borrow().iter().filter(|c| c.as_str() == name).count()
    }
    fn last_timer_text(&self) -> Option<String> {
        self.0
            .borrow()
            .iter()
            .rev()
            .find_map(|c| c.strip_prefix("timer:").map(str::to_string))
    }
}

impl StageSink for Recorder {
    fn timer_text(&mut self, text: &str) { self.0.borrow_mut().push(format!("timer:{text}")); }
    fn level_completed(&mut self) { self.0.borrow_mut().push("completed".into()); }
    fn level_failed(&mut self, cause: FailCause) {
        self.0.borrow_mut().push("failed".into());
        self.0.borrow_mut().push(format!("cause:{cause:?}"));
    }
    fn level_reset(&mut self) { self.0.borrow_mut().push("reset".into()); }
    fn transition_ready(&mut self) { self.0.borrow_mut().push("transition".into()); }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn bare_level(real: f64, sink: Recorder) -> Level {
    init_logging();
    Level::new("bare", ClockConfig::new(real, 400.0), Box::new(Bare), Box::new(sink))
}

fn collection_level(tally: &CollectionTally, sink: Recorder) -> Level {
    init_logging();
    Level::new(
        "stage1",
        ClockConfig::new(10.0, 400.0),
        Box::new(CollectionStage::with_tally(tally.clone())),
        Box::new(sink),
    )
}

fn count(events: &[StageEvent], pred: impl Fn(&StageEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

/// realTotal=3, d=1, nothing plugged in: failure fires exactly once.
#[test]
fn timeout_without_behavior_fails_level_once() {
    let sink = Recorder::default();
    let mut level = bare_level(3.0, sink.clone());
    level.start_clock();

    let mut events = Vec::new();
    for _ in 0..3 {
        events.extend(level.tick(1.0));
    }
    // Extra frames after the timeout change nothing.
    for _ in 0..3 {
        events.extend(level.tick(1.0));
    }

    assert_eq!(level.phase(), LevelPhase::Failed);
    assert_eq!(
        count(&events, |e| matches!(e, StageEvent::LevelFailed { cause: FailCause::Timeout })),
        1
    );
    assert_eq!(sink.count("failed"), 1);
}

/// Goal met at tick 5 of 10: early completion routes to complete(), never fail().
#[test]
fn early_completion_completes_level() {
    let tally = CollectionTally::new();
    tally.add_spawned(1);
    let sink = Recorder::default();
    let mut level = collection_level(&tally, sink.clone());
    level.start_clock();

    let mut events = Vec::new();
    for _ in 0..5 {
        events.extend(level.tick(1.0));
    }
    tally.record(TxKind::Valid);
    events.extend(level.tick(1.0));
    for _ in 0..10 {
        events.extend(level.tick(1.0));
    }

    assert_eq!(level.phase(), LevelPhase::Completed);
    assert_eq!(count(&events, |e| *e == StageEvent::ClockEarlyCompleted), 1);
    assert_eq!(count(&events, |e| *e == StageEvent::LevelCompleted), 1);
    assert_eq!(count(&events, |e| matches!(e, StageEvent::LevelFailed { .. })), 0);
    assert_eq!(sink.count("failed"), 0);
    assert_eq!(sink.count("completed"), 1);
}

#[test]
fn second_transition_is_rejected_without_error() {
    let mut level = bare_level(10.0, Recorder::default());

    assert!(level.complete());
    assert!(!level.fail(FailCause::External));
    assert!(!level.complete());

    assert_eq!(level.phase(), LevelPhase::Completed);
    let events = level.drain_events();
    assert_eq!(count(&events, |e| *e == StageEvent::LevelCompleted), 1);
    assert_eq!(count(&events, |e| matches!(e, StageEvent::LevelFailed { .. })), 0);
}

#[test]
fn complete_stops_a_running_clock() {
    let mut level = bare_level(10.0, Recorder::default());
    level.start_clock();
    level.tick(1.0);

    level.complete();

    assert_eq!(level.clock().state(), ClockState::Idle);
    let events = level.drain_events();
    assert_eq!(
        events,
        vec![
            StageEvent::ClockStopped { real_remaining: 9.0 },
            StageEvent::LevelCompleted,
        ]
    );
}

#[test]
fn player_death_fails_independently_of_clock() {
    let sink = Recorder::default();
    let mut level = bare_level(2.0, sink.clone());
    level.start_clock();

    assert!(level.player_died());
    // The clock keeps running and later times out; the guard absorbs it.
    let events: Vec<_> = (0..3).flat_map(|_| level.tick(1.0)).collect();

    assert_eq!(level.phase(), LevelPhase::Failed);
    assert_eq!(sink.count("cause:PlayerDeath"), 1);
    assert_eq!(sink.count("failed"), 1);
    assert_eq!(count(&events, |e| matches!(e, StageEvent::ClockTimedOut { .. })), 1);
}

#[test]
fn reset_returns_to_playing_with_fresh_state() {
    let tally = CollectionTally::new();
    tally.add_spawned(3);
    let sink = Recorder::default();
    let mut level = collection_level(&tally, sink.clone());
    level.start_clock();
    tally.record(TxKind::Fake);
    for _ in 0..10 {
        level.tick(1.0);
    }
    assert_eq!(level.phase(), LevelPhase::Failed);

    level.reset();

    assert_eq!(level.phase(), LevelPhase::Playing);
    assert_eq!(level.clock().state(), ClockState::Idle);
    assert_eq!(level.clock().real_remaining(), 10.0);
    assert_eq!(level.clock().display_remaining(), 400.0);
    assert_eq!(tally.collected(), 0);
    assert_eq!(tally.to_collect(), 3, "spawn count survives a reset");
    assert_eq!(sink.count("reset"), 1);
    assert_eq!(sink.last_timer_text().as_deref(), Some("400 ms"));

    // Playable again.
    assert!(level.start_clock());
    assert!(level.complete());
}

#[test]
fn pause_freezes_ticking_until_resume() {
    let mut level = bare_level(10.0, Recorder::default());
    level.start_clock();
    level.tick(1.0);

    assert!(level.pause());
    assert!(!level.pause());
    let paused: Vec<_> = (0..5).flat_map(|_| level.tick(1.0)).collect();
    assert_eq!(paused, vec![StageEvent::LevelPaused]);
    assert_eq!(level.clock().real_remaining(), 9.0);

    assert!(level.resume());
    level.tick(1.0);
    assert_eq!(level.clock().real_remaining(), 8.0);
}

#[test]
fn pause_refused_after_level_ends() {
    let mut level = bare_level(10.0, Recorder::default());
    level.fail(FailCause::External);
    assert!(!level.pause());
    assert!(!level.resume());
}

#[test]
fn start_zone_only_reacts_to_the_player() {
    let mut level = bare_level(10.0, Recorder::default());

    assert!(!level.enter_start_zone(EntityKind::Crate));
    assert!(!level.clock().is_running());

    assert!(level.enter_start_zone(EntityKind::Player));
    assert!(level.clock().is_running());

    level.tick(2.0);
    assert!(!level.enter_start_zone(EntityKind::Player));
    assert_eq!(level.clock().real_remaining(), 8.0);
}

#[test]
fn start_zone_disabled_by_config() {
    init_logging();
    let mut config = GameConfig::default_test().stage("stage1").unwrap().clone();
    config.timer.start_on_player_trigger = false;
    let mut level = Level::from_config(&config, build_controller(&config), Box::new(NullSink));

    assert!(!level.enter_start_zone(EntityKind::Player));
    assert!(level.start_clock());
}

#[test]
fn auto_start_config_runs_from_construction() {
    init_logging();
    let mut config = GameConfig::default_test().stage("stage1").unwrap().clone();
    config.timer.auto_start = true;
    let mut level = Level::from_config(&config, build_controller(&config), Box::new(NullSink));

    assert!(level.clock().is_running());
    let events = level.drain_events();
    assert!(matches!(events.as_slice(), [StageEvent::ClockStarted { .. }]));

    level.tick(4.0);
    level.reset();

    assert!(level.clock().is_running(), "reset re-applies auto start");
    assert_eq!(level.clock().real_remaining(), 10.0);
    let events = level.drain_events();
    assert!(matches!(
        events.as_slice(),
        [StageEvent::ClockReset, StageEvent::LevelReset, StageEvent::ClockStarted { .. }]
    ));
}

/// stage2 in the test config completes 0.5s after the player reaches the exit.
#[test]
fn end_zone_completes_after_delay_once() {
    init_logging();
    let config = GameConfig::default_test().stage("stage2").unwrap().clone();
    let mut level = Level::from_config(&config, build_controller(&config), Box::new(NullSink));

    assert!(!level.enter_end_zone(EntityKind::Crate));
    assert!(level.enter_end_zone(EntityKind::Player));
    assert!(!level.enter_end_zone(EntityKind::Player), "trigger once");

    level.tick(0.25);
    assert_eq!(level.phase(), LevelPhase::Playing);
    let events = level.tick(0.25);
    assert_eq!(level.phase(), LevelPhase::Completed);
    assert_eq!(count(&events, |e| *e == StageEvent::LevelCompleted), 1);
}

#[test]
fn end_zone_without_delay_completes_immediately() {
    let mut level = bare_level(10.0, Recorder::default());
    assert!(level.enter_end_zone(EntityKind::Player));
    assert_eq!(level.phase(), LevelPhase::Completed);
}

/// stage1 in the test config transitions 1.0s after completion, exactly once.
#[test]
fn transition_ready_fires_once_after_delay() {
    init_logging();
    let config = GameConfig::default_test().stage("stage1").unwrap().clone();
    let sink = Recorder::default();
    let mut level = Level::from_config(&config, build_controller(&config), Box::new(sink.clone()));

    level.complete();
    let first = level.tick(0.5);
    assert_eq!(count(&first, |e| matches!(e, StageEvent::TransitionReady { .. })), 0);

    let second = level.tick(0.5);
    assert_eq!(second, vec![StageEvent::TransitionReady { after: 1.0 }]);

    let later: Vec<_> = (0..5).flat_map(|_| level.tick(0.5)).collect();
    assert!(later.is_empty());
    assert_eq!(sink.count("transition"), 1);
}

#[test]
fn failed_level_never_transitions() {
    init_logging();
    let config = GameConfig::default_test().stage("stage1").unwrap().clone();
    let sink = Recorder::default();
    let mut level = Level::from_config(&config, build_controller(&config), Box::new(sink.clone()));

    level.fail(FailCause::External);
    for _ in 0..10 {
        level.tick(1.0);
    }
    assert_eq!(sink.count("transition"), 0);
}

#[test]
fn force_complete_routes_to_level_completion() {
    let mut level = bare_level(10.0, Recorder::default());
    assert!(!level.force_complete(), "idle clock cannot be forced");

    level.start_clock();
    assert!(level.force_complete());

    assert_eq!(level.phase(), LevelPhase::Completed);
    let events = level.drain_events();
    assert_eq!(
        events,
        vec![
            StageEvent::ClockStarted { real_total: 10.0, display_total: 400.0 },
            StageEvent::ClockCompleted,
            StageEvent::ClockEarlyCompleted,
            StageEvent::LevelCompleted,
        ]
    );
}

#[test]
fn sink_receives_display_text_each_tick() {
    let sink = Recorder::default();
    let mut level = bare_level(10.0, sink.clone());
    level.start_clock();
    level.tick(5.0);
    assert_eq!(sink.last_timer_text().as_deref(), Some("200 ms"));
}

#[test]
fn teardown_hands_back_the_controller() {
    let tally = CollectionTally::new();
    let level = collection_level(&tally, Recorder::default());

    let controller = level.teardown();

    let stage = controller
        .as_any()
        .downcast_ref::<CollectionStage>()
        .expect("collection stage");
    assert_eq!(stage.remaining(), 0);
}
