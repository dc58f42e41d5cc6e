use stage_clock_core::{
    config::{GameConfig, StageKind},
    error::StageError,
};

#[test]
fn shipped_stage_file_loads() {
    let config = GameConfig::load("../data").expect("data/stages.json");
    assert_eq!(config.stage_order, vec!["stage1", "stage2"]);

    let stage1 = config.stage("stage1").unwrap();
    assert_eq!(stage1.kind, StageKind::Collection);
    assert_eq!(stage1.timer.real_duration_secs, 150.0);
    assert_eq!(stage1.spawn_count, 12);

    let stage2 = config.stage("stage2").unwrap();
    assert_eq!(stage2.end_trigger.delay_secs, 1.0);
    assert!(stage2.timer.allow_external_completion, "defaulted field");
}

#[test]
fn omitted_fields_take_defaults() {
    let config = GameConfig::from_json(
        r#"{ "stages": [ { "stage_id": "s", "label": "S", "kind": "verification" } ] }"#,
    )
    .unwrap();
    let stage = config.stage("s").unwrap();

    assert_eq!(stage.timer.real_duration_secs, 150.0);
    assert_eq!(stage.timer.display_duration, 400.0);
    assert!(!stage.timer.auto_start);
    assert!(stage.timer.start_on_player_trigger);
    assert!(stage.end_trigger.trigger_once);
    assert_eq!(stage.transition_delay_secs, 2.3);
    assert_eq!(stage.required_verifications, 0);
}

#[test]
fn degenerate_duration_is_clamped_when_building_the_clock() {
    let config = GameConfig::from_json(
        r#"{ "stages": [ { "stage_id": "s", "label": "S", "kind": "collection",
             "timer": { "real_duration_secs": -4.0 } } ] }"#,
    )
    .unwrap();
    let clock = config.stage("s").unwrap().timer.clock_config();
    assert_eq!(clock.real_total, stage_clock_core::clock::FALLBACK_DURATION);
}

#[test]
fn unknown_stage_is_an_error() {
    let config = GameConfig::default_test();
    assert!(matches!(
        config.stage("stage9"),
        Err(StageError::StageNotFound { .. })
    ));
}

#[test]
fn next_stage_follows_file_order() {
    let config = GameConfig::default_test();
    assert_eq!(config.next_stage("stage1").map(|s| s.stage_id.as_str()), Some("stage2"));
    assert!(config.next_stage("stage2").is_none());
    assert!(config.next_stage("missing").is_none());
}

#[test]
fn malformed_file_is_rejected() {
    assert!(GameConfig::from_json(r#"{ "stages": [ { "stage_id": 3 } ] }"#).is_err());
}
