//! stage-runner: headless runner for the stage clock.
//!
//! Usage:
//!   stage-runner --stage stage1 --seed 12345 --frames 9000 --db run.db
//!   stage-runner --stage stage1 --campaign
//!   stage-runner --stage stage2 --ipc-mode

use anyhow::{Context, Result};
use stage_clock_core::{
    autoplay::{AutoPlayProfile, AutoPlayer},
    clock::ClockSnapshot,
    command::StageCommand,
    config::{GameConfig, StageConfig},
    event::{FailCause, StageEvent},
    level::{LevelPhase, StageSink},
    session::StageSession,
    store::StageStore,
    types::{Frame, StageId},
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Tick { count: u64 },
    Command { command: StageCommand },
    Quit,
}

#[derive(serde::Serialize)]
struct UiState {
    session_id: String,
    stage_id: StageId,
    frame: Frame,
    phase: LevelPhase,
    paused: bool,
    timer_text: String,
    clock: ClockSnapshot,
    stage_progress: f64,
    events: Vec<StageEvent>,
}

/// HUD stand-in: the runner has no screen, so HUD updates go to the log.
struct LogSink {
    stage_id: StageId,
}

impl StageSink for LogSink {
    fn timer_text(&mut self, text: &str) {
        log::trace!("[{}] timer {text}", self.stage_id);
    }

    fn stage_progress(&mut self, fraction: f64) {
        log::debug!("[{}] stage progress {:.0}%", self.stage_id, fraction * 100.0);
    }

    fn level_completed(&mut self) {
        log::info!("[{}] completed", self.stage_id);
    }

    fn level_failed(&mut self, cause: FailCause) {
        log::info!("[{}] failed: {cause:?}", self.stage_id);
    }

    fn transition_ready(&mut self) {
        log::info!("[{}] ready for next scene", self.stage_id);
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let frames = parse_arg(&args, "--frames", 9000u64);
    let fps = parse_arg(&args, "--fps", 60u32).max(1);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let campaign = args.iter().any(|a| a == "--campaign");
    let db = str_arg(&args, "--db", ":memory:");
    let data_dir = str_arg(&args, "--data-dir", "./data");
    let first_stage = str_arg(&args, "--stage", "stage1");
    let dt = 1.0 / f64::from(fps);

    let config = GameConfig::load(data_dir)?;

    if ipc_mode {
        let stage = config.stage(first_stage)?;
        let mut session = open_session(db, seed, stage)?;
        return run_ipc_loop(&mut session, dt);
    }

    println!("stage-runner");
    println!("  seed:      {seed}");
    println!("  frames:    {frames} @ {fps} fps");
    println!("  db:        {db}");
    println!("  data_dir:  {data_dir}");
    println!();

    let mut stage = config.stage(first_stage)?;
    loop {
        let mut session = open_session(db, seed, stage)?;
        let mut player = AutoPlayer::new(seed, AutoPlayProfile::default());
        session.run_autoplay(&mut player, frames, dt)?;
        print_summary(&session)?;

        if !campaign || session.level().phase() != LevelPhase::Completed {
            break;
        }
        match config.next_stage(&stage.stage_id) {
            Some(next) => stage = next,
            None => break,
        }
    }

    Ok(())
}

fn open_session(db: &str, seed: u64, stage: &StageConfig) -> Result<StageSession> {
    let store = StageStore::open(db).with_context(|| format!("opening {db}"))?;
    store.migrate()?;
    let session_id = uuid::Uuid::new_v4().to_string();
    let sink = Box::new(LogSink { stage_id: stage.stage_id.clone() });
    Ok(StageSession::build(session_id, seed, stage, store, sink)?)
}

fn run_ipc_loop(session: &mut StageSession, dt: f64) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{err_json}")?;
                stdout.flush()?;
                continue;
            }
        };

        let events = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => Vec::new(),
            IpcCommand::Tick { count } => {
                let mut events = Vec::new();
                for _ in 0..count {
                    events.extend(session.advance(dt)?);
                }
                events
            }
            IpcCommand::Command { command } => session.apply(command)?,
        };
        let state = build_ui_state(session, events);
        writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn build_ui_state(session: &StageSession, events: Vec<StageEvent>) -> UiState {
    let level = session.level();
    UiState {
        session_id: session.session_id.clone(),
        stage_id: level.stage_id().to_string(),
        frame: session.frame(),
        phase: level.phase(),
        paused: level.is_paused(),
        timer_text: level.clock().display_text(),
        clock: level.clock().snapshot(),
        stage_progress: level.stage_progress(),
        events,
    }
}

fn print_summary(session: &StageSession) -> Result<()> {
    let level = session.level();
    let clock = level.clock();

    println!("=== STAGE SUMMARY ===");
    println!("  session_id:     {}", session.session_id);
    println!("  stage:          {}", level.stage_id());
    println!("  frames run:     {}", session.frame());
    println!("  outcome:        {:?}", level.phase());
    println!("  timer:          {}", clock.display_text());
    println!("  real remaining: {:.2}s", clock.real_remaining());
    println!("  stage progress: {:.0}%", level.stage_progress() * 100.0);
    println!("  timeouts:       {}", session.event_count("clock_timed_out")?);
    println!("  events logged:  {}", session.events()?.len());
    println!();
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn str_arg<'a>(args: &'a [String], flag: &str, default: &'a str) -> &'a str {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .unwrap_or(default)
}
