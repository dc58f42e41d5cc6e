use crate::{
    clock::ClockConfig,
    error::{StageError, StageResult},
    types::Seconds,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Collect every spawned transaction.
    Collection,
    /// Place every valid crate into a verification slot.
    Verification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Real seconds the countdown runs.
    #[serde(default = "default_real_duration")]
    pub real_duration_secs: Seconds,
    /// Stylized value shown in the HUD (rendered as "N ms").
    #[serde(default = "default_display_duration")]
    pub display_duration: f64,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default = "default_true")]
    pub start_on_player_trigger: bool,
    #[serde(default = "default_true")]
    pub allow_external_completion: bool,
}

impl TimerConfig {
    pub fn clock_config(&self) -> ClockConfig {
        ClockConfig::new(self.real_duration_secs, self.display_duration)
            .with_external_completion(self.allow_external_completion)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            real_duration_secs: default_real_duration(),
            display_duration: default_display_duration(),
            auto_start: false,
            start_on_player_trigger: true,
            allow_external_completion: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndTriggerConfig {
    #[serde(default = "default_true")]
    pub trigger_once: bool,
    #[serde(default)]
    pub delay_secs: Seconds,
}

impl Default for EndTriggerConfig {
    fn default() -> Self {
        Self { trigger_once: true, delay_secs: 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub stage_id: String,
    pub label: String,
    pub kind: StageKind,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub end_trigger: EndTriggerConfig,
    /// Delay between completion and the scene transition.
    #[serde(default = "default_transition_delay")]
    pub transition_delay_secs: Seconds,
    /// Collection stages: transactions spawned at setup.
    #[serde(default)]
    pub spawn_count: u32,
    /// Verification stages: crates that must be verified.
    #[serde(default)]
    pub required_verifications: u32,
    #[serde(default)]
    pub verification_slots: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct StagesFile {
    stages: Vec<StageConfig>,
}

fn default_real_duration() -> Seconds { 150.0 }
fn default_display_duration() -> f64 { 400.0 }
fn default_transition_delay() -> Seconds { 2.3 }
fn default_true() -> bool { true }

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub stages: HashMap<String, StageConfig>,
    /// Stage ids in file order.
    pub stage_order: Vec<String>,
}

impl GameConfig {
    /// Load from the data/ directory.
    /// In tests, use GameConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/stages.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let file: StagesFile = serde_json::from_str(content)?;
        Ok(Self::from_stages(file.stages))
    }

    fn from_stages(stages: Vec<StageConfig>) -> Self {
        let stage_order = stages.iter().map(|s| s.stage_id.clone()).collect();
        let stages = stages
            .into_iter()
            .map(|s| (s.stage_id.clone(), s))
            .collect();
        Self { stages, stage_order }
    }

    pub fn stage(&self, stage_id: &str) -> StageResult<&StageConfig> {
        self.stages
            .get(stage_id)
            .ok_or_else(|| StageError::StageNotFound { stage_id: stage_id.to_string() })
    }

    /// The stage that follows `stage_id` in file order, if any.
    pub fn next_stage(&self, stage_id: &str) -> Option<&StageConfig> {
        let idx = self.stage_order.iter().position(|id| id == stage_id)?;
        self.stage_order
            .get(idx + 1)
            .and_then(|id| self.stages.get(id))
    }

    /// Small, fast stages for tests.
    pub fn default_test() -> Self {
        let collection = StageConfig {
            stage_id: "stage1".into(),
            label: "Transaction Collection".into(),
            kind: StageKind::Collection,
            timer: TimerConfig {
                real_duration_secs: 10.0,
                display_duration: 400.0,
                ..TimerConfig::default()
            },
            end_trigger: EndTriggerConfig::default(),
            transition_delay_secs: 1.0,
            spawn_count: 4,
            required_verifications: 0,
            verification_slots: 0,
        };
        let verification = StageConfig {
            stage_id: "stage2".into(),
            label: "Signature Verification".into(),
            kind: StageKind::Verification,
            timer: TimerConfig {
                real_duration_secs: 8.0,
                display_duration: 400.0,
                ..TimerConfig::default()
            },
            end_trigger: EndTriggerConfig { trigger_once: true, delay_secs: 0.5 },
            transition_delay_secs: 1.0,
            spawn_count: 0,
            required_verifications: 3,
            verification_slots: 3,
        };
        Self::from_stages(vec![collection, verification])
    }
}
