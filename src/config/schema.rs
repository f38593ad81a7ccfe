//! YAML schema for declarative detection training configuration
//!
//! A configuration is loaded once and never mutated. Closed enums carry the
//! optimizer and scheduler choices, so an unknown `kind` is rejected while the
//! file is parsed rather than when training starts.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::data::TransformSpec;

/// Deserialize a bool from either a YAML boolean (`true`) or a quoted string (`"true"`).
fn deserialize_bool_lenient<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Str(s) => match s.to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected 'true' or 'false', got '{other}'"
            ))),
        },
    }
}

/// Complete hyperparameter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterConfig {
    /// Record sources for the three splits
    pub data: DataConfig,

    /// Per-stage augmentation pipelines
    #[serde(default)]
    pub augmentations: AugmentationConfig,

    /// Per-stage batch sizes
    #[serde(default)]
    pub batch_size: BatchSizes,

    /// Worker pool and ordering options
    #[serde(default)]
    pub dataloader: DataLoaderConfig,

    /// Optimizer kind and parameters
    pub optimizer: OptimizerSpec,

    /// Learning-rate schedule and its cadence
    #[serde(default)]
    pub scheduler: SchedulerSpec,

    /// Epoch budget and step-level options
    #[serde(default)]
    pub trainer: TrainerConfig,

    /// Optional early stopping policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_stopping: Option<EarlyStoppingConfig>,

    /// Checkpoint policy
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// IoU types evaluated at test time
    #[serde(default = "default_iou_types")]
    pub iou_types: Vec<IouType>,
}

/// Record source locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Training annotations CSV
    pub train_csv: PathBuf,

    /// Validation annotations CSV
    pub valid_csv: PathBuf,

    /// Test annotations CSV
    pub test_csv: PathBuf,

    /// Directory relative image filenames resolve against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_root: Option<PathBuf>,
}

/// Augmentation transforms per stage, applied in order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    pub train: Vec<TransformSpec>,
    pub valid: Vec<TransformSpec>,
    pub test: Vec<TransformSpec>,
}

/// Batch size of each stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSizes {
    pub train: usize,
    pub valid: usize,
    pub test: usize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self { train: default_batch_size(), valid: default_batch_size(), test: default_batch_size() }
    }
}

fn default_batch_size() -> usize {
    4
}

/// Data-loading worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLoaderConfig {
    /// Worker threads; 0 loads batches on the control thread
    #[serde(default)]
    pub num_workers: usize,

    /// Batches each worker may prepare ahead of the consumer
    #[serde(default = "default_prefetch_factor")]
    pub prefetch_factor: usize,

    /// Reshuffle the training split every epoch
    #[serde(default = "default_true", deserialize_with = "deserialize_bool_lenient")]
    pub shuffle: bool,

    /// Drop the last incomplete training batch
    #[serde(default, deserialize_with = "deserialize_bool_lenient")]
    pub drop_last: bool,

    /// Seed for shuffling and augmentation randomness
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for DataLoaderConfig {
    fn default() -> Self {
        Self {
            num_workers: 0,
            prefetch_factor: default_prefetch_factor(),
            shuffle: true,
            drop_last: false,
            seed: default_seed(),
        }
    }
}

fn default_prefetch_factor() -> usize {
    2
}

fn default_seed() -> u64 {
    42
}

fn default_true() -> bool {
    true
}

/// SGD parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SgdParams {
    pub lr: f32,
    #[serde(default)]
    pub momentum: f32,
    #[serde(default)]
    pub weight_decay: f32,
    #[serde(default, deserialize_with = "deserialize_bool_lenient")]
    pub nesterov: bool,
}

/// Adam / AdamW parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamParams {
    pub lr: f32,
    #[serde(default = "default_betas")]
    pub betas: (f32, f32),
    #[serde(default = "default_eps")]
    pub eps: f32,
    #[serde(default)]
    pub weight_decay: f32,
}

fn default_betas() -> (f32, f32) {
    (0.9, 0.999)
}

fn default_eps() -> f32 {
    1e-8
}

/// Optimizer choice
///
/// ```yaml
/// optimizer:
///   kind: adamw
///   params: { lr: 0.0001, weight_decay: 0.01 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum OptimizerSpec {
    Sgd(SgdParams),
    Adam(AdamParams),
    #[serde(rename = "adamw")]
    AdamW(AdamParams),
}

impl OptimizerSpec {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sgd(_) => "sgd",
            Self::Adam(_) => "adam",
            Self::AdamW(_) => "adamw",
        }
    }

    /// Configured initial learning rate
    pub fn lr(&self) -> f32 {
        match self {
            Self::Sgd(p) => p.lr,
            Self::Adam(p) | Self::AdamW(p) => p.lr,
        }
    }
}

/// Learning-rate schedule shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Keep the initial learning rate
    Constant,
    /// Multiply by `gamma` every `step_size` advances
    Step { step_size: usize, gamma: f32 },
    /// Multiply by `gamma` at each milestone advance count
    MultiStep { milestones: Vec<usize>, gamma: f32 },
    /// Multiply by `gamma` every advance
    Exponential { gamma: f32 },
    /// Cosine annealing from the initial rate to `eta_min` over `t_max` advances
    Cosine {
        t_max: usize,
        #[serde(default)]
        eta_min: f32,
    },
    /// Ramp linearly from zero over `warmup_steps` advances
    LinearWarmup { warmup_steps: usize },
}

impl SchedulerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Step { .. } => "step",
            Self::MultiStep { .. } => "multi_step",
            Self::Exponential { .. } => "exponential",
            Self::Cosine { .. } => "cosine",
            Self::LinearWarmup { .. } => "linear_warmup",
        }
    }
}

/// Whether the schedule advances per train step or per epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerInterval {
    Step,
    #[default]
    Epoch,
}

/// Schedule plus the cadence the controller drives it at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSchedulerSpec", into = "RawSchedulerSpec")]
pub struct SchedulerSpec {
    pub kind: SchedulerKind,
    pub interval: SchedulerInterval,
    /// Advance once every `frequency` intervals
    pub frequency: usize,
}

impl Default for SchedulerSpec {
    fn default() -> Self {
        Self { kind: SchedulerKind::Constant, interval: SchedulerInterval::Epoch, frequency: 1 }
    }
}

/// On-disk layout of [`SchedulerSpec`]
///
/// ```yaml
/// scheduler:
///   kind: step
///   params: { step_size: 3, gamma: 0.1 }
///   interval: epoch
///   frequency: 1
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawSchedulerSpec {
    kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    params: Value,
    #[serde(default)]
    interval: SchedulerInterval,
    #[serde(default = "default_frequency")]
    frequency: usize,
}

fn default_frequency() -> usize {
    1
}

impl TryFrom<RawSchedulerSpec> for SchedulerSpec {
    type Error = String;

    fn try_from(raw: RawSchedulerSpec) -> Result<Self, Self::Error> {
        let tagged = if raw.params.is_null() {
            json!({ "kind": raw.kind })
        } else {
            json!({ "kind": raw.kind, "params": raw.params })
        };
        let kind: SchedulerKind = serde_json::from_value(tagged)
            .map_err(|e| format!("invalid scheduler '{}': {e}", raw.kind))?;
        Ok(Self { kind, interval: raw.interval, frequency: raw.frequency })
    }
}

impl From<SchedulerSpec> for RawSchedulerSpec {
    fn from(spec: SchedulerSpec) -> Self {
        let params = match &spec.kind {
            SchedulerKind::Constant => Value::Null,
            SchedulerKind::Step { step_size, gamma } => {
                json!({ "step_size": step_size, "gamma": gamma })
            }
            SchedulerKind::MultiStep { milestones, gamma } => {
                json!({ "milestones": milestones, "gamma": gamma })
            }
            SchedulerKind::Exponential { gamma } => json!({ "gamma": gamma }),
            SchedulerKind::Cosine { t_max, eta_min } => json!({ "t_max": t_max, "eta_min": eta_min }),
            SchedulerKind::LinearWarmup { warmup_steps } => json!({ "warmup_steps": warmup_steps }),
        };
        Self {
            kind: spec.kind.name().to_string(),
            params,
            interval: spec.interval,
            frequency: spec.frequency,
        }
    }
}

/// Trainer-level options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Upper bound on train/validate cycles
    #[serde(default = "default_max_epochs")]
    pub max_epochs: usize,

    /// Clip the global gradient norm to this value before each optimizer step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grad_clip: Option<f32>,

    /// Emit a step log line every N train steps
    #[serde(default = "default_log_every_n_steps")]
    pub log_every_n_steps: usize,

    /// Restore parameters, optimizer state and counters before training
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_from: Option<PathBuf>,

    /// Append one row of epoch metrics per validation to this CSV
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_csv: Option<PathBuf>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_epochs: default_max_epochs(),
            grad_clip: None,
            log_every_n_steps: default_log_every_n_steps(),
            resume_from: None,
            metrics_csv: None,
        }
    }
}

fn default_max_epochs() -> usize {
    10
}

fn default_log_every_n_steps() -> usize {
    50
}

/// Validation metric a policy watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoredMetric {
    /// Mean total validation loss
    #[default]
    ValLoss,
    ValClassificationLoss,
    ValRegressionLoss,
}

impl MonitoredMetric {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ValLoss => "val_loss",
            Self::ValClassificationLoss => "val_classification_loss",
            Self::ValRegressionLoss => "val_regression_loss",
        }
    }
}

/// Improvement direction of a monitored metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    #[default]
    Min,
    Max,
}

/// Early stopping policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarlyStoppingConfig {
    #[serde(default)]
    pub monitor: MonitoredMetric,
    #[serde(default)]
    pub mode: MonitorMode,
    /// Smallest change that counts as improvement
    #[serde(default)]
    pub min_delta: f32,
    /// Non-improving validations tolerated before stopping
    #[serde(default = "default_patience")]
    pub patience: usize,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self {
            monitor: MonitoredMetric::ValLoss,
            mode: MonitorMode::Min,
            min_delta: 0.0,
            patience: default_patience(),
        }
    }
}

fn default_patience() -> usize {
    3
}

/// Checkpoint policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory checkpoints are written to
    #[serde(default = "default_checkpoint_dir")]
    pub dirpath: PathBuf,
    #[serde(default)]
    pub monitor: MonitoredMetric,
    #[serde(default)]
    pub mode: MonitorMode,
    /// Also write `checkpoint_last.json` after every validation
    #[serde(default, deserialize_with = "deserialize_bool_lenient")]
    pub save_last: bool,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dirpath: default_checkpoint_dir(),
            monitor: MonitoredMetric::ValLoss,
            mode: MonitorMode::Min,
            save_last: false,
        }
    }
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

/// Annotation geometry evaluated by the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IouType {
    Bbox,
}

fn default_iou_types() -> Vec<IouType> {
    vec![IouType::Bbox]
}
