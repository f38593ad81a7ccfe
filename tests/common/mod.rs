//! Shared fixtures: a stub detector and on-disk record sources

#![allow(dead_code)]

use std::cell::Cell;
use std::fs;
use std::sync::{Arc, Mutex};

use ndarray::{arr1, Array3, Array4};
use tempfile::TempDir;

use detectar::config::{parse_config, HyperparameterConfig};
use detectar::data::{Batch, BoundingBox, InMemoryImageLoader};
use detectar::eval::{Detection, DetectionResult};
use detectar::optim::Parameter;
use detectar::train::{
    CheckpointEvent, DetectionModel, EarlyStopEvent, EpochSummary, LifecycleHook, LossBreakdown,
    StageContext, StepContext,
};
use detectar::Result;

/// Detector with scripted losses
///
/// Training always reports `train_loss` and a unit gradient. Validation call
/// `k` reports `val_schedule[k]` (the last value repeats) as classification
/// loss, so with one validation batch per epoch the schedule is per epoch.
pub struct StubModel {
    params: Vec<Parameter>,
    pub train_loss: LossBreakdown,
    pub val_schedule: Vec<f32>,
    val_calls: Cell<usize>,
    pub forward_calls: usize,
}

impl StubModel {
    pub fn new(train_loss: LossBreakdown, val_schedule: Vec<f32>) -> Self {
        Self {
            params: vec![Parameter::new("head.w", arr1(&[1.0])), Parameter::frozen("backbone.w", arr1(&[5.0]))],
            train_loss,
            val_schedule,
            val_calls: Cell::new(0),
            forward_calls: 0,
        }
    }

    pub fn weight(&self) -> f32 {
        self.params[0].data[0]
    }
}

impl DetectionModel for StubModel {
    fn forward(&mut self, _batch: &Batch) -> Result<LossBreakdown> {
        self.forward_calls += 1;
        Ok(self.train_loss)
    }

    fn backward(&mut self, _loss: &LossBreakdown) -> Result<()> {
        self.params[0].set_grad(arr1(&[1.0]));
        Ok(())
    }

    fn evaluate(&self, _batch: &Batch) -> Result<LossBreakdown> {
        let k = self.val_calls.get();
        self.val_calls.set(k + 1);
        let value = self.val_schedule.get(k).or(self.val_schedule.last()).copied().unwrap_or(1.0);
        Ok(LossBreakdown::new(value, 0.0))
    }

    /// The top-left quarter of whatever image it is given, which is where
    /// the fixture's only box sits
    fn predict(&self, images: &Array4<f32>) -> Result<Vec<DetectionResult>> {
        let (n, _, h, w) = images.dim();
        let bbox = BoundingBox::new(0.0, 0.0, w as f32 / 2.0, h as f32 / 2.0)?;
        let result = DetectionResult::new(vec![Detection { bbox, label: 1, score: 0.9 }]);
        Ok(vec![result; n])
    }

    fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.params
    }
}

/// Record sources in a temp dir: 4 train, 1 validation and 2 test images,
/// each with one 4x4 box of label 1
pub struct Fixture {
    pub dir: TempDir,
    pub config: HyperparameterConfig,
    pub images: Arc<InMemoryImageLoader>,
}

fn write_source(dir: &TempDir, name: &str, prefix: &str, n: usize) -> String {
    let mut body = String::from("filename,xmin,ymin,xmax,ymax,labels\n");
    for i in 0..n {
        body.push_str(&format!("{prefix}{i}.png,0,0,4,4,1\n"));
    }
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    path.display().to_string()
}

pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let train = write_source(&dir, "train.csv", "t", 4);
    let valid = write_source(&dir, "valid.csv", "v", 1);
    let test = write_source(&dir, "test.csv", "s", 2);
    let checkpoints = dir.path().join("checkpoints").display().to_string();

    let yaml = format!(
        r#"
data:
  train_csv: {train}
  valid_csv: {valid}
  test_csv: {test}
batch_size:
  train: 2
  valid: 4
  test: 2
optimizer:
  kind: sgd
  params: {{ lr: 0.1 }}
trainer:
  max_epochs: 3
checkpoint:
  dirpath: {checkpoints}
"#
    );
    let mut config = parse_config(&yaml).unwrap();
    config.dataloader.shuffle = false;

    let mut images = InMemoryImageLoader::new();
    for (prefix, n) in [("t", 4), ("v", 1), ("s", 2)] {
        for i in 0..n {
            images.insert(format!("{prefix}{i}.png"), Array3::zeros((3, 8, 8)));
        }
    }

    Fixture { dir, config, images: Arc::new(images) }
}

/// Hook that records everything it observes
#[derive(Clone, Default)]
pub struct Recorder {
    pub stages: Arc<Mutex<Vec<StageContext>>>,
    pub steps: Arc<Mutex<Vec<StepContext>>>,
    pub epochs: Arc<Mutex<Vec<EpochSummary>>>,
    pub checkpoints: Arc<Mutex<Vec<CheckpointEvent>>>,
    pub early_stops: Arc<Mutex<Vec<EarlyStopEvent>>>,
}

impl LifecycleHook for Recorder {
    fn on_stage_start(&mut self, ctx: &StageContext) {
        self.stages.lock().unwrap().push(ctx.clone());
    }

    fn on_train_step_end(&mut self, ctx: &StepContext) {
        self.steps.lock().unwrap().push(ctx.clone());
    }

    fn on_epoch_end(&mut self, summary: &EpochSummary) {
        self.epochs.lock().unwrap().push(summary.clone());
    }

    fn on_checkpoint_saved(&mut self, event: &CheckpointEvent) {
        self.checkpoints.lock().unwrap().push(event.clone());
    }

    fn on_early_stop(&mut self, event: &EarlyStopEvent) {
        self.early_stops.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "Recorder"
    }
}
