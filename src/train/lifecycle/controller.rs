//! The lifecycle controller: stages, steps, policies and hooks on one thread

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::result::{EpochReport, FitResult, TestReport};
use super::state::{FinishReason, LifecycleState};
use crate::config::{validate_config, HyperparameterConfig};
use crate::data::{DataLoader, DatasetStager, ImageLoader, LoaderOptions, Stage, StagedDatasets};
use crate::error::{Error, Result};
use crate::eval::EvaluationAccumulator;
use crate::io::{load_checkpoint, save_checkpoint, Checkpoint, PolicySnapshot};
use crate::optim::{OptimizationConfigurator, OptimizationSetup};
use crate::train::callback::{
    CheckpointEvent, CsvMetricsLogger, EarlyStopEvent, EpochSummary, HookManager, LifecycleHook,
    LoggingHook, StageContext, StepContext,
};
use crate::train::{
    CheckpointPolicy, DetectionModel, EarlyStopping, LossBreakdown, LossMeter, StepExecutor,
};

/// Drives a detection model through prepare, train/validate epochs and test
///
/// Every transition is checked against the current [`LifecycleState`]; an
/// out-of-order call fails with [`Error::InvalidTransition`] and leaves the
/// state unchanged.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use detectar::config::load_config;
/// use detectar::data::FileImageLoader;
/// use detectar::eval::EvaluationAccumulator;
/// use detectar::train::{DetectionModel, LifecycleController};
///
/// fn run<M: DetectionModel>(model: M) -> detectar::Result<()> {
///     let config = load_config("config.yaml")?;
///     let iou_types = config.iou_types.clone();
///     let mut controller = LifecycleController::new(config, model, Arc::new(FileImageLoader))?;
///     let fit = controller.fit()?;
///     println!("trained {} epochs", fit.epochs);
///
///     let ground_truth = controller.datasets().map(|d| d.test.ground_truth()).unwrap_or_default();
///     let mut accumulator = EvaluationAccumulator::new(ground_truth, &iou_types)?;
///     let report = controller.test(&mut accumulator)?;
///     println!("AP {:.3}", report.summary.primary_ap);
///     Ok(())
/// }
/// ```
pub struct LifecycleController<M: DetectionModel> {
    config: HyperparameterConfig,
    model: M,
    images: Arc<dyn ImageLoader>,
    state: LifecycleState,
    datasets: Option<StagedDatasets>,
    optimization: Option<OptimizationSetup>,
    executor: StepExecutor,
    hooks: HookManager,
    checkpoint_policy: CheckpointPolicy,
    early_stopping: Option<EarlyStopping>,
    /// Training epochs completed
    epoch: usize,
    global_step: usize,
    /// Mean train loss of the epoch awaiting validation
    pending_train: Option<(LossBreakdown, Instant)>,
    train_started: bool,
    history: Vec<EpochReport>,
}

impl<M: DetectionModel> LifecycleController<M> {
    /// Validate `config` and install the logging hook (plus the CSV logger
    /// when `trainer.metrics_csv` is set)
    pub fn new(config: HyperparameterConfig, model: M, images: Arc<dyn ImageLoader>) -> Result<Self> {
        validate_config(&config)?;

        let mut hooks = HookManager::new();
        hooks.add(LoggingHook::new(config.trainer.log_every_n_steps));
        if let Some(path) = &config.trainer.metrics_csv {
            hooks.add(CsvMetricsLogger::new(path));
        }

        Ok(Self {
            executor: StepExecutor::new(config.trainer.grad_clip),
            checkpoint_policy: CheckpointPolicy::from_config(&config.checkpoint),
            early_stopping: config.early_stopping.as_ref().map(EarlyStopping::from_config),
            config,
            model,
            images,
            state: LifecycleState::Idle,
            datasets: None,
            optimization: None,
            hooks,
            epoch: 0,
            global_step: 0,
            pending_train: None,
            train_started: false,
            history: Vec::new(),
        })
    }

    /// Register a hook, builder style
    pub fn with_hook<H: LifecycleHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.add(hook);
        self
    }

    /// Register a hook
    pub fn add_hook<H: LifecycleHook + 'static>(&mut self, hook: H) {
        self.hooks.add(hook);
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &HyperparameterConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Training epochs completed
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    pub fn history(&self) -> &[EpochReport] {
        &self.history
    }

    /// Staged splits, available after [`prepare`](Self::prepare)
    pub fn datasets(&self) -> Option<&StagedDatasets> {
        self.datasets.as_ref()
    }

    /// Current optimizer learning rate, once optimization is configured
    pub fn lr(&self) -> Option<f32> {
        self.optimization.as_ref().map(|o| o.optimizer.lr())
    }

    /// Scheduler advances so far, once optimization is configured
    pub fn scheduler_advances(&self) -> Option<usize> {
        self.optimization.as_ref().map(|o| o.scheduler.advances())
    }

    fn invalid(&self, action: &'static str) -> Error {
        Error::InvalidTransition { from: self.state.to_string(), action }
    }

    fn staged(&self) -> Result<StagedDatasets> {
        self.datasets.clone().ok_or_else(|| self.invalid("run a stage before prepare"))
    }

    fn loader(&self, datasets: &StagedDatasets, stage: Stage) -> DataLoader {
        let cfg = &self.config;
        let (batch_size, shuffle, drop_last) = match stage {
            Stage::Train => (cfg.batch_size.train, cfg.dataloader.shuffle, cfg.dataloader.drop_last),
            Stage::Validation => (cfg.batch_size.valid, false, false),
            Stage::Test => (cfg.batch_size.test, false, false),
        };
        let options = LoaderOptions {
            batch_size,
            num_workers: cfg.dataloader.num_workers,
            prefetch_factor: cfg.dataloader.prefetch_factor,
            shuffle,
            drop_last,
            seed: cfg.dataloader.seed,
        };
        DataLoader::new(Arc::clone(datasets.split(stage)), Arc::clone(&self.images), options)
    }

    fn ensure_optimization(&mut self) -> Result<()> {
        if self.optimization.is_none() {
            self.optimization = Some(OptimizationConfigurator::configure(&self.config, self.model.parameters())?);
        }
        Ok(())
    }

    /// `Idle → Prepared`: stage the three splits
    pub fn prepare(&mut self) -> Result<()> {
        if self.state != LifecycleState::Idle {
            return Err(self.invalid("prepare"));
        }
        let stager = DatasetStager::new(self.config.data.clone(), self.config.augmentations.clone());
        let datasets = stager.stage()?;
        info!(
            train = datasets.train.len(),
            validation = datasets.validation.len(),
            test = datasets.test.len(),
            "datasets staged"
        );
        self.datasets = Some(datasets);
        self.state = LifecycleState::Prepared;
        Ok(())
    }

    /// Restore parameters, optimizer state, counters and policy state
    ///
    /// Allowed from `Idle` (which prepares first) or `Prepared`. Afterwards the
    /// controller sits at the checkpoint's epoch, validated, so the next
    /// [`train_epoch`](Self::train_epoch) continues with the following epoch.
    pub fn resume_from(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match self.state {
            LifecycleState::Idle => self.prepare()?,
            LifecycleState::Prepared => {}
            _ => return Err(self.invalid("resume from a checkpoint")),
        }

        let checkpoint = load_checkpoint(path)?;
        checkpoint.restore_parameters(path, self.model.parameters_mut())?;
        self.ensure_optimization()?;
        if let Some(setup) = self.optimization.as_mut() {
            setup.optimizer.load_state(checkpoint.optimizer.clone())?;
            setup.scheduler.restore(checkpoint.scheduler, setup.optimizer.as_mut());
        }
        self.checkpoint_policy.restore(checkpoint.policies.checkpoint_best);
        if let Some(es) = self.early_stopping.as_mut() {
            es.restore(checkpoint.policies.early_stopping.unwrap_or_default());
        }

        self.epoch = checkpoint.epoch;
        self.global_step = checkpoint.global_step;
        self.state = LifecycleState::Validating { epoch: checkpoint.epoch, validated: true };
        info!(
            path = %path.display(),
            epoch = checkpoint.epoch,
            global_step = checkpoint.global_step,
            "resumed from checkpoint"
        );
        Ok(())
    }

    /// Train one epoch: `Prepared → Training(1)` or `Validating(k) → Training(k+1)`,
    /// ending in `Validating` with validation pending
    ///
    /// Returns the mean train loss of the epoch.
    pub fn train_epoch(&mut self) -> Result<LossBreakdown> {
        let epoch = match self.state {
            LifecycleState::Prepared => self.epoch + 1,
            LifecycleState::Validating { epoch, validated: true } => epoch + 1,
            _ => return Err(self.invalid("train an epoch")),
        };
        let datasets = self.staged()?;
        self.ensure_optimization()?;
        let loader = self.loader(&datasets, Stage::Train);
        let steps_per_epoch = loader.num_batches();

        self.state = LifecycleState::Training { epoch };
        if !self.train_started {
            self.train_started = true;
            self.hooks.on_stage_start(&StageContext {
                stage: Stage::Train,
                epoch,
                global_step: self.global_step,
                dataset_len: loader.dataset_len(),
                num_batches: steps_per_epoch,
                max_epochs: self.config.trainer.max_epochs,
            });
        }

        let started = Instant::now();
        let mut meter = LossMeter::new();
        let setup = self.optimization.as_mut().ok_or_else(|| Error::optimization("optimizer not configured"))?;
        for (i, batch) in loader.epoch(epoch as u64).enumerate() {
            let batch = batch?;
            let loss = self.executor.train_step(&mut self.model, setup.optimizer.as_mut(), &batch)?;
            self.global_step += 1;
            setup.scheduler.on_train_step(setup.optimizer.as_mut());
            meter.update(&loss);
            self.hooks.on_train_step_end(&StepContext {
                epoch,
                step: i + 1,
                steps_per_epoch,
                global_step: self.global_step,
                loss,
                lr: setup.optimizer.lr(),
            });
        }
        if setup.scheduler.on_epoch_end(setup.optimizer.as_mut()) {
            debug!(epoch, lr = setup.optimizer.lr(), "scheduler advanced");
        }

        let train = meter.mean();
        self.epoch = epoch;
        self.pending_train = Some((train, started));
        self.state = LifecycleState::Validating { epoch, validated: false };
        Ok(train)
    }

    /// Run the pending validation pass, then the checkpoint and early stopping policies
    pub fn validate_epoch(&mut self) -> Result<EpochReport> {
        let epoch = match self.state {
            LifecycleState::Validating { epoch, validated: false } => epoch,
            _ => return Err(self.invalid("validate an epoch")),
        };
        let datasets = self.staged()?;
        let loader = self.loader(&datasets, Stage::Validation);

        let mut meter = LossMeter::new();
        for batch in loader.epoch(epoch as u64) {
            let loss = self.executor.validation_step(&self.model, &batch?)?;
            meter.update(&loss);
        }
        let validation = meter.mean();
        let (train, started) = self.pending_train.take().unwrap_or_else(|| (Default::default(), Instant::now()));
        let lr = self.lr().unwrap_or_default();

        self.hooks.on_epoch_end(&EpochSummary {
            epoch,
            max_epochs: self.config.trainer.max_epochs,
            global_step: self.global_step,
            train,
            validation,
            lr,
            elapsed_secs: started.elapsed().as_secs_f64(),
        });

        let metric = self.checkpoint_policy.monitor();
        let decision = self.checkpoint_policy.evaluate(epoch, validation.metric(metric));
        let stop = match self.early_stopping.as_mut() {
            Some(es) => es.update(validation.metric(es.monitor())),
            None => false,
        };

        if !decision.paths.is_empty() {
            let checkpoint = self.snapshot(epoch, decision.value)?;
            let best_path = self.checkpoint_policy.best_checkpoint_path();
            for path in &decision.paths {
                save_checkpoint(path, &checkpoint)?;
                self.hooks.on_checkpoint_saved(&CheckpointEvent {
                    epoch,
                    path: path.clone(),
                    metric,
                    value: decision.value,
                    is_best: *path == best_path,
                });
            }
        }

        let report = EpochReport {
            epoch,
            train,
            validation,
            monitored: decision.value,
            lr,
            improved: decision.improved,
            stopped_early: stop,
        };
        self.history.push(report.clone());

        if let (true, Some(es)) = (stop, self.early_stopping.as_ref()) {
            self.hooks.on_early_stop(&EarlyStopEvent {
                epoch,
                metric: es.monitor(),
                best: es.best(),
                patience: es.patience(),
            });
            self.state = LifecycleState::Finished { reason: FinishReason::EarlyStopped };
        } else {
            self.state = LifecycleState::Validating { epoch, validated: true };
        }
        Ok(report)
    }

    fn snapshot(&self, epoch: usize, value: f32) -> Result<Checkpoint> {
        let setup = self.optimization.as_ref().ok_or_else(|| Error::optimization("optimizer not configured"))?;
        Ok(Checkpoint {
            epoch,
            global_step: self.global_step,
            metric: self.checkpoint_policy.monitor(),
            value,
            parameters: Checkpoint::capture_parameters(self.model.parameters()),
            optimizer: setup.optimizer.state(),
            scheduler: setup.scheduler.counters(),
            policies: PolicySnapshot {
                checkpoint_best: self.checkpoint_policy.best(),
                early_stopping: self.early_stopping.as_ref().map(EarlyStopping::state),
            },
            saved_at: Utc::now(),
        })
    }

    /// Prepare if needed, resume from `trainer.resume_from` if set, then
    /// train and validate until `max_epochs` or early stopping
    pub fn fit(&mut self) -> Result<FitResult> {
        if self.state == LifecycleState::Idle {
            self.prepare()?;
            if let Some(path) = self.config.trainer.resume_from.clone() {
                self.resume_from(path)?;
            }
        }

        let started = Instant::now();
        loop {
            match self.state {
                LifecycleState::Finished { .. } => break,
                LifecycleState::Validating { epoch, validated: true }
                    if epoch >= self.config.trainer.max_epochs =>
                {
                    break
                }
                LifecycleState::Validating { validated: false, .. } => {
                    self.validate_epoch()?;
                }
                _ => {
                    self.train_epoch()?;
                    self.validate_epoch()?;
                }
            }
        }

        let result = FitResult {
            epochs: self.epoch,
            global_step: self.global_step,
            stopped_early: self.state == LifecycleState::Finished { reason: FinishReason::EarlyStopped },
            best: self.checkpoint_policy.best(),
            history: self.history.clone(),
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        info!(
            epochs = result.epochs,
            global_step = result.global_step,
            stopped_early = result.stopped_early,
            best = ?result.best,
            "training finished"
        );
        Ok(result)
    }

    /// Predict every test image, feed `accumulator`, then accumulate and summarize
    ///
    /// Ground truth of each test image is replaced by the batch target the
    /// model actually saw, so test-time augmentations move both together.
    pub fn test(&mut self, accumulator: &mut EvaluationAccumulator) -> Result<TestReport> {
        if !self.state.can_test() {
            return Err(self.invalid("test"));
        }
        let datasets = self.staged()?;
        let loader = self.loader(&datasets, Stage::Test);

        self.state = LifecycleState::Testing;
        self.hooks.on_stage_start(&StageContext {
            stage: Stage::Test,
            epoch: self.epoch,
            global_step: self.global_step,
            dataset_len: loader.dataset_len(),
            num_batches: loader.num_batches(),
            max_epochs: self.config.trainer.max_epochs,
        });

        let mut images = 0;
        let mut batches = 0;
        for batch in loader.epoch(0) {
            let batch = batch?;
            let results = self.executor.test_step(&self.model, &batch)?;
            images += results.len();
            batches += 1;
            // score against boxes in the same space as the augmented images
            accumulator.replace_ground_truth(&batch.targets)?;
            accumulator.update(results)?;
        }
        accumulator.accumulate()?;
        let summary = accumulator.summarize()?;

        self.state = LifecycleState::Finished { reason: FinishReason::Tested };
        info!(images, primary_ap = summary.primary_ap, "test finished");
        Ok(TestReport { images, batches, summary })
    }
}
