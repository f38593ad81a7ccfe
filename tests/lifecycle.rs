//! End-to-end lifecycle tests against a scripted detector

mod common;

use approx::assert_relative_eq;
use detectar::config::{
    EarlyStoppingConfig, IouType, MonitorMode, MonitoredMetric, SchedulerInterval, SchedulerKind,
    SchedulerSpec,
};
use detectar::data::{Stage, TransformSpec};
use detectar::eval::EvaluationAccumulator;
use detectar::io::load_checkpoint;
use detectar::train::{FinishReason, LifecycleController, LifecycleState, LossBreakdown};
use detectar::Error;

use common::{fixture, Recorder, StubModel};

fn stub(val_schedule: Vec<f32>) -> StubModel {
    StubModel::new(LossBreakdown::new(0.3, 0.2), val_schedule)
}

fn accumulator(controller: &LifecycleController<StubModel>) -> EvaluationAccumulator {
    let gt = controller.datasets().unwrap().test.ground_truth();
    EvaluationAccumulator::new(gt, &[IouType::Bbox]).unwrap()
}

#[test]
fn test_one_epoch_reports_every_step() {
    let fx = fixture();
    let recorder = Recorder::default();
    let mut controller = LifecycleController::new(fx.config, stub(vec![1.0]), fx.images)
        .unwrap()
        .with_hook(recorder.clone());

    controller.prepare().unwrap();
    let train = controller.train_epoch().unwrap();

    assert_relative_eq!(train.total(), 0.5);
    assert_eq!(controller.global_step(), 2);
    assert_eq!(controller.model().forward_calls, 2);
    assert_eq!(controller.state(), LifecycleState::Validating { epoch: 1, validated: false });

    let steps = recorder.steps.lock().unwrap();
    assert_eq!(steps.len(), 2);
    for (i, step) in steps.iter().enumerate() {
        assert_eq!(step.step, i + 1);
        assert_eq!(step.steps_per_epoch, 2);
        assert_relative_eq!(step.loss.total(), 0.5);
    }
    let stages = recorder.stages.lock().unwrap();
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].stage, Stage::Train);
    assert_eq!(stages[0].dataset_len, 4);
}

#[test]
fn test_train_stage_start_fires_once() {
    let mut fx = fixture();
    fx.config.trainer.max_epochs = 3;
    let recorder = Recorder::default();
    let mut controller = LifecycleController::new(fx.config, stub(vec![1.0]), fx.images)
        .unwrap()
        .with_hook(recorder.clone());

    let result = controller.fit().unwrap();
    assert_eq!(result.epochs, 3);
    assert_eq!(result.global_step, 6);
    assert_eq!(recorder.stages.lock().unwrap().len(), 1);
    assert_eq!(recorder.epochs.lock().unwrap().len(), 3);
}

#[test]
fn test_early_stopping_after_patience_plus_one() {
    let mut fx = fixture();
    fx.config.trainer.max_epochs = 20;
    fx.config.early_stopping = Some(EarlyStoppingConfig { patience: 2, ..EarlyStoppingConfig::default() });
    let recorder = Recorder::default();
    let mut controller = LifecycleController::new(fx.config, stub(vec![1.0]), fx.images)
        .unwrap()
        .with_hook(recorder.clone());

    let result = controller.fit().unwrap();
    assert!(result.stopped_early);
    assert_eq!(result.history.len(), 3);
    assert!(result.history[2].stopped_early);
    assert_eq!(controller.state(), LifecycleState::Finished { reason: FinishReason::EarlyStopped });
    assert_eq!(recorder.early_stops.lock().unwrap().len(), 1);

    // testing is still allowed after an early stop
    let mut acc = accumulator(&controller);
    controller.test(&mut acc).unwrap();
    assert_eq!(controller.state(), LifecycleState::Finished { reason: FinishReason::Tested });
}

#[test]
fn test_checkpoints_written_only_on_improvement() {
    let mut fx = fixture();
    fx.config.trainer.max_epochs = 4;
    fx.config.checkpoint.mode = MonitorMode::Max;
    fx.config.checkpoint.monitor = MonitoredMetric::ValLoss;
    let dir = fx.config.checkpoint.dirpath.clone();
    let recorder = Recorder::default();
    let mut controller =
        LifecycleController::new(fx.config, stub(vec![0.5, 0.6, 0.55, 0.7]), fx.images)
            .unwrap()
            .with_hook(recorder.clone());

    let result = controller.fit().unwrap();
    assert_eq!(result.best, Some(0.7));
    for (epoch, exists) in [(1, true), (2, true), (3, false), (4, true)] {
        assert_eq!(dir.join(format!("checkpoint_epoch_{epoch}.json")).exists(), exists, "epoch {epoch}");
    }
    let improved: Vec<bool> = result.history.iter().map(|r| r.improved).collect();
    assert_eq!(improved, vec![true, true, false, true]);

    let best = load_checkpoint(dir.join("checkpoint_best.json")).unwrap();
    assert_eq!(best.epoch, 4);
    assert_relative_eq!(best.value, 0.7);

    let events = recorder.checkpoints.lock().unwrap();
    assert_eq!(events.len(), 6);
    assert_eq!(events.iter().filter(|e| e.is_best).count(), 3);
}

#[test]
fn test_save_last_writes_every_epoch() {
    let mut fx = fixture();
    fx.config.trainer.max_epochs = 2;
    fx.config.checkpoint.save_last = true;
    let dir = fx.config.checkpoint.dirpath.clone();
    // min mode: the second epoch does not improve
    let mut controller =
        LifecycleController::new(fx.config, stub(vec![0.5, 0.9]), fx.images).unwrap();

    controller.fit().unwrap();
    assert!(!dir.join("checkpoint_epoch_2.json").exists());
    assert_eq!(load_checkpoint(dir.join("checkpoint_last.json")).unwrap().epoch, 2);
    assert_eq!(load_checkpoint(dir.join("checkpoint_best.json")).unwrap().epoch, 1);
}

#[test]
fn test_epoch_scheduler_advances_once_per_epoch() {
    let mut fx = fixture();
    fx.config.trainer.max_epochs = 3;
    fx.config.scheduler = SchedulerSpec {
        kind: SchedulerKind::Step { step_size: 1, gamma: 0.5 },
        interval: SchedulerInterval::Epoch,
        frequency: 1,
    };
    let mut controller = LifecycleController::new(fx.config, stub(vec![1.0]), fx.images).unwrap();

    controller.fit().unwrap();
    assert_eq!(controller.scheduler_advances(), Some(3));
    assert_relative_eq!(controller.lr().unwrap(), 0.1 * 0.125, epsilon = 1e-7);
}

#[test]
fn test_step_scheduler_respects_frequency() {
    let mut fx = fixture();
    fx.config.trainer.max_epochs = 2;
    fx.config.scheduler = SchedulerSpec {
        kind: SchedulerKind::Step { step_size: 1, gamma: 0.5 },
        interval: SchedulerInterval::Step,
        frequency: 2,
    };
    let recorder = Recorder::default();
    let mut controller = LifecycleController::new(fx.config, stub(vec![1.0]), fx.images)
        .unwrap()
        .with_hook(recorder.clone());

    controller.fit().unwrap();
    // 4 steps at frequency 2
    assert_eq!(controller.scheduler_advances(), Some(2));
    assert_relative_eq!(controller.lr().unwrap(), 0.025, epsilon = 1e-7);

    let lrs: Vec<f32> = recorder.steps.lock().unwrap().iter().map(|s| s.lr).collect();
    assert_relative_eq!(lrs[0], 0.1, epsilon = 1e-7);
    assert_relative_eq!(lrs[1], 0.05, epsilon = 1e-7);
    assert_relative_eq!(lrs[2], 0.05, epsilon = 1e-7);
    assert_relative_eq!(lrs[3], 0.025, epsilon = 1e-7);
}

#[test]
fn test_invalid_transitions_leave_state_unchanged() {
    let fx = fixture();
    let mut controller = LifecycleController::new(fx.config, stub(vec![1.0]), fx.images).unwrap();
    let mut acc = EvaluationAccumulator::new(Vec::new(), &[IouType::Bbox]).unwrap();

    assert!(matches!(controller.train_epoch(), Err(Error::InvalidTransition { .. })));
    assert!(matches!(controller.validate_epoch(), Err(Error::InvalidTransition { .. })));
    assert!(matches!(controller.test(&mut acc), Err(Error::InvalidTransition { .. })));
    assert_eq!(controller.state(), LifecycleState::Idle);

    controller.prepare().unwrap();
    assert!(matches!(controller.prepare(), Err(Error::InvalidTransition { .. })));
    assert!(matches!(controller.validate_epoch(), Err(Error::InvalidTransition { .. })));

    controller.train_epoch().unwrap();
    // validation is pending
    assert!(matches!(controller.train_epoch(), Err(Error::InvalidTransition { .. })));
    controller.validate_epoch().unwrap();
    assert!(matches!(controller.validate_epoch(), Err(Error::InvalidTransition { .. })));
    assert!(matches!(controller.resume_from("missing.json"), Err(Error::InvalidTransition { .. })));
    assert_eq!(controller.state(), LifecycleState::Validating { epoch: 1, validated: true });
}

#[test]
fn test_resume_restores_counters_and_parameters() {
    let mut fx = fixture();
    fx.config.trainer.max_epochs = 2;
    let dir = fx.config.checkpoint.dirpath.clone();
    let config = fx.config.clone();

    let mut first =
        LifecycleController::new(fx.config, stub(vec![0.9, 0.8]), fx.images.clone()).unwrap();
    first.fit().unwrap();
    let trained = first.model().weight();
    // unit gradient, lr 0.1, 4 steps
    assert_relative_eq!(trained, 0.6, epsilon = 1e-5);

    let mut config = config;
    config.trainer.max_epochs = 4;
    config.trainer.resume_from = Some(dir.join("checkpoint_best.json"));
    let mut second = LifecycleController::new(config, stub(vec![0.7]), fx.images).unwrap();
    let recorder = Recorder::default();
    second.add_hook(recorder.clone());

    second.prepare().unwrap();
    second.resume_from(dir.join("checkpoint_best.json")).unwrap();
    assert_eq!(second.epoch(), 2);
    assert_eq!(second.global_step(), 4);
    assert_eq!(second.state(), LifecycleState::Validating { epoch: 2, validated: true });
    assert_relative_eq!(second.model().weight(), trained);

    let result = second.fit().unwrap();
    let epochs: Vec<usize> = result.history.iter().map(|r| r.epoch).collect();
    assert_eq!(epochs, vec![3, 4]);
    assert_eq!(result.global_step, 8);

    let stages = recorder.stages.lock().unwrap();
    assert_eq!(stages[0].epoch, 3);
    assert_eq!(stages[0].global_step, 4);
}

#[test]
fn test_fit_honours_configured_resume_path() {
    let mut fx = fixture();
    fx.config.trainer.max_epochs = 1;
    let dir = fx.config.checkpoint.dirpath.clone();
    let mut config = fx.config.clone();
    LifecycleController::new(fx.config, stub(vec![0.5]), fx.images.clone()).unwrap().fit().unwrap();

    config.trainer.max_epochs = 2;
    config.trainer.resume_from = Some(dir.join("checkpoint_epoch_1.json"));
    let mut controller = LifecycleController::new(config, stub(vec![0.4]), fx.images).unwrap();
    let result = controller.fit().unwrap();
    assert_eq!(result.history.len(), 1);
    assert_eq!(result.epochs, 2);
}

#[test]
fn test_resume_from_missing_checkpoint_fails() {
    let fx = fixture();
    let missing = fx.dir.path().join("nope.json");
    let mut controller = LifecycleController::new(fx.config, stub(vec![1.0]), fx.images).unwrap();
    assert!(controller.resume_from(missing).is_err());
}

#[test]
fn test_test_stage_feeds_accumulator() {
    let fx = fixture();
    let recorder = Recorder::default();
    let mut controller = LifecycleController::new(fx.config, stub(vec![1.0]), fx.images)
        .unwrap()
        .with_hook(recorder.clone());
    controller.prepare().unwrap();

    let mut acc = accumulator(&controller);
    let report = controller.test(&mut acc).unwrap();
    assert_eq!(report.images, 2);
    assert_eq!(report.batches, 1);
    assert_relative_eq!(report.summary.primary_ap, 1.0, epsilon = 1e-9);
    assert_eq!(controller.state(), LifecycleState::Finished { reason: FinishReason::Tested });

    let stages = recorder.stages.lock().unwrap();
    assert_eq!(stages.last().unwrap().stage, Stage::Test);

    let mut again = accumulator(&controller);
    assert!(matches!(controller.test(&mut again), Err(Error::InvalidTransition { .. })));
}

#[test]
fn test_test_stage_scores_in_augmented_space() {
    let mut fx = fixture();
    fx.config.augmentations.test = vec![TransformSpec::Resize { width: 16, height: 16 }];
    let mut controller = LifecycleController::new(fx.config, stub(vec![1.0]), fx.images).unwrap();
    controller.prepare().unwrap();

    // built from the raw record boxes, (0, 0, 4, 4)
    let mut acc = accumulator(&controller);
    let report = controller.test(&mut acc).unwrap();
    assert_relative_eq!(report.summary.primary_ap, 1.0, epsilon = 1e-9);
}

#[test]
fn test_metrics_csv_gets_one_row_per_epoch() {
    let mut fx = fixture();
    fx.config.trainer.max_epochs = 2;
    let csv = fx.dir.path().join("metrics.csv");
    fx.config.trainer.metrics_csv = Some(csv.clone());
    let mut controller = LifecycleController::new(fx.config, stub(vec![1.0]), fx.images).unwrap();

    controller.fit().unwrap();
    let body = std::fs::read_to_string(csv).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("epoch,"));
}
