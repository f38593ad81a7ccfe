//! Hook manager for dispatching lifecycle events to multiple hooks

use super::traits::{
    CheckpointEvent, EarlyStopEvent, EpochSummary, LifecycleHook, StageContext, StepContext,
};

/// Manages multiple hooks and dispatches events in registration order
#[derive(Default)]
pub struct HookManager {
    hooks: Vec<Box<dyn LifecycleHook>>,
}

impl HookManager {
    /// Create new hook manager
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add a hook
    pub fn add<H: LifecycleHook + 'static>(&mut self, hook: H) {
        self.hooks.push(Box::new(hook));
    }

    /// Add an already boxed hook
    pub fn add_boxed(&mut self, hook: Box<dyn LifecycleHook>) {
        self.hooks.push(hook);
    }

    /// Check if no hooks are registered
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Get number of hooks
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Registered hook names, in dispatch order
    pub fn names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub fn on_stage_start(&mut self, ctx: &StageContext) {
        for hook in &mut self.hooks {
            hook.on_stage_start(ctx);
        }
    }

    pub fn on_train_step_end(&mut self, ctx: &StepContext) {
        for hook in &mut self.hooks {
            hook.on_train_step_end(ctx);
        }
    }

    pub fn on_epoch_end(&mut self, summary: &EpochSummary) {
        for hook in &mut self.hooks {
            hook.on_epoch_end(summary);
        }
    }

    pub fn on_checkpoint_saved(&mut self, event: &CheckpointEvent) {
        for hook in &mut self.hooks {
            hook.on_checkpoint_saved(event);
        }
    }

    pub fn on_early_stop(&mut self, event: &EarlyStopEvent) {
        for hook in &mut self.hooks {
            hook.on_early_stop(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Stage;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl LifecycleHook for Recorder {
        fn on_stage_start(&mut self, ctx: &StageContext) {
            self.log.lock().unwrap().push(format!("{}:{}", self.tag, ctx.stage));
        }

        fn name(&self) -> &'static str {
            self.tag
        }
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = HookManager::new();
        assert!(manager.is_empty());
        manager.add(Recorder { tag: "a", log: Arc::clone(&log) });
        manager.add_boxed(Box::new(Recorder { tag: "b", log: Arc::clone(&log) }));
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.names(), vec!["a", "b"]);

        manager.on_stage_start(&StageContext {
            stage: Stage::Test,
            epoch: 0,
            global_step: 0,
            dataset_len: 1,
            num_batches: 1,
            max_epochs: 1,
        });
        assert_eq!(*log.lock().unwrap(), vec!["a:test", "b:test"]);
    }
}
