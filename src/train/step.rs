//! One step of each stage

use tracing::debug;

use super::loss::LossBreakdown;
use super::model::DetectionModel;
use crate::data::{Batch, ImageId};
use crate::error::{Error, Result};
use crate::eval::DetectionResult;
use crate::optim::{clip_grad_norm, Optimizer};

/// Runs single train, validation and test steps
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepExecutor {
    grad_clip: Option<f32>,
}

impl StepExecutor {
    pub fn new(grad_clip: Option<f32>) -> Self {
        Self { grad_clip }
    }

    /// Forward, backward, optional clipping and one optimizer step
    pub fn train_step<M: DetectionModel + ?Sized>(
        &self,
        model: &mut M,
        optimizer: &mut dyn Optimizer,
        batch: &Batch,
    ) -> Result<LossBreakdown> {
        batch.validate()?;
        optimizer.zero_grad(model.parameters_mut());

        let loss = model.forward(batch)?;
        loss.validate()?;
        model.backward(&loss)?;

        if let Some(max_norm) = self.grad_clip {
            let norm = clip_grad_norm(model.parameters_mut(), max_norm);
            debug!(grad_norm = norm, max_norm, "clipped gradients");
        }

        optimizer.step(model.parameters_mut())?;
        Ok(loss)
    }

    /// Evaluation-mode loss; parameters are never touched
    pub fn validation_step<M: DetectionModel + ?Sized>(
        &self,
        model: &M,
        batch: &Batch,
    ) -> Result<LossBreakdown> {
        batch.validate()?;
        let loss = model.evaluate(batch)?;
        loss.validate()?;
        Ok(loss)
    }

    /// Predictions for every image of the batch, keyed by image id
    pub fn test_step<M: DetectionModel + ?Sized>(
        &self,
        model: &M,
        batch: &Batch,
    ) -> Result<Vec<(ImageId, DetectionResult)>> {
        batch.validate()?;
        let results = model.predict(&batch.images)?;
        if results.len() != batch.image_ids.len() {
            return Err(Error::batch_shape(format!(
                "model returned {} results for {} images",
                results.len(),
                batch.image_ids.len()
            )));
        }
        for result in &results {
            result.validate()?;
        }
        Ok(batch.image_ids.iter().copied().zip(results).collect())
    }
}
