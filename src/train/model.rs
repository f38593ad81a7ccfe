//! The detector behind the lifecycle

use ndarray::Array4;

use super::loss::LossBreakdown;
use crate::data::Batch;
use crate::error::Result;
use crate::eval::DetectionResult;
use crate::optim::Parameter;

/// An object detector the lifecycle can train, validate and test
///
/// The network and its loss functions live behind this trait. Training-mode
/// calls take `&mut self`; evaluation-mode calls take `&self` and therefore
/// cannot touch parameters or gradients.
pub trait DetectionModel {
    /// Training-mode forward pass returning the loss for `batch`
    fn forward(&mut self, batch: &Batch) -> Result<LossBreakdown>;

    /// Populate parameter gradients for the loss of the last forward pass
    fn backward(&mut self, loss: &LossBreakdown) -> Result<()>;

    /// Evaluation-mode loss for `batch`
    fn evaluate(&self, batch: &Batch) -> Result<LossBreakdown>;

    /// One detection result per image of `images` (`[N, C, H, W]`)
    fn predict(&self, images: &Array4<f32>) -> Result<Vec<DetectionResult>>;

    fn parameters(&self) -> &[Parameter];

    fn parameters_mut(&mut self) -> &mut [Parameter];
}
