//! Detection loss records

use serde::{Deserialize, Serialize};

use crate::config::MonitoredMetric;
use crate::error::{Error, Result};

/// Per-batch detection loss, split by head
///
/// Both components must be finite and non-negative; `total` is their sum.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LossBreakdown {
    pub classification: f32,
    pub regression: f32,
}

impl LossBreakdown {
    pub fn new(classification: f32, regression: f32) -> Self {
        Self { classification, regression }
    }

    pub fn total(&self) -> f32 {
        self.classification + self.regression
    }

    /// Reject negative or non-finite components
    pub fn validate(&self) -> Result<()> {
        for (component, value) in
            [("classification", self.classification), ("regression", self.regression)]
        {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidLoss { component, value });
            }
        }
        Ok(())
    }

    /// Value of a monitored validation metric
    pub fn metric(&self, metric: MonitoredMetric) -> f32 {
        match metric {
            MonitoredMetric::ValLoss => self.total(),
            MonitoredMetric::ValClassificationLoss => self.classification,
            MonitoredMetric::ValRegressionLoss => self.regression,
        }
    }
}

/// Running mean of loss components over the batches of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LossMeter {
    classification: f64,
    regression: f64,
    batches: usize,
}

impl LossMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, loss: &LossBreakdown) {
        self.classification += f64::from(loss.classification);
        self.regression += f64::from(loss.regression);
        self.batches += 1;
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Mean over the batches seen; zero when none were
    pub fn mean(&self) -> LossBreakdown {
        if self.batches == 0 {
            return LossBreakdown::default();
        }
        let n = self.batches as f64;
        LossBreakdown::new((self.classification / n) as f32, (self.regression / n) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_total_and_metric() {
        let loss = LossBreakdown::new(0.3, 0.2);
        assert_abs_diff_eq!(loss.total(), 0.5, epsilon = 1e-6);
        assert_eq!(loss.metric(MonitoredMetric::ValClassificationLoss), 0.3);
        assert_eq!(loss.metric(MonitoredMetric::ValRegressionLoss), 0.2);
        assert_abs_diff_eq!(loss.metric(MonitoredMetric::ValLoss), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_validate_rejects_bad_components() {
        assert!(LossBreakdown::new(0.0, 0.0).validate().is_ok());
        let err = LossBreakdown::new(-0.1, 0.0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidLoss { component: "classification", .. }));
        let err = LossBreakdown::new(0.1, f32::NAN).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidLoss { component: "regression", .. }));
        assert!(LossBreakdown::new(f32::INFINITY, 0.0).validate().is_err());
    }

    #[test]
    fn test_meter_mean() {
        let mut meter = LossMeter::new();
        assert_eq!(meter.mean(), LossBreakdown::default());
        meter.update(&LossBreakdown::new(1.0, 0.0));
        meter.update(&LossBreakdown::new(0.0, 2.0));
        assert_eq!(meter.batches(), 2);
        assert_abs_diff_eq!(meter.mean().classification, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(meter.mean().regression, 1.0, epsilon = 1e-6);
    }
}
