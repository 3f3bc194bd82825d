//! Training metrics and evaluation

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::dataset::TargetNormalization;

/// Metrics accumulated during one training/validation epoch
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    /// Sum of batch losses (MSE in normalized space)
    pub total_loss: f64,
    /// Sum of absolute errors (in normalized space)
    pub abs_error_sum: f64,
    /// Total predictions
    pub total_predictions: usize,
    /// Number of batches accumulated
    pub batch_count: usize,
    /// Target normalization for converting errors back to points
    pub target_norm: TargetNormalization,
}

impl Metrics {
    /// Create with specific normalization params
    pub fn with_normalization(target_norm: TargetNormalization) -> Self {
        Metrics {
            target_norm,
            ..Self::default()
        }
    }

    /// Update metrics with a batch result
    pub fn update(&mut self, loss: f32, abs_error_sum: f32, batch_size: usize) {
        self.total_loss += loss as f64;
        self.abs_error_sum += abs_error_sum as f64;
        self.total_predictions += batch_size;
        self.batch_count += 1;
    }

    /// Get average loss
    pub fn avg_loss(&self) -> f64 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.total_loss / self.batch_count as f64
        }
    }

    /// Mean absolute error in points
    pub fn mae(&self) -> f64 {
        if self.total_predictions == 0 {
            0.0
        } else {
            (self.abs_error_sum / self.total_predictions as f64) * self.target_norm.std as f64
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loss: {:.4} | MAE: {:.2} pts", self.avg_loss(), self.mae())
    }
}

/// Held-out regression quality, in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    pub count: usize,
}

impl RegressionMetrics {
    /// Compare predictions to targets (both in points)
    pub fn from_predictions(predictions: &[f32], targets: &[f32]) -> Self {
        let n = predictions.len().min(targets.len());
        if n == 0 {
            return RegressionMetrics {
                mae: 0.0,
                rmse: 0.0,
                r2: 0.0,
                count: 0,
            };
        }

        let pairs = || {
            predictions
                .iter()
                .zip(targets.iter())
                .map(|(&p, &t)| (p as f64, t as f64))
        };

        let abs_sum: f64 = pairs().map(|(p, t)| (p - t).abs()).sum();
        let ss_res: f64 = pairs().map(|(p, t)| (p - t).powi(2)).sum();
        let target_mean = pairs().map(|(_, t)| t).sum::<f64>() / n as f64;
        let ss_tot: f64 = pairs().map(|(_, t)| (t - target_mean).powi(2)).sum();

        // Constant targets: perfect fit scores 1, anything else 0
        let r2 = if ss_tot == 0.0 {
            if ss_res == 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        };

        RegressionMetrics {
            mae: abs_sum / n as f64,
            rmse: (ss_res / n as f64).sqrt(),
            r2,
            count: n,
        }
    }
}

impl fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE: {:.2} | RMSE: {:.2} | R²: {:.2} (n={})",
            self.mae, self.rmse, self.r2, self.count
        )
    }
}

/// Training history for tracking progress
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub train_maes: Vec<f64>,
    pub val_maes: Vec<f64>,
    pub best_val_loss: f64,
    pub best_epoch: usize,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self {
            best_val_loss: f64::INFINITY,
            ..Default::default()
        }
    }

    /// Record metrics for an epoch; returns true when this epoch is the new best
    pub fn record_epoch(&mut self, epoch: usize, train: &Metrics, val: &Metrics) -> bool {
        self.train_losses.push(train.avg_loss());
        self.val_losses.push(val.avg_loss());
        self.train_maes.push(train.mae());
        self.val_maes.push(val.mae());

        if val.avg_loss() < self.best_val_loss {
            self.best_val_loss = val.avg_loss();
            self.best_epoch = epoch;
            true
        } else {
            false
        }
    }

    /// Check if we should early stop
    pub fn should_early_stop(&self, patience: usize) -> bool {
        if patience == 0 || self.val_losses.len() < patience {
            return false;
        }
        let current_epoch = self.val_losses.len() - 1;
        current_epoch - self.best_epoch >= patience
    }

    pub fn epochs_run(&self) -> usize {
        self.val_losses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regression_metrics_hand_computed() {
        let preds = [10.0, 20.0, 30.0, 40.0];
        let targets = [12.0, 18.0, 30.0, 44.0];
        let m = RegressionMetrics::from_predictions(&preds, &targets);

        // errors: -2, 2, 0, -4
        assert!((m.mae - 2.0).abs() < 1e-9);
        assert!((m.rmse - 6.0f64.sqrt()).abs() < 1e-9);
        // target mean 26, ss_tot = 196 + 64 + 16 + 324 = 600, ss_res = 24
        assert!((m.r2 - (1.0 - 24.0 / 600.0)).abs() < 1e-9);
        assert_eq!(m.count, 4);
    }

    #[test]
    fn test_regression_metrics_constant_targets() {
        let perfect = RegressionMetrics::from_predictions(&[5.0, 5.0], &[5.0, 5.0]);
        assert_eq!(perfect.r2, 1.0);
        let off = RegressionMetrics::from_predictions(&[4.0, 6.0], &[5.0, 5.0]);
        assert_eq!(off.r2, 0.0);
        assert_eq!(RegressionMetrics::from_predictions(&[], &[]).count, 0);
    }

    #[test]
    fn test_epoch_metrics_scale_to_points() {
        let mut m = Metrics::with_normalization(TargetNormalization {
            mean: 20.0,
            std: 5.0,
        });
        m.update(0.5, 2.0, 4);
        m.update(0.3, 1.0, 2);
        assert!((m.avg_loss() - 0.4).abs() < 1e-6);
        // 3.0 / 6 * 5.0
        assert!((m.mae() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_early_stopping() {
        let mut history = TrainingHistory::new();
        let mut improving = Metrics::default();
        improving.update(1.0, 0.0, 1);
        assert!(history.record_epoch(0, &improving, &improving));

        let mut worse = Metrics::default();
        worse.update(2.0, 0.0, 1);
        for epoch in 1..=3 {
            assert!(!history.record_epoch(epoch, &worse, &worse));
        }
        assert_eq!(history.best_epoch, 0);
        assert!(history.should_early_stop(3));
        assert!(!history.should_early_stop(4));
        assert!(!history.should_early_stop(0));
    }
}
