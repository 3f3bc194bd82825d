//! Training loop for the points regressor

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataloader::DataLoaderBuilder;
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};

use crate::data::dataset::{
    FeatureNormalization, PointsBatch, PointsBatcher, PointsDataset, PointsSample,
    TargetNormalization,
};
use crate::model::{ModelArtifact, ModelMetadata, PointsRegressor, RegressorConfig};
use crate::training::metrics::{Metrics, RegressionMetrics, TrainingHistory};
use crate::training::split::{SplitDatasets, SplitRatios};
use crate::{HoopsError, Result, TrainingConfig};

/// Mean squared error over a batch
pub fn mse_loss<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    (predictions - targets).powf_scalar(2.0).mean()
}

/// Result of a full training run
pub struct TrainingOutcome<B: Backend> {
    pub artifact: ModelArtifact<B>,
    pub history: TrainingHistory,
}

/// Trainer for [`PointsRegressor`]
pub struct RegressionTrainer<B: AutodiffBackend> {
    model: PointsRegressor<B>,
    regressor: RegressorConfig,
    optimizer: burn::optim::adaptor::OptimizerAdaptor<burn::optim::Adam, PointsRegressor<B>, B>,
    config: TrainingConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> RegressionTrainer<B> {
    /// Create a trainer with a freshly initialized model
    pub fn new(regressor: RegressorConfig, config: TrainingConfig, device: B::Device) -> Self {
        B::seed(config.seed);
        let model = PointsRegressor::new(&device, &regressor);
        let optimizer = AdamConfig::new()
            .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay as f32)))
            .init();

        RegressionTrainer {
            model,
            regressor,
            optimizer,
            config,
            device,
        }
    }

    /// Split, normalize, fit with early stopping and evaluate on the test set
    pub fn train(mut self, dataset: PointsDataset) -> Result<TrainingOutcome<B::InnerBackend>> {
        let schema = dataset.schema();
        schema.check_dim(self.regressor.input_dim).map_err(|e| {
            HoopsError::Config(format!("regressor does not fit schema {}: {}", schema, e))
        })?;

        let ratios = SplitRatios {
            validation: self.config.validation_fraction,
            test: self.config.test_fraction,
        };
        let split = SplitDatasets::from_dataset(dataset, ratios, self.config.seed)?;

        // Statistics come from the training rows only
        let feature_norm = FeatureNormalization::from_samples(split.train.samples(), schema.dim());
        let target_norm = TargetNormalization::from_samples(split.train.samples());
        log::info!(
            "Feature normalization: mean={:?}, std={:?}",
            feature_norm.mean,
            feature_norm.std
        );
        log::info!(
            "Target normalization: mean={:.2}, std={:.2}",
            target_norm.mean,
            target_norm.std
        );

        let train_samples = split.train.len();
        let test_samples = split.test.len();
        let train_norm = split.train.normalized(&feature_norm, target_norm);
        let val_norm = split.val.normalized(&feature_norm, target_norm);

        let batch_size = self.config.batch_size.clamp(1, train_norm.len());
        let train_loader = DataLoaderBuilder::new(PointsBatcher::<B>::new(self.device.clone()))
            .batch_size(batch_size)
            .shuffle(self.config.seed)
            .build(train_norm);

        let mut history = TrainingHistory::new();
        let mut best_model = self.model.clone();

        log::info!(
            "Starting training for {} epochs ({} train / {} val / {} test)",
            self.config.epochs,
            train_samples,
            split.val.len(),
            test_samples
        );

        for epoch in 0..self.config.epochs {
            let train_metrics = self.train_epoch(train_loader.iter(), target_norm);
            let val_metrics = self.validate(val_norm.samples(), target_norm);

            if history.record_epoch(epoch, &train_metrics, &val_metrics) {
                best_model = self.model.clone();
                log::debug!("  New best model (val_loss: {:.4})", val_metrics.avg_loss());
            }

            if epoch % 10 == 0 || epoch + 1 == self.config.epochs {
                log::info!(
                    "Epoch {}/{}: Train: {} | Val: {}",
                    epoch + 1,
                    self.config.epochs,
                    train_metrics,
                    val_metrics
                );
            }

            if history.should_early_stop(self.config.early_stopping_patience) {
                log::info!(
                    "Early stopping at epoch {} (best was epoch {})",
                    epoch + 1,
                    history.best_epoch + 1
                );
                break;
            }
        }

        let model = best_model.valid();
        let predictions = predict_points(
            &model,
            split.test.samples(),
            &feature_norm,
            target_norm,
            &self.device,
        );
        let targets: Vec<f32> = split.test.samples().iter().map(|s| s.target).collect();
        let metrics = RegressionMetrics::from_predictions(&predictions, &targets);
        log::info!("Test set: {}", metrics);

        let metadata = ModelMetadata {
            schema,
            regressor: self.regressor,
            feature_norm,
            target_norm,
            metrics: Some(metrics),
            train_samples,
            test_samples,
            trained_at: chrono::Utc::now().to_rfc3339(),
        };

        Ok(TrainingOutcome {
            artifact: ModelArtifact { model, metadata },
            history,
        })
    }

    /// Train one epoch
    fn train_epoch(
        &mut self,
        loader: impl Iterator<Item = PointsBatch<B>>,
        target_norm: TargetNormalization,
    ) -> Metrics {
        let mut metrics = Metrics::with_normalization(target_norm);

        for batch in loader {
            let batch_size = batch.features.dims()[0];
            let predictions = self.model.forward(batch.features);

            let abs_error: f32 = (predictions.clone() - batch.targets.clone())
                .abs()
                .sum()
                .into_scalar()
                .elem();
            let loss = mse_loss(predictions, batch.targets);
            let loss_val: f32 = loss.clone().into_scalar().elem();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self
                .optimizer
                .step(self.config.learning_rate, self.model.clone(), grads);

            metrics.update(loss_val, abs_error, batch_size);
        }

        metrics
    }

    /// Full-batch validation with dropout disabled
    fn validate(&self, samples: &[PointsSample], target_norm: TargetNormalization) -> Metrics {
        let mut metrics = Metrics::with_normalization(target_norm);
        if samples.is_empty() {
            return metrics;
        }

        let model = self.model.valid();
        let batcher = PointsBatcher::<B::InnerBackend>::new(self.device.clone());
        let batch = batcher.batch(samples.to_vec(), &self.device);
        let predictions = model.forward(batch.features);

        let abs_error: f32 = (predictions.clone() - batch.targets.clone())
            .abs()
            .sum()
            .into_scalar()
            .elem();
        let loss: f32 = mse_loss(predictions, batch.targets).into_scalar().elem();
        metrics.update(loss, abs_error, samples.len());

        metrics
    }
}

/// Predict points for raw (unnormalized) samples
pub fn predict_points<B: Backend>(
    model: &PointsRegressor<B>,
    samples: &[PointsSample],
    feature_norm: &FeatureNormalization,
    target_norm: TargetNormalization,
    device: &B::Device,
) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let normalized: Vec<PointsSample> = samples
        .iter()
        .map(|s| PointsSample {
            features: feature_norm.normalize(&s.features),
            target: s.target,
        })
        .collect();
    let batch = PointsBatcher::<B>::new(device.clone()).batch(normalized, device);

    model
        .forward(batch.features)
        .into_data()
        .iter::<f32>()
        .map(|p| target_norm.denormalize(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSchema;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    /// Target is a noiseless linear function of the first feature
    fn linear_dataset(n: usize) -> PointsDataset {
        let samples = (0..n)
            .map(|i| {
                let avg = 10.0 + (i % 20) as f32;
                PointsSample {
                    features: vec![avg, 30.0, 0.0, 32.0, 15.0, 7.0],
                    target: avg,
                }
            })
            .collect();
        PointsDataset::from_samples(samples, FeatureSchema::Core)
    }

    fn quick_config() -> TrainingConfig {
        TrainingConfig {
            epochs: 60,
            batch_size: 16,
            learning_rate: 1e-2,
            weight_decay: 0.0,
            dropout: 0.0,
            hidden_dims: vec![8],
            early_stopping_patience: 0,
            test_fraction: 0.2,
            validation_fraction: 0.1,
            seed: 7,
        }
    }

    #[test]
    fn test_mse_loss() {
        let device = Default::default();
        let preds =
            Tensor::<NdArray<f32>, 1>::from_floats([1.0, 2.0, 3.0], &device).reshape([3, 1]);
        let targets =
            Tensor::<NdArray<f32>, 1>::from_floats([1.0, 0.0, 6.0], &device).reshape([3, 1]);
        let loss: f32 = mse_loss(preds, targets).into_scalar().elem();
        // (0 + 4 + 9) / 3
        assert!((loss - 13.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_training_learns_and_records_metadata() {
        let config = quick_config();
        let regressor =
            RegressorConfig::for_schema(FeatureSchema::Core, config.hidden_dims.clone(), 0.0);
        let trainer =
            RegressionTrainer::<TestBackend>::new(regressor.clone(), config, Default::default());

        let outcome = trainer.train(linear_dataset(200)).unwrap();
        let meta = &outcome.artifact.metadata;

        assert_eq!(meta.schema, FeatureSchema::Core);
        assert_eq!(meta.regressor, regressor);
        assert_eq!(meta.train_samples, 140);
        assert_eq!(meta.test_samples, 40);
        assert!(meta.validate().is_ok());

        let metrics = meta.metrics.unwrap();
        assert_eq!(metrics.count, 40);
        // Predicting the mean would give MAE 5, the fit must do much better
        assert!(metrics.mae < 3.0, "test MAE too high: {}", metrics.mae);
        assert!(outcome.history.epochs_run() > 0);
    }

    #[test]
    fn test_training_rejects_wrong_schema() {
        let config = quick_config();
        let regressor = RegressorConfig::for_schema(FeatureSchema::HomeAway, vec![4], 0.0);
        let trainer = RegressionTrainer::<TestBackend>::new(regressor, config, Default::default());
        assert!(matches!(
            trainer.train(linear_dataset(50)),
            Err(HoopsError::Config(_))
        ));
    }

    #[test]
    fn test_training_needs_enough_rows() {
        let config = quick_config();
        let regressor = RegressorConfig::for_schema(FeatureSchema::Core, vec![4], 0.0);
        let trainer = RegressionTrainer::<TestBackend>::new(regressor, config, Default::default());
        assert!(trainer.train(linear_dataset(2)).is_err());
    }
}
