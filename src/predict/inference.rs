//! Model inference for predictions

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::Serialize;

use crate::data::session::{GameSession, SessionSummary};
use crate::features::{FeatureSchema, FeatureVector, HistoryStatus};
use crate::model::ModelArtifact;
use crate::{HoopsError, Result};

/// A next-game prediction with the inputs that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionReport {
    pub predicted_points: f32,
    pub features: FeatureVector,
    pub history: HistoryStatus,
    pub summary: SessionSummary,
    /// Prediction minus the mean points of the games entered
    pub delta_vs_avg: f32,
}

/// Predictor for next-game points, loaded once and read-only afterwards
pub struct Predictor<B: Backend> {
    artifact: ModelArtifact<B>,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    pub fn new(artifact: ModelArtifact<B>, device: B::Device) -> Self {
        Predictor { artifact, device }
    }

    /// Load predictor from a saved artifact
    pub fn load(model_path: &str, device: B::Device) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let artifact = ModelArtifact::load(model_path, &device)?;
        Ok(Self::new(artifact, device))
    }

    pub fn schema(&self) -> FeatureSchema {
        self.artifact.metadata.schema
    }

    /// Predict points for one feature vector
    pub fn predict(&self, features: &FeatureVector) -> Result<f32> {
        let metadata = &self.artifact.metadata;
        let expected = metadata.regressor.input_dim;
        if features.len() != expected {
            return Err(HoopsError::ShapeMismatch {
                expected,
                actual: features.len(),
            });
        }
        if features.schema() != metadata.schema {
            return Err(HoopsError::Schema(format!(
                "vector built for {} but model expects {}",
                features.schema(),
                metadata.schema
            )));
        }

        let normalized = metadata.feature_norm.normalize(features.as_slice());
        let input = Tensor::<B, 1>::from_floats(normalized.as_slice(), &self.device)
            .reshape([1, expected]);
        let output = self.artifact.model.forward(input);

        let value = output
            .into_data()
            .iter::<f32>()
            .next()
            .ok_or_else(|| HoopsError::ShapeMismatch {
                expected: 1,
                actual: 0,
            })?;

        Ok(metadata.target_norm.denormalize(value))
    }

    /// Compute features for a full session and predict the next game
    pub fn predict_session(&self, session: &GameSession) -> Result<PredictionReport> {
        let features = session.features(self.schema())?;
        let predicted_points = self.predict(&features)?;
        let summary = session.summary();
        log::debug!(
            "Predicted {:.1} points from {:?}",
            predicted_points,
            features.as_slice()
        );

        Ok(PredictionReport {
            predicted_points,
            history: features.history(),
            delta_vs_avg: predicted_points - summary.avg_points,
            features,
            summary,
        })
    }
}

/// Format a prediction for display
pub fn format_prediction(report: &PredictionReport, label: Option<&str>) -> String {
    let title = label.unwrap_or("Next game");
    let s = &report.summary;

    let mut features = String::new();
    for (name, value) in report.features.named() {
        features.push_str(&format!("│    {:<16} {:>8.2}\n", name, value));
    }

    format!(
        r#"
┌─────────────────────────────────────────────────┐
│  {}
├─────────────────────────────────────────────────┤
│  Predicted points: {:.1} ({:+.1} vs average)
│  Last {} games:     {:.1} pts, {:.1} min, {:.1}/{:.1} FG
│  Home games:       {}
│  Schema:           {} ({})
│  Features:
{}└─────────────────────────────────────────────────┘
"#,
        title,
        report.predicted_points,
        report.delta_vs_avg,
        s.games,
        s.avg_points,
        s.avg_minutes,
        s.avg_fgm,
        s.avg_fga,
        s.home_games,
        report.features.schema(),
        report.history,
        features
    )
}

/// Randomly initialized predictor with identity feature scaling
#[cfg(test)]
pub(crate) fn untrained_predictor(schema: FeatureSchema) -> Predictor<burn::backend::NdArray<f32>> {
    use crate::data::dataset::{FeatureNormalization, TargetNormalization};
    use crate::model::{ModelMetadata, PointsRegressor, RegressorConfig};

    let device = Default::default();
    let regressor = RegressorConfig::for_schema(schema, vec![4], 0.0);
    let metadata = ModelMetadata {
        schema,
        regressor: regressor.clone(),
        feature_norm: FeatureNormalization {
            mean: vec![0.0; schema.dim()],
            std: vec![1.0; schema.dim()],
        },
        target_norm: TargetNormalization {
            mean: 20.0,
            std: 5.0,
        },
        metrics: None,
        train_samples: 0,
        test_samples: 0,
        trained_at: "2024-10-01T00:00:00Z".to_string(),
    };
    let artifact = ModelArtifact {
        model: PointsRegressor::new(&device, &regressor),
        metadata,
    };
    Predictor::new(artifact, device)
}
