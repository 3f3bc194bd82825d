//! Model artifact: weights plus the metadata needed to feed them
//!
//! An artifact is two files sharing a stem:
//! - `<stem>.mpk`: regressor weights (Burn named MessagePack record)
//! - `<stem>.json`: [`ModelMetadata`] (schema, normalization, metrics)

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::mlp::{PointsRegressor, RegressorConfig};
use crate::data::dataset::{FeatureNormalization, TargetNormalization};
use crate::features::FeatureSchema;
use crate::training::metrics::RegressionMetrics;
use crate::{HoopsError, Result};

/// Everything besides the weights that inference depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub schema: FeatureSchema,
    pub regressor: RegressorConfig,
    pub feature_norm: FeatureNormalization,
    pub target_norm: TargetNormalization,
    /// Held-out evaluation, absent for untrained artifacts
    pub metrics: Option<RegressionMetrics>,
    pub train_samples: usize,
    pub test_samples: usize,
    /// RFC 3339 timestamp
    pub trained_at: String,
}

impl ModelMetadata {
    /// Check that schema, network input and normalization agree
    pub fn validate(&self) -> Result<()> {
        self.schema
            .check_dim(self.regressor.input_dim)
            .and_then(|_| self.schema.check_dim(self.feature_norm.dim()))
            .and_then(|_| self.schema.check_dim(self.feature_norm.std.len()))
            .map_err(|e| {
                HoopsError::ModelLoad(format!(
                    "metadata inconsistent with schema {}: {}",
                    self.schema, e
                ))
            })
    }
}

pub fn weights_path(stem: &str) -> String {
    format!("{}.mpk", stem)
}

pub fn metadata_path(stem: &str) -> String {
    format!("{}.json", stem)
}

/// Whether both artifact files exist
pub fn artifact_exists(stem: &str) -> bool {
    Path::new(&weights_path(stem)).exists() && Path::new(&metadata_path(stem)).exists()
}

/// Read and validate the metadata file alone
pub fn load_metadata(stem: &str) -> Result<ModelMetadata> {
    let path = metadata_path(stem);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| HoopsError::ModelLoad(format!("{}: {}", path, e)))?;
    let metadata: ModelMetadata = serde_json::from_str(&content)
        .map_err(|e| HoopsError::ModelLoad(format!("{}: {}", path, e)))?;
    metadata.validate()?;
    Ok(metadata)
}

/// A trained regressor with its metadata
#[derive(Debug)]
pub struct ModelArtifact<B: Backend> {
    pub model: PointsRegressor<B>,
    pub metadata: ModelMetadata,
}

impl<B: Backend> ModelArtifact<B>
where
    B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
    B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Write both files, creating the parent directory
    pub fn save(&self, stem: &str) -> Result<()> {
        self.metadata.validate()?;
        if let Some(parent) = Path::new(stem).parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.model.save(stem)?;
        let json = serde_json::to_string_pretty(&self.metadata)?;
        std::fs::write(metadata_path(stem), json)?;
        Ok(())
    }

    /// Load and validate an artifact
    pub fn load(stem: &str, device: &B::Device) -> Result<Self> {
        let weights = weights_path(stem);
        if !Path::new(&weights).exists() {
            return Err(HoopsError::ModelLoad(format!(
                "{} not found - run `hoops train` first",
                weights
            )));
        }

        let metadata = load_metadata(stem)?;
        let model = PointsRegressor::load(device, stem, &metadata.regressor)?;
        log::info!(
            "Loaded model {} (schema {}, {} features)",
            stem,
            metadata.schema,
            metadata.schema.dim()
        );

        Ok(ModelArtifact { model, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn metadata(schema: FeatureSchema) -> ModelMetadata {
        ModelMetadata {
            schema,
            regressor: RegressorConfig::for_schema(schema, vec![4], 0.0),
            feature_norm: FeatureNormalization {
                mean: vec![0.0; schema.dim()],
                std: vec![1.0; schema.dim()],
            },
            target_norm: TargetNormalization::default(),
            metrics: None,
            train_samples: 0,
            test_samples: 0,
            trained_at: "2024-10-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_validate_detects_mismatch() {
        assert!(metadata(FeatureSchema::Core).validate().is_ok());

        let mut bad = metadata(FeatureSchema::Core);
        bad.regressor.input_dim = 7;
        assert!(matches!(bad.validate(), Err(HoopsError::ModelLoad(_))));

        let mut bad = metadata(FeatureSchema::HomeAway);
        bad.feature_norm.mean.pop();
        assert!(matches!(bad.validate(), Err(HoopsError::ModelLoad(_))));
    }

    #[test]
    fn test_save_and_load_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("model").join("points");
        let stem = stem.to_str().unwrap();

        let device = Default::default();
        let meta = metadata(FeatureSchema::HomeAway);
        let artifact = ModelArtifact {
            model: PointsRegressor::<TestBackend>::new(&device, &meta.regressor),
            metadata: meta.clone(),
        };
        artifact.save(stem).unwrap();
        assert!(artifact_exists(stem));

        let loaded = ModelArtifact::<TestBackend>::load(stem, &device).unwrap();
        assert_eq!(loaded.metadata, meta);
    }

    #[test]
    fn test_weights_from_other_schema_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("points");
        let stem = stem.to_str().unwrap();
        let device = Default::default();

        // Weights trained for home-v2, metadata left over from a core-v1 run
        let home = metadata(FeatureSchema::HomeAway);
        PointsRegressor::<TestBackend>::new(&device, &home.regressor)
            .save(stem)
            .unwrap();
        let core = metadata(FeatureSchema::Core);
        std::fs::write(metadata_path(stem), serde_json::to_string(&core).unwrap()).unwrap();

        let err = ModelArtifact::<TestBackend>::load(stem, &device).unwrap_err();
        assert!(matches!(err, HoopsError::ModelLoad(_)));
    }

    #[test]
    fn test_missing_or_corrupt_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("points");
        let stem = stem.to_str().unwrap();
        let device = Default::default();

        let err = ModelArtifact::<TestBackend>::load(stem, &device).unwrap_err();
        assert!(matches!(err, HoopsError::ModelLoad(_)));

        std::fs::write(weights_path(stem), b"not a model").unwrap();
        std::fs::write(metadata_path(stem), b"{ broken").unwrap();
        let err = ModelArtifact::<TestBackend>::load(stem, &device).unwrap_err();
        assert!(matches!(err, HoopsError::ModelLoad(_)));
    }
}
