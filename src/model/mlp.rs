//! MLP regressor for next-game points
//!
//! Architecture: Input(dim) → [Linear → ReLU → Dropout] × hidden → Linear(1)
//!
//! Inputs and the output are in normalized space; see
//! [`crate::model::artifact::ModelMetadata`] for the scaling parameters.

use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::features::FeatureSchema;
use crate::{HoopsError, Result};

/// Configuration for the regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressorConfig {
    /// Input dimension (schema feature count)
    pub input_dim: usize,
    /// Hidden layer widths, e.g. [32, 16]
    pub hidden_dims: Vec<usize>,
    /// Dropout rate
    pub dropout: f64,
}

impl RegressorConfig {
    pub fn for_schema(schema: FeatureSchema, hidden_dims: Vec<usize>, dropout: f64) -> Self {
        RegressorConfig {
            input_dim: schema.dim(),
            hidden_dims,
            dropout,
        }
    }
}

impl Default for RegressorConfig {
    fn default() -> Self {
        RegressorConfig::for_schema(FeatureSchema::default(), vec![32, 16], 0.1)
    }
}

/// A single hidden layer block: Linear → ReLU → Dropout
#[derive(Module, Debug)]
pub struct HiddenBlock<B: Backend> {
    linear: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> HiddenBlock<B> {
    pub fn new(device: &B::Device, in_dim: usize, out_dim: usize, dropout: f64) -> Self {
        HiddenBlock {
            linear: LinearConfig::new(in_dim, out_dim).init(device),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(x);
        let x = relu(x);
        self.dropout.forward(x)
    }
}

/// Feed-forward regressor producing one value per row
#[derive(Module, Debug)]
pub struct PointsRegressor<B: Backend> {
    hidden: Vec<HiddenBlock<B>>,
    output: Linear<B>,
}

impl<B: Backend> PointsRegressor<B> {
    pub fn new(device: &B::Device, config: &RegressorConfig) -> Self {
        let mut hidden = Vec::with_capacity(config.hidden_dims.len());
        let mut in_dim = config.input_dim;
        for &width in &config.hidden_dims {
            hidden.push(HiddenBlock::new(device, in_dim, width, config.dropout));
            in_dim = width;
        }

        PointsRegressor {
            hidden,
            output: LinearConfig::new(in_dim, 1).init(device),
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `features` - Normalized features [batch, input_dim]
    ///
    /// # Returns
    /// Normalized predictions [batch, 1]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self
            .hidden
            .iter()
            .fold(features, |x, block| block.forward(x));
        self.output.forward(x)
    }

    /// Save model weights (`.mpk` is appended to the path)
    pub fn save(&self, path: &str) -> Result<()>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.clone().into_record(), path.into())
            .map_err(|e| HoopsError::Io(std::io::Error::other(e.to_string())))
    }

    /// Load model weights saved with [`PointsRegressor::save`]
    pub fn load(device: &B::Device, path: &str, config: &RegressorConfig) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(path.into(), device)
            .map_err(|e| HoopsError::ModelLoad(format!("{}: {}", path, e)))?;

        let model = Self::new(device, config).load_record(record);
        model
            .check_shapes(config)
            .map_err(|e| HoopsError::ModelLoad(format!("{}: {}", path, e)))?;
        Ok(model)
    }

    /// Compare every layer's weight shape with `config`
    ///
    /// Loading a record does not check shapes, so weights saved for another
    /// input width would otherwise only fail inside the first forward pass.
    pub fn check_shapes(&self, config: &RegressorConfig) -> std::result::Result<(), String> {
        if self.hidden.len() != config.hidden_dims.len() {
            return Err(format!(
                "{} hidden layers, config expects {}",
                self.hidden.len(),
                config.hidden_dims.len()
            ));
        }

        let mut in_dim = config.input_dim;
        for (i, (block, &width)) in self.hidden.iter().zip(&config.hidden_dims).enumerate() {
            check_linear(&block.linear, in_dim, width, &format!("hidden layer {}", i))?;
            in_dim = width;
        }
        check_linear(&self.output, in_dim, 1, "output layer")
    }
}

fn check_linear<B: Backend>(
    linear: &Linear<B>,
    in_dim: usize,
    out_dim: usize,
    name: &str,
) -> std::result::Result<(), String> {
    let dims = linear.weight.dims();
    if dims != [in_dim, out_dim] {
        return Err(format!(
            "{} weights are {:?}, expected [{}, {}]",
            name, dims, in_dim, out_dim
        ));
    }
    Ok(())
}
