//! Prediction and inference
//!
//! Load the trained model, run it on a session's games and drive the
//! interactive console.

pub mod console;
pub mod inference;

pub use console::{Console, SessionCommand};
pub use inference::{format_prediction, PredictionReport, Predictor};

/// How predictions are printed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use table or json.", s)),
        }
    }
}
