use thiserror::Error;

use crate::preprocessing::domain::preprocessed_buffer::PreprocessedBuffer;

use super::emotion::Emotion;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("classifier returned no scores")]
    EmptyOutput,
    #[error("classifier returned unknown class index {0}")]
    UnknownClass(usize),
}

/// Maps one preprocessed face to an expression class.
///
/// Treated as pure by the pipeline. Shared by reference, so implementations
/// that wrap a stateful runtime must synchronise internally.
pub trait EmotionClassifier: Send + Sync {
    fn classify(&self, buffer: &PreprocessedBuffer) -> Result<Emotion, ClassifierError>;
}
