//! FER-2013 expression classifier using ONNX Runtime via `ort`.
use std::path::Path;
use std::sync::Mutex;

use crate::classification::domain::emotion::Emotion;
use crate::classification::domain::emotion_classifier::{ClassifierError, EmotionClassifier};
use crate::preprocessing::domain::preprocessed_buffer::PreprocessedBuffer;
use crate::shared::constants::CLASSIFIER_INPUT_SIZE;
use crate::shared::execution_provider::{intra_op_threads, preferred_execution_providers};

pub struct OnnxEmotionClassifier {
    session: Mutex<ort::session::Session>,
    channels_first: bool,
}

impl OnnxEmotionClassifier {
    /// Loads a 48x48 grayscale expression model.
    ///
    /// Models exported channels-last (`[1, 48, 48, 1]`) and channels-first
    /// (`[1, 1, 48, 48]`) are both accepted; the single channel means the
    /// sample order is the same either way.
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_intra_threads(intra_op_threads())?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let channels_first = session
            .inputs()
            .first()
            .map(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } => {
                    shape.len() == 4 && shape[1] == 1 && shape[3] == CLASSIFIER_INPUT_SIZE as i64
                }
                _ => false,
            })
            .unwrap_or(false);

        log::info!(
            "Loaded emotion model {} ({})",
            model_path.display(),
            if channels_first { "NCHW" } else { "NHWC" }
        );
        Ok(Self {
            session: Mutex::new(session),
            channels_first,
        })
    }

    fn scores(&self, buffer: &PreprocessedBuffer) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let mut input = buffer.to_array();
        if self.channels_first {
            let size = CLASSIFIER_INPUT_SIZE;
            input = input.into_shape_with_order((1, 1, size, size))?;
        }
        let input_value = ort::value::Tensor::from_array(input)?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Ok(Vec::new());
        }
        let scores = outputs[0].try_extract_array::<f32>()?;
        Ok(scores.iter().copied().collect())
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn classify(&self, buffer: &PreprocessedBuffer) -> Result<Emotion, ClassifierError> {
        let scores = self
            .scores(buffer)
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let index = argmax(&scores).ok_or(ClassifierError::EmptyOutput)?;
        Emotion::from_index(index).ok_or(ClassifierError::UnknownClass(index))
    }
}

/// Index of the largest finite score. Ties resolve to the lowest index.
fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}
