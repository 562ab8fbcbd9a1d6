pub const FACE_MODEL_NAME: &str = "yolo11n_widerface.onnx";
pub const EMOTION_MODEL_NAME: &str = "emotion_fer2013_48x48.onnx";

/// Side length of the square classifier input.
pub const CLASSIFIER_INPUT_SIZE: usize = 48;

/// Samples in one preprocessed buffer (48 x 48 x 1).
pub const CLASSIFIER_INPUT_LEN: usize = CLASSIFIER_INPUT_SIZE * CLASSIFIER_INPUT_SIZE;

/// Label shown whenever no emotion could be determined.
pub const UNKNOWN_LABEL: &str = "Unknown";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
