pub mod ml_model;
pub mod inference;

pub use ml_model::{LetterClassifier, ModelConfig, ARCHITECTURE};
pub use inference::{encode_model, BurnClassifier, InferenceEngine};
