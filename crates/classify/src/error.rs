use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Graph error: {0}")]
    Rag(#[from] rag::RagError),

    #[error("Volume error: {0}")]
    Volume(#[from] volume::VolumeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watershed shape {watershed:?} does not match ground-truth shape {ground_truth:?}")]
    ShapeMismatch {
        watershed: Vec<usize>,
        ground_truth: Vec<usize>,
    },

    #[error("Unknown classifier '{selector}', expected one of: {expected}")]
    UnknownClassifier { selector: String, expected: String },

    #[error("Unknown kernel '{selector}', expected one of: {expected}")]
    UnknownKernel { selector: String, expected: String },

    #[error("{model} has no probability output")]
    ProbabilityUnsupported { model: &'static str },

    #[error("Classifier has not been fitted")]
    NotFitted,

    #[error("Invalid training set: {0}")]
    InvalidTrainingSet(String),

    #[error("Failed to encode model: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Failed to decode model: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

pub type Result<T> = std::result::Result<T, ClassifyError>;
