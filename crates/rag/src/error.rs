use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Volume error: {0}")]
    Volume(#[from] volume::VolumeError),

    #[error("Watershed shape {watershed:?} does not match probability shape {probability:?}")]
    VolumeShapeMismatch {
        watershed: Vec<usize>,
        probability: Vec<usize>,
    },

    #[error("No region with id {0}")]
    MissingRegion(u32),

    #[error("No boundary between regions {0} and {1}")]
    MissingBoundary(u32, u32),

    #[error("Cannot merge region {0} with itself")]
    SelfMerge(u32),
}

pub type Result<T> = std::result::Result<T, RagError>;
