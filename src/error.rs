use thiserror::Error;

use crate::enums::LoadStage;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("Sample buffer has {actual} values, dimensions require {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Index {index:?} outside grid bounds {bounds:?}")]
    IndexOutOfRange {
        index: (usize, usize, usize),
        bounds: (usize, usize, usize),
    },

    #[error("Slice shape {actual:?} does not match target slice shape {expected:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Volume has not been loaded")]
    NotLoaded,

    #[error("Load aborted before stage {0:?}")]
    LoadAborted(LoadStage),
}

impl From<serde_json::Error> for VolumeError {
    fn from(err: serde_json::Error) -> Self {
        VolumeError::DecodeError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VolumeError>;
