use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlmanacError {
    #[error("insufficient data: need {required} rows, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("model '{0}' used before fit")]
    NotFitted(String),

    #[error("incompatible shape: fitted on {expected}, given {actual}")]
    IncompatibleShape { expected: String, actual: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model error: {0}")]
    ModelError(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AlmanacError>;
