use thiserror::Error;

#[derive(Debug, Error)]
pub enum TinyLlamaError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },

    #[error("Index out of bounds: index {index} is out of bounds for dim {dim} with size {size}")]
    OutOfBounds { index: usize, dim: usize, size: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid weight file: {0}")]
    FileFormat(String),

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TinyLlamaError>;
