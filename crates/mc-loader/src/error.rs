use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file too short for its {0}-byte header")]
    TruncatedHeader(u64),
    #[error("invalid header JSON: {0}")]
    HeaderJson(#[from] serde_json::Error),
    #[error("unsupported dtype '{dtype}' for tensor '{name}'")]
    UnsupportedDType { name: String, dtype: String },
    #[error("tensor '{0}' does not have a 2-element shape")]
    BadShape(String),
    #[error("data offsets of tensor '{0}' do not match its shape or the file size")]
    BadOffsets(String),
    #[error("tensor not found: {0}")]
    TensorNotFound(String),
    #[error("tensor '{name}' is {got}, cannot load as {expected}")]
    DTypeMismatch {
        name: String,
        expected: &'static str,
        got: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, LoaderError>;
