//! `mc-loader` - Memory-mapped tensor-file loading.
//!
//! Parses the safetensors-style container (little-endian `u64` header length,
//! JSON metadata, raw tensor bytes at declared offsets) and hands reference
//! matrices to the compute crates through `Mat::from_raw`. The compute core
//! itself never touches the file format.

pub mod error;
pub mod file;

pub use error::{LoaderError, Result};
pub use file::{TensorDType, TensorFile, TensorInfo};
