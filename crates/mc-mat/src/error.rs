use thiserror::Error;

use crate::dtype::DType;

/// Backend and resource failures surfaced by the dispatch layer.
///
/// Caller contract violations (dimension mismatches, bad strides,
/// non-power-of-two Strassen inputs) are programming errors and panic
/// instead of appearing here; see the assertions on the CPU engine.
#[derive(Error, Debug)]
pub enum MatError {
    #[error("dtype mismatch: lhs is {lhs}, rhs is {rhs}")]
    DTypeMismatch { lhs: DType, rhs: DType },
    #[error("{call} failed with status {code}")]
    OpenCl { call: &'static str, code: i32 },
    #[error("cuda kernel runner returned status {0}")]
    CudaKernel(i32),
}

pub type Result<T> = std::result::Result<T, MatError>;
