//! `mc-mat` - Dense matrix store/view and compute backends for matrix-compute.
//!
//! This crate provides:
//! - A `Mat` store type owning a padded, row-major buffer for one element type
//! - Non-owning strided `View`/`ViewMut` windows, including the quadrant
//!   sub-views used by Strassen recursion
//! - A CPU reference engine (`add`, `sub`, `multiply_naive`, `copy`) and a
//!   recursive Strassen multiplier
//! - A `ComputeBackend` trait for pluggable multiply targets (CPU, OpenCL,
//!   CUDA) over dtype-erased views

pub mod backend;
pub mod cpu;
pub mod cuda;
pub mod dtype;
pub mod error;
pub mod mat;
#[cfg(feature = "opencl")]
pub mod opencl;
pub mod view;

// Re-export primary types at the crate root for convenience.
pub use backend::{AnyMat, AnyView, ComputeBackend, CpuBackend};
pub use cpu::{add, copy, multiply_naive, strassen, sub};
pub use cuda::{CudaBackend, CudaRunner, KernelVariant};
pub use dtype::{CastFrom, DType, Element};
pub use error::{MatError, Result};
pub use mat::Mat;
#[cfg(feature = "opencl")]
pub use opencl::{ClBackend, ClContext};
pub use view::{Quadrant, View, ViewMut};
