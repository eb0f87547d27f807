//! CUDA backend: marshaling to an opaque, ABI-stable kernel runner.
//!
//! The kernel internals live outside this crate; this module only copies
//! host pointers and dimensions across the C ABI and selects a kernel
//! variant. The runner is carried as a function table so tests can inject a
//! fake without a GPU or the external library; the `cuda` cargo feature
//! links the real runner symbols and provides [`CudaRunner::linked`].

use crate::backend::{dispatch_pair, AnyMat, AnyView, ComputeBackend};
use crate::dtype::Element;
use crate::error::{MatError, Result};
use crate::mat::Mat;
use crate::view::View;

/// Which kernel implementation the external runner should launch.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelVariant {
    /// Plain one-thread-per-element kernel.
    Plain = 0,
    /// Shared-memory tiled kernel.
    Tiled = 1,
    /// Tiled kernel over unified memory.
    TiledUnified = 2,
    /// Instrumented variant used by the runner's own tests.
    Test = 3,
}

/// ABI signature of the i64 kernel runner. Returns 0 on success.
pub type RunKernelI64 = unsafe extern "C" fn(
    lhs: *const i64,
    lhs_cols: u32,
    lhs_rows: u32,
    lhs_stride: u32,
    rhs: *const i64,
    rhs_cols: u32,
    rhs_rows: u32,
    rhs_stride: u32,
    out: *mut i64,
    out_cols: u32,
    out_rows: u32,
    out_stride: u32,
    variant: u32,
) -> i32;

/// ABI signature of the f32 kernel runner. Returns 0 on success.
pub type RunKernelF32 = unsafe extern "C" fn(
    lhs: *const f32,
    lhs_cols: u32,
    lhs_rows: u32,
    lhs_stride: u32,
    rhs: *const f32,
    rhs_cols: u32,
    rhs_rows: u32,
    rhs_stride: u32,
    out: *mut f32,
    out_cols: u32,
    out_rows: u32,
    out_stride: u32,
    variant: u32,
) -> i32;

/// The per-dtype entry points of one kernel runner implementation.
#[derive(Debug, Clone, Copy)]
pub struct CudaRunner {
    pub run_i64: RunKernelI64,
    pub run_f32: RunKernelF32,
}

#[cfg(feature = "cuda")]
#[link(name = "mckernels")]
extern "C" {
    fn matmul_run_kernel_i64(
        lhs: *const i64,
        lhs_cols: u32,
        lhs_rows: u32,
        lhs_stride: u32,
        rhs: *const i64,
        rhs_cols: u32,
        rhs_rows: u32,
        rhs_stride: u32,
        out: *mut i64,
        out_cols: u32,
        out_rows: u32,
        out_stride: u32,
        variant: u32,
    ) -> i32;

    fn matmul_run_kernel_f32(
        lhs: *const f32,
        lhs_cols: u32,
        lhs_rows: u32,
        lhs_stride: u32,
        rhs: *const f32,
        rhs_cols: u32,
        rhs_rows: u32,
        rhs_stride: u32,
        out: *mut f32,
        out_cols: u32,
        out_rows: u32,
        out_stride: u32,
        variant: u32,
    ) -> i32;
}

#[cfg(feature = "cuda")]
impl CudaRunner {
    /// The runner linked from the external kernel library.
    pub fn linked() -> Self {
        CudaRunner {
            run_i64: matmul_run_kernel_i64,
            run_f32: matmul_run_kernel_f32,
        }
    }
}

/// CUDA compute backend.
#[derive(Debug, Clone)]
pub struct CudaBackend {
    runner: CudaRunner,
    variant: KernelVariant,
}

impl CudaBackend {
    pub fn new(runner: CudaRunner, variant: KernelVariant) -> Self {
        CudaBackend { runner, variant }
    }

    fn multiply_i64(&self, lhs: View<'_, i64>, rhs: View<'_, i64>) -> Result<Mat<i64>> {
        assert_square_pair(lhs, rhs);

        let mut out = Mat::<i64>::new(lhs.width(), lhs.height());
        let mut ov = out.view_mut();
        let code = unsafe {
            (self.runner.run_i64)(
                lhs.as_ptr(),
                lhs.width() as u32,
                lhs.height() as u32,
                lhs.stride() as u32,
                rhs.as_ptr(),
                rhs.width() as u32,
                rhs.height() as u32,
                rhs.stride() as u32,
                ov.as_mut_ptr(),
                ov.width() as u32,
                ov.height() as u32,
                ov.stride() as u32,
                self.variant as u32,
            )
        };
        if code != 0 {
            return Err(MatError::CudaKernel(code));
        }
        Ok(out)
    }

    fn multiply_f32(&self, lhs: View<'_, f32>, rhs: View<'_, f32>) -> Result<Mat<f32>> {
        assert_square_pair(lhs, rhs);

        let mut out = Mat::<f32>::new(lhs.width(), lhs.height());
        let mut ov = out.view_mut();
        let code = unsafe {
            (self.runner.run_f32)(
                lhs.as_ptr(),
                lhs.width() as u32,
                lhs.height() as u32,
                lhs.stride() as u32,
                rhs.as_ptr(),
                rhs.width() as u32,
                rhs.height() as u32,
                rhs.stride() as u32,
                ov.as_mut_ptr(),
                ov.width() as u32,
                ov.height() as u32,
                ov.stride() as u32,
                self.variant as u32,
            )
        };
        if code != 0 {
            return Err(MatError::CudaKernel(code));
        }
        Ok(out)
    }
}

/// The external kernels only handle square inputs of equal width.
fn assert_square_pair<T: Element>(lhs: View<'_, T>, rhs: View<'_, T>) {
    assert_eq!(lhs.width(), lhs.height(), "cuda: lhs must be square");
    assert_eq!(rhs.width(), rhs.height(), "cuda: rhs must be square");
    assert_eq!(
        lhs.width(),
        rhs.width(),
        "cuda: inputs must have equal width"
    );
}

impl ComputeBackend for CudaBackend {
    fn name(&self) -> &str {
        "cuda"
    }

    fn multiply(&self, lhs: AnyView<'_>, rhs: AnyView<'_>) -> Result<AnyMat> {
        dispatch_pair(
            lhs,
            rhs,
            |l, r| self.multiply_i64(l, r).map(AnyMat::I64),
            |l, r| self.multiply_f32(l, r).map(AnyMat::F32),
        )
    }
}
