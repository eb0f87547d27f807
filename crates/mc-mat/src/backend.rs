use std::fmt::Debug;

use crate::cpu::multiply_naive;
use crate::dtype::DType;
use crate::error::{MatError, Result};
use crate::mat::Mat;
use crate::view::View;

/// A dtype-erased read-only matrix view.
///
/// The element-type set is closed, so erasure is a tagged union rather than
/// dynamic dispatch: call sites stay generic over dtype by matching the tag.
#[derive(Debug, Clone, Copy)]
pub enum AnyView<'a> {
    I64(View<'a, i64>),
    F32(View<'a, f32>),
}

impl<'a> AnyView<'a> {
    pub fn dtype(&self) -> DType {
        match self {
            AnyView::I64(_) => DType::I64,
            AnyView::F32(_) => DType::F32,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            AnyView::I64(v) => v.width(),
            AnyView::F32(v) => v.width(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            AnyView::I64(v) => v.height(),
            AnyView::F32(v) => v.height(),
        }
    }
}

impl<'a> From<View<'a, i64>> for AnyView<'a> {
    fn from(v: View<'a, i64>) -> Self {
        AnyView::I64(v)
    }
}

impl<'a> From<View<'a, f32>> for AnyView<'a> {
    fn from(v: View<'a, f32>) -> Self {
        AnyView::F32(v)
    }
}

/// A dtype-erased owned result matrix, as returned by backend multiplies.
#[derive(Debug, Clone)]
pub enum AnyMat {
    I64(Mat<i64>),
    F32(Mat<f32>),
}

impl AnyMat {
    pub fn dtype(&self) -> DType {
        match self {
            AnyMat::I64(_) => DType::I64,
            AnyMat::F32(_) => DType::F32,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            AnyMat::I64(m) => m.width(),
            AnyMat::F32(m) => m.width(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            AnyMat::I64(m) => m.height(),
            AnyMat::F32(m) => m.height(),
        }
    }

    pub fn as_i64(&self) -> Option<&Mat<i64>> {
        match self {
            AnyMat::I64(m) => Some(m),
            AnyMat::F32(_) => None,
        }
    }

    pub fn as_f32(&self) -> Option<&Mat<f32>> {
        match self {
            AnyMat::F32(m) => Some(m),
            AnyMat::I64(_) => None,
        }
    }
}

/// Trait for pluggable multiply targets (CPU, OpenCL, CUDA, fakes in tests).
///
/// Every implementation must produce results identical to the CPU reference
/// for integer elements, and within accumulation-order rounding for f32.
/// A failed call returns `Err` and leaves no partial caller-visible output;
/// retries are the harness's business, never the backend's.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu", "opencl", "cuda").
    fn name(&self) -> &str;

    /// Matrix multiply over dtype-erased views, returning a newly owned
    /// result matrix of the same dtype.
    fn multiply(&self, lhs: AnyView<'_>, rhs: AnyView<'_>) -> Result<AnyMat>;
}

/// Reference CPU backend; forwards to [`multiply_naive`].
#[derive(Debug, Clone, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn multiply(&self, lhs: AnyView<'_>, rhs: AnyView<'_>) -> Result<AnyMat> {
        match (lhs, rhs) {
            (AnyView::I64(l), AnyView::I64(r)) => Ok(AnyMat::I64(multiply_naive(l, r))),
            (AnyView::F32(l), AnyView::F32(r)) => Ok(AnyMat::F32(multiply_naive(l, r))),
            (l, r) => Err(MatError::DTypeMismatch {
                lhs: l.dtype(),
                rhs: r.dtype(),
            }),
        }
    }
}

/// Dispatch one erased view pair to the same-dtype operation `op`.
///
/// Shared by the GPU backends, which are generic over the element type but
/// select a kernel by the runtime tag.
pub(crate) fn dispatch_pair<Fi, Ff, O>(
    lhs: AnyView<'_>,
    rhs: AnyView<'_>,
    op_i64: Fi,
    op_f32: Ff,
) -> Result<O>
where
    Fi: FnOnce(View<'_, i64>, View<'_, i64>) -> Result<O>,
    Ff: FnOnce(View<'_, f32>, View<'_, f32>) -> Result<O>,
{
    match (lhs, rhs) {
        (AnyView::I64(l), AnyView::I64(r)) => op_i64(l, r),
        (AnyView::F32(l), AnyView::F32(r)) => op_f32(l, r),
        (l, r) => Err(MatError::DTypeMismatch {
            lhs: l.dtype(),
            rhs: r.dtype(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_backend_i64() {
        let backend = CpuBackend::new();
        let lhs = Mat::from_rows(&[&[1i64, 2], &[3, 4]]);
        let rhs = Mat::from_rows(&[&[5i64, 6], &[7, 8]]);
        let out = backend
            .multiply(lhs.view().into(), rhs.view().into())
            .unwrap();
        let out = out.as_i64().unwrap();
        assert_eq!(out.get(0, 0), 19);
        assert_eq!(out.get(1, 0), 22);
        assert_eq!(out.get(0, 1), 43);
        assert_eq!(out.get(1, 1), 50);
    }

    #[test]
    fn test_cpu_backend_f32() {
        let backend = CpuBackend::new();
        let lhs = Mat::from_rows(&[&[1.0f32, 0.0], &[0.0, 1.0]]);
        let rhs = Mat::from_rows(&[&[3.0f32, 4.0], &[5.0, 6.0]]);
        let out = backend
            .multiply(lhs.view().into(), rhs.view().into())
            .unwrap();
        let out = out.as_f32().unwrap();
        assert_eq!(out.get(1, 1), 6.0);
    }

    #[test]
    fn test_dtype_mismatch_is_an_error() {
        let backend = CpuBackend::new();
        let lhs = Mat::<i64>::new(2, 2);
        let rhs = Mat::<f32>::new(2, 2);
        let err = backend
            .multiply(lhs.view().into(), rhs.view().into())
            .unwrap_err();
        assert!(matches!(err, MatError::DTypeMismatch { .. }));
    }

    #[test]
    fn test_any_view_reports_shape() {
        let m = Mat::<i64>::new(3, 5);
        let v: AnyView<'_> = m.view().into();
        assert_eq!(v.dtype(), DType::I64);
        assert_eq!(v.width(), 3);
        assert_eq!(v.height(), 5);
    }
}
