//! CPU reference engine.
//!
//! Straightforward element-wise loops optimized for correctness rather than
//! peak throughput; every backend is verified against `multiply_naive`.
//! Shape violations are programming errors and panic rather than returning
//! an error value — callers validate shapes before invoking these routines.

mod strassen;

pub use strassen::strassen;

use crate::dtype::Element;
use crate::mat::Mat;
use crate::view::{View, ViewMut};

/// Element-wise sum. The result is freshly allocated with `lhs`'s
/// width/height/stride.
///
/// # Panics
/// Panics if the dimensions mismatch.
pub fn add<T: Element>(lhs: View<'_, T>, rhs: View<'_, T>) -> Mat<T> {
    assert!(
        lhs.dims_match(rhs),
        "add: dimension mismatch {}x{} vs {}x{}",
        lhs.width(),
        lhs.height(),
        rhs.width(),
        rhs.height()
    );

    let mut out = Mat::with_stride(lhs.width(), lhs.height(), lhs.stride());
    for y in 0..lhs.height() {
        for x in 0..lhs.width() {
            out.set(x, y, lhs.get(x, y) + rhs.get(x, y));
        }
    }
    out
}

/// Element-wise difference. Same allocation rules as [`add`].
///
/// # Panics
/// Panics if the dimensions mismatch.
pub fn sub<T: Element>(lhs: View<'_, T>, rhs: View<'_, T>) -> Mat<T> {
    assert!(
        lhs.dims_match(rhs),
        "sub: dimension mismatch {}x{} vs {}x{}",
        lhs.width(),
        lhs.height(),
        rhs.width(),
        rhs.height()
    );

    let mut out = Mat::with_stride(lhs.width(), lhs.height(), lhs.stride());
    for y in 0..lhs.height() {
        for x in 0..lhs.width() {
            out.set(x, y, lhs.get(x, y) - rhs.get(x, y));
        }
    }
    out
}

/// Reference triple-loop multiply: `out[x,y] = sum_i lhs[i,y] * rhs[x,i]`.
///
/// Inputs need not be square; the result has dimensions
/// `(rhs.width, lhs.height)`.
///
/// # Panics
/// Panics unless `lhs.width == rhs.height`.
pub fn multiply_naive<T: Element>(lhs: View<'_, T>, rhs: View<'_, T>) -> Mat<T> {
    assert_eq!(
        lhs.width(),
        rhs.height(),
        "multiply: lhs width must equal rhs height"
    );

    let mut out = Mat::new(rhs.width(), lhs.height());
    for y in 0..lhs.height() {
        for x in 0..rhs.width() {
            let mut acc = T::default();
            for i in 0..lhs.width() {
                acc += lhs.get(i, y) * rhs.get(x, i);
            }
            out.set(x, y, acc);
        }
    }
    out
}

/// Element-wise copy of `src` into `dst`.
///
/// # Panics
/// Panics if the dimensions mismatch.
pub fn copy<T: Element>(dst: &mut ViewMut<'_, T>, src: View<'_, T>) {
    assert!(
        dst.as_view().dims_match(src),
        "copy: dimension mismatch {}x{} vs {}x{}",
        dst.width(),
        dst.height(),
        src.width(),
        src.height()
    );

    for y in 0..src.height() {
        for x in 0..src.width() {
            dst.set(x, y, src.get(x, y));
        }
    }
}
