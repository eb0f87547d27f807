use crate::cpu::{add, copy, multiply_naive, sub};
use crate::dtype::Element;
use crate::mat::Mat;
use crate::view::{Quadrant, View};

/// Below this width a quadrant is multiplied with the naive triple loop:
/// the 7-multiply/18-add bookkeeping does not pay for itself, and splitting
/// further would bottom out at degenerate quadrant sizes.
const RECURSION_FLOOR: usize = 4;

/// Recursive Strassen multiply.
///
/// Restricted to square matrices of equal width whose width is a power of
/// two (widths at or below the recursion floor are handed to
/// [`multiply_naive`] directly and need not be powers of two). The result
/// shares `lhs`'s stride.
///
/// For `f32` the accumulation order of the quadrant combinations is part of
/// the observable contract; see the assembly step below.
///
/// # Panics
/// Panics if the inputs are not square, not of equal width, or wider than
/// the recursion floor without being a power of two.
pub fn strassen<T: Element>(lhs: View<'_, T>, rhs: View<'_, T>) -> Mat<T> {
    assert_eq!(lhs.width(), lhs.height(), "strassen: lhs must be square");
    assert_eq!(rhs.width(), rhs.height(), "strassen: rhs must be square");
    assert_eq!(
        lhs.width(),
        rhs.width(),
        "strassen: inputs must have equal width"
    );
    assert!(
        lhs.width() <= RECURSION_FLOOR || lhs.width().is_power_of_two(),
        "strassen: width {} is not a power of two",
        lhs.width()
    );

    strassen_rec(lhs, rhs)
}

fn strassen_rec<T: Element>(lhs: View<'_, T>, rhs: View<'_, T>) -> Mat<T> {
    let width = lhs.width();
    let mut out = Mat::with_stride(width, width, lhs.stride());

    if width <= RECURSION_FLOOR {
        copy(&mut out.view_mut(), multiply_naive(lhs, rhs).view());
        return out;
    }

    debug_assert!(width % 4 == 0);

    let a11 = lhs.quadrant(Quadrant::TopLeft);
    let a12 = lhs.quadrant(Quadrant::TopRight);
    let a21 = lhs.quadrant(Quadrant::BottomLeft);
    let a22 = lhs.quadrant(Quadrant::BottomRight);

    let b11 = rhs.quadrant(Quadrant::TopLeft);
    let b12 = rhs.quadrant(Quadrant::TopRight);
    let b21 = rhs.quadrant(Quadrant::BottomLeft);
    let b22 = rhs.quadrant(Quadrant::BottomRight);

    let m1 = strassen_rec(add(a11, a22).view(), add(b11, b22).view());
    let m2 = strassen_rec(add(a21, a22).view(), b11);
    let m3 = strassen_rec(a11, sub(b12, b22).view());
    let m4 = strassen_rec(a22, sub(b21, b11).view());
    let m5 = strassen_rec(add(a11, a12).view(), b22);
    let m6 = strassen_rec(sub(a21, a11).view(), add(b11, b12).view());
    let m7 = strassen_rec(sub(a12, a22).view(), add(b21, b22).view());

    // C11 = M1 - M5 + M4 + M7, built left to right. The accumulation order
    // is observable for floating-point elements and must stay fixed.
    let c11 = add(add(sub(m1.view(), m5.view()).view(), m4.view()).view(), m7.view());
    let c12 = add(m3.view(), m5.view());
    let c21 = add(m2.view(), m4.view());
    // C22 = M1 - M2 + M3 + M6, same ordering rule.
    let c22 = add(add(sub(m1.view(), m2.view()).view(), m3.view()).view(), m6.view());

    let mut ov = out.view_mut();
    copy(&mut ov.quadrant_mut(Quadrant::TopLeft), c11.view());
    copy(&mut ov.quadrant_mut(Quadrant::TopRight), c12.view());
    copy(&mut ov.quadrant_mut(Quadrant::BottomLeft), c21.view());
    copy(&mut ov.quadrant_mut(Quadrant::BottomRight), c22.view());

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_mats_equal(a: &Mat<i64>, b: &Mat<i64>) {
        assert_eq!(a.width(), b.width());
        assert_eq!(a.height(), b.height());
        for y in 0..a.height() {
            for x in 0..a.width() {
                assert_eq!(a.get(x, y), b.get(x, y), "mismatch at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_base_case_matches_naive() {
        let lhs = Mat::<i64>::random(4, 4);
        let rhs = Mat::<i64>::random(4, 4);
        assert_mats_equal(
            &strassen(lhs.view(), rhs.view()),
            &multiply_naive(lhs.view(), rhs.view()),
        );
    }

    #[test]
    fn test_8x8_matches_naive() {
        // One non-trivial split before the recursion floor.
        let lhs = Mat::from_rows(&[
            &[1i64, 2, 3, 4, 1, 2, 3, 4],
            &[11, 12, 13, 14, 11, 12, 13, 14],
            &[21, 22, 23, 24, 21, 22, 23, 24],
            &[45, 98, 66, 0, 45, 98, 66, 0],
            &[1, 2, 3, 4, 1, 2, 3, 4],
            &[11, 12, 13, 14, 11, 12, 13, 14],
            &[21, 22, 23, 24, 21, 22, 23, 24],
            &[45, 98, 66, 0, 45, 98, 66, 0],
        ]);
        let rhs = Mat::from_rows(&[
            &[4i64, 2, 3, 5, 4, 2, 3, 5],
            &[87, 4, 16, 4, 87, 4, 16, 4],
            &[12, 2, 4, 4, 12, 2, 4, 4],
            &[4, 3, 1, 9, 4, 3, 1, 9],
            &[4, 2, 3, 5, 4, 2, 3, 5],
            &[87, 4, 16, 4, 87, 4, 16, 4],
            &[12, 2, 4, 4, 12, 2, 4, 4],
            &[4, 3, 1, 9, 4, 3, 1, 9],
        ]);

        assert_mats_equal(
            &strassen(lhs.view(), rhs.view()),
            &multiply_naive(lhs.view(), rhs.view()),
        );
    }

    #[test]
    fn test_16x16_random_matches_naive() {
        // Small element range keeps the products well inside i64.
        let mut lhs = Mat::<i64>::new(16, 16);
        let mut rhs = Mat::<i64>::new(16, 16);
        let mut seed = 1u64;
        for y in 0..16 {
            for x in 0..16 {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                lhs.set(x, y, (seed >> 33) as i64 % 100);
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                rhs.set(x, y, (seed >> 33) as i64 % 100);
            }
        }

        assert_mats_equal(
            &strassen(lhs.view(), rhs.view()),
            &multiply_naive(lhs.view(), rhs.view()),
        );
    }

    #[test]
    fn test_result_keeps_input_stride() {
        let lhs = Mat::<i64>::with_stride(8, 8, 32);
        let rhs = Mat::<i64>::random(8, 8);
        let out = strassen(lhs.view(), rhs.view());
        assert_eq!(out.stride(), 32);
    }

    #[test]
    #[should_panic]
    fn test_non_square_panics() {
        let lhs = Mat::<i64>::new(8, 4);
        let rhs = Mat::<i64>::new(8, 8);
        let _ = strassen(lhs.view(), rhs.view());
    }

    #[test]
    #[should_panic]
    fn test_non_power_of_two_panics() {
        let lhs = Mat::<i64>::new(12, 12);
        let rhs = Mat::<i64>::new(12, 12);
        let _ = strassen(lhs.view(), rhs.view());
    }

    #[test]
    fn test_f32_8x8_close_to_naive() {
        let lhs = Mat::<f32>::random(8, 8);
        let rhs = Mat::<f32>::random(8, 8);
        let fast = strassen(lhs.view(), rhs.view());
        let slow = multiply_naive(lhs.view(), rhs.view());
        for y in 0..8 {
            for x in 0..8 {
                approx::assert_relative_eq!(
                    fast.get(x, y),
                    slow.get(x, y),
                    epsilon = 1e-5,
                    max_relative = 1e-4
                );
            }
        }
    }
}
