use mc_mat::{Element, View};

/// Position of the first element where `a` and `b` differ, or `None` if the
/// logical windows are identical. Padding columns are never inspected.
///
/// # Panics
/// Panics if the dimensions mismatch.
pub fn first_mismatch<T: Element>(a: View<'_, T>, b: View<'_, T>) -> Option<(usize, usize)> {
    assert!(
        a.dims_match(b),
        "compare: dimension mismatch {}x{} vs {}x{}",
        a.width(),
        a.height(),
        b.width(),
        b.height()
    );

    for y in 0..a.height() {
        for x in 0..a.width() {
            if a.get(x, y) != b.get(x, y) {
                return Some((x, y));
            }
        }
    }
    None
}

/// Largest absolute element-wise difference between two f32 windows.
/// Used to bound accumulation-order drift between backends.
///
/// # Panics
/// Panics if the dimensions mismatch.
pub fn max_abs_diff(a: View<'_, f32>, b: View<'_, f32>) -> f32 {
    assert!(
        a.dims_match(b),
        "compare: dimension mismatch {}x{} vs {}x{}",
        a.width(),
        a.height(),
        b.width(),
        b.height()
    );

    let mut max = 0.0f32;
    for y in 0..a.height() {
        for x in 0..a.width() {
            let diff = (a.get(x, y) - b.get(x, y)).abs();
            if diff > max {
                max = diff;
            }
        }
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_mat::Mat;

    #[test]
    fn test_identical_views_match() {
        let a = Mat::from_rows(&[&[1i64, 2], &[3, 4]]);
        let b = Mat::from_rows(&[&[1i64, 2], &[3, 4]]);
        assert_eq!(first_mismatch(a.view(), b.view()), None);
    }

    #[test]
    fn test_first_mismatch_position() {
        let a = Mat::from_rows(&[&[1i64, 2], &[3, 4]]);
        let b = Mat::from_rows(&[&[1i64, 2], &[9, 4]]);
        assert_eq!(first_mismatch(a.view(), b.view()), Some((0, 1)));
    }

    #[test]
    fn test_padding_is_ignored() {
        // Same logical contents, different strides.
        let a = Mat::from_rows(&[&[1i64, 2], &[3, 4]]);
        let mut b = Mat::with_stride(2, 2, 24);
        b.set(0, 0, 1);
        b.set(1, 0, 2);
        b.set(0, 1, 3);
        b.set(1, 1, 4);
        assert_eq!(first_mismatch(a.view(), b.view()), None);
    }

    #[test]
    fn test_max_abs_diff() {
        let a = Mat::from_rows(&[&[1.0f32, 2.0]]);
        let b = Mat::from_rows(&[&[1.5f32, 1.75]]);
        assert_eq!(max_abs_diff(a.view(), b.view()), 0.5);
    }
}
