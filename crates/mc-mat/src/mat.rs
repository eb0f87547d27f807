use crate::dtype::{CastFrom, Element};
use crate::view::{View, ViewMut};

/// Rows are padded so their length is a multiple of this many elements,
/// keeping power-of-two quadrant splits inside row boundaries.
pub const STRIDE_ALIGN: usize = 16;

/// Round a logical width up to the next stride boundary.
pub fn align_stride(width: usize) -> usize {
    (width + STRIDE_ALIGN - 1) & !(STRIDE_ALIGN - 1)
}

/// An owning, padded, row-major dense matrix.
///
/// Holds `stride * height` elements of a single numeric type. The logical
/// window is `width` columns by `height` rows; padding columns
/// (`width <= x < stride`) are zero-filled on creation and never read by
/// consumers. The store is exclusively owned and never aliased; all sharing
/// happens through non-owning [`View`]s.
#[derive(Debug, Clone)]
pub struct Mat<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
    stride: usize,
}

impl<T: Element> Mat<T> {
    /// Create a zero-filled matrix with an automatically aligned stride.
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_stride(width, height, 0)
    }

    /// Create a zero-filled matrix with an explicit stride.
    ///
    /// A `stride` of 0 means "auto": the width rounded up to
    /// [`STRIDE_ALIGN`] elements.
    ///
    /// # Panics
    /// Panics if an explicit `stride` is smaller than `width`.
    pub fn with_stride(width: usize, height: usize, stride: usize) -> Self {
        let stride = if stride == 0 { align_stride(width) } else { stride };
        assert!(
            stride >= width,
            "stride {} is smaller than width {}",
            stride,
            width
        );
        Mat {
            data: vec![T::default(); stride * height],
            width,
            height,
            stride,
        }
    }

    /// Create a matrix filled with pseudo-random bit patterns.
    ///
    /// Only used to generate non-trivial test inputs; the distribution is
    /// whatever `rand` hands out for the element type.
    pub fn random(width: usize, height: usize) -> Self {
        let mut rng = rand::thread_rng();
        let mut mat = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                mat.set(x, y, T::random(&mut rng));
            }
        }
        mat
    }

    /// Create a matrix from a nested row literal.
    ///
    /// # Panics
    /// Panics if the rows do not all have the same length.
    pub fn from_rows(rows: &[&[T]]) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        let mut mat = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), width, "row {} has uneven length", y);
            for (x, &v) in row.iter().enumerate() {
                mat.set(x, y, v);
            }
        }
        mat
    }

    /// Copy `width` elements per row out of a foreign buffer into a freshly
    /// allocated, auto-strided matrix, converting each element from the
    /// source type.
    ///
    /// `src_pitch` is the source row pitch in elements (>= `width`); the
    /// tensor-file loader hands in tightly packed rows with
    /// `src_pitch == width`.
    ///
    /// # Panics
    /// Panics if `src` is too short for the declared shape.
    pub fn from_raw<S: Copy>(src: &[S], width: usize, height: usize, src_pitch: usize) -> Self
    where
        T: CastFrom<S>,
    {
        assert!(src_pitch >= width, "source pitch smaller than width");
        assert!(
            src.len() >= src_pitch * height.saturating_sub(1) + width,
            "source buffer too short for {}x{} with pitch {}",
            width,
            height,
            src_pitch
        );
        let mut mat = Self::new(width, height);
        for y in 0..height {
            let row = &src[y * src_pitch..y * src_pitch + width];
            for (x, &v) in row.iter().enumerate() {
                mat.set(x, y, T::cast_from(v));
            }
        }
        mat
    }

    /// Logical width in elements.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Logical height in rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Elements per row in the underlying buffer (>= width).
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Read one element. Bounds are only checked in debug builds; callers
    /// own `x < width`, `y < height`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        debug_assert!(x < self.width);
        debug_assert!(y < self.height);
        self.data[x + y * self.stride]
    }

    /// Write one element. Bounds are only checked in debug builds.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        debug_assert!(x < self.width);
        debug_assert!(y < self.height);
        self.data[x + y * self.stride] = value;
    }

    /// Borrow the full logical window.
    pub fn view(&self) -> View<'_, T> {
        View::new(&self.data, self.width, self.height, self.stride)
    }

    /// Mutably borrow the full logical window.
    pub fn view_mut(&mut self) -> ViewMut<'_, T> {
        ViewMut::new(&mut self.data, self.width, self.height, self.stride)
    }

    /// The underlying buffer, padding included. Used by backends that
    /// marshal whole host buffers across an ABI boundary.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable access to the underlying buffer, padding included.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// True iff widths and heights are pairwise equal. Strides may differ.
pub fn dimensions_match<T: Element>(a: &Mat<T>, b: &Mat<T>) -> bool {
    a.width == b.width && a.height == b.height
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_stride_alignment() {
        let m = Mat::<i64>::new(3, 4);
        assert_eq!(m.width(), 3);
        assert_eq!(m.height(), 4);
        assert_eq!(m.stride(), 16);

        let m = Mat::<i64>::new(16, 2);
        assert_eq!(m.stride(), 16);

        let m = Mat::<i64>::new(17, 2);
        assert_eq!(m.stride(), 32);
    }

    #[test]
    fn test_explicit_stride() {
        let m = Mat::<f32>::with_stride(3, 2, 5);
        assert_eq!(m.stride(), 5);
        assert_eq!(m.as_slice().len(), 10);
    }

    #[test]
    #[should_panic]
    fn test_stride_smaller_than_width_panics() {
        let _ = Mat::<i64>::with_stride(8, 2, 4);
    }

    #[test]
    fn test_zero_filled_including_padding() {
        let m = Mat::<i64>::new(3, 2);
        assert!(m.as_slice().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_get_set() {
        let mut m = Mat::<i64>::new(4, 3);
        m.set(2, 1, 42);
        assert_eq!(m.get(2, 1), 42);
        assert_eq!(m.get(0, 0), 0);
    }

    #[test]
    fn test_from_rows() {
        let m = Mat::from_rows(&[&[1i64, 2, 3], &[4, 5, 6]]);
        assert_eq!(m.width(), 3);
        assert_eq!(m.height(), 2);
        assert_eq!(m.get(0, 0), 1);
        assert_eq!(m.get(2, 1), 6);
    }

    #[test]
    #[should_panic]
    fn test_from_rows_uneven_panics() {
        let _ = Mat::from_rows(&[&[1i64, 2], &[3]]);
    }

    #[test]
    fn test_from_raw_widens_i32() {
        // Tightly packed 2x2 i32 source, widened into an i64 store.
        let src: [i32; 4] = [1, -2, 3, -4];
        let m = Mat::<i64>::from_raw(&src, 2, 2, 2);
        assert_eq!(m.get(0, 0), 1);
        assert_eq!(m.get(1, 0), -2);
        assert_eq!(m.get(0, 1), 3);
        assert_eq!(m.get(1, 1), -4);
        assert_eq!(m.stride(), 16);
    }

    #[test]
    fn test_from_raw_skips_source_pitch() {
        // Source rows are 4 elements apart but only 2 are copied.
        let src: [i64; 8] = [1, 2, 9, 9, 3, 4, 9, 9];
        let m = Mat::<i64>::from_raw(&src, 2, 2, 4);
        assert_eq!(m.get(0, 1), 3);
        assert_eq!(m.get(1, 1), 4);
    }

    #[test]
    fn test_random_is_nontrivial() {
        let m = Mat::<i64>::random(8, 8);
        let first = m.get(0, 0);
        let all_same = (0..8).all(|y| (0..8).all(|x| m.get(x, y) == first));
        assert!(!all_same);
    }

    #[test]
    fn test_dimensions_match() {
        let a = Mat::<i64>::new(3, 4);
        let b = Mat::<i64>::with_stride(3, 4, 20);
        let c = Mat::<i64>::new(4, 3);
        assert!(dimensions_match(&a, &b));
        assert!(!dimensions_match(&a, &c));
    }
}
