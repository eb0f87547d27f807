use crate::dtype::Element;

/// One of the four equal sub-windows of a square view, as used by the
/// Strassen quadrant split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// A non-owning strided rectangular window over a [`Mat`](crate::Mat)'s
/// buffer, or over a sub-region of another view.
///
/// The slice starts at the view origin; element `(x, y)` lives at
/// `x + y * stride`. Ownership of the memory stays with the store, so a view
/// can never outlive it.
#[derive(Debug, Clone, Copy)]
pub struct View<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T: Element> View<'a, T> {
    pub(crate) fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> Self {
        debug_assert!(stride >= width);
        debug_assert!(height == 0 || data.len() >= stride * (height - 1) + width);
        View {
            data,
            width,
            height,
            stride,
        }
    }

    pub fn width(self) -> usize {
        self.width
    }

    pub fn height(self) -> usize {
        self.height
    }

    pub fn stride(self) -> usize {
        self.stride
    }

    /// Read one element. Bounds are only checked in debug builds; callers
    /// own `x < width`, `y < height`.
    #[inline]
    pub fn get(self, x: usize, y: usize) -> T {
        debug_assert!(x < self.width);
        debug_assert!(y < self.height);
        self.data[x + y * self.stride]
    }

    /// True iff widths and heights are pairwise equal. Strides may differ.
    pub fn dims_match(self, other: View<'_, T>) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// A sub-window at origin `(x0, y0)`. Pure offset bookkeeping; the
    /// sub-view shares this view's stride.
    pub fn sub(self, x0: usize, y0: usize, width: usize, height: usize) -> View<'a, T> {
        debug_assert!(x0 + width <= self.width);
        debug_assert!(y0 + height <= self.height);
        View {
            data: &self.data[x0 + y0 * self.stride..],
            width,
            height,
            stride: self.stride,
        }
    }

    /// The half-size quadrant sub-view used by the Strassen split.
    ///
    /// # Panics
    /// Panics if width or height is odd.
    pub fn quadrant(self, q: Quadrant) -> View<'a, T> {
        assert!(self.width % 2 == 0 && self.height % 2 == 0);
        let (hw, hh) = (self.width / 2, self.height / 2);
        match q {
            Quadrant::TopLeft => self.sub(0, 0, hw, hh),
            Quadrant::TopRight => self.sub(hw, 0, hw, hh),
            Quadrant::BottomLeft => self.sub(0, hh, hw, hh),
            Quadrant::BottomRight => self.sub(hw, hh, hw, hh),
        }
    }

    /// Pointer to the view origin, for backends that marshal the host
    /// buffer across an ABI boundary.
    pub fn as_ptr(self) -> *const T {
        self.data.as_ptr()
    }

    /// Length of the underlying slice from the view origin to the end of
    /// the parent buffer, in elements.
    pub fn data_len(self) -> usize {
        self.data.len()
    }
}

/// Mutable counterpart of [`View`], used by `copy` and by quadrant assembly
/// when Strassen writes its output blocks.
#[derive(Debug)]
pub struct ViewMut<'a, T> {
    data: &'a mut [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T: Element> ViewMut<'a, T> {
    pub(crate) fn new(data: &'a mut [T], width: usize, height: usize, stride: usize) -> Self {
        debug_assert!(stride >= width);
        debug_assert!(height == 0 || data.len() >= stride * (height - 1) + width);
        ViewMut {
            data,
            width,
            height,
            stride,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        debug_assert!(x < self.width);
        debug_assert!(y < self.height);
        self.data[x + y * self.stride]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        debug_assert!(x < self.width);
        debug_assert!(y < self.height);
        self.data[x + y * self.stride] = value;
    }

    /// A mutable sub-window at origin `(x0, y0)`, sharing this view's
    /// stride. Reborrows, so only one sub-window is live at a time.
    pub fn sub_mut(&mut self, x0: usize, y0: usize, width: usize, height: usize) -> ViewMut<'_, T> {
        debug_assert!(x0 + width <= self.width);
        debug_assert!(y0 + height <= self.height);
        ViewMut {
            data: &mut self.data[x0 + y0 * self.stride..],
            width,
            height,
            stride: self.stride,
        }
    }

    /// The half-size mutable quadrant used when assembling Strassen output.
    ///
    /// # Panics
    /// Panics if width or height is odd.
    pub fn quadrant_mut(&mut self, q: Quadrant) -> ViewMut<'_, T> {
        assert!(self.width % 2 == 0 && self.height % 2 == 0);
        let (hw, hh) = (self.width / 2, self.height / 2);
        match q {
            Quadrant::TopLeft => self.sub_mut(0, 0, hw, hh),
            Quadrant::TopRight => self.sub_mut(hw, 0, hw, hh),
            Quadrant::BottomLeft => self.sub_mut(0, hh, hw, hh),
            Quadrant::BottomRight => self.sub_mut(hw, hh, hw, hh),
        }
    }

    /// Reborrow as a read-only view.
    pub fn as_view(&self) -> View<'_, T> {
        View::new(self.data, self.width, self.height, self.stride)
    }

    /// Mutable pointer to the view origin, for ABI marshaling.
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr()
    }
}
