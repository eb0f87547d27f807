use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};

use rand::Rng;

/// Supported element types for matrix storage.
///
/// The set is closed and known at compile time; the dispatch layer carries
/// one of these tags alongside an erased view so call sites can stay generic
/// over dtype without dynamic dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 64-bit signed integer.
    I64,
    /// 32-bit floating point.
    F32,
}

impl DType {
    /// Returns the size in bytes of a single element.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::I64 => 8,
            DType::F32 => 4,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::I64 => write!(f, "i64"),
            DType::F32 => write!(f, "f32"),
        }
    }
}

/// Numeric element type a `Mat` can hold.
///
/// `Default::default()` is the additive zero for both implementors, which the
/// multiply accumulators rely on.
pub trait Element:
    Copy
    + Default
    + PartialEq
    + fmt::Debug
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + AddAssign
{
    /// The runtime tag for this element type.
    const DTYPE: DType;

    /// Produce a pseudo-random element. Distribution quality is irrelevant;
    /// this only has to generate non-trivial test inputs.
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self;
}

impl Element for i64 {
    const DTYPE: DType = DType::I64;

    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        // Bounded so that sums of products in the multiply paths stay well
        // inside i64 even for large inputs.
        rng.gen_range(-(1 << 20)..1 << 20)
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        rng.gen()
    }
}

/// Lossy-or-lossless numeric conversion used when importing foreign buffers.
///
/// `Mat::from_raw` copies rows out of a source buffer whose element type may
/// differ from the destination store's; each source element is narrowed or
/// widened through this trait.
pub trait CastFrom<S> {
    fn cast_from(src: S) -> Self;
}

impl CastFrom<i64> for i64 {
    fn cast_from(src: i64) -> Self {
        src
    }
}

impl CastFrom<i32> for i64 {
    fn cast_from(src: i32) -> Self {
        src as i64
    }
}

impl CastFrom<f32> for f32 {
    fn cast_from(src: f32) -> Self {
        src
    }
}

impl CastFrom<f64> for f32 {
    fn cast_from(src: f64) -> Self {
        src as f32
    }
}

impl CastFrom<i32> for f32 {
    fn cast_from(src: i32) -> Self {
        src as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_in_bytes() {
        assert_eq!(DType::I64.size_in_bytes(), 8);
        assert_eq!(DType::F32.size_in_bytes(), 4);
    }

    #[test]
    fn test_display() {
        assert_eq!(DType::I64.to_string(), "i64");
        assert_eq!(DType::F32.to_string(), "f32");
    }

    #[test]
    fn test_element_tags() {
        assert_eq!(<i64 as Element>::DTYPE, DType::I64);
        assert_eq!(<f32 as Element>::DTYPE, DType::F32);
    }

    #[test]
    fn test_cast_widening() {
        assert_eq!(<i64 as CastFrom<i32>>::cast_from(-7), -7i64);
        assert_eq!(<f32 as CastFrom<f64>>::cast_from(1.5), 1.5f32);
        assert_eq!(<f32 as CastFrom<i32>>::cast_from(3), 3.0f32);
    }
}
