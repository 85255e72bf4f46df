//! Fixed-layout values that can be copied to and from raw bytes.
//!
//! A [FixedLayout] type always occupies exactly [FixedLayout::SIZE] bytes. Its canonical layout
//! is little-endian; the engines apply the configured [crate::Endian] on top of it.
//!
//! `usize` and `isize` are omitted to prevent the layout from depending on the target
//! architecture.

use crate::Error;

/// A value with a constant size and a flat, padding-free byte representation.
pub trait FixedLayout: Copy {
    /// Number of bytes in the representation.
    const SIZE: usize;

    /// Writes the canonical (little-endian) representation into `out`.
    ///
    /// `out` is exactly [Self::SIZE] bytes long.
    fn store(&self, out: &mut [u8]);

    /// Reads a value from its canonical (little-endian) representation.
    ///
    /// `bytes` is exactly [Self::SIZE] bytes long.
    fn load(bytes: &[u8]) -> Result<Self, Error>;
}

macro_rules! impl_fixed_layout {
    ($type:ty) => {
        impl FixedLayout for $type {
            const SIZE: usize = std::mem::size_of::<$type>();

            #[inline]
            fn store(&self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn load(bytes: &[u8]) -> Result<Self, Error> {
                let mut raw = [0u8; std::mem::size_of::<$type>()];
                raw.copy_from_slice(bytes);
                Ok(<$type>::from_le_bytes(raw))
            }
        }
    };
}

impl_fixed_layout!(u8);
impl_fixed_layout!(u16);
impl_fixed_layout!(u32);
impl_fixed_layout!(u64);
impl_fixed_layout!(u128);
impl_fixed_layout!(i8);
impl_fixed_layout!(i16);
impl_fixed_layout!(i32);
impl_fixed_layout!(i64);
impl_fixed_layout!(i128);
impl_fixed_layout!(f32);
impl_fixed_layout!(f64);

impl FixedLayout for bool {
    const SIZE: usize = 1;

    #[inline]
    fn store(&self, out: &mut [u8]) {
        out[0] = u8::from(*self);
    }

    #[inline]
    fn load(bytes: &[u8]) -> Result<Self, Error> {
        match bytes[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::DataCorruption(format!("invalid bool: {other}"))),
        }
    }
}

impl FixedLayout for char {
    const SIZE: usize = 4;

    #[inline]
    fn store(&self, out: &mut [u8]) {
        u32::from(*self).store(out);
    }

    #[inline]
    fn load(bytes: &[u8]) -> Result<Self, Error> {
        let raw = u32::load(bytes)?;
        char::from_u32(raw).ok_or_else(|| Error::DataCorruption(format!("invalid char: {raw:#x}")))
    }
}
