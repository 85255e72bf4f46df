//! Length prefixes.
//!
//! A [LengthPrefix] selects how a length is written before a variable-length payload. Fixed-width
//! and float prefixes go through the engine's endian transform like any other fixed-layout value.
//! The two smart prefixes pick their own width:
//!
//! - [Smart15]: 1 or 2 bytes. The low bit of the first byte selects the width; the remaining
//!   7 or 15 bits hold the value (`0..=32767`).
//! - [Smart62]: 1, 2, 4 or 8 bytes. The low 2 bits of the first byte select the width
//!   (`1 << selector` bytes); the remaining 6, 14, 30 or 62 bits hold the value
//!   (`0..=2^62-1`).
//!
//! Both are written little-endian, one byte at a time.

use crate::{value::Decode, value::Encode, Config, Error, Memory, Reader, Writer};
use std::fmt;

/// How a length is encoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LengthPrefix {
    /// No length is written.
    None,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    /// The length is stored as an `f32`.
    F32,
    /// The length is stored as an `f64`.
    F64,
    Smart15,
    Smart62,
    /// The length is handled by the configured [LengthHandler].
    Custom,
    /// Resolves to the engine's configured default.
    #[default]
    Default,
}

impl LengthPrefix {
    /// Replaces [LengthPrefix::Default] with `default`.
    pub const fn resolve(self, default: LengthPrefix) -> LengthPrefix {
        match self {
            Self::Default => default,
            kind => kind,
        }
    }

    /// Returns true if `value` can be encoded by this prefix without loss.
    pub fn fits(self, value: i64) -> bool {
        match self {
            Self::None | Self::Default | Self::I64 | Self::Custom => true,
            Self::I8 => i8::try_from(value).is_ok(),
            Self::U8 => u8::try_from(value).is_ok(),
            Self::I16 => i16::try_from(value).is_ok(),
            Self::U16 => u16::try_from(value).is_ok(),
            Self::I32 => i32::try_from(value).is_ok(),
            Self::U32 => u32::try_from(value).is_ok(),
            Self::U64 => value >= 0,
            Self::F32 => {
                let float = value as f32;
                float.is_finite() && float as i64 == value && float < i64::MAX as f32
            }
            Self::F64 => {
                let float = value as f64;
                float as i64 == value && float < i64::MAX as f64
            }
            Self::Smart15 => (0..=i64::from(Smart15::MAX)).contains(&value),
            Self::Smart62 => value >= 0 && value as u64 <= Smart62::MAX,
        }
    }

    /// Returns the encoded size if it does not depend on the value.
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Self::None => Some(0),
            Self::I8 | Self::U8 => Some(1),
            Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 => Some(4),
            Self::I64 | Self::U64 | Self::F64 => Some(8),
            Self::Smart15 | Self::Smart62 | Self::Custom | Self::Default => None,
        }
    }
}

/// Writes and reads lengths for [LengthPrefix::Custom].
pub trait LengthHandler: Send + Sync + fmt::Debug {
    fn write_length(&self, writer: &mut Writer<'_>, length: i64) -> Result<(), Error>;

    fn read_length(&self, reader: &mut Reader<'_>) -> Result<i64, Error>;
}

/// A length in `0..=32767`, encoded in 1 or 2 bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Smart15(pub u16);

impl Smart15 {
    pub const MAX: u16 = (1 << 15) - 1;

    /// Largest value that fits in a single byte.
    pub const MAX_SHORT: u16 = (1 << 7) - 1;

    /// Number of bytes `self` encodes to.
    pub const fn encoded_size(self) -> usize {
        if self.0 <= Self::MAX_SHORT {
            1
        } else {
            2
        }
    }
}

impl TryFrom<i64> for Smart15 {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Error> {
        u16::try_from(value)
            .ok()
            .filter(|value| *value <= Self::MAX)
            .map(Self)
            .ok_or(Error::InvalidCast {
                kind: LengthPrefix::Smart15,
                value,
            })
    }
}

impl Encode for Smart15 {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<(), Error> {
        if self.0 > Self::MAX {
            return Err(Error::InvalidCast {
                kind: LengthPrefix::Smart15,
                value: i64::from(self.0),
            });
        }
        if self.0 <= Self::MAX_SHORT {
            return writer.write((self.0 << 1) as u8);
        }
        let raw = (self.0 << 1) | 1;
        writer.write((raw & 0xFF) as u8)?;
        writer.write((raw >> 8) as u8)
    }
}

impl Decode for Smart15 {
    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), Error> {
        let first: u8 = reader.read()?;
        if first & 1 == 0 {
            self.0 = u16::from(first >> 1);
            return Ok(());
        }
        let second: u8 = reader.read()?;
        self.0 = ((u16::from(second) << 8) | u16::from(first)) >> 1;
        Ok(())
    }
}

/// A length in `0..=2^62-1`, encoded in 1, 2, 4 or 8 bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Smart62(pub u64);

impl Smart62 {
    pub const MAX: u64 = (1 << 62) - 1;

    /// Selector for the smallest width that holds `self`, or `None` if out of range.
    const fn selector(self) -> Option<u32> {
        match self.0 {
            0..=0x3F => Some(0),
            0x40..=0x3FFF => Some(1),
            0x4000..=0x3FFF_FFFF => Some(2),
            0x4000_0000..=Self::MAX => Some(3),
            _ => None,
        }
    }

    /// Number of bytes `self` encodes to (zero if out of range).
    pub const fn encoded_size(self) -> usize {
        match self.selector() {
            Some(selector) => 1 << selector,
            None => 0,
        }
    }
}

impl TryFrom<i64> for Smart62 {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Error> {
        u64::try_from(value)
            .ok()
            .filter(|value| *value <= Self::MAX)
            .map(Self)
            .ok_or(Error::InvalidCast {
                kind: LengthPrefix::Smart62,
                value,
            })
    }
}

impl Encode for Smart62 {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<(), Error> {
        let selector = self.selector().ok_or(Error::InvalidCast {
            kind: LengthPrefix::Smart62,
            value: self.0 as i64,
        })?;
        let raw = (self.0 << 2) | u64::from(selector);
        for byte in raw.to_le_bytes().into_iter().take(1 << selector) {
            writer.write(byte)?;
        }
        Ok(())
    }
}

impl Decode for Smart62 {
    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), Error> {
        let first: u8 = reader.read()?;
        let selector = first & 0b11;
        let mut raw = u64::from(first);
        if selector > 0 {
            for i in 1..(1usize << selector) {
                let byte: u8 = reader.read()?;
                raw |= u64::from(byte) << (8 * i);
            }
        }
        self.0 = raw >> 2;
        Ok(())
    }
}

/// Encodes `value` with `kind` using `config` and returns the bytes.
pub fn encode(kind: LengthPrefix, value: i64, config: &Config) -> Result<Vec<u8>, Error> {
    let mut memory = Memory::new();
    let mut writer = Writer::leave_open(&mut memory, config.clone());
    writer.write_length_prefix(value, kind)?;
    writer.close()?;
    drop(writer);
    Ok(memory.into_inner())
}

/// Decodes a length written with `kind` from the start of `bytes` using `config`.
pub fn decode(kind: LengthPrefix, bytes: &[u8], config: &Config) -> Result<i64, Error> {
    let mut reader = Reader::new(Memory::from(bytes), config.clone());
    let value = reader.read_length_prefix(kind)?;
    reader.close()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Validation, Endian};
    use std::sync::Arc;
    use test_case::test_case;

    fn roundtrip(kind: LengthPrefix, value: i64) -> usize {
        let cfg = Config::default().with_max_length(i64::MAX);
        let bytes = encode(kind, value, &cfg).unwrap();
        assert_eq!(decode(kind, &bytes, &cfg).unwrap(), value);
        bytes.len()
    }

    #[test_case(0, 1)]
    #[test_case(127, 1)]
    #[test_case(128, 2)]
    #[test_case(32767, 2)]
    fn test_smart15_boundaries(value: i64, size: usize) {
        assert_eq!(roundtrip(LengthPrefix::Smart15, value), size);
        assert_eq!(Smart15(value as u16).encoded_size(), size);
    }

    #[test_case(32768)]
    #[test_case(-1)]
    fn test_smart15_rejects(value: i64) {
        // Rejected regardless of validation settings
        let cfg = Config::default().with_validation(Validation::NONE);
        assert!(matches!(
            encode(LengthPrefix::Smart15, value, &cfg),
            Err(Error::InvalidCast {
                kind: LengthPrefix::Smart15,
                ..
            })
        ));
    }

    #[test]
    fn test_smart15_layout() {
        let cfg = Config::default();
        assert_eq!(encode(LengthPrefix::Smart15, 5, &cfg).unwrap(), [0b0000_1010]);
        // 300 = 0b1_0010_1100, shifted left with the selector bit set
        assert_eq!(
            encode(LengthPrefix::Smart15, 300, &cfg).unwrap(),
            [0b0101_1001, 0b0000_0010]
        );
    }

    #[test_case(0, 1)]
    #[test_case(63, 1)]
    #[test_case(64, 2)]
    #[test_case(16383, 2)]
    #[test_case(16384, 4)]
    #[test_case((1 << 30) - 1, 4)]
    #[test_case(1 << 30, 8)]
    #[test_case((1 << 62) - 1, 8)]
    fn test_smart62_boundaries(value: i64, size: usize) {
        assert_eq!(roundtrip(LengthPrefix::Smart62, value), size);
        assert_eq!(Smart62(value as u64).encoded_size(), size);
    }

    #[test_case(1 << 62)]
    #[test_case(i64::MAX)]
    #[test_case(-1)]
    fn test_smart62_rejects(value: i64) {
        let cfg = Config::default().with_validation(Validation::NONE);
        assert!(matches!(
            encode(LengthPrefix::Smart62, value, &cfg),
            Err(Error::InvalidCast {
                kind: LengthPrefix::Smart62,
                ..
            })
        ));
    }

    #[test]
    fn test_smart62_layout() {
        let cfg = Config::default();
        assert_eq!(encode(LengthPrefix::Smart62, 1, &cfg).unwrap(), [0b0000_0100]);
        assert_eq!(
            encode(LengthPrefix::Smart62, 64, &cfg).unwrap(),
            [0b0000_0001, 0b0000_0001]
        );
        assert_eq!(
            encode(LengthPrefix::Smart62, 16384, &cfg).unwrap(),
            [0b0000_0010, 0, 1, 0]
        );
    }

    #[test_case(LengthPrefix::I8, 127, 1)]
    #[test_case(LengthPrefix::I8, -128, 1)]
    #[test_case(LengthPrefix::U8, 255, 1)]
    #[test_case(LengthPrefix::I16, -1, 2)]
    #[test_case(LengthPrefix::U16, 65535, 2)]
    #[test_case(LengthPrefix::I32, i32::MIN as i64, 4)]
    #[test_case(LengthPrefix::U32, u32::MAX as i64, 4)]
    #[test_case(LengthPrefix::I64, i64::MIN, 8)]
    #[test_case(LengthPrefix::U64, i64::MAX, 8)]
    #[test_case(LengthPrefix::F32, 1 << 24, 4)]
    #[test_case(LengthPrefix::F64, 1 << 53, 8)]
    #[test_case(LengthPrefix::None, 12345, 0)]
    fn test_fixed_width(kind: LengthPrefix, value: i64, size: usize) {
        if kind == LengthPrefix::None {
            let cfg = Config::default();
            assert!(encode(kind, value, &cfg).unwrap().is_empty());
            return;
        }
        assert_eq!(roundtrip(kind, value), size);
        assert_eq!(kind.fixed_size(), Some(size));
    }

    #[test_case(LengthPrefix::I8, 128)]
    #[test_case(LengthPrefix::U8, 256)]
    #[test_case(LengthPrefix::U8, -1)]
    #[test_case(LengthPrefix::I16, 32768)]
    #[test_case(LengthPrefix::U16, 65536)]
    #[test_case(LengthPrefix::I32, i32::MAX as i64 + 1)]
    #[test_case(LengthPrefix::U32, -1)]
    #[test_case(LengthPrefix::U64, -1)]
    #[test_case(LengthPrefix::F32, (1 << 24) + 1)]
    #[test_case(LengthPrefix::F64, (1 << 53) + 1)]
    fn test_range_validation(kind: LengthPrefix, value: i64) {
        assert!(!kind.fits(value));
        let cfg = Config::default();
        assert!(matches!(
            encode(kind, value, &cfg),
            Err(Error::InvalidCast { .. })
        ));
    }

    #[test]
    fn test_truncation_without_validation() {
        let cfg = Config::default()
            .with_validation(Validation::NONE)
            .with_max_length(i64::MAX);
        let bytes = encode(LengthPrefix::U8, 257, &cfg).unwrap();
        assert_eq!(bytes, [1]);
        assert_eq!(decode(LengthPrefix::U8, &bytes, &cfg).unwrap(), 1);

        let bytes = encode(LengthPrefix::I8, 200, &cfg).unwrap();
        assert_eq!(decode(LengthPrefix::I8, &bytes, &cfg).unwrap(), -56);
    }

    #[test]
    fn test_default_resolves() {
        let cfg = Config::default().with_default_prefix(LengthPrefix::U16);
        assert_eq!(encode(LengthPrefix::Default, 7, &cfg).unwrap(), [7, 0]);
        assert_eq!(decode(LengthPrefix::Default, &[7, 0], &cfg).unwrap(), 7);

        // A default that points at itself is rejected
        let cfg = Config::default().with_default_prefix(LengthPrefix::Default);
        assert!(matches!(
            encode(LengthPrefix::Default, 7, &cfg),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_big_endian_prefix() {
        let cfg = Config::default().with_endian(Endian::BIG);
        assert_eq!(encode(LengthPrefix::U32, 1, &cfg).unwrap(), [0, 0, 0, 1]);
        assert_eq!(decode(LengthPrefix::U32, &[0, 0, 0, 1], &cfg).unwrap(), 1);
    }

    #[test]
    fn test_max_length_guard() {
        let cfg = Config::default().with_max_length(100);

        // Exactly max + 1 is accepted
        let bytes = encode(LengthPrefix::U32, 101, &cfg).unwrap();
        assert_eq!(decode(LengthPrefix::U32, &bytes, &cfg).unwrap(), 101);

        // max + 2 is corrupt
        let bytes = encode(LengthPrefix::U32, 102, &cfg).unwrap();
        assert!(matches!(
            decode(LengthPrefix::U32, &bytes, &cfg),
            Err(Error::DataCorruption(_))
        ));
    }

    #[test]
    fn test_none_cannot_be_read() {
        let cfg = Config::default();
        assert!(matches!(
            decode(LengthPrefix::None, &[], &cfg),
            Err(Error::InvalidOperation(_))
        ));
    }

    /// Stores lengths as a 3-byte big-endian integer.
    #[derive(Debug)]
    struct ThreeBytes;

    impl LengthHandler for ThreeBytes {
        fn write_length(&self, writer: &mut Writer<'_>, length: i64) -> Result<(), Error> {
            let bytes = u32::try_from(length)
                .map_err(|_| Error::InvalidCast {
                    kind: LengthPrefix::Custom,
                    value: length,
                })?
                .to_be_bytes();
            writer.write_bytes(&bytes[1..])
        }

        fn read_length(&self, reader: &mut Reader<'_>) -> Result<i64, Error> {
            let bytes = reader.read_bytes(3)?;
            Ok(i64::from(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])))
        }
    }

    #[test]
    fn test_custom_handler() {
        let cfg = Config::default().with_length_handler(Arc::new(ThreeBytes));
        let bytes = encode(LengthPrefix::Custom, 0x010203, &cfg).unwrap();
        assert_eq!(bytes, [1, 2, 3]);
        assert_eq!(decode(LengthPrefix::Custom, &bytes, &cfg).unwrap(), 0x010203);
    }

    #[test]
    fn test_custom_without_handler() {
        let cfg = Config::default();
        assert!(matches!(
            encode(LengthPrefix::Custom, 1, &cfg),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            decode(LengthPrefix::Custom, &[1], &cfg),
            Err(Error::InvalidOperation(_))
        ));
    }
}
