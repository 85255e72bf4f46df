//! Configuration shared by [crate::Writer] and [crate::Reader].

use crate::{endian::Endian, prefix::LengthHandler, prefix::LengthPrefix, text::TextEncoding};
use std::sync::Arc;

/// How the length prefix of a string is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StringLength {
    /// The prefix counts encoded bytes.
    #[default]
    Bytes,
    /// The prefix counts characters.
    Chars,
}

/// Optional checks performed by the engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Validation {
    /// Reject lengths that do not fit the selected fixed-width or float prefix.
    ///
    /// When disabled, such lengths are truncated. Smart prefixes are always checked.
    pub lengths: bool,
    /// Reject reads that would overrun the active store.
    pub end_of_stream: bool,
    /// Reject strings that do not survive a round trip through their encoding.
    pub encoding: bool,
    /// Reject terminated strings that contain the terminator.
    pub terminator: bool,
}

impl Validation {
    pub const ALL: Self = Self {
        lengths: true,
        end_of_stream: true,
        encoding: true,
        terminator: true,
    };

    pub const NONE: Self = Self {
        lengths: false,
        end_of_stream: false,
        encoding: false,
        terminator: false,
    };
}

impl Default for Validation {
    fn default() -> Self {
        Self::ALL
    }
}

/// Configuration for a reader or writer.
#[derive(Clone, Debug)]
pub struct Config {
    /// Byte and bit order applied to fixed-layout values.
    pub endian: Endian,
    /// Encoding used by string operations that do not name one.
    pub encoding: TextEncoding,
    /// Prefix [LengthPrefix::Default] resolves to.
    pub default_prefix: LengthPrefix,
    /// Interpretation of string length prefixes.
    pub string_length: StringLength,
    /// Optional checks.
    pub validate: Validation,
    /// Largest accepted decoded length (decoding `max_length + 1` is still accepted).
    pub max_length: i64,
    /// Initial size of the scratch buffer.
    pub scratch_capacity: usize,
    /// Handler used by [LengthPrefix::Custom].
    pub length_handler: Option<Arc<dyn LengthHandler>>,
    /// Capability used by whole-object serialization.
    #[cfg(feature = "serde")]
    pub object_format: Option<Arc<dyn crate::object::ObjectFormat>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endian: Endian::LITTLE,
            encoding: TextEncoding::Utf8,
            default_prefix: LengthPrefix::U32,
            string_length: StringLength::Bytes,
            validate: Validation::ALL,
            max_length: i32::MAX as i64,
            scratch_capacity: 16,
            length_handler: None,
            #[cfg(feature = "serde")]
            object_format: None,
        }
    }
}

impl Config {
    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_default_prefix(mut self, prefix: LengthPrefix) -> Self {
        self.default_prefix = prefix;
        self
    }

    pub fn with_string_length(mut self, string_length: StringLength) -> Self {
        self.string_length = string_length;
        self
    }

    pub fn with_validation(mut self, validate: Validation) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_scratch_capacity(mut self, capacity: usize) -> Self {
        self.scratch_capacity = capacity;
        self
    }

    pub fn with_length_handler(mut self, handler: Arc<dyn LengthHandler>) -> Self {
        self.length_handler = Some(handler);
        self
    }

    #[cfg(feature = "serde")]
    pub fn with_object_format(mut self, format: Arc<dyn crate::object::ObjectFormat>) -> Self {
        self.object_format = Some(format);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endian::{BitOrder, ByteOrder};

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.endian, Endian::LITTLE);
        assert_eq!(cfg.default_prefix, LengthPrefix::U32);
        assert_eq!(cfg.string_length, StringLength::Bytes);
        assert_eq!(cfg.validate, Validation::ALL);
        assert!(cfg.length_handler.is_none());
    }

    #[test]
    fn test_builders() {
        let endian = Endian::new(ByteOrder::Big, BitOrder::Msb0);
        let cfg = Config::default()
            .with_endian(endian)
            .with_encoding(TextEncoding::Latin1)
            .with_default_prefix(LengthPrefix::Smart62)
            .with_string_length(StringLength::Chars)
            .with_validation(Validation::NONE)
            .with_max_length(10);
        assert_eq!(cfg.endian, endian);
        assert_eq!(cfg.encoding, TextEncoding::Latin1);
        assert_eq!(cfg.default_prefix, LengthPrefix::Smart62);
        assert_eq!(cfg.string_length, StringLength::Chars);
        assert_eq!(cfg.validate, Validation::NONE);
        assert_eq!(cfg.max_length, 10);
    }
}
