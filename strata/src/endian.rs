//! Byte and bit order transforms for fixed-size values.
//!
//! Values are laid out little-endian with the least significant bit first before they reach
//! the transform. [transform] rewrites that canonical layout in place to match an [Endian]
//! configuration (and, because both reversals are involutions, back again on read).

/// Lookup table mapping each byte to its bit-reversed value.
pub const BIT_REVERSE: [u8; 256] = build_bit_reverse();

const fn build_bit_reverse() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut byte = i as u8;
        let mut reversed = 0u8;
        let mut bit = 0;
        while bit < 8 {
            reversed = (reversed << 1) | (byte & 1);
            byte >>= 1;
            bit += 1;
        }
        table[i] = reversed;
        i += 1;
    }
    table
}

/// Order of bytes within a multi-byte value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// Order of bits within each byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BitOrder {
    /// Least significant bit first (no change to byte content).
    #[default]
    Lsb0,
    /// Most significant bit first (every byte is bit-reversed).
    Msb0,
}

/// Combined byte and bit order selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Endian {
    pub bytes: ByteOrder,
    pub bits: BitOrder,
}

impl Endian {
    pub const LITTLE: Self = Self {
        bytes: ByteOrder::Little,
        bits: BitOrder::Lsb0,
    };

    pub const BIG: Self = Self {
        bytes: ByteOrder::Big,
        bits: BitOrder::Lsb0,
    };

    pub const fn new(bytes: ByteOrder, bits: BitOrder) -> Self {
        Self { bytes, bits }
    }

    /// Returns true if multi-byte values must have their byte order reversed.
    pub const fn needs_byte_reorder(&self) -> bool {
        matches!(self.bytes, ByteOrder::Big)
    }

    /// Returns true if every byte must have its bit order reversed.
    pub const fn needs_bit_reorder(&self) -> bool {
        matches!(self.bits, BitOrder::Msb0)
    }

    /// Returns true if any transform applies.
    pub const fn needs_reorder(&self) -> bool {
        self.needs_byte_reorder() || self.needs_bit_reorder()
    }
}

/// Reverses the bits of a single byte.
#[inline]
pub const fn reverse_bits(byte: u8) -> u8 {
    BIT_REVERSE[byte as usize]
}

/// Applies the requested reversals to `buf` in place.
///
/// Bits are reversed per byte first, then the byte sequence is reversed. A single byte
/// only ever has its bits reversed.
#[inline]
pub fn transform(buf: &mut [u8], reverse_bytes: bool, reverse_bits_in_byte: bool) {
    if let [byte] = buf {
        if reverse_bits_in_byte {
            *byte = reverse_bits(*byte);
        }
        return;
    }
    if reverse_bits_in_byte {
        for byte in buf.iter_mut() {
            *byte = reverse_bits(*byte);
        }
    }
    if reverse_bytes {
        buf.reverse();
    }
}
