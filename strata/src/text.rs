//! Text encodings used by string operations.
//!
//! Encoding is lossy: characters an encoding cannot represent are written as `?`. Decoding is
//! lossy as well, with malformed sequences replaced by U+FFFD. Writers can opt into a round trip
//! check (see [crate::Validation::encoding]) to reject lossy writes.

/// A text encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    /// 7-bit ASCII.
    Ascii,
    /// ISO-8859-1.
    Latin1,
}

const SUBSTITUTE: u8 = b'?';

impl TextEncoding {
    /// The largest number of bytes a single character can occupy.
    pub const fn max_bytes_per_char(self) -> usize {
        match self {
            Self::Utf8 | Self::Utf16Le | Self::Utf16Be | Self::Utf32Le => 4,
            Self::Ascii | Self::Latin1 => 1,
        }
    }

    /// Returns the number of bytes per character if every character has the same width.
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Utf32Le => Some(4),
            Self::Ascii | Self::Latin1 => Some(1),
            Self::Utf8 | Self::Utf16Le | Self::Utf16Be => None,
        }
    }

    /// Encodes `text`, substituting `?` for characters the encoding cannot represent.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Self::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Self::Utf32Le => text.chars().flat_map(|c| u32::from(c).to_le_bytes()).collect(),
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { SUBSTITUTE })
                .collect(),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(SUBSTITUTE))
                .collect(),
        }
    }

    /// Decodes `bytes`, replacing malformed sequences with U+FFFD.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Utf16Le => decode_utf16(bytes, u16::from_le_bytes),
            Self::Utf16Be => decode_utf16(bytes, u16::from_be_bytes),
            Self::Utf32Le => bytes
                .chunks(4)
                .map(|chunk| match <[u8; 4]>::try_from(chunk) {
                    Ok(raw) => {
                        char::from_u32(u32::from_le_bytes(raw)).unwrap_or(char::REPLACEMENT_CHARACTER)
                    }
                    Err(_) => char::REPLACEMENT_CHARACTER,
                })
                .collect(),
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { char::from(b) } else { char::REPLACEMENT_CHARACTER })
                .collect(),
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }

    /// Returns the number of bytes occupied by the first `chars` characters of `bytes`, or `None`
    /// if `bytes` holds fewer than `chars` complete characters.
    pub fn prefix_len(self, bytes: &[u8], chars: usize) -> Option<usize> {
        let mut offset = 0;
        for _ in 0..chars {
            let width = self.char_width(&bytes[offset..])?;
            offset += width;
        }
        Some(offset)
    }

    /// Width of the character starting at `bytes[0]`, if it is complete.
    fn char_width(self, bytes: &[u8]) -> Option<usize> {
        let width = match self {
            Self::Utf8 => match *bytes.first()? {
                0xF0..=0xFF => 4,
                0xE0..=0xEF => 3,
                0xC0..=0xDF => 2,
                _ => 1,
            },
            Self::Utf16Le | Self::Utf16Be => {
                let unit = bytes.get(..2)?;
                let unit = if self == Self::Utf16Le {
                    u16::from_le_bytes([unit[0], unit[1]])
                } else {
                    u16::from_be_bytes([unit[0], unit[1]])
                };
                if (0xD800..=0xDBFF).contains(&unit) {
                    4
                } else {
                    2
                }
            }
            Self::Utf32Le => 4,
            Self::Ascii | Self::Latin1 => 1,
        };
        (bytes.len() >= width).then_some(width)
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    let mut text: String = char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if bytes.len() % 2 != 0 {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}
