//! Read and write binary streams.
//!
//! # Overview
//!
//! A pair of cursor-based engines ([Writer] and [Reader]) that serialize fixed-layout values,
//! sequences and strings to and from any seekable [Store]. Each engine addresses the top frame
//! of a [Stack], so layers such as compression sections and mid-stream insertion are pushed on
//! top of the base store and removed again without the caller noticing.
//!
//! # Layout
//!
//! - Fixed-layout values ([FixedLayout]) are written flat, in the configured [Endian].
//! - Strings are `[length prefix][encoded bytes]`, or `[encoded bytes][0x00]` when terminated.
//! - Arrays and collections are `[length prefix][item]*`.
//! - Length prefixes are fixed-width integers, floats, or one of the self-sizing [Smart15] and
//!   [Smart62] encodings (see [LengthPrefix]).
//!
//! Nothing describes the layout in the stream itself: readers must mirror writers call for call.
//!
//! # Example
//!
//! ```
//! use strata::{Config, Endian, LengthPrefix, Memory, Reader, Writer};
//!
//! let config = Config::default().with_endian(Endian::BIG);
//!
//! let mut memory = Memory::new();
//! let mut writer = Writer::leave_open(&mut memory, config.clone());
//! writer.write(0x0102u16).unwrap();
//! writer.write_string("hello", LengthPrefix::Smart15).unwrap();
//! writer.write_array(&[1u32, 2, 3], LengthPrefix::U8).unwrap();
//! writer.close().unwrap();
//! drop(writer);
//! assert_eq!(&memory.as_slice()[..3], &[0x01, 0x02, 10]);
//!
//! let mut reader = Reader::new(Memory::from(memory.into_inner()), config);
//! assert_eq!(reader.read::<u16>().unwrap(), 0x0102);
//! assert_eq!(reader.read_string(LengthPrefix::Smart15).unwrap(), "hello");
//! assert_eq!(reader.read_array::<u32>(LengthPrefix::U8).unwrap(), vec![1, 2, 3]);
//! ```

pub mod compression;
pub mod config;
pub mod endian;
mod engine;
pub mod error;
pub mod layout;
#[cfg(feature = "serde")]
pub mod object;
pub mod prefix;
pub mod reader;
pub mod stack;
pub mod store;
pub mod text;
pub mod value;
pub mod writer;

// Re-export main types and traits
pub use compression::{Algorithm, CompressSection, DecompressSection};
pub use config::{Config, StringLength, Validation};
pub use endian::{BitOrder, ByteOrder, Endian};
pub use error::Error;
pub use layout::FixedLayout;
#[cfg(feature = "serde")]
pub use object::{JsonFormat, ObjectFormat};
pub use prefix::{LengthHandler, LengthPrefix, Smart15, Smart62};
pub use reader::Reader;
pub use stack::{Frame, Stack, StackId};
pub use store::{Memory, Store, SubView};
pub use text::TextEncoding;
pub use value::{Decode, Encode};
pub use writer::Writer;

/// Installs a subscriber that prints events to the test output.
#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}
