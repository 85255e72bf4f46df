//! Values that know how to write and read themselves.
//!
//! Any type can take part in the array, collection and option machinery of the engines by
//! implementing [Encode] and [Decode]. Every [FixedLayout] type does so automatically.
//!
//! # Example
//!
//! ```
//! use strata::{Config, Decode, Encode, Error, LengthPrefix, Memory, Reader, Writer};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Item {
//!     id: u32,
//!     name: String,
//! }
//!
//! impl Encode for Item {
//!     fn encode(&self, writer: &mut Writer<'_>) -> Result<(), Error> {
//!         writer.write(self.id)?;
//!         writer.write_string(&self.name, LengthPrefix::Smart15)
//!     }
//! }
//!
//! impl Decode for Item {
//!     fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), Error> {
//!         self.id = reader.read()?;
//!         self.name = reader.read_string(LengthPrefix::Smart15)?;
//!         Ok(())
//!     }
//! }
//!
//! let mut memory = Memory::new();
//! let items = vec![Item { id: 1, name: "a".into() }, Item { id: 2, name: "bc".into() }];
//!
//! let mut writer = Writer::leave_open(&mut memory, Config::default());
//! writer.write_array(&items, LengthPrefix::U8).unwrap();
//! writer.close().unwrap();
//! drop(writer);
//!
//! let mut reader = Reader::new(Memory::from(memory.into_inner()), Config::default());
//! let decoded: Vec<Item> = reader.read_array(LengthPrefix::U8).unwrap();
//! assert_eq!(decoded, items);
//! ```

use crate::{layout::FixedLayout, Error, Reader, Writer};

/// A value that can write itself to a [Writer].
pub trait Encode {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<(), Error>;
}

/// A value that can populate itself from a [Reader].
pub trait Decode {
    /// Overwrites `self` with a value read from `reader`.
    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), Error>;
}

impl<T: FixedLayout> Encode for T {
    #[inline]
    fn encode(&self, writer: &mut Writer<'_>) -> Result<(), Error> {
        writer.write(*self)
    }
}

impl<T: FixedLayout> Decode for T {
    #[inline]
    fn decode_into(&mut self, reader: &mut Reader<'_>) -> Result<(), Error> {
        *self = reader.read()?;
        Ok(())
    }
}
