//! Whole-object serialization through `serde`.
//!
//! An escape hatch for values that do not implement [crate::Encode] / [crate::Decode]. The
//! object is converted to a self-describing document, rendered by the configured
//! [ObjectFormat] and stored as a length-prefixed blob. This is far larger and slower than the
//! flat layout and is never used by the engines themselves.
//!
//! # Example
//!
//! ```
//! use std::{collections::BTreeMap, sync::Arc};
//! use strata::{Config, JsonFormat, LengthPrefix, Memory, Reader, Writer};
//!
//! let config = Config::default().with_object_format(Arc::new(JsonFormat));
//! let value = BTreeMap::from([("a".to_string(), 1u32)]);
//!
//! let mut memory = Memory::new();
//! let mut writer = Writer::leave_open(&mut memory, config.clone());
//! writer.write_object(&value, LengthPrefix::U16).unwrap();
//! writer.close().unwrap();
//! drop(writer);
//!
//! let mut reader = Reader::new(Memory::from(memory.into_inner()), config);
//! let decoded: BTreeMap<String, u32> = reader.read_object(LengthPrefix::U16).unwrap();
//! assert_eq!(decoded, value);
//! ```

use crate::{prefix::LengthPrefix, Error, Reader, Writer};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;

/// Renders documents to bytes and back.
pub trait ObjectFormat: Send + Sync + fmt::Debug {
    fn to_bytes(&self, document: &Value) -> Result<Vec<u8>, Error>;

    fn from_bytes(&self, bytes: &[u8]) -> Result<Value, Error>;
}

/// Compact JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonFormat;

impl ObjectFormat for JsonFormat {
    fn to_bytes(&self, document: &Value) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(document).map_err(|err| Error::Object(err.to_string()))
    }

    fn from_bytes(&self, bytes: &[u8]) -> Result<Value, Error> {
        serde_json::from_slice(bytes).map_err(|err| Error::Object(err.to_string()))
    }
}

const NO_FORMAT: &str = "no object format configured";

impl Writer<'_> {
    /// Serializes `value` with the configured [ObjectFormat] as a blob preceded by its length.
    pub fn write_object<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
        prefix: LengthPrefix,
    ) -> Result<(), Error> {
        let format = self
            .config()?
            .object_format
            .clone()
            .ok_or(Error::InvalidOperation(NO_FORMAT))?;
        let document = serde_json::to_value(value).map_err(|err| Error::Object(err.to_string()))?;
        let bytes = format.to_bytes(&document)?;
        self.write_prefixed_bytes(&bytes, prefix)
    }
}

impl Reader<'_> {
    /// Deserializes a value written by [Writer::write_object].
    pub fn read_object<T: DeserializeOwned>(&mut self, prefix: LengthPrefix) -> Result<T, Error> {
        let format = self
            .config()?
            .object_format
            .clone()
            .ok_or(Error::InvalidOperation(NO_FORMAT))?;
        let bytes = self.read_prefixed_bytes(prefix)?;
        let document = format.from_bytes(&bytes)?;
        serde_json::from_value(document).map_err(|err| Error::Object(err.to_string()))
    }
}
