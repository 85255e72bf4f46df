//! Reading values from a [Stack].
//!
//! The mirror of [crate::Writer]: bytes are taken from the frame on top of the stack, the
//! configured [crate::Endian] transform is undone, and the canonical layout is parsed.

use crate::{
    compression::{Algorithm, DecompressSection},
    config::{Config, StringLength},
    engine::{impl_engine_accessors, Engine},
    layout::FixedLayout,
    prefix::{LengthPrefix, Smart15, Smart62},
    stack::{Frame, Role, Stack},
    store::{Memory, Store},
    text::TextEncoding,
    value::Decode,
    writer::TERMINATOR,
    Error,
};
use bytes::Bytes;
use std::io::SeekFrom;
use tracing::{debug, trace, warn};

/// Reads values from the active frame of a [Stack].
///
/// After [Reader::close] (or drop), every operation fails with [Error::Disposed].
pub struct Reader<'a> {
    engine: Engine<'a>,
}

impl_engine_accessors!(Reader);

impl<'a> Reader<'a> {
    /// Creates a reader that owns `store` and closes it on teardown.
    pub fn new(store: impl Store + 'a, config: Config) -> Self {
        Self::with_stack(Stack::new(store), config)
    }

    /// Creates a reader that leaves `store` open on teardown.
    pub fn leave_open(store: impl Store + 'a, config: Config) -> Self {
        Self::with_stack(Stack::leave_open(store), config)
    }

    /// Creates a reader over an existing stack.
    pub fn with_stack(stack: Stack<'a>, config: Config) -> Self {
        Self {
            engine: Engine::new(stack, config),
        }
    }

    /// Fills `buf` with one value's bytes, undoing the endian transform over all of them.
    pub fn read_raw(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.engine.take(buf.len(), |bytes| {
            buf.copy_from_slice(bytes);
            Ok(())
        })
    }

    /// Reads a fixed-layout value.
    pub fn read<T: FixedLayout>(&mut self) -> Result<T, Error> {
        self.engine.take(T::SIZE, T::load)
    }

    /// Reads `len` bytes untransformed.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, Error> {
        self.engine.take_bytes(len).map(Bytes::from)
    }

    /// Reads a length followed by that many bytes.
    pub fn read_prefixed_bytes(&mut self, prefix: LengthPrefix) -> Result<Bytes, Error> {
        let len = self.read_count(prefix)?;
        self.read_bytes(len)
    }

    /// Overwrites `value` through its own [Decode] implementation.
    pub fn read_into<T: Decode + ?Sized>(&mut self, value: &mut T) -> Result<(), Error> {
        value.decode_into(self)
    }

    /// Constructs a default `T` and populates it through its [Decode] implementation.
    pub fn read_new<T: Decode + Default>(&mut self) -> Result<T, Error> {
        let mut value = T::default();
        value.decode_into(self)?;
        Ok(value)
    }

    /// Reads a presence flag followed by the value, if any.
    pub fn read_option<T: Decode + Default>(&mut self) -> Result<Option<T>, Error> {
        if self.read::<bool>()? {
            return self.read_new().map(Some);
        }
        Ok(None)
    }

    /// Reads a length followed by that many items.
    pub fn read_array<T: Decode + Default>(&mut self, prefix: LengthPrefix) -> Result<Vec<T>, Error> {
        let count = self.read_count(prefix)?;
        self.read_array_exact(count)
    }

    /// Reads exactly `count` items (for arrays written with [LengthPrefix::None]).
    pub fn read_array_exact<T: Decode + Default>(&mut self, count: usize) -> Result<Vec<T>, Error> {
        // Never trust a decoded count with more capacity than the frame could fill
        let remaining = usize::try_from(self.engine.remaining()?).unwrap_or(usize::MAX);
        let mut items = Vec::with_capacity(count.min(remaining));
        for _ in 0..count {
            items.push(self.read_new()?);
        }
        Ok(items)
    }

    /// Reads a length followed by that many items into any collection.
    pub fn read_collection<T, C>(&mut self, prefix: LengthPrefix) -> Result<C, Error>
    where
        T: Decode + Default,
        C: FromIterator<T>,
    {
        Ok(self.read_array(prefix)?.into_iter().collect())
    }

    /// Reads a length-prefixed string in the configured encoding.
    pub fn read_string(&mut self, prefix: LengthPrefix) -> Result<String, Error> {
        let encoding = self.engine.config.encoding;
        self.read_string_with(prefix, encoding)
    }

    /// Reads a length-prefixed string in `encoding`.
    ///
    /// When lengths count characters and `encoding` is not fixed-width, the largest possible
    /// span is read, the characters are located within it, and the cursor is moved back to
    /// the end of the last one.
    pub fn read_string_with(
        &mut self,
        prefix: LengthPrefix,
        encoding: TextEncoding,
    ) -> Result<String, Error> {
        let length = self.read_count(prefix)?;
        let bytes = match (self.engine.config.string_length, encoding.fixed_width()) {
            (StringLength::Bytes, _) => self.engine.take_bytes(length)?,
            (StringLength::Chars, Some(width)) => {
                let len = length.checked_mul(width).ok_or_else(|| {
                    Error::DataCorruption(format!("string of {length} characters is too long"))
                })?;
                self.engine.take_bytes(len)?
            }
            (StringLength::Chars, None) => self.take_chars(length, encoding)?,
        };
        Ok(encoding.decode(&bytes))
    }

    /// Reads the bytes of `chars` characters of a variable-width encoding.
    fn take_chars(&mut self, chars: usize, encoding: TextEncoding) -> Result<Vec<u8>, Error> {
        let remaining = usize::try_from(self.engine.remaining()?).unwrap_or(usize::MAX);
        let span = chars
            .saturating_mul(encoding.max_bytes_per_char())
            .min(remaining);
        let mut bytes = self.engine.take_bytes(span)?;
        let used = encoding.prefix_len(&bytes, chars).ok_or_else(|| {
            Error::DataCorruption(format!(
                "could not recover {chars} {encoding:?} characters from {span} bytes"
            ))
        })?;
        let excess = (span - used) as i64;
        if excess > 0 {
            self.engine.seek(SeekFrom::Current(-excess))?;
        }
        bytes.truncate(used);
        Ok(bytes)
    }

    /// Reads a string in the configured encoding up to [TERMINATOR].
    pub fn read_terminated_string(&mut self) -> Result<String, Error> {
        let encoding = self.engine.config.encoding;
        self.read_terminated_string_with(encoding)
    }

    /// Reads a string in `encoding` up to [TERMINATOR]. The terminator is consumed.
    pub fn read_terminated_string_with(&mut self, encoding: TextEncoding) -> Result<String, Error> {
        let bytes = self.engine.take_until(TERMINATOR)?;
        Ok(encoding.decode(&bytes))
    }

    /// Reads a length written with `prefix`.
    ///
    /// Fails with [Error::DataCorruption] if the length exceeds the configured maximum by more
    /// than one.
    pub fn read_length_prefix(&mut self, prefix: LengthPrefix) -> Result<i64, Error> {
        let kind = prefix.resolve(self.engine.config.default_prefix);
        let value = match kind {
            LengthPrefix::None => {
                return Err(Error::InvalidOperation(
                    "a length written without a prefix cannot be read",
                ))
            }
            LengthPrefix::I8 => i64::from(self.read::<i8>()?),
            LengthPrefix::U8 => i64::from(self.read::<u8>()?),
            LengthPrefix::I16 => i64::from(self.read::<i16>()?),
            LengthPrefix::U16 => i64::from(self.read::<u16>()?),
            LengthPrefix::I32 => i64::from(self.read::<i32>()?),
            LengthPrefix::U32 => i64::from(self.read::<u32>()?),
            LengthPrefix::I64 => self.read::<i64>()?,
            LengthPrefix::U64 => {
                let value = self.read::<u64>()?;
                i64::try_from(value).map_err(|_| {
                    Error::DataCorruption(format!("length {value} does not fit an i64"))
                })?
            }
            LengthPrefix::F32 => self.read::<f32>()? as i64,
            LengthPrefix::F64 => self.read::<f64>()? as i64,
            LengthPrefix::Smart15 => i64::from(self.read_new::<Smart15>()?.0),
            LengthPrefix::Smart62 => self.read_new::<Smart62>()?.0 as i64,
            LengthPrefix::Custom => {
                let handler = self
                    .engine
                    .config
                    .length_handler
                    .clone()
                    .ok_or(Error::InvalidOperation("no custom length handler configured"))?;
                handler.read_length(self)?
            }
            LengthPrefix::Default => {
                return Err(Error::InvalidOperation(
                    "default length prefix is not configured",
                ))
            }
        };
        let max = self.engine.config.max_length;
        if value.saturating_sub(1) > max {
            return Err(Error::DataCorruption(format!(
                "length {value} exceeds the maximum of {max}"
            )));
        }
        Ok(value)
    }

    /// Reads a length and checks it can size a buffer.
    fn read_count(&mut self, prefix: LengthPrefix) -> Result<usize, Error> {
        let value = self.read_length_prefix(prefix)?;
        usize::try_from(value)
            .map_err(|_| Error::DataCorruption(format!("negative length {value}")))
    }

    /// Decompresses the next `length` bytes of the active frame and serves every following
    /// read from them until [Self::end_section].
    ///
    /// Decompression happens immediately, and the cursor of the frame below moves past the
    /// compressed bytes. A section that decompresses to more than the accepted maximum length
    /// fails with [Error::DataCorruption].
    pub fn begin_section(&mut self, algorithm: Algorithm, length: u64) -> Result<(), Error> {
        let span = usize::try_from(length)
            .map_err(|_| Error::DataCorruption(format!("section of {length} bytes")))?;
        self.engine.ensure(span)?;
        let limit = u64::try_from(self.engine.config.max_length)
            .unwrap_or(0)
            .saturating_add(1);
        let stack = self.engine.stack()?;
        let view = stack.sub_view(length)?;
        let end = view.end();
        let decompressed = algorithm.decompress(view, limit)?;
        stack.top_mut().store().set_position(end)?;
        debug!(
            ?algorithm,
            compressed = length,
            decompressed = decompressed.len(),
            "decompressed section"
        );

        let mut frame = Frame::new(stack, Memory::from(decompressed));
        frame.set_role(Role::Decompress);
        stack.push(frame)
    }

    /// Reads a length written with `prefix`, then begins a section of that many bytes.
    pub fn begin_prefixed_section(
        &mut self,
        algorithm: Algorithm,
        prefix: LengthPrefix,
    ) -> Result<(), Error> {
        let length = self.read_count(prefix)?;
        self.begin_section(algorithm, length as u64)
    }

    /// Begins a section covering everything after the cursor.
    pub fn decompress_to_end(&mut self, algorithm: Algorithm) -> Result<(), Error> {
        let length = self.engine.remaining()?;
        self.begin_section(algorithm, length)
    }

    /// Discards the active section.
    pub fn end_section(&mut self) -> Result<(), Error> {
        let stack = self.engine.stack()?;
        if stack.top().role() != Role::Decompress {
            return Err(Error::InvalidOperation("no decompression section in progress"));
        }
        stack.pop()?.dispose()?;
        trace!(depth = stack.depth(), "ended decompression section");
        Ok(())
    }

    /// Begins a section of `length` bytes and returns a guard that ends it.
    pub fn decompress(
        &mut self,
        algorithm: Algorithm,
        length: u64,
    ) -> Result<DecompressSection<'_, 'a>, Error> {
        self.begin_section(algorithm, length)?;
        let depth = self.engine.stack()?.depth();
        Ok(DecompressSection::new(self, depth))
    }

    /// Begins a length-prefixed section and returns a guard that ends it.
    pub fn decompress_prefixed(
        &mut self,
        algorithm: Algorithm,
        prefix: LengthPrefix,
    ) -> Result<DecompressSection<'_, 'a>, Error> {
        self.begin_prefixed_section(algorithm, prefix)?;
        let depth = self.engine.stack()?.depth();
        Ok(DecompressSection::new(self, depth))
    }

    pub(crate) fn end_section_at(&mut self, depth: usize) -> Result<(), Error> {
        if self.engine.stack()?.depth() != depth {
            return Err(Error::InvalidOperation("section is not the active frame"));
        }
        self.end_section()
    }

    /// Discards every pending section, then releases all frames.
    ///
    /// Closing a closed reader does nothing.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.engine.is_disposed() {
            return Ok(());
        }
        self.engine.dispose()
    }
}

impl Drop for Reader<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(?err, "failed to close reader");
        }
    }
}
