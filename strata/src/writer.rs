//! Writing values to a [Stack].
//!
//! Typed values flow downward: a value is laid out in the scratch buffer, transformed to the
//! configured [crate::Endian], then written to whatever frame is on top of the stack.

use crate::{
    compression::{Algorithm, CompressSection},
    config::{Config, StringLength},
    engine::{impl_engine_accessors, Engine},
    layout::FixedLayout,
    prefix::{LengthPrefix, Smart15, Smart62},
    stack::{Role, Stack},
    store::Store,
    text::TextEncoding,
    value::Encode,
    Error,
};
use tracing::{debug, trace, warn};

/// Byte written after a terminated string.
pub const TERMINATOR: u8 = 0;

/// Writes values to the active frame of a [Stack].
///
/// The writer must be closed (explicitly with [Writer::close] or implicitly on drop) to flush
/// pending sections and insertions. After closing, every operation fails with
/// [Error::Disposed].
pub struct Writer<'a> {
    engine: Engine<'a>,
}

impl_engine_accessors!(Writer);

impl<'a> Writer<'a> {
    /// Creates a writer that owns `store` and closes it on teardown.
    pub fn new(store: impl Store + 'a, config: Config) -> Self {
        Self::with_stack(Stack::new(store), config)
    }

    /// Creates a writer that leaves `store` open on teardown.
    pub fn leave_open(store: impl Store + 'a, config: Config) -> Self {
        Self::with_stack(Stack::leave_open(store), config)
    }

    /// Creates a writer over an existing stack.
    pub fn with_stack(stack: Stack<'a>, config: Config) -> Self {
        Self {
            engine: Engine::new(stack, config),
        }
    }

    /// Truncates or extends the active frame.
    pub fn set_len(&mut self, len: u64) -> Result<(), Error> {
        self.engine.set_len(len)
    }

    /// Flushes the active frame's store.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.engine.flush()
    }

    /// Writes `bytes` as a single value, applying the endian transform to all of them.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.engine
            .emit(bytes.len(), |buf| buf.copy_from_slice(bytes))
    }

    /// Writes a fixed-layout value.
    pub fn write<T: FixedLayout>(&mut self, value: T) -> Result<(), Error> {
        self.engine.emit(T::SIZE, |buf| value.store(buf))
    }

    /// Writes `bytes` untransformed and without a length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.engine.emit_bytes(bytes)
    }

    /// Writes the length of `bytes` followed by `bytes`.
    pub fn write_prefixed_bytes(&mut self, bytes: &[u8], prefix: LengthPrefix) -> Result<(), Error> {
        self.write_length_prefix(length_of(bytes.len(), prefix)?, prefix)?;
        self.write_bytes(bytes)
    }

    /// Writes a value through its own [Encode] implementation.
    pub fn write_value<T: Encode + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        value.encode(self)
    }

    /// Writes a presence flag followed by the value, if any.
    pub fn write_option<T: Encode>(&mut self, value: Option<&T>) -> Result<(), Error> {
        self.write(value.is_some())?;
        match value {
            Some(value) => value.encode(self),
            None => Ok(()),
        }
    }

    /// Writes the length of `items` followed by every item.
    pub fn write_array<T: Encode>(&mut self, items: &[T], prefix: LengthPrefix) -> Result<(), Error> {
        self.write_collection(items, prefix)
    }

    /// Writes the length of `items` followed by every item, in iteration order.
    pub fn write_collection<'i, T, I>(&mut self, items: I, prefix: LengthPrefix) -> Result<(), Error>
    where
        T: Encode + 'i,
        I: IntoIterator<Item = &'i T>,
        I::IntoIter: ExactSizeIterator,
    {
        let items = items.into_iter();
        self.write_length_prefix(length_of(items.len(), prefix)?, prefix)?;
        for item in items {
            item.encode(self)?;
        }
        Ok(())
    }

    /// Writes `text` in the configured encoding, preceded by its length.
    pub fn write_string(&mut self, text: &str, prefix: LengthPrefix) -> Result<(), Error> {
        let encoding = self.engine.config.encoding;
        self.write_string_with(text, prefix, encoding)
    }

    /// Writes `text` in `encoding`, preceded by its length.
    ///
    /// The length counts bytes or characters according to [Config::string_length].
    pub fn write_string_with(
        &mut self,
        text: &str,
        prefix: LengthPrefix,
        encoding: TextEncoding,
    ) -> Result<(), Error> {
        self.engine.stack()?;
        let bytes = encoding.encode(text);
        if self.engine.config.validate.encoding && encoding.decode(&bytes) != text {
            return Err(Error::EncodingFidelity(encoding));
        }
        let length = match self.engine.config.string_length {
            StringLength::Bytes => bytes.len(),
            StringLength::Chars => text.chars().count(),
        };
        self.write_length_prefix(length_of(length, prefix)?, prefix)?;
        self.write_bytes(&bytes)
    }

    /// Writes `text` in the configured encoding, followed by [TERMINATOR].
    pub fn write_terminated_string(&mut self, text: &str) -> Result<(), Error> {
        let encoding = self.engine.config.encoding;
        self.write_terminated_string_with(text, encoding)
    }

    /// Writes `text` in `encoding`, followed by [TERMINATOR].
    pub fn write_terminated_string_with(
        &mut self,
        text: &str,
        encoding: TextEncoding,
    ) -> Result<(), Error> {
        self.engine.stack()?;
        let bytes = encoding.encode(text);
        if self.engine.config.validate.terminator {
            if let Some(index) = bytes.iter().position(|&b| b == TERMINATOR) {
                return Err(Error::EmbeddedTerminator(index));
            }
        }
        self.write_bytes(&bytes)?;
        self.write_bytes(&[TERMINATOR])
    }

    /// Writes `value` as a length using `prefix`.
    ///
    /// With length validation enabled, a value that does not fit `prefix` fails with
    /// [Error::InvalidCast] before anything is written. Otherwise it is truncated to the
    /// prefix width. Smart prefixes always reject out-of-range values.
    pub fn write_length_prefix(&mut self, value: i64, prefix: LengthPrefix) -> Result<(), Error> {
        let kind = prefix.resolve(self.engine.config.default_prefix);
        if self.engine.config.validate.lengths && !kind.fits(value) {
            return Err(Error::InvalidCast { kind, value });
        }
        match kind {
            LengthPrefix::None => self.engine.stack().map(|_| ()),
            LengthPrefix::I8 => self.write(value as i8),
            LengthPrefix::U8 => self.write(value as u8),
            LengthPrefix::I16 => self.write(value as i16),
            LengthPrefix::U16 => self.write(value as u16),
            LengthPrefix::I32 => self.write(value as i32),
            LengthPrefix::U32 => self.write(value as u32),
            LengthPrefix::I64 => self.write(value),
            LengthPrefix::U64 => self.write(value as u64),
            LengthPrefix::F32 => self.write(value as f32),
            LengthPrefix::F64 => self.write(value as f64),
            LengthPrefix::Smart15 => Smart15::try_from(value)?.encode(self),
            LengthPrefix::Smart62 => Smart62::try_from(value)?.encode(self),
            LengthPrefix::Custom => {
                let handler = self
                    .engine
                    .config
                    .length_handler
                    .clone()
                    .ok_or(Error::InvalidOperation("no custom length handler configured"))?;
                handler.write_length(self, value)
            }
            LengthPrefix::Default => Err(Error::InvalidOperation(
                "default length prefix is not configured",
            )),
        }
    }

    /// Starts staging bytes to be inserted at the current position.
    ///
    /// Everything written until [Self::end_insert] is spliced into the active frame at the
    /// current position, shifting the bytes after it.
    pub fn begin_insert(&mut self) -> Result<(), Error> {
        let at = self.engine.position()?;
        let stack = self.engine.stack()?;
        stack.create().set_role(Role::Insert { at });
        trace!(at, "began insert");
        Ok(())
    }

    /// Splices the staged bytes into the frame below.
    pub fn end_insert(&mut self) -> Result<(), Error> {
        let stack = self.engine.stack()?;
        let Role::Insert { at } = stack.top().role() else {
            return Err(Error::InvalidOperation("no insert in progress"));
        };
        let staged = stack.pop()?.into_bytes()?;
        stack.top_mut().store().set_position(at)?;
        stack.insert_into_top(&staged)
    }

    /// Starts a compression section. Everything written until [Self::end_section] is
    /// compressed with `algorithm` at `level`.
    ///
    /// With a `prefix`, the compressed length is written before the compressed bytes.
    pub fn begin_section(
        &mut self,
        algorithm: Algorithm,
        level: i32,
        prefix: Option<LengthPrefix>,
    ) -> Result<(), Error> {
        let stack = self.engine.stack()?;
        stack.create().set_role(Role::Compress {
            algorithm,
            level,
            prefix,
        });
        trace!(?algorithm, level, depth = stack.depth(), "began compression section");
        Ok(())
    }

    /// Compresses the active section into the frame below.
    ///
    /// Nothing reaches the frame below unless compression succeeds.
    pub fn end_section(&mut self) -> Result<(), Error> {
        let stack = self.engine.stack()?;
        let Role::Compress {
            algorithm,
            level,
            prefix,
        } = stack.top().role()
        else {
            return Err(Error::InvalidOperation("no compression section in progress"));
        };
        let raw = stack.pop()?.into_bytes()?;
        let compressed = algorithm.compress(&raw, level)?;
        if let Some(prefix) = prefix {
            self.write_length_prefix(length_of(compressed.len(), prefix)?, prefix)?;
        }
        self.engine
            .stack()?
            .copy_into_top(&mut compressed.as_slice(), false)?;
        debug!(
            ?algorithm,
            raw = raw.len(),
            compressed = compressed.len(),
            "flushed compression section"
        );
        Ok(())
    }

    /// Starts a compression section that ends when the writer is closed.
    pub fn compress_to_end(&mut self, algorithm: Algorithm, level: i32) -> Result<(), Error> {
        self.begin_section(algorithm, level, None)
    }

    /// Starts a compression section and returns a guard that ends it.
    pub fn compress(
        &mut self,
        algorithm: Algorithm,
        level: i32,
        prefix: Option<LengthPrefix>,
    ) -> Result<CompressSection<'_, 'a>, Error> {
        self.begin_section(algorithm, level, prefix)?;
        let depth = self.engine.stack()?.depth();
        Ok(CompressSection::new(self, depth))
    }

    pub(crate) fn end_section_at(&mut self, depth: usize) -> Result<(), Error> {
        if self.engine.stack()?.depth() != depth {
            return Err(Error::InvalidOperation("section is not the active frame"));
        }
        self.end_section()
    }

    /// Ends the frame on top of the stack according to its role.
    fn end_frame(&mut self) -> Result<(), Error> {
        let role = self.engine.stack()?.top().role();
        match role {
            Role::Insert { .. } => self.end_insert(),
            Role::Compress { .. } => self.end_section(),
            Role::Plain | Role::Decompress => self.engine.stack()?.pop()?.dispose(),
        }
    }

    /// Ends every pending insert and section (top first), then releases all frames.
    ///
    /// Teardown runs exactly once and continues past failures; the first error is returned.
    /// Closing a closed writer does nothing.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.engine.is_disposed() {
            return Ok(());
        }
        let mut result = Ok(());
        loop {
            let depth = self.engine.stack()?.depth();
            if depth <= 1 {
                break;
            }
            if let Err(err) = self.end_frame() {
                if result.is_ok() {
                    result = Err(err);
                }
                // A failure before the pop leaves the frame in place; the drain releases it
                if self.engine.stack()?.depth() == depth {
                    break;
                }
            }
        }
        let released = self.engine.dispose();
        result.and(released)
    }
}

impl Drop for Writer<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(?err, "failed to close writer");
        }
    }
}

/// Converts a collection length for `prefix`.
fn length_of(len: usize, prefix: LengthPrefix) -> Result<i64, Error> {
    i64::try_from(len).map_err(|_| Error::InvalidCast {
        kind: prefix,
        value: i64::MAX,
    })
}
