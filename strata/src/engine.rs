//! State shared by [crate::Writer] and [crate::Reader].

use crate::{
    config::Config,
    endian::{self, Endian},
    stack::Stack,
    Error,
};
use std::io::SeekFrom;

/// Cursor, scratch buffer and configuration over a [Stack].
pub(crate) struct Engine<'a> {
    stack: Stack<'a>,
    scratch: Vec<u8>,
    pub(crate) config: Config,
    reorder_bytes: bool,
    reorder_bits: bool,
    disposed: bool,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(stack: Stack<'a>, config: Config) -> Self {
        let mut engine = Self {
            stack,
            scratch: vec![0; config.scratch_capacity],
            config,
            reorder_bytes: false,
            reorder_bits: false,
            disposed: false,
        };
        engine.apply_endian(engine.config.endian);
        engine
    }

    pub(crate) fn stack(&mut self) -> Result<&mut Stack<'a>, Error> {
        self.active()?;
        Ok(&mut self.stack)
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Releases every frame of the stack. Runs at most once; later calls are no-ops.
    pub(crate) fn dispose(&mut self) -> Result<(), Error> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.stack.release_all()
    }

    /// Fails with [Error::Disposed] once the engine is closed.
    fn active(&self) -> Result<(), Error> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    pub(crate) fn config(&self) -> Result<&Config, Error> {
        self.active()?;
        Ok(&self.config)
    }

    pub(crate) fn config_mut(&mut self) -> Result<&mut Config, Error> {
        self.active()?;
        Ok(&mut self.config)
    }

    pub(crate) fn set_endian(&mut self, endian: Endian) -> Result<(), Error> {
        self.active()?;
        self.apply_endian(endian);
        Ok(())
    }

    fn apply_endian(&mut self, endian: Endian) {
        self.config.endian = endian;
        self.reorder_bytes = endian.needs_byte_reorder();
        self.reorder_bits = endian.needs_bit_reorder();
    }

    pub(crate) fn needs_byte_reorder(&self) -> Result<bool, Error> {
        self.active()?;
        Ok(self.reorder_bytes)
    }

    pub(crate) fn needs_bit_reorder(&self) -> Result<bool, Error> {
        self.active()?;
        Ok(self.reorder_bits)
    }

    pub(crate) fn scratch_capacity(&self) -> Result<usize, Error> {
        self.active()?;
        Ok(self.scratch.len())
    }

    pub(crate) fn position(&mut self) -> Result<u64, Error> {
        Ok(self.stack()?.top_mut().store().position()?)
    }

    pub(crate) fn set_position(&mut self, position: u64) -> Result<(), Error> {
        Ok(self.stack()?.top_mut().store().set_position(position)?)
    }

    pub(crate) fn len(&mut self) -> Result<u64, Error> {
        Ok(self.stack()?.top_mut().store().len()?)
    }

    pub(crate) fn set_len(&mut self, len: u64) -> Result<(), Error> {
        Ok(self.stack()?.top_mut().store().set_len(len)?)
    }

    pub(crate) fn remaining(&mut self) -> Result<u64, Error> {
        let store = self.stack()?.top_mut().store();
        let position = store.position()?;
        Ok(store.len()?.saturating_sub(position))
    }

    pub(crate) fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error> {
        Ok(self.stack()?.top_mut().store().seek(pos)?)
    }

    pub(crate) fn flush(&mut self) -> Result<(), Error> {
        Ok(self.stack()?.top_mut().store().flush()?)
    }

    /// Writes one `size`-byte value produced by `fill`, applying the endian transform.
    pub(crate) fn emit(&mut self, size: usize, fill: impl FnOnce(&mut [u8])) -> Result<(), Error> {
        self.active()?;
        let store = self.stack.top_mut().store();

        // Single bytes never need reordering, only bit reversal
        if size == 1 {
            let mut byte = [0u8];
            fill(&mut byte);
            if self.reorder_bits {
                byte[0] = endian::reverse_bits(byte[0]);
            }
            store.write_all(&byte)?;
            return Ok(());
        }

        if self.scratch.len() < size {
            self.scratch.resize(size, 0);
        }
        let buf = &mut self.scratch[..size];
        fill(buf);
        if self.reorder_bytes || self.reorder_bits {
            endian::transform(buf, self.reorder_bytes, self.reorder_bits);
        }
        store.write_all(buf)?;
        Ok(())
    }

    /// Writes `bytes` as-is.
    pub(crate) fn emit_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.stack()?.top_mut().store().write_all(bytes)?;
        Ok(())
    }

    /// Fails with [Error::EndOfStream] if fewer than `size` bytes remain and the guard is on.
    pub(crate) fn ensure(&mut self, size: usize) -> Result<(), Error> {
        if !self.config.validate.end_of_stream {
            return Ok(());
        }
        let remaining = self.remaining()?;
        let size = size as u64;
        if size > remaining {
            return Err(Error::EndOfStream {
                overrun: size - remaining,
            });
        }
        Ok(())
    }

    /// Reads one `size`-byte value, undoes the endian transform and hands it to `parse`.
    pub(crate) fn take<T>(
        &mut self,
        size: usize,
        parse: impl FnOnce(&[u8]) -> Result<T, Error>,
    ) -> Result<T, Error> {
        self.active()?;
        self.ensure(size)?;
        let store = self.stack.top_mut().store();

        if size == 1 {
            let mut byte = [0u8];
            store.read_exact(&mut byte)?;
            if self.reorder_bits {
                byte[0] = endian::reverse_bits(byte[0]);
            }
            return parse(&byte);
        }

        if self.scratch.len() < size {
            self.scratch.resize(size, 0);
        }
        let buf = &mut self.scratch[..size];
        store.read_exact(buf)?;
        if self.reorder_bytes || self.reorder_bits {
            endian::transform(buf, self.reorder_bytes, self.reorder_bits);
        }
        parse(buf)
    }

    /// Reads `len` bytes as-is.
    pub(crate) fn take_bytes(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        self.ensure(len)?;
        let mut bytes = vec![0u8; len];
        self.stack()?.top_mut().store().read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Reads bytes as-is up to and including `terminator`, returning them without it.
    pub(crate) fn take_until(&mut self, terminator: u8) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::new();
        let mut byte = [0u8];
        loop {
            self.ensure(1)?;
            self.stack()?.top_mut().store().read_exact(&mut byte)?;
            if byte[0] == terminator {
                return Ok(bytes);
            }
            bytes.push(byte[0]);
        }
    }
}

/// Generates the cursor and configuration accessors shared by both engines.
macro_rules! impl_engine_accessors {
    ($type:ident) => {
        impl<'a> $type<'a> {
            /// Returns the stack the engine operates on.
            pub fn stack(&mut self) -> Result<&mut $crate::Stack<'a>, $crate::Error> {
                self.engine.stack()
            }

            /// Returns true once [Self::close] has run.
            pub fn is_disposed(&self) -> bool {
                self.engine.is_disposed()
            }

            /// Returns the current configuration.
            pub fn config(&self) -> Result<&$crate::Config, $crate::Error> {
                self.engine.config()
            }

            /// Position within the active frame.
            pub fn position(&mut self) -> Result<u64, $crate::Error> {
                self.engine.position()
            }

            /// Moves the position within the active frame.
            pub fn set_position(&mut self, position: u64) -> Result<(), $crate::Error> {
                self.engine.set_position(position)
            }

            /// Length of the active frame.
            pub fn len(&mut self) -> Result<u64, $crate::Error> {
                self.engine.len()
            }

            /// Returns true if the active frame is empty.
            pub fn is_empty(&mut self) -> Result<bool, $crate::Error> {
                Ok(self.engine.len()? == 0)
            }

            /// Bytes between the position and the end of the active frame.
            pub fn remaining(&mut self) -> Result<u64, $crate::Error> {
                self.engine.remaining()
            }

            /// Seeks within the active frame.
            pub fn seek(&mut self, pos: std::io::SeekFrom) -> Result<u64, $crate::Error> {
                self.engine.seek(pos)
            }

            /// Current size of the scratch buffer. It grows to the largest single value
            /// seen and never shrinks.
            pub fn scratch_capacity(&self) -> Result<usize, $crate::Error> {
                self.engine.scratch_capacity()
            }

            pub fn endian(&self) -> Result<$crate::Endian, $crate::Error> {
                Ok(self.engine.config()?.endian)
            }

            pub fn set_endian(&mut self, endian: $crate::Endian) -> Result<(), $crate::Error> {
                self.engine.set_endian(endian)
            }

            pub fn needs_byte_reorder(&self) -> Result<bool, $crate::Error> {
                self.engine.needs_byte_reorder()
            }

            pub fn needs_bit_reorder(&self) -> Result<bool, $crate::Error> {
                self.engine.needs_bit_reorder()
            }

            pub fn needs_reorder(&self) -> Result<bool, $crate::Error> {
                Ok(self.engine.needs_byte_reorder()? || self.engine.needs_bit_reorder()?)
            }

            pub fn set_encoding(
                &mut self,
                encoding: $crate::TextEncoding,
            ) -> Result<(), $crate::Error> {
                self.engine.config_mut()?.encoding = encoding;
                Ok(())
            }

            pub fn set_default_prefix(
                &mut self,
                prefix: $crate::LengthPrefix,
            ) -> Result<(), $crate::Error> {
                self.engine.config_mut()?.default_prefix = prefix;
                Ok(())
            }

            pub fn set_string_length(
                &mut self,
                string_length: $crate::StringLength,
            ) -> Result<(), $crate::Error> {
                self.engine.config_mut()?.string_length = string_length;
                Ok(())
            }

            pub fn set_validation(
                &mut self,
                validate: $crate::Validation,
            ) -> Result<(), $crate::Error> {
                self.engine.config_mut()?.validate = validate;
                Ok(())
            }

            pub fn set_max_length(&mut self, max_length: i64) -> Result<(), $crate::Error> {
                self.engine.config_mut()?.max_length = max_length;
                Ok(())
            }
        }
    };
}

pub(crate) use impl_engine_accessors;
