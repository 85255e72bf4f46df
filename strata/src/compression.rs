//! Compression sections.
//!
//! A section is a span of the stream passed through a compressor. On the write side, a section
//! is a fresh in-memory frame: everything written while it is on top is buffered, and ending the
//! section compresses the buffer and copies the result (optionally preceded by its length) into
//! the frame below. On the read side, beginning a section eagerly decompresses a span of the
//! active frame into a fresh in-memory frame that then serves all reads until the section ends.
//!
//! Sections nest: each operates purely on its own frame, so inner sections are flushed into
//! outer ones as they end.
//!
//! # Example
//!
//! ```
//! use strata::{Algorithm, Config, LengthPrefix, Memory, Reader, Writer};
//!
//! let mut memory = Memory::new();
//! let mut writer = Writer::leave_open(&mut memory, Config::default());
//! writer.write(7u8).unwrap();
//! let mut section = writer.compress(Algorithm::Zstd, 3, Some(LengthPrefix::U32)).unwrap();
//! section.write_bytes(&[42; 1024]).unwrap();
//! section.finish().unwrap();
//! writer.close().unwrap();
//! drop(writer);
//! assert!(memory.as_slice().len() < 1024);
//!
//! let mut reader = Reader::new(Memory::from(memory.into_inner()), Config::default());
//! assert_eq!(reader.read::<u8>().unwrap(), 7);
//! let mut section = reader.decompress_prefixed(Algorithm::Zstd, LengthPrefix::U32).unwrap();
//! assert_eq!(&section.read_bytes(1024).unwrap()[..], &[42; 1024][..]);
//! section.finish().unwrap();
//! ```

use crate::{Error, Reader, Writer};
use flate2::{
    read::{DeflateDecoder, GzDecoder, ZlibDecoder},
    write::{DeflateEncoder, GzEncoder, ZlibEncoder},
    Compression,
};
use std::{
    io::{self, Read, Write},
    ops::{Deref, DerefMut},
};
use tracing::warn;

/// Compression algorithm applied to a section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Raw DEFLATE.
    Deflate,
    /// DEFLATE with a zlib header and checksum.
    Zlib,
    /// DEFLATE with a gzip header and checksum.
    Gzip,
    Zstd,
}

impl Algorithm {
    /// Compresses `data` in full.
    ///
    /// For the DEFLATE family, `level` must be in `0..=9` (anything else selects the default
    /// level). For zstd, `level` is passed through (`0` selects the default level).
    pub fn compress(self, data: &[u8], level: i32) -> Result<Vec<u8>, Error> {
        let flate_level = || {
            u32::try_from(level)
                .ok()
                .filter(|level| *level <= 9)
                .map(Compression::new)
                .unwrap_or_default()
        };
        let result = match self {
            Self::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), flate_level());
                encoder.write_all(data).and_then(|_| encoder.finish())
            }
            Self::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), flate_level());
                encoder.write_all(data).and_then(|_| encoder.finish())
            }
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate_level());
                encoder.write_all(data).and_then(|_| encoder.finish())
            }
            Self::Zstd => zstd::bulk::compress(data, level),
        };
        result.map_err(|err| Error::Compression(format!("{self:?}: {err}")))
    }

    /// Decompresses everything `input` yields.
    ///
    /// Fails with [Error::DataCorruption] once the output grows past `limit` bytes, without
    /// decoding the rest.
    pub fn decompress(self, input: impl Read, limit: u64) -> Result<Vec<u8>, Error> {
        let result = match self {
            Self::Deflate => read_bounded(DeflateDecoder::new(input), limit),
            Self::Zlib => read_bounded(ZlibDecoder::new(input), limit),
            Self::Gzip => read_bounded(GzDecoder::new(input), limit),
            Self::Zstd => zstd::stream::read::Decoder::new(input)
                .and_then(|decoder| read_bounded(decoder, limit)),
        };
        let output = result.map_err(|err| Error::Compression(format!("{self:?}: {err}")))?;
        if output.len() as u64 > limit {
            return Err(Error::DataCorruption(format!(
                "{self:?} section decompresses past {limit} bytes"
            )));
        }
        Ok(output)
    }
}

/// Reads at most `limit + 1` bytes from `decoder`, enough to tell whether it exceeds `limit`.
fn read_bounded(decoder: impl Read, limit: u64) -> io::Result<Vec<u8>> {
    let mut output = Vec::new();
    decoder
        .take(limit.saturating_add(1))
        .read_to_end(&mut output)?;
    Ok(output)
}

/// A write-side section that is flushed when finished or dropped.
///
/// Dereferences to the [Writer], so everything written through the guard lands in the section.
/// Dropping the guard finishes the section but can only log a failure; call [Self::finish] to
/// observe it.
pub struct CompressSection<'w, 'a> {
    writer: &'w mut Writer<'a>,
    depth: usize,
    done: bool,
}

impl<'w, 'a> CompressSection<'w, 'a> {
    pub(crate) fn new(writer: &'w mut Writer<'a>, depth: usize) -> Self {
        Self {
            writer,
            depth,
            done: false,
        }
    }

    /// Compresses the section into the frame below.
    ///
    /// Fails with [Error::InvalidOperation] if the section is no longer the active frame.
    pub fn finish(mut self) -> Result<(), Error> {
        self.done = true;
        self.writer.end_section_at(self.depth)
    }
}

impl<'a> Deref for CompressSection<'_, 'a> {
    type Target = Writer<'a>;

    fn deref(&self) -> &Self::Target {
        self.writer
    }
}

impl<'a> DerefMut for CompressSection<'_, 'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.writer
    }
}

impl Drop for CompressSection<'_, '_> {
    fn drop(&mut self) {
        if self.done || self.writer.is_disposed() {
            return;
        }
        if let Err(err) = self.writer.end_section_at(self.depth) {
            warn!(?err, "failed to finish compression section");
        }
    }
}

/// A read-side section that is discarded when finished or dropped.
///
/// Dereferences to the [Reader], so every read through the guard is served from the
/// decompressed bytes.
pub struct DecompressSection<'r, 'a> {
    reader: &'r mut Reader<'a>,
    depth: usize,
    done: bool,
}

impl<'r, 'a> DecompressSection<'r, 'a> {
    pub(crate) fn new(reader: &'r mut Reader<'a>, depth: usize) -> Self {
        Self {
            reader,
            depth,
            done: false,
        }
    }

    /// Discards the section.
    ///
    /// Fails with [Error::InvalidOperation] if the section is no longer the active frame.
    pub fn finish(mut self) -> Result<(), Error> {
        self.done = true;
        self.reader.end_section_at(self.depth)
    }
}

impl<'a> Deref for DecompressSection<'_, 'a> {
    type Target = Reader<'a>;

    fn deref(&self) -> &Self::Target {
        self.reader
    }
}

impl<'a> DerefMut for DecompressSection<'_, 'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.reader
    }
}

impl Drop for DecompressSection<'_, '_> {
    fn drop(&mut self) {
        if self.done || self.reader.is_disposed() {
            return;
        }
        if let Err(err) = self.reader.end_section_at(self.depth) {
            warn!(?err, "failed to finish decompression section");
        }
    }
}
