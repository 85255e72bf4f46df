//! Backing stores and bounded views over them.
//!
//! A [Store] is any seekable byte container that also knows (and can change) its length. The
//! engines only ever touch the store at the top of their [crate::Stack].

use bytes::Bytes;
use std::{
    fs::File,
    io::{self, Cursor, Read, Seek, SeekFrom, Write},
};

/// The capability set the engines require from a byte container.
pub trait Store: Read + Write + Seek {
    /// Returns the length of the store in bytes.
    fn len(&mut self) -> io::Result<u64>;

    /// Truncates or extends (with zeroes) the store to `len` bytes.
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    /// Returns true if the store holds no bytes.
    fn is_empty(&mut self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the current position.
    fn position(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    /// Moves the current position to `position`.
    fn set_position(&mut self, position: u64) -> io::Result<()> {
        self.seek(SeekFrom::Start(position)).map(|_| ())
    }

    /// Flushes and releases any resources held by the store.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl<S: Store + ?Sized> Store for &mut S {
    fn len(&mut self) -> io::Result<u64> {
        (**self).len()
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        (**self).set_len(len)
    }

    fn position(&mut self) -> io::Result<u64> {
        (**self).position()
    }

    fn set_position(&mut self, position: u64) -> io::Result<()> {
        (**self).set_position(position)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn len(&mut self) -> io::Result<u64> {
        (**self).len()
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        (**self).set_len(len)
    }

    fn position(&mut self) -> io::Result<u64> {
        (**self).position()
    }

    fn set_position(&mut self, position: u64) -> io::Result<()> {
        (**self).set_position(position)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl Store for File {
    fn len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl Store for Cursor<Vec<u8>> {
    fn len(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len).map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
        self.get_mut().resize(len, 0);
        Ok(())
    }
}

/// A growable in-memory store.
///
/// Writing past the end extends the store; writing before the end overwrites in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Memory {
    data: Vec<u8>,
    position: usize,
}

impl Memory {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            position: 0,
        }
    }

    /// Returns the stored bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the store and returns the stored bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Consumes the store and returns the stored bytes as [Bytes].
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }
}

impl From<Vec<u8>> for Memory {
    fn from(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }
}

impl From<&[u8]> for Memory {
    fn from(data: &[u8]) -> Self {
        Self::from(data.to_vec())
    }
}

impl From<Bytes> for Memory {
    fn from(data: Bytes) -> Self {
        Self::from(Vec::from(data))
    }
}

impl Read for Memory {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.data.get(self.position..).unwrap_or_default();
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }
}

impl Write for Memory {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let end = self.position + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.position..end].copy_from_slice(buf);
        self.position = end;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for Memory {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => (self.data.len() as u64).checked_add_signed(delta),
            SeekFrom::Current(delta) => (self.position as u64).checked_add_signed(delta),
        };
        let target = target
            .and_then(|target| usize::try_from(target).ok())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "invalid seek to a negative position")
            })?;
        self.position = target;
        Ok(target as u64)
    }
}

impl Store for Memory {
    fn len(&mut self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len).map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
        self.data.resize(len, 0);
        Ok(())
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.position as u64)
    }
}

/// A read-only window over `length` bytes of a store, starting at `offset`.
///
/// The window is clipped to the end of the store. Reading from the view advances the
/// underlying store's position.
pub struct SubView<'a, S: Store + ?Sized> {
    store: &'a mut S,
    start: u64,
    len: u64,
    consumed: u64,
}

impl<'a, S: Store + ?Sized> SubView<'a, S> {
    /// Creates a view and positions `store` at its start.
    pub fn new(store: &'a mut S, offset: u64, length: u64) -> io::Result<Self> {
        let total = store.len()?;
        let start = offset.min(total);
        let len = length.min(total - start);
        store.set_position(start)?;
        Ok(Self {
            store,
            start,
            len,
            consumed: 0,
        })
    }

    /// Offset of the view within the store.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Offset of the first byte after the view.
    pub fn end(&self) -> u64 {
        self.start + self.len
    }

    /// Length of the view after clipping.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if the view covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> u64 {
        self.len - self.consumed
    }
}

impl<S: Store + ?Sized> Read for SubView<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        let n = buf.len().min(limit);
        if n == 0 {
            return Ok(0);
        }
        let read = self.store.read(&mut buf[..n])?;
        self.consumed += read as u64;
        Ok(read)
    }
}
