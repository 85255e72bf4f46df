//! A LIFO stack of backing stores.
//!
//! The [Stack] always holds a base [Frame]. Readers and writers only ever address the top frame,
//! so pushing a frame transparently redirects every subsequent operation (this is how
//! compression sections and mid-stream insertion are layered on top of the base store).
//!
//! # Ownership
//!
//! A frame either owns its store (closed when the frame is disposed) or was created with
//! [Frame::leave_open], in which case disposal leaves the store untouched and the caller keeps
//! responsibility for it.
//!
//! # Example
//!
//! ```
//! use strata::{Memory, Stack, Store};
//!
//! let mut stack = Stack::new(Memory::from(vec![0, 1, 2, 3, 4, 5, 6, 7]));
//! stack.top_mut().store().set_position(4).unwrap();
//! stack.insert_into_top(&[100, 101]).unwrap();
//!
//! let base = stack.close_into_bytes().unwrap();
//! assert_eq!(base, vec![0, 1, 2, 3, 100, 101, 4, 5, 6, 7]);
//! ```

use crate::{
    compression::Algorithm,
    prefix::LengthPrefix,
    store::{Memory, Store, SubView},
    Error,
};
use std::{
    io::{self, Read},
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::{trace, warn};

static NEXT_STACK_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a [Stack]. Frames remember the stack they were created for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StackId(u64);

/// What an engine must do when a frame is popped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Role {
    /// Nothing beyond releasing the store.
    Plain,
    /// Splice the frame's bytes into the frame below at `at`.
    Insert { at: u64 },
    /// Compress the frame's bytes into the frame below.
    Compress {
        algorithm: Algorithm,
        level: i32,
        prefix: Option<LengthPrefix>,
    },
    /// Holds already decompressed bytes; discarded on pop.
    Decompress,
}

/// A single entry on a [Stack].
pub struct Frame<'a> {
    store: Box<dyn Store + 'a>,
    owned: bool,
    owner: StackId,
    role: Role,
    released: bool,
}

impl<'a> Frame<'a> {
    /// Creates a frame for `stack` that owns `store`.
    pub fn new(stack: &Stack<'_>, store: impl Store + 'a) -> Self {
        Self::with_owner(stack.id, Box::new(store), true)
    }

    /// Creates a frame for `stack` that leaves `store` open when disposed.
    pub fn leave_open(stack: &Stack<'_>, store: impl Store + 'a) -> Self {
        Self::with_owner(stack.id, Box::new(store), false)
    }

    fn with_owner(owner: StackId, store: Box<dyn Store + 'a>, owned: bool) -> Self {
        Self {
            store,
            owned,
            owner,
            role: Role::Plain,
            released: false,
        }
    }

    /// The stack this frame may be pushed onto.
    pub fn owner(&self) -> StackId {
        self.owner
    }

    /// Returns true if disposing the frame closes its store.
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Returns the frame's store.
    pub fn store(&mut self) -> &mut (dyn Store + 'a) {
        self.store.as_mut()
    }

    pub(crate) fn role(&self) -> Role {
        self.role
    }

    pub(crate) fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    /// Reads the whole content of the frame, then disposes it.
    pub fn into_bytes(mut self) -> Result<Vec<u8>, Error> {
        let mut content = Vec::new();
        self.store.set_position(0)?;
        self.store.read_to_end(&mut content)?;
        self.dispose()?;
        Ok(content)
    }

    /// Releases the store, closing it if the frame owns it.
    pub fn dispose(mut self) -> Result<(), Error> {
        self.release()
    }

    /// Closes an owned store at most once.
    fn release(&mut self) -> Result<(), Error> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if self.owned {
            self.store.close()?;
        }
        Ok(())
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(?err, "failed to release frame");
        }
    }
}

/// A non-empty LIFO sequence of [Frame]s.
pub struct Stack<'a> {
    id: StackId,
    frames: Vec<Frame<'a>>,
}

impl<'a> Stack<'a> {
    /// Creates a stack whose base frame owns `base`.
    pub fn new(base: impl Store + 'a) -> Self {
        Self::with_base(Box::new(base), true)
    }

    /// Creates a stack whose base frame leaves `base` open on teardown.
    pub fn leave_open(base: impl Store + 'a) -> Self {
        Self::with_base(Box::new(base), false)
    }

    fn with_base(base: Box<dyn Store + 'a>, owned: bool) -> Self {
        let id = StackId(NEXT_STACK_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            id,
            frames: vec![Frame::with_owner(id, base, owned)],
        }
    }

    /// Returns the identity of this stack.
    pub fn id(&self) -> StackId {
        self.id
    }

    /// Returns the number of frames, including the base frame.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns the active frame.
    pub fn top(&self) -> &Frame<'a> {
        self.frames.last().expect("stack always holds a base frame")
    }

    /// Returns the active frame.
    pub fn top_mut(&mut self) -> &mut Frame<'a> {
        self.frames
            .last_mut()
            .expect("stack always holds a base frame")
    }

    /// Pushes `frame`, making it the active frame.
    ///
    /// Fails with [Error::ContractViolation] if `frame` was created for another stack.
    pub fn push(&mut self, frame: Frame<'a>) -> Result<(), Error> {
        if frame.owner != self.id {
            return Err(Error::ContractViolation);
        }
        self.frames.push(frame);
        trace!(depth = self.frames.len(), "pushed frame");
        Ok(())
    }

    /// Removes and returns the active frame.
    ///
    /// The base frame can never be popped.
    pub fn pop(&mut self) -> Result<Frame<'a>, Error> {
        if self.frames.len() < 2 {
            return Err(Error::InvalidOperation("cannot pop the base frame"));
        }
        let frame = self.drain_top().ok_or(Error::InvalidOperation("stack is empty"))?;
        trace!(depth = self.frames.len(), "popped frame");
        Ok(frame)
    }

    /// Pushes a fresh in-memory frame and returns it.
    pub fn create(&mut self) -> &mut Frame<'a> {
        self.frames
            .push(Frame::with_owner(self.id, Box::new(Memory::new()), true));
        trace!(depth = self.frames.len(), "created frame");
        self.top_mut()
    }

    /// Copies everything `data` yields into the active frame at its current position.
    ///
    /// With `keep_position`, the position is restored afterwards. Returns the number of
    /// bytes copied.
    pub fn copy_into_top(&mut self, data: &mut impl Read, keep_position: bool) -> Result<u64, Error> {
        let store = self.top_mut().store();
        let start = store.position()?;
        let copied = io::copy(data, store)?;
        if keep_position {
            store.set_position(start)?;
        }
        Ok(copied)
    }

    /// Splices `data` into the active frame at its current position.
    ///
    /// Bytes at and after the position are shifted to follow `data`, and the position is left
    /// directly after `data`. This buffers the whole tail, so it costs O(tail length).
    pub fn insert_into_top(&mut self, data: &[u8]) -> Result<(), Error> {
        let store = self.top_mut().store();
        let at = store.position()?;
        let mut tail = Vec::new();
        store.read_to_end(&mut tail)?;
        store.set_position(at)?;
        store.write_all(data)?;
        store.write_all(&tail)?;
        store.set_position(at + data.len() as u64)?;
        trace!(at, inserted = data.len(), shifted = tail.len(), "inserted into frame");
        Ok(())
    }

    /// Returns a read-only view of the next `length` bytes of the active frame.
    pub fn sub_view(&mut self, length: u64) -> Result<SubView<'_, dyn Store + 'a>, Error> {
        let store = self.top_mut().store();
        let offset = store.position()?;
        Ok(SubView::new(store, offset, length)?)
    }

    /// Removes the active frame, including the base frame. Used for teardown only.
    pub(crate) fn drain_top(&mut self) -> Option<Frame<'a>> {
        self.frames.pop()
    }

    /// Disposes every frame, top first, returning the first error encountered.
    ///
    /// Every frame is disposed even if an earlier one fails.
    pub fn close(mut self) -> Result<(), Error> {
        self.release_all()
    }

    pub(crate) fn release_all(&mut self) -> Result<(), Error> {
        let mut result = Ok(());
        while let Some(frame) = self.drain_top() {
            if let Err(err) = frame.dispose() {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    /// Disposes every frame above the base, then returns the content of the base frame.
    pub fn close_into_bytes(mut self) -> Result<Vec<u8>, Error> {
        while self.depth() > 1 {
            self.pop()?.dispose()?;
        }
        let base = self
            .drain_top()
            .ok_or(Error::InvalidOperation("stack is empty"))?;
        base.into_bytes()
    }
}

impl Drop for Stack<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release_all() {
            warn!(?err, "failed to release stack");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        cell::Cell,
        io::{Seek, SeekFrom, Write},
        rc::Rc,
    };

    fn write(stack: &mut Stack<'_>, data: &[u8]) {
        stack.top_mut().store().write_all(data).unwrap();
    }

    #[test]
    fn test_push_pop_tracks_top() {
        let mut stack = Stack::new(Memory::new());
        assert_eq!(stack.depth(), 1);

        write(&mut stack, &[1]);
        stack.create();
        write(&mut stack, &[2, 2]);
        stack.create();
        write(&mut stack, &[3, 3, 3]);
        assert_eq!(stack.depth(), 3);

        // The top frame is always the most recently pushed one
        assert_eq!(stack.pop().unwrap().into_bytes().unwrap(), [3, 3, 3]);
        assert_eq!(stack.pop().unwrap().into_bytes().unwrap(), [2, 2]);
        assert_eq!(stack.close_into_bytes().unwrap(), [1]);
    }

    #[test]
    fn test_pop_base_fails() {
        let mut stack = Stack::new(Memory::new());
        assert!(matches!(stack.pop(), Err(Error::InvalidOperation(_))));

        stack.create();
        stack.pop().unwrap();
        assert!(matches!(stack.pop(), Err(Error::InvalidOperation(_))));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_push_foreign_frame() {
        let mut first = Stack::new(Memory::new());
        let second = Stack::new(Memory::new());
        assert_ne!(first.id(), second.id());

        let foreign = Frame::new(&second, Memory::new());
        assert!(matches!(first.push(foreign), Err(Error::ContractViolation)));

        let own = Frame::new(&first, Memory::new());
        first.push(own).unwrap();
        assert_eq!(first.depth(), 2);
    }

    #[test]
    fn test_insert_into_top() {
        let mut stack = Stack::new(Memory::from(vec![0, 1, 2, 3, 4, 5, 6, 7]));
        stack.top_mut().store().set_position(4).unwrap();
        stack.insert_into_top(&[100, 101]).unwrap();
        assert_eq!(stack.top_mut().store().position().unwrap(), 6);
        assert_eq!(
            stack.close_into_bytes().unwrap(),
            [0, 1, 2, 3, 100, 101, 4, 5, 6, 7]
        );
    }

    #[test]
    fn test_insert_at_end() {
        let mut stack = Stack::new(Memory::from(vec![0, 1]));
        stack.top_mut().store().set_position(2).unwrap();
        stack.insert_into_top(&[2, 3]).unwrap();
        assert_eq!(stack.close_into_bytes().unwrap(), [0, 1, 2, 3]);
    }

    #[test]
    fn test_copy_into_top() {
        let mut stack = Stack::new(Memory::from(vec![9, 9, 9]));
        stack.top_mut().store().set_position(1).unwrap();

        let copied = stack.copy_into_top(&mut &[1u8, 2][..], true).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(stack.top_mut().store().position().unwrap(), 1);

        stack.copy_into_top(&mut &[5u8, 6, 7][..], false).unwrap();
        assert_eq!(stack.top_mut().store().position().unwrap(), 4);
        assert_eq!(stack.close_into_bytes().unwrap(), [9, 5, 6, 7]);
    }

    #[test]
    fn test_sub_view_advances_top() {
        let mut stack = Stack::new(Memory::from(vec![0, 1, 2, 3, 4]));
        stack.top_mut().store().set_position(1).unwrap();
        {
            let mut view = stack.sub_view(2).unwrap();
            let mut out = Vec::new();
            view.read_to_end(&mut out).unwrap();
            assert_eq!(out, [1, 2]);
        }
        assert_eq!(stack.top_mut().store().position().unwrap(), 3);
    }

    #[test]
    fn test_leave_open() {
        let mut memory = Memory::new();
        {
            let mut stack = Stack::leave_open(&mut memory);
            assert!(!stack.top().is_owned());
            write(&mut stack, &[1, 2, 3]);
            stack.close().unwrap();
        }
        assert_eq!(memory.as_slice(), &[1, 2, 3]);
    }

    /// Counts how often the store is closed.
    #[derive(Default)]
    struct Counted {
        inner: Memory,
        closes: Rc<Cell<usize>>,
    }

    impl Read for Counted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Write for Counted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for Counted {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    impl Store for Counted {
        fn len(&mut self) -> io::Result<u64> {
            self.inner.len()
        }

        fn set_len(&mut self, len: u64) -> io::Result<()> {
            self.inner.set_len(len)
        }

        fn close(&mut self) -> io::Result<()> {
            self.closes.set(self.closes.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_drop_closes_owned_stores() {
        let base = Counted::default();
        let base_closes = base.closes.clone();
        let upper = Counted::default();
        let upper_closes = upper.closes.clone();
        {
            let mut stack = Stack::new(base);
            write(&mut stack, &[1]);
            let frame = Frame::new(&stack, upper);
            stack.push(frame).unwrap();
        }
        assert_eq!(base_closes.get(), 1);
        assert_eq!(upper_closes.get(), 1);
    }

    #[test]
    fn test_frame_closed_once() {
        let mut stack = Stack::new(Memory::new());

        // Disposed explicitly, then dropped
        let store = Counted::default();
        let closes = store.closes.clone();
        let frame = Frame::new(&stack, store);
        stack.push(frame).unwrap();
        stack.pop().unwrap().dispose().unwrap();
        assert_eq!(closes.get(), 1);

        // Dropped without being disposed
        let store = Counted::default();
        let closes = store.closes.clone();
        let frame = Frame::new(&stack, store);
        stack.push(frame).unwrap();
        drop(stack.pop().unwrap());
        assert_eq!(closes.get(), 1);

        // Closing the stack does not close the base twice
        let base = Counted::default();
        let closes = base.closes.clone();
        Stack::new(base).close().unwrap();
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_drop_leaves_borrowed_store_open() {
        let mut base = Counted::default();
        drop(Stack::leave_open(&mut base));
        assert_eq!(base.closes.get(), 0);
    }
}
