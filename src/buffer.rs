//! A small buffer abstraction for the read/write relay loop.
//!
//! Most reads are relayed byte-for-byte and can be written straight out of
//! the fixed-size scratch buffer the read landed in — no copy needed. Some
//! paths (telnet IAC stripping, hex-dump tee-ing) must materialize an
//! owned, possibly different-length buffer instead. `NcBuffer` unifies the
//! two cases so [`crate::multiplex`] can track a single "how much of this
//! buffer is still unwritten" cursor regardless of which kind it's
//! holding.

/// Pending bytes to be written to a socket, plus how much of the front has
/// already been written.
pub enum NcBuffer<'a> {
    /// A view into a caller-owned scratch slice (the common case: a
    /// fixed-size read buffer on the stack of the relay loop).
    Scratch { data: &'a [u8], cursor: usize },
    /// An owned, heap-allocated buffer (used when bytes were
    /// transformed — telnet stripping, or anything that changes length).
    Owned { data: Vec<u8>, cursor: usize },
}

impl<'a> NcBuffer<'a> {
    /// Wraps a borrowed slice with nothing yet written.
    pub fn from_scratch(data: &'a [u8]) -> Self {
        NcBuffer::Scratch { data, cursor: 0 }
    }

    /// Wraps an owned buffer with nothing yet written.
    pub fn from_owned(data: Vec<u8>) -> Self {
        NcBuffer::Owned { data, cursor: 0 }
    }

    /// An empty owned buffer, the starting state of a queue with nothing
    /// pending.
    pub fn empty() -> NcBuffer<'static> {
        NcBuffer::Owned { data: Vec::new(), cursor: 0 }
    }

    /// The bytes not yet written.
    pub fn remaining(&self) -> &[u8] {
        match self {
            NcBuffer::Scratch { data, cursor } => &data[*cursor..],
            NcBuffer::Owned { data, cursor } => &data[*cursor..],
        }
    }

    /// Advances the write cursor by `n` bytes. For owned storage the
    /// written prefix is dropped immediately rather than just stepping the
    /// cursor, so a long-lived queue doesn't grow unbounded across many
    /// partial writes.
    pub fn advance(&mut self, n: usize) {
        match self {
            NcBuffer::Scratch { cursor, .. } => *cursor += n,
            NcBuffer::Owned { data, cursor } => {
                debug_assert_eq!(*cursor, 0);
                data.drain(..n);
            }
        }
    }

    /// Appends `bytes` to this buffer, promoting a scratch-backed view to
    /// owned storage first if necessary. This is the one-copy promotion a
    /// relay loop needs when a fresh read lands while bytes from a
    /// previous read are still queued: the scratch view can't outlive the
    /// caller's reusable read buffer, so it has to become owned before it
    /// can be merged with anything that will.
    pub fn append(&mut self, bytes: &[u8]) {
        match self {
            NcBuffer::Owned { data, cursor } => {
                debug_assert_eq!(*cursor, 0);
                data.extend_from_slice(bytes);
            }
            NcBuffer::Scratch { data, cursor } => {
                let mut owned = data[*cursor..].to_vec();
                owned.extend_from_slice(bytes);
                *self = NcBuffer::Owned { data: owned, cursor: 0 };
            }
        }
    }

    /// Whether every byte has been written.
    pub fn is_empty(&self) -> bool {
        self.remaining().is_empty()
    }

    /// Total length, regardless of cursor position.
    pub fn len(&self) -> usize {
        match self {
            NcBuffer::Scratch { data, .. } => data.len(),
            NcBuffer::Owned { data, .. } => data.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_advance() {
        let data = b"hello world";
        let mut buf = NcBuffer::from_scratch(data);
        assert_eq!(buf.remaining(), data);
        buf.advance(6);
        assert_eq!(buf.remaining(), b"world");
        assert!(!buf.is_empty());
        buf.advance(5);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_owned_advance() {
        let mut buf = NcBuffer::from_owned(vec![1, 2, 3, 4]);
        assert_eq!(buf.len(), 4);
        buf.advance(4);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_owned_advance_compacts_storage() {
        let mut buf = NcBuffer::from_owned(vec![1, 2, 3, 4]);
        buf.advance(2);
        assert_eq!(buf.remaining(), &[3, 4]);
        buf.append(&[5, 6]);
        assert_eq!(buf.remaining(), &[3, 4, 5, 6]);
    }

    #[test]
    fn test_append_promotes_scratch_to_owned() {
        let data = b"abc";
        let mut buf = NcBuffer::from_scratch(data);
        buf.advance(1);
        buf.append(b"xyz");
        assert_eq!(buf.remaining(), b"bcxyz");
        assert!(matches!(buf, NcBuffer::Owned { .. }));
    }

    #[test]
    fn test_empty_is_empty() {
        let mut buf = NcBuffer::empty();
        assert!(buf.is_empty());
        buf.append(b"hi");
        assert_eq!(buf.remaining(), b"hi");
    }
}
