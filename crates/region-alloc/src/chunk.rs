//! In-place chunk headers ("boundary tags") and traversal over them.
//!
//! Every chunk of a boundary-tag region, free or occupied, starts with a
//! [`ChunkHeader`]. Headers never own anything: they are views into the
//! region's bytes, addressed by [`ChunkOffset`].
//!
//! ```text
//! Chunk Layout:
//! ┌────────────────────────────────────────────────┬──────────────────────┐
//! │ ChunkHeader                                    │ Payload              │
//! │ ┌──────┬───────┬──────┬──────┬──────┐          │                      │
//! │ │ size │ state │ left │ next │ prev │          │ (client pointer)     │
//! │ └──────┴───────┴──────┴──────┴──────┘          │                      │
//! └────────────────────────────────────────────────┴──────────────────────┘
//! ◄──────────────────────────── size ────────────────────────────────────►
//! ```
//!
//! `size` covers the header itself. The right neighbour of a chunk starts at
//! `offset + size`; `left` records the offset of the left neighbour so both
//! physical neighbours are reachable in O(1). `next`/`prev` link the chunk
//! into the free chain while it is free.

use derive_more::{Display, IsVariant};

use crate::region::Region;

/// Byte offset of a chunk header from the start of its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("{_0:#x}")]
pub struct ChunkOffset(usize);

impl ChunkOffset {
    #[must_use]
    pub const fn new(offset: usize) -> Self {
        Self(offset)
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    pub(crate) const fn add(self, bytes: usize) -> Self {
        Self(self.0 + bytes)
    }
}

/// Whether a chunk is available for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IsVariant)]
#[repr(u8)]
pub enum ChunkState {
    #[display("free")]
    Free,
    #[display("occupied")]
    Occupied,
}

/// Link value standing in for "no chunk".
const NIL: usize = usize::MAX;

const fn encode(link: Option<ChunkOffset>) -> usize {
    match link {
        Some(offset) => offset.0,
        None => NIL,
    }
}

const fn decode(link: usize) -> Option<ChunkOffset> {
    if link == NIL {
        None
    } else {
        Some(ChunkOffset(link))
    }
}

/// Metadata stored at the beginning of every chunk.
///
/// The header has 16-byte alignment so that the payload following it is
/// suitably aligned for any primitive type.
#[repr(C, align(16))]
#[derive(Debug, Clone)]
pub struct ChunkHeader {
    /// Total bytes spanned by the chunk, header included.
    size: usize,
    /// Offset of the physically preceding chunk.
    left: usize,
    /// Next chunk in the free chain.
    next: usize,
    /// Previous chunk in the free chain.
    prev: usize,
    state: ChunkState,
}

impl ChunkHeader {
    /// Creates an unlinked header.
    pub(crate) const fn new(size: usize, state: ChunkState, left: Option<ChunkOffset>) -> Self {
        Self {
            size,
            left: encode(left),
            next: NIL,
            prev: NIL,
            state,
        }
    }

    /// Returns the size of the chunk in bytes, header included.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn state(&self) -> ChunkState {
        self.state
    }

    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.state.is_free()
    }

    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        self.state.is_occupied()
    }

    /// Returns the physically preceding chunk, or `None` for the first chunk
    /// of the region.
    #[must_use]
    pub const fn left(&self) -> Option<ChunkOffset> {
        decode(self.left)
    }

    /// Returns the next chunk in the free chain.
    #[must_use]
    pub const fn next(&self) -> Option<ChunkOffset> {
        decode(self.next)
    }

    /// Returns the previous chunk in the free chain.
    #[must_use]
    pub const fn prev(&self) -> Option<ChunkOffset> {
        decode(self.prev)
    }

    pub(crate) const fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    pub(crate) const fn set_state(&mut self, state: ChunkState) {
        self.state = state;
    }

    pub(crate) const fn set_left(&mut self, left: Option<ChunkOffset>) {
        self.left = encode(left);
    }

    pub(crate) const fn set_next(&mut self, next: Option<ChunkOffset>) {
        self.next = encode(next);
    }

    pub(crate) const fn set_prev(&mut self, prev: Option<ChunkOffset>) {
        self.prev = encode(prev);
    }
}

/// Iterator following `next` links from a starting chunk.
///
/// This is how placement policies see the free chain: in chain order, one
/// header at a time.
#[derive(Debug, Clone)]
pub struct ChunkChain<'a> {
    region: &'a Region,
    cursor: Option<ChunkOffset>,
}

impl<'a> ChunkChain<'a> {
    pub(crate) const fn new(region: &'a Region, head: Option<ChunkOffset>) -> Self {
        Self {
            region,
            cursor: head,
        }
    }
}

impl<'a> Iterator for ChunkChain<'a> {
    type Item = (ChunkOffset, &'a ChunkHeader);

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.cursor?;
        let header = self.region.header(offset);
        self.cursor = header.next();
        Some((offset, header))
    }
}

/// Iterator over every chunk of a region in address order.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    region: &'a Region,
    cursor: usize,
}

impl<'a> Chunks<'a> {
    pub(crate) const fn new(region: &'a Region) -> Self {
        Self { region, cursor: 0 }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = (ChunkOffset, &'a ChunkHeader);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.region.capacity() {
            return None;
        }
        let offset = ChunkOffset::new(self.cursor);
        let header = self.region.header(offset);
        assert!(header.size() > 0, "zero-sized chunk at {offset}");
        self.cursor += header.size();
        Some((offset, header))
    }
}
