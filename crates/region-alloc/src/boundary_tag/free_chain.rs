//! The doubly linked chain of free chunks.
//!
//! Links live inside the chunk headers (`next`/`prev`); the chain itself only
//! remembers its head. Chunks are pushed at the head when freed (LIFO), so
//! chain order is not address order.

use crate::{
    chunk::{ChunkChain, ChunkOffset},
    region::Region,
};

#[derive(Debug, Default)]
pub(super) struct FreeChain {
    head: Option<ChunkOffset>,
}

impl FreeChain {
    pub(super) const fn head(&self) -> Option<ChunkOffset> {
        self.head
    }

    pub(super) const fn iter<'a>(&self, region: &'a Region) -> ChunkChain<'a> {
        ChunkChain::new(region, self.head)
    }

    /// Links an unlinked chunk in front of the current head.
    pub(super) fn push_front(&mut self, region: &mut Region, chunk: ChunkOffset) {
        let old_head = self.head;
        let header = region.header_mut(chunk);
        header.set_prev(None);
        header.set_next(old_head);
        if let Some(old_head) = old_head {
            region.header_mut(old_head).set_prev(Some(chunk));
        }
        self.head = Some(chunk);
    }

    /// Removes `chunk` from the chain and clears its links.
    pub(super) fn unlink(&mut self, region: &mut Region, chunk: ChunkOffset) {
        let header = region.header_mut(chunk);
        let (prev, next) = (header.prev(), header.next());
        header.set_prev(None);
        header.set_next(None);

        if let Some(prev) = prev {
            region.header_mut(prev).set_next(next);
        } else {
            assert_eq!(self.head, Some(chunk), "chunk at {chunk} is not linked");
            self.head = next;
        }
        if let Some(next) = next {
            region.header_mut(next).set_prev(prev);
        }
    }

    /// Puts `new` in the chain position held by `old`, unlinking `old`.
    ///
    /// `new` must not be linked already.
    pub(super) fn replace(&mut self, region: &mut Region, old: ChunkOffset, new: ChunkOffset) {
        let header = region.header_mut(old);
        let (prev, next) = (header.prev(), header.next());
        header.set_prev(None);
        header.set_next(None);

        let header = region.header_mut(new);
        header.set_prev(prev);
        header.set_next(next);

        if let Some(prev) = prev {
            region.header_mut(prev).set_next(Some(new));
        } else {
            assert_eq!(self.head, Some(old), "chunk at {old} is not linked");
            self.head = Some(new);
        }
        if let Some(next) = next {
            region.header_mut(next).set_prev(Some(new));
        }
    }

    /// Makes a linked chunk the head of the chain.
    pub(super) fn move_to_front(&mut self, region: &mut Region, chunk: ChunkOffset) {
        if self.head != Some(chunk) {
            self.unlink(region, chunk);
            self.push_front(region, chunk);
        }
    }
}

/// Writes consecutive chunk headers with the given sizes and states and links
/// the free ones into a chain in address order.
#[cfg(test)]
pub(super) fn lay_out(
    chunks: &[(usize, crate::chunk::ChunkState)],
) -> (Region, FreeChain, alloc::vec::Vec<ChunkOffset>) {
    use alloc::vec::Vec;

    use crate::chunk::ChunkHeader;

    let capacity = chunks.iter().map(|(size, _)| size).sum();
    let mut region = Region::new(capacity, align_of::<ChunkHeader>()).unwrap();
    let mut offsets = Vec::new();
    let mut cursor = 0;
    let mut left = None;
    for &(size, state) in chunks {
        let offset = ChunkOffset::new(cursor);
        region.write_header(offset, ChunkHeader::new(size, state, left));
        offsets.push(offset);
        left = Some(offset);
        cursor += size;
    }

    let mut chain = FreeChain::default();
    for (&offset, &(_, state)) in offsets.iter().zip(chunks).rev() {
        if state.is_free() {
            chain.push_front(&mut region, offset);
        }
    }
    (region, chain, offsets)
}
