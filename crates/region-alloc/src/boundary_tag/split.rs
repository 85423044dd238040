//! Carving a free chunk into an allocated prefix and a free remainder.

use log::trace;

use super::free_chain::FreeChain;
use crate::{
    chunk::{ChunkHeader, ChunkOffset, ChunkState},
    region::Region,
};

/// Outcome of [`split`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Split {
    /// The chunk that will satisfy the request. Always the candidate itself.
    pub(super) allocated: ChunkOffset,
    /// The free chunk carved off the end, if the candidate was large enough.
    pub(super) remainder: Option<ChunkOffset>,
}

/// Splits `candidate` so that its prefix spans exactly `requested` bytes.
///
/// If the remainder could not hold more than a bare header, the candidate is
/// left whole and still linked in the free chain. Otherwise a free header is
/// written at `candidate + requested`; it takes the candidate's place in the
/// free chain (becoming the head if the candidate was the head) and becomes
/// the left neighbour of the chunk that used to follow the candidate.
///
/// Only bytes inside the candidate chunk are written, apart from link fields
/// of its neighbours.
///
/// # Panics
///
/// Panics if `candidate` is not a free chunk of at least `requested` bytes.
pub(super) fn split(
    region: &mut Region,
    chain: &mut FreeChain,
    candidate: ChunkOffset,
    requested: usize,
    header_size: usize,
) -> Split {
    let header = region.header(candidate);
    let size = header.size();
    assert!(header.is_free(), "splitting occupied chunk at {candidate}");
    assert!(
        size >= requested,
        "chunk at {candidate} ({size} bytes) cannot hold {requested} bytes"
    );

    if size <= requested.saturating_add(header_size) {
        trace!("split: chunk at {candidate} ({size} bytes) used whole for {requested} bytes");
        return Split {
            allocated: candidate,
            remainder: None,
        };
    }

    let right = region.right_of(candidate);
    let remainder = candidate.add(requested);
    region.write_header(
        remainder,
        ChunkHeader::new(size - requested, ChunkState::Free, Some(candidate)),
    );
    region.header_mut(candidate).set_size(requested);
    if let Some(right) = right {
        region.header_mut(right).set_left(Some(remainder));
    }
    chain.replace(region, candidate, remainder);

    trace!(
        "split: chunk at {candidate} ({size} bytes) into {requested} + {} at {remainder}",
        size - requested
    );
    Split {
        allocated: candidate,
        remainder: Some(remainder),
    }
}
