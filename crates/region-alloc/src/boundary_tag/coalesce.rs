//! Merging a freed chunk with its free physical neighbours.

use log::trace;

use super::free_chain::FreeChain;
use crate::{chunk::ChunkOffset, region::Region};

/// Merges the free, linked chunk at `chunk` with a free right neighbour and a
/// free left neighbour, both in one call.
///
/// The absorbed chunks are unlinked from the free chain. Returns the chunk
/// that survives the merge: `chunk` itself, or its left neighbour if the left
/// neighbour absorbed it. The survivor keeps the chain position it had
/// before.
///
/// Because every deallocation coalesces immediately, two adjacent free
/// chunks never exist between calls, so the immediate neighbours are the
/// only candidates.
///
/// # Panics
///
/// Panics if `chunk` is not free.
pub(super) fn coalesce(
    region: &mut Region,
    chain: &mut FreeChain,
    chunk: ChunkOffset,
) -> ChunkOffset {
    assert!(
        region.header(chunk).is_free(),
        "coalescing occupied chunk at {chunk}"
    );

    if let Some(right) = region
        .right_of(chunk)
        .filter(|&right| region.header(right).is_free())
    {
        chain.unlink(region, right);
        absorb(region, chunk, right);
        trace!("coalesce: {chunk} absorbed right neighbour {right}");
    }

    let Some(left) = region
        .header(chunk)
        .left()
        .filter(|&left| region.header(left).is_free())
    else {
        return chunk;
    };
    chain.unlink(region, chunk);
    absorb(region, left, chunk);
    trace!("coalesce: {chunk} absorbed into left neighbour {left}");
    left
}

/// Grows `survivor` over its right neighbour `absorbed`.
fn absorb(region: &mut Region, survivor: ChunkOffset, absorbed: ChunkOffset) {
    let absorbed_size = region.header(absorbed).size();
    let header = region.header_mut(survivor);
    header.set_size(header.size() + absorbed_size);
    if let Some(right) = region.right_of(survivor) {
        region.header_mut(right).set_left(Some(survivor));
    }
}
