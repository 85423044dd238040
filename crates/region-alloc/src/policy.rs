//! Placement policies choosing which free chunk satisfies a request.
//!
//! A policy is a stateless search over the free chain. It never changes chunk
//! sizes or links; carving the chosen chunk is the allocator's job. The
//! policy is selected per allocator through a type parameter and cannot be
//! switched afterwards.
//!
//! | Policy | Search | Picks |
//! |--------|--------|-------|
//! | [`FirstFit`] | stops at the first fit | earliest fitting chunk in chain order |
//! | [`BestFit`] | scans the whole chain | smallest fitting chunk, earliest on ties |

use crate::chunk::{ChunkChain, ChunkOffset};

/// Strategy locating a free chunk of at least a required size.
pub trait PlacementPolicy {
    /// Human-readable policy name, used in log output.
    const NAME: &'static str;

    /// Selects a free chunk whose size is at least `required` bytes.
    ///
    /// `chain` yields the free chain in chain order. Occupied chunks are
    /// skipped if any appear. Returns `None` if nothing fits, including when
    /// the chain is empty.
    fn select(chain: ChunkChain<'_>, required: usize) -> Option<ChunkOffset>;
}

/// Returns the first free chunk large enough for the request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FirstFit;

impl PlacementPolicy for FirstFit {
    const NAME: &'static str = "first-fit";

    fn select(mut chain: ChunkChain<'_>, required: usize) -> Option<ChunkOffset> {
        chain
            .find(|(_, header)| header.is_free() && header.size() >= required)
            .map(|(offset, _)| offset)
    }
}

/// Returns the smallest free chunk large enough for the request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BestFit;

impl PlacementPolicy for BestFit {
    const NAME: &'static str = "best-fit";

    fn select(chain: ChunkChain<'_>, required: usize) -> Option<ChunkOffset> {
        // `min_by_key` keeps the first of equal minimums
        chain
            .filter(|(_, header)| header.is_free() && header.size() >= required)
            .min_by_key(|(_, header)| header.size())
            .map(|(offset, _)| offset)
    }
}
