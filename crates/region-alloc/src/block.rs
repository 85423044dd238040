//! Fixed-slot pool allocator.
//!
//! The region is divided into equal slots of `size_of::<T>()` bytes, each
//! holding exactly one item. Slot states live in a side table, so the slots
//! themselves carry no header.

use alloc::{vec, vec::Vec};
use core::{fmt, marker::PhantomData, ptr::NonNull};

use log::{debug, trace};
use snafu::OptionExt as _;

use crate::{
    TypedAllocator,
    chunk::ChunkState,
    region::{Region, RegionError, region_error},
};

/// A pool of equally sized slots, one `T` each.
pub struct BlockAllocator<T> {
    region: Region,
    slots: Vec<ChunkState>,
    _marker: PhantomData<T>,
}

impl<T> BlockAllocator<T> {
    /// Creates a pool of `slots` free slots.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::CapacityOverflow`] if the pool size overflows,
    /// [`RegionError::ZeroCapacity`] if it is zero (no slots, or a zero-sized
    /// `T`), or any other error of [`Region::new`].
    pub fn new(slots: usize) -> Result<Self, RegionError> {
        let slot_size = size_of::<T>();
        let capacity = slots
            .checked_mul(slot_size)
            .context(region_error::CapacityOverflowSnafu { slots, slot_size })?;
        let region = Region::new(capacity, align_of::<T>())?;

        debug!("block allocator: {slots} slots of {slot_size} bytes");
        Ok(Self {
            region,
            slots: vec![ChunkState::Free; slots],
            _marker: PhantomData,
        })
    }

    /// Returns the pool size in bytes.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.region.capacity()
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn slots(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn count_occupied_blocks(&self) -> usize {
        self.slots
            .iter()
            .filter(|state| state.is_occupied())
            .count()
    }

    #[must_use]
    pub fn occupied_bytes(&self) -> usize {
        self.count_occupied_blocks() * size_of::<T>()
    }

    /// Allocates the first free slot.
    ///
    /// Returns `None` if `n` exceeds the slot size or every slot is taken.
    pub fn allocate(&mut self, n: usize) -> Option<NonNull<T>> {
        if n > size_of::<T>() {
            return None;
        }
        let Some(index) = self.slots.iter().position(|state| state.is_free()) else {
            debug!("block allocator: all {} slots occupied", self.slots());
            return None;
        };

        self.slots[index] = ChunkState::Occupied;
        trace!("block allocator: allocated slot {index}");
        Some(self.region.ptr_at(index * size_of::<T>()).cast())
    }

    /// Returns the slot holding `ptr` to the pool. Null pointers are
    /// ignored.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer returned by
    /// [`allocate`](Self::allocate) on this pool that has not been
    /// deallocated since. Foreign and misaligned pointers and double frees
    /// cause a panic.
    pub unsafe fn deallocate(&mut self, ptr: *mut T) {
        let Some(ptr) = NonNull::new(ptr) else {
            return;
        };
        let Some(offset) = self.region.offset_of(ptr.cast()) else {
            panic!("pointer {ptr:p} does not belong to this allocator");
        };
        assert!(
            offset.is_multiple_of(size_of::<T>()),
            "pointer {ptr:p} is not a slot start"
        );

        let index = offset / size_of::<T>();
        let state = &mut self.slots[index];
        assert!(state.is_occupied(), "double free of slot {index}");
        *state = ChunkState::Free;
        trace!("block allocator: freed slot {index}");
    }
}

impl<T> TypedAllocator for BlockAllocator<T> {
    type Item = T;

    fn max_size(&self) -> usize {
        self.max_size()
    }

    fn occupied_bytes(&self) -> usize {
        self.occupied_bytes()
    }

    fn allocate(&mut self, n: usize) -> Option<NonNull<T>> {
        self.allocate(n)
    }

    unsafe fn deallocate(&mut self, ptr: *mut T) {
        unsafe { self.deallocate(ptr) }
    }
}

impl<T> fmt::Debug for BlockAllocator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockAllocator")
            .field("slots", &self.slots())
            .field("slot_size", &size_of::<T>())
            .field("occupied", &self.count_occupied_blocks())
            .finish()
    }
}
