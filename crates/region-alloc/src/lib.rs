//! Typed allocators managing one fixed, pre-reserved memory region.
//!
//! Every allocator in this crate obtains its region from the global
//! allocator exactly once, at construction, and serves all requests from
//! inside it. The region never grows; running out of space is reported by
//! `allocate` returning `None`.
//!
//! # Available Allocators
//!
//! ## [`BoundaryTagAllocator`](boundary_tag::BoundaryTagAllocator)
//!
//! A general-purpose variable-size allocator. Each chunk carries an in-place
//! header recording its size, state and physical left neighbour, so freed
//! chunks merge with free neighbours on both sides in constant time. Best
//! suited for:
//!
//! - Variable-sized allocations with unpredictable lifetimes
//! - Workloads that need fragmentation to heal as memory is freed
//!
//! The free chunk serving a request is chosen by a [`PlacementPolicy`]:
//! [`FirstFit`] (default) or [`BestFit`].
//!
//! ## [`ArenaAllocator`](arena::ArenaAllocator)
//!
//! A bump allocator. Allocation only advances an offset; memory is released
//! all at once by `reset`.
//!
//! ## [`BlockAllocator`](block::BlockAllocator)
//!
//! A pool of equally sized slots holding one item each.
//!
//! # Usage Example
//!
//! ```rust
//! use region_alloc::{
//!     TypedAllocator as _,
//!     boundary_tag::BoundaryTagAllocator,
//!     policy::BestFit,
//! };
//!
//! let mut allocator = BoundaryTagAllocator::<u64, BestFit>::new(1024)?;
//!
//! let ptr = allocator.allocate(size_of::<u64>()).unwrap();
//! unsafe {
//!     allocator.construct(ptr, 42);
//!     assert_eq!(ptr.read(), 42);
//!     allocator.deallocate(ptr.as_ptr());
//! }
//! assert_eq!(allocator.occupied_bytes(), 0);
//! # Ok::<(), region_alloc::region::RegionError>(())
//! ```
//!
//! # Performance Characteristics
//!
//! | Allocator | Allocation | Deallocation | Memory Overhead |
//! |-----------|------------|--------------|-----------------|
//! | `BoundaryTagAllocator` | O(k) free chunks | O(1) | one header per chunk |
//! | `ArenaAllocator` | O(1) | no-op | alignment padding |
//! | `BlockAllocator` | O(n) slots | O(1) | one state byte per slot |
//!
//! # Thread Safety
//!
//! The allocators are `Send` (for `Send` items) but not `Sync`. They can be
//! moved between threads but require external synchronization for
//! concurrent access.

#![no_std]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

use core::ptr::NonNull;

pub use self::policy::{BestFit, FirstFit, PlacementPolicy};

pub mod arena;
pub mod block;
pub mod boundary_tag;
pub mod chunk;
pub mod policy;
pub mod region;

/// The contract shared by the allocators of this crate.
///
/// Allocators hand out storage for items of type [`Item`](Self::Item), with
/// a request size in bytes. Hosts generic over this trait can swap one
/// allocator for another without code changes.
pub trait TypedAllocator {
    /// The managed item type.
    type Item;

    /// Returns the size of the managed region in bytes.
    fn max_size(&self) -> usize;

    /// Returns the bytes currently consumed by live allocations, including
    /// any per-allocation overhead.
    fn occupied_bytes(&self) -> usize;

    /// Allocates storage for a request of `n` bytes.
    ///
    /// Returns `None` if the request cannot be served from the region.
    fn allocate(&mut self, n: usize) -> Option<NonNull<Self::Item>>;

    /// Releases storage previously returned by [`allocate`](Self::allocate).
    /// Null pointers are ignored.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live allocation of this allocator. The memory
    /// must not be accessed afterwards.
    unsafe fn deallocate(&mut self, ptr: *mut Self::Item);

    /// Moves `value` into the storage at `ptr` without dropping whatever
    /// bytes were there.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation of this allocator.
    unsafe fn construct(&mut self, ptr: NonNull<Self::Item>, value: Self::Item) {
        unsafe { ptr.write(value) }
    }

    /// Drops the item at `ptr` in place. The storage stays allocated.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation of this allocator holding an
    /// initialized item that is not used afterwards.
    unsafe fn destroy(&mut self, ptr: NonNull<Self::Item>) {
        unsafe { ptr.drop_in_place() }
    }
}
