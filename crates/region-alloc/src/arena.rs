//! Bump allocator over one fixed region.
//!
//! Allocations are carved from the region front to back by advancing a single
//! offset. Individual frees are ignored; [`ArenaAllocator::reset`] releases
//! everything at once.
//!
//! ```text
//! ┌──────┬─────┬──────┬──────────┬──────────────────────────────┐
//! │ A    │ pad │ B    │ C        │ remaining                    │
//! └──────┴─────┴──────┴──────────┴──────────────────────────────┘
//!                                ▲ offset
//! ```

use core::{fmt, marker::PhantomData, ptr::NonNull};

use log::{debug, trace};

use crate::{
    TypedAllocator,
    region::{Region, RegionError},
};

/// A bump allocator handing out `T`-aligned allocations from one region.
pub struct ArenaAllocator<T> {
    region: Region,
    offset: usize,
    _marker: PhantomData<T>,
}

impl<T> ArenaAllocator<T> {
    /// Creates an arena owning a region of exactly `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Region::new`].
    pub fn new(capacity: usize) -> Result<Self, RegionError> {
        let region = Region::new(capacity, align_of::<T>())?;
        debug!("arena allocator: {capacity} bytes");
        Ok(Self {
            region,
            offset: 0,
            _marker: PhantomData,
        })
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.region.capacity()
    }

    /// Returns the bytes consumed so far, alignment padding included.
    #[must_use]
    pub fn occupied_bytes(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.max_size() - self.offset
    }

    /// Allocates `n` bytes aligned for `T`.
    ///
    /// Returns `None` if `n` is zero, smaller than `size_of::<T>()`, or does
    /// not fit in the rest of the region.
    pub fn allocate(&mut self, n: usize) -> Option<NonNull<T>> {
        if n == 0 || n < size_of::<T>() {
            return None;
        }

        let start = self.offset.checked_next_multiple_of(align_of::<T>())?;
        let end = start.checked_add(n).filter(|&end| end <= self.max_size());
        let Some(end) = end else {
            debug!(
                "arena allocator: out of memory for {n} bytes ({} remaining)",
                self.remaining()
            );
            return None;
        };

        self.offset = end;
        trace!("arena allocator: allocated {n} bytes at {start:#x}");
        Some(self.region.ptr_at(start).cast())
    }

    /// Releases every allocation at once.
    ///
    /// Pointers returned before the reset must not be used afterwards.
    pub fn reset(&mut self) {
        debug!("arena allocator: reset, released {} bytes", self.offset);
        self.offset = 0;
    }
}

impl<T> TypedAllocator for ArenaAllocator<T> {
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

    /// Individual frees are ignored; use [`ArenaAllocator::reset`].
    unsafe fn deallocate(&mut self, ptr: *mut T) {
        trace!("arena allocator: ignored free of {ptr:p}");
    }
}

impl<T> fmt::Debug for ArenaAllocator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaAllocator")
            .field("capacity", &self.max_size())
            .field("offset", &self.offset)
            .finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let mut arena = ArenaAllocator::<i32>::new(1024).unwrap();
        let ptr = arena.allocate(size_of::<i32>()).unwrap();
        unsafe {
            ptr.write(7);
            assert_eq!(ptr.read(), 7);
        }
        assert_eq!(arena.occupied_bytes(), size_of::<i32>());
    }

    #[test]
    fn test_fill() {
        let mut arena = ArenaAllocator::<i32>::new(1024).unwrap();
        for _ in 0..arena.max_size() / size_of::<i32>() {
            assert!(arena.allocate(size_of::<i32>()).is_some());
        }
        assert_eq!(arena.remaining(), 0);
    }

    #[test]
    fn test_fill_reset_fill() {
        let mut arena = ArenaAllocator::<i32>::new(1024).unwrap();
        let first = arena.allocate(size_of::<i32>()).unwrap();
        for _ in 1..arena.max_size() / size_of::<i32>() {
            assert!(arena.allocate(size_of::<i32>()).is_some());
        }

        arena.reset();
        assert_eq!(arena.occupied_bytes(), 0);

        assert_eq!(arena.allocate(size_of::<i32>()), Some(first));
        for _ in 1..arena.max_size() / size_of::<i32>() {
            assert!(arena.allocate(size_of::<i32>()).is_some());
        }
    }

    #[test]
    fn test_over_fill() {
        let mut arena = ArenaAllocator::<i32>::new(2 * size_of::<i32>()).unwrap();
        assert!(arena.allocate(size_of::<i32>()).is_some());
        assert!(arena.allocate(size_of::<i32>()).is_some());
        assert!(arena.allocate(size_of::<i32>()).is_none());
    }

    #[test]
    fn test_rejected_requests() {
        let mut arena = ArenaAllocator::<u64>::new(64).unwrap();
        assert!(arena.allocate(0).is_none());
        assert!(arena.allocate(4).is_none());
        assert!(arena.allocate(65).is_none());
        assert!(arena.allocate(usize::MAX).is_none());
        assert_eq!(arena.occupied_bytes(), 0);
    }

    #[test]
    fn test_alignment_padding() {
        let mut arena = ArenaAllocator::<u32>::new(64).unwrap();
        let first = arena.allocate(5).unwrap();
        let second = arena.allocate(4).unwrap();

        assert!(second.is_aligned());
        assert_eq!(second.addr().get() - first.addr().get(), 8);
        assert_eq!(arena.occupied_bytes(), 12);
        assert_eq!(arena.remaining(), 52);
    }

    #[test]
    fn test_free_is_noop() {
        let mut arena = ArenaAllocator::<i32>::new(64).unwrap();
        let ptr = arena.allocate(size_of::<i32>()).unwrap();
        unsafe { TypedAllocator::deallocate(&mut arena, ptr.as_ptr()) };
        assert_eq!(arena.occupied_bytes(), size_of::<i32>());
    }

    #[test]
    fn test_zero_capacity() {
        assert!(matches!(
            ArenaAllocator::<i32>::new(0),
            Err(RegionError::ZeroCapacity { .. })
        ));
    }
}
