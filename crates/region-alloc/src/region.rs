//! Owned backing storage for the allocators in this crate.
//!
//! A [`Region`] is obtained from the global allocator exactly once, at
//! construction, and returned to it on drop. It is never resized. Every
//! allocator in this crate carves its allocations out of one region and
//! addresses the bytes inside it by offset from the region base.

use alloc::alloc as global;
use core::{
    alloc::{Layout, LayoutError},
    ptr::NonNull,
};

use log::debug;
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu, ensure};

use crate::chunk::{ChunkHeader, ChunkOffset};

/// Errors that can occur while creating an allocator's backing region.
#[derive(Debug, Snafu)]
#[snafu(module, visibility(pub(crate)))]
pub enum RegionError {
    #[snafu(display("cannot create a zero-sized region"))]
    ZeroCapacity {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("region of {capacity} bytes cannot hold a chunk of {required} bytes"))]
    TooSmall {
        capacity: usize,
        required: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("invalid region layout, capacity: {capacity}, align: {align}"))]
    InvalidLayout {
        capacity: usize,
        align: usize,
        #[snafu(source)]
        source: LayoutError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("region size overflows: {slots} slots of {slot_size} bytes"))]
    CapacityOverflow {
        slots: usize,
        slot_size: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to allocate region, layout: {layout:?}"))]
    OutOfMemory {
        layout: Layout,
        #[snafu(implicit)]
        location: Location,
    },
}

/// A contiguous, exclusively owned byte buffer of fixed capacity.
///
/// The region hands out addresses by offset. Chunk headers are read and
/// written in place through [`header`](Self::header) and
/// [`header_mut`](Self::header_mut); every offset is bounds-checked against
/// the capacity and checked for header alignment.
///
/// # Thread Safety
///
/// The region is `Send` but not `Sync`: ownership of the buffer may move
/// between threads, but it is never shared.
#[derive(Debug)]
pub struct Region {
    base: NonNull<u8>,
    layout: Layout,
}

unsafe impl Send for Region {}

impl Region {
    /// Reserves a region of exactly `capacity` bytes whose base is aligned to
    /// `align`.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::ZeroCapacity`] for an empty region,
    /// [`RegionError::InvalidLayout`] if `capacity` and `align` do not form a
    /// valid [`Layout`], and [`RegionError::OutOfMemory`] if the global
    /// allocator cannot provide the memory.
    pub fn new(capacity: usize, align: usize) -> Result<Self, RegionError> {
        ensure!(capacity > 0, region_error::ZeroCapacitySnafu);
        let layout = Layout::from_size_align(capacity, align)
            .context(region_error::InvalidLayoutSnafu { capacity, align })?;

        let base = NonNull::new(unsafe { global::alloc(layout) })
            .context(region_error::OutOfMemorySnafu { layout })?;

        debug!("region: reserved {capacity} bytes at {base:p} (align {align})");
        Ok(Self { base, layout })
    }

    /// Returns the size of the region in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.layout.size()
    }

    /// Returns the alignment of the region base.
    #[must_use]
    pub fn align(&self) -> usize {
        self.layout.align()
    }

    /// Returns a pointer to the first byte of the region.
    #[must_use]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Returns `true` if `ptr` points into the region.
    #[must_use]
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        self.offset_of(ptr).is_some()
    }

    /// Converts a pointer into the region into its offset from the base.
    pub(crate) fn offset_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        ptr.addr()
            .get()
            .checked_sub(self.base.addr().get())
            .filter(|&offset| offset < self.capacity())
    }

    /// Returns a pointer `offset` bytes past the region base.
    ///
    /// # Panics
    ///
    /// Panics if `offset` lies past the end of the region.
    pub(crate) fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        assert!(
            offset <= self.capacity(),
            "offset {offset:#x} out of region bounds ({:#x})",
            self.capacity()
        );
        unsafe { self.base.add(offset) }
    }

    /// Returns the chunk that physically follows the chunk at `chunk`, if
    /// any.
    pub(crate) fn right_of(&self, chunk: ChunkOffset) -> Option<ChunkOffset> {
        let end = chunk.get() + self.header(chunk).size();
        (end < self.capacity()).then(|| ChunkOffset::new(end))
    }

    pub(crate) fn header(&self, chunk: ChunkOffset) -> &ChunkHeader {
        let ptr = self.header_ptr(chunk);
        unsafe { ptr.as_ref() }
    }

    pub(crate) fn header_mut(&mut self, chunk: ChunkOffset) -> &mut ChunkHeader {
        let mut ptr = self.header_ptr(chunk);
        unsafe { ptr.as_mut() }
    }

    /// Writes a fresh header at `chunk`, overwriting whatever bytes were
    /// there.
    pub(crate) fn write_header(&mut self, chunk: ChunkOffset, header: ChunkHeader) {
        let ptr = self.header_ptr(chunk);
        unsafe { ptr.write(header) }
    }

    fn header_ptr(&self, chunk: ChunkOffset) -> NonNull<ChunkHeader> {
        assert!(
            chunk.get() + size_of::<ChunkHeader>() <= self.capacity(),
            "chunk header at {chunk} out of region bounds ({:#x})",
            self.capacity()
        );
        let ptr = self.ptr_at(chunk.get()).cast::<ChunkHeader>();
        assert!(ptr.is_aligned(), "chunk header at {chunk} is misaligned");
        ptr
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        debug!(
            "region: released {} bytes at {:p}",
            self.capacity(),
            self.base
        );
        unsafe { global::dealloc(self.base.as_ptr(), self.layout) }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkState;

    #[test]
    fn test_new_region() {
        let region = Region::new(1024, 16).unwrap();
        assert_eq!(region.capacity(), 1024);
        assert_eq!(region.align(), 16);
        assert_eq!(region.base().addr().get() % 16, 0);
    }

    #[test]
    fn test_zero_capacity() {
        assert!(matches!(
            Region::new(0, 16),
            Err(RegionError::ZeroCapacity { .. })
        ));
    }

    #[test]
    fn test_invalid_align() {
        assert!(matches!(
            Region::new(64, 3),
            Err(RegionError::InvalidLayout {
                capacity: 64,
                align: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_offsets() {
        let region = Region::new(256, 16).unwrap();
        let base = region.base();

        assert_eq!(region.offset_of(base), Some(0));
        assert_eq!(region.offset_of(region.ptr_at(100)), Some(100));
        assert_eq!(region.offset_of(region.ptr_at(256)), None);
        assert!(region.contains(region.ptr_at(255)));
        assert!(!region.contains(region.ptr_at(256)));
    }

    #[test]
    #[should_panic(expected = "out of region bounds")]
    fn test_ptr_past_end() {
        let region = Region::new(64, 16).unwrap();
        let _ = region.ptr_at(65);
    }

    #[test]
    fn test_header_round_trip() {
        let mut region = Region::new(256, 16).unwrap();
        let chunk = ChunkOffset::new(64);
        region.write_header(chunk, ChunkHeader::new(192, ChunkState::Free, None));

        assert_eq!(region.header(chunk).size(), 192);
        assert!(region.header(chunk).is_free());

        region.header_mut(chunk).set_state(ChunkState::Occupied);
        assert!(region.header(chunk).is_occupied());
        assert_eq!(region.right_of(chunk), None);
    }

    #[test]
    #[should_panic(expected = "misaligned")]
    fn test_misaligned_header() {
        let region = Region::new(256, 16).unwrap();
        let _ = region.header(ChunkOffset::new(8));
    }
}
