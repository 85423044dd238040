#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]
#![cfg(test)]

use std::{collections::BTreeSet, ptr::NonNull};

use proptest::{prelude::*, sample::Index};
use region_alloc::{
    BestFit, FirstFit, PlacementPolicy, block::BlockAllocator,
    boundary_tag::BoundaryTagAllocator,
};

#[derive(Debug, Clone)]
enum Op {
    Allocate(usize),
    Deallocate(Index),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1_usize..512).prop_map(Op::Allocate),
        2 => any::<Index>().prop_map(Op::Deallocate),
    ]
}

#[derive(Debug)]
struct Live {
    ptr: NonNull<u8>,
    len: usize,
    pattern: u8,
}

impl Live {
    fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

fn check_structure<P>(
    allocator: &BoundaryTagAllocator<u8, P>,
    live: &[Live],
) -> Result<(), TestCaseError>
where
    P: PlacementPolicy,
{
    // conservation
    prop_assert_eq!(
        allocator.occupied_bytes() + allocator.free_bytes(),
        allocator.max_size()
    );

    // chunks partition the region and no two free chunks touch
    let chunks = allocator
        .chunks()
        .map(|(offset, header)| (offset.get(), header.size(), header.is_free()))
        .collect::<Vec<_>>();
    let mut cursor = 0;
    for &(offset, size, _) in &chunks {
        prop_assert_eq!(offset, cursor);
        prop_assert!(size >= BoundaryTagAllocator::<u8, P>::HEADER_SIZE);
        cursor += size;
    }
    prop_assert_eq!(cursor, allocator.max_size());
    for pair in chunks.windows(2) {
        prop_assert!(!(pair[0].2 && pair[1].2), "adjacent free chunks: {pair:?}");
    }

    // the free chain holds exactly the free chunks, each once
    let chain = allocator
        .free_chunks()
        .map(|(offset, _)| offset.get())
        .collect::<Vec<_>>();
    let chain_set = chain.iter().copied().collect::<BTreeSet<_>>();
    let free_set = chunks
        .iter()
        .filter(|(_, _, free)| *free)
        .map(|&(offset, _, _)| offset)
        .collect::<BTreeSet<_>>();
    prop_assert_eq!(chain.len(), chain_set.len());
    prop_assert_eq!(chain_set, free_set);

    let occupied = chunks.iter().filter(|(_, _, free)| !free).count();
    prop_assert_eq!(occupied, live.len());

    // live allocations never overlap and keep their contents
    let mut ranges = live
        .iter()
        .map(|entry| (entry.ptr.addr().get(), entry.len))
        .collect::<Vec<_>>();
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        prop_assert!(pair[0].0 + pair[0].1 <= pair[1].0, "overlap: {pair:?}");
    }
    for entry in live {
        prop_assert!(entry.bytes().iter().all(|&b| b == entry.pattern));
    }
    Ok(())
}

fn run<P>(capacity: usize, ops: &[Op]) -> Result<(), TestCaseError>
where
    P: PlacementPolicy,
{
    let mut allocator = BoundaryTagAllocator::<u8, P>::new(capacity).unwrap();
    let mut live = Vec::<Live>::new();
    let mut next_pattern = 0_u8;

    for op in ops {
        match op {
            Op::Allocate(len) => {
                let len = *len;
                let before = allocator.occupied_bytes();
                if let Some(ptr) = allocator.allocate(len) {
                    prop_assert!(
                        ptr.addr()
                            .get()
                            .is_multiple_of(BoundaryTagAllocator::<u8, P>::ALIGN)
                    );
                    let consumed = allocator.occupied_bytes() - before;
                    let required = BoundaryTagAllocator::<u8, P>::chunk_size_for(len).unwrap();
                    prop_assert!(consumed >= required);

                    next_pattern = next_pattern.wrapping_add(1);
                    unsafe { ptr.write_bytes(next_pattern, len) };
                    live.push(Live {
                        ptr,
                        len,
                        pattern: next_pattern,
                    });
                } else {
                    // nothing large enough may be left on the free chain
                    let required = BoundaryTagAllocator::<u8, P>::chunk_size_for(len).unwrap();
                    prop_assert!(
                        allocator
                            .free_chunks()
                            .all(|(_, header)| header.size() < required)
                    );
                }
            }
            Op::Deallocate(index) => {
                if live.is_empty() {
                    continue;
                }
                let freed = live.swap_remove(index.index(live.len()));
                prop_assert!(freed.bytes().iter().all(|&b| b == freed.pattern));
                unsafe { allocator.deallocate(freed.ptr.as_ptr()) };
            }
        }
        check_structure(&allocator, &live)?;
    }

    for freed in live.drain(..) {
        unsafe { allocator.deallocate(freed.ptr.as_ptr()) };
    }
    prop_assert_eq!(allocator.occupied_bytes(), 0);
    prop_assert_eq!(allocator.chunks().count(), 1);
    Ok(())
}

proptest! {
    #[test]
    fn first_fit_keeps_region_consistent(
        capacity in 256_usize..4096,
        ops in prop::collection::vec(op(), 1..128),
    ) {
        run::<FirstFit>(capacity, &ops)?;
    }

    #[test]
    fn best_fit_keeps_region_consistent(
        capacity in 256_usize..4096,
        ops in prop::collection::vec(op(), 1..128),
    ) {
        run::<BestFit>(capacity, &ops)?;
    }

    #[test]
    fn block_pool_hands_out_distinct_slots(
        slots in 1_usize..64,
        ops in prop::collection::vec(op(), 1..128),
    ) {
        let mut pool = BlockAllocator::<u64>::new(slots).unwrap();
        let mut live = Vec::new();

        for op in &ops {
            match op {
                Op::Allocate(_) => match pool.allocate(size_of::<u64>()) {
                    Some(ptr) => {
                        prop_assert!(!live.contains(&ptr));
                        live.push(ptr);
                    }
                    None => {
                        prop_assert_eq!(live.len(), slots);
                    }
                },
                Op::Deallocate(index) => {
                    if !live.is_empty() {
                        let ptr = live.swap_remove(index.index(live.len()));
                        unsafe { pool.deallocate(ptr.as_ptr()) };
                    }
                }
            }
            prop_assert_eq!(pool.count_occupied_blocks(), live.len());
            prop_assert_eq!(pool.occupied_bytes(), live.len() * size_of::<u64>());
        }
    }
}
