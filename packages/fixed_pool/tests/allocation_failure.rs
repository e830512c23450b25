//! Behavior of `FixedPool` when the system allocator refuses to provide memory.
//!
//! The global allocator of this test binary can be told to fail allocations on the current thread,
//! which lets the tests reach the growth failure paths of the pool without exhausting memory.

#![allow(
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    missing_docs,
    reason = "we do not need to worry about these things when writing test code"
)]

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::ptr::{self, NonNull};

use fixed_pool::{Error, FixedPool};
use new_zealand::nz;

#[global_allocator]
static ALLOCATOR: FailingAllocator = FailingAllocator;

thread_local! {
    // Allocations of at least this many bytes fail on this thread.
    static FAIL_FROM_SIZE: Cell<usize> = const { Cell::new(usize::MAX) };
}

struct FailingAllocator;

impl FailingAllocator {
    fn should_fail(size: usize) -> bool {
        FAIL_FROM_SIZE
            .try_with(|fail_from| size >= fail_from.get())
            .unwrap_or(false)
    }
}

// SAFETY: We delegate all allocation operations to the system allocator. Refusing an allocation
// by returning null is permitted by the `GlobalAlloc` contract.
unsafe impl GlobalAlloc for FailingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if Self::should_fail(layout.size()) {
            return ptr::null_mut();
        }

        // SAFETY: We forward the call to the system allocator.
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: We forward the call to the system allocator.
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if Self::should_fail(layout.size()) {
            return ptr::null_mut();
        }

        // SAFETY: We forward the call to the system allocator.
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if Self::should_fail(new_size) {
            return ptr::null_mut();
        }

        // SAFETY: We forward the call to the system allocator.
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

/// Makes allocations of at least `size` bytes fail on the current thread until the returned
/// guard is dropped.
fn fail_allocations_from(size: usize) -> impl Drop {
    FAIL_FROM_SIZE.set(size);

    scopeguard::guard((), |()| FAIL_FROM_SIZE.set(usize::MAX))
}

fn read<T: Copy>(ptr: NonNull<T>) -> T {
    // SAFETY: Only called on pointers to live values.
    unsafe { ptr.read() }
}

type Item = [u64; 100];

#[test]
fn failed_block_allocation_leaves_pool_unchanged() {
    let mut pool = FixedPool::<Item>::builder().block_capacity(nz!(4)).build();
    let block_size = pool.item_stride().get() * pool.block_capacity().get();

    let items: Vec<_> = (0..4).map(|i| pool.allocate([i; 100])).collect();
    assert_eq!(pool.capacity(), 4);

    let result = {
        // The block list itself is far smaller than a block, so only the block fails.
        let _failing = fail_allocations_from(block_size);
        pool.try_allocate([99; 100])
    };

    match result {
        Err(Error::AllocationFailed { layout }) => assert_eq!(layout.size(), block_size),
        other => panic!("expected the block allocation to fail, got {other:?}"),
    }

    assert_eq!(pool.block_count(), 1);
    assert_eq!(pool.capacity(), 4);
    assert_eq!(pool.len(), 4);

    for (i, item) in items.iter().enumerate() {
        assert_eq!(read(*item), [i as u64; 100]);
    }

    // A freed slot is still reused.
    // SAFETY: Allocated from this pool, deallocated once.
    unsafe {
        pool.deallocate(items[1]);
    }

    let reused = pool.allocate([11; 100]);
    assert_eq!(reused, items[1]);
    assert_eq!(read(reused), [11; 100]);

    // Growth works again once memory is available, and the new block provides virgin slots.
    let grown = pool.allocate([12; 100]);
    assert_eq!(pool.block_count(), 2);
    assert_eq!(pool.capacity(), 8);
    assert_eq!(pool.len(), 5);
    assert!(!items.contains(&grown));
    assert_eq!(read(grown), [12; 100]);
}

#[test]
fn failed_block_allocation_does_not_call_initializer() {
    let mut pool = FixedPool::<Item>::builder().block_capacity(nz!(4)).build();
    let block_size = pool.item_stride().get() * pool.block_capacity().get();

    let items: Vec<_> = (0..4).map(|i| pool.allocate([i; 100])).collect();

    let initializer_called = Cell::new(false);

    let result = {
        let _failing = fail_allocations_from(block_size);

        // SAFETY: The initializer fully initializes the slot.
        unsafe {
            pool.try_allocate_with(|slot| {
                initializer_called.set(true);
                slot.write([99; 100]);
            })
        }
    };

    assert!(matches!(result, Err(Error::AllocationFailed { .. })));
    assert!(!initializer_called.get());
    assert_eq!(pool.len(), items.len());
    assert_eq!(pool.block_count(), 1);
}

#[test]
fn failed_block_list_growth_leaves_pool_unchanged() {
    let mut pool = FixedPool::<u64>::builder().block_capacity(nz!(1)).build();
    let first = pool.allocate(1);

    let result = {
        // Every allocation fails, so growth stops at the block list before any block is made.
        let _failing = fail_allocations_from(1);
        pool.try_allocate(2)
    };

    assert!(matches!(result, Err(Error::BlockListGrowthFailed(_))));
    assert_eq!(pool.block_count(), 1);
    assert_eq!(pool.capacity(), 1);
    assert_eq!(pool.len(), 1);
    assert_eq!(read(first), 1);

    let second = pool.allocate(2);
    assert_eq!(pool.block_count(), 2);
    assert_eq!(read(second), 2);
}

#[test]
fn try_build_reports_failed_first_block() {
    let result = {
        let _failing = fail_allocations_from(1);
        FixedPool::<u64>::builder().try_build()
    };

    assert!(matches!(result, Err(Error::AllocationFailed { .. })));
}
