use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::num::NonZero;
use std::ptr::NonNull;
use std::thread;

use scopeguard::ScopeGuard;
use tracing::debug;

use crate::{Block, DropPolicy, Error, FixedPoolBuilder, FreeList, Result, SlotLayout};

/// A pool of storage for values of type `T` that allocates and deallocates in O(1).
///
/// The pool owns a growing set of blocks, each one buffer with room for a fixed number of values.
/// Every slot of every block is in one of three states:
///
/// * **live** - holds a value handed out by [`allocate()`][1] and not yet [deallocated][2],
/// * **vacant** - held a value that has since been deallocated; its first bytes now hold a link
///   to the previously vacated slot, forming a stack of reusable slots,
/// * **virgin** - never used, located past the bump cursor of the newest block.
///
/// Allocation reuses the most recently vacated slot if there is one, otherwise it takes the next
/// virgin slot. Only when neither exists does the pool ask the system allocator for a new block.
/// Memory is never returned to the system until the pool is dropped.
///
/// # Out of band access
///
/// The pool hands out raw pointers and never creates references to the values it stores, so the
/// caller is free to create shared or exclusive references to a value through its pointer, for
/// as long as the value is live. The address of a value never changes while it is live, even as
/// the pool grows.
///
/// # Resource usage
///
/// The pool starts with one block and grows by one block whenever every slot is live. Each block
/// is a single allocation from the system allocator. Blocks are only released when the pool is
/// dropped.
///
/// Dropping the pool does not drop values that are still live, see [`DropPolicy`].
///
/// # Thread safety
///
/// The pool is thread-mobile ([`Send`]) if `T` is, but not thread-safe ([`Sync`]). To share a
/// pool between threads, wrap the whole pool in a mutex.
///
/// # Example
///
/// ```rust
/// use fixed_pool::FixedPool;
///
/// let mut pool = FixedPool::<String>::new();
///
/// let greeting = pool.allocate("Hello".to_string());
///
/// // SAFETY: The value is live and nothing else references it.
/// unsafe {
///     greeting.as_ptr().as_mut().unwrap().push_str(", World!");
/// }
///
/// // SAFETY: The value is live and nothing else references it exclusively.
/// assert_eq!(unsafe { greeting.as_ref() }, "Hello, World!");
///
/// // SAFETY: The pointer came from this pool and is not used after this call.
/// unsafe {
///     pool.deallocate(greeting);
/// }
///
/// assert!(pool.is_empty());
/// ```
///
/// [1]: Self::allocate
/// [2]: Self::deallocate
pub struct FixedPool<T> {
    /// The blocks that provide the storage of the pool, oldest first.
    ///
    /// Only the newest block can contain virgin slots, as a new block is only added once every
    /// slot of the existing blocks is live.
    blocks: Vec<Block>,

    slot_layout: SlotLayout,

    /// Slots whose value has been deallocated, most recently vacated on top.
    free_list: FreeList,

    /// Index of the first virgin slot in the newest block. Equal to the block capacity once every
    /// slot of the newest block has been handed out at least once.
    next_virgin_index: usize,

    /// Total number of slots in all blocks.
    capacity: usize,

    /// Number of live values.
    len: usize,

    drop_policy: DropPolicy,

    _item: PhantomData<T>,
}

impl<T> FixedPool<T> {
    /// # Errors
    ///
    /// Returns an error if the first block cannot be allocated.
    pub(crate) fn try_new_inner(
        block_capacity: NonZero<usize>,
        drop_policy: DropPolicy,
    ) -> Result<Self> {
        let slot_layout = SlotLayout::of::<T>(block_capacity)?;
        let first_block = Block::try_new(slot_layout)?;

        debug!(
            item_type = type_name::<T>(),
            block_capacity = block_capacity.get(),
            item_stride = slot_layout.stride().get(),
            "created pool"
        );

        Ok(Self {
            blocks: vec![first_block],
            slot_layout,
            free_list: FreeList::new(),
            next_virgin_index: 0,
            capacity: block_capacity.get(),
            len: 0,
            drop_policy,
            _item: PhantomData,
        })
    }

    /// Creates a new [`FixedPool`] with the default configuration.
    ///
    /// The pool starts with one block of capacity and grows automatically as values are
    /// allocated.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let pool = FixedPool::<u64>::new();
    ///
    /// assert!(pool.is_empty());
    /// assert_eq!(pool.block_count(), 1);
    /// assert_eq!(pool.capacity(), pool.block_capacity().get());
    /// ```
    ///
    /// # Panics
    ///
    /// If the system allocator cannot provide the first block, the global allocation error
    /// handler is invoked, which aborts the process by default.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a new [`FixedPool`].
    ///
    /// Use this when you want to customize the pool configuration beyond the defaults.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::{DropPolicy, FixedPool};
    /// use new_zealand::nz;
    ///
    /// let pool = FixedPool::<u32>::builder()
    ///     .block_capacity(nz!(128))
    ///     .drop_policy(DropPolicy::MustNotLeakItems)
    ///     .build();
    ///
    /// assert_eq!(pool.capacity(), 128);
    /// ```
    pub fn builder() -> FixedPoolBuilder<T> {
        FixedPoolBuilder::new()
    }

    /// The number of live values in the pool.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<i32>::new();
    /// assert_eq!(pool.len(), 0);
    ///
    /// let a = pool.allocate(42);
    /// let b = pool.allocate(24);
    /// assert_eq!(pool.len(), 2);
    ///
    /// // SAFETY: The pointer came from this pool and is not used after this call.
    /// unsafe { pool.deallocate(a) };
    /// assert_eq!(pool.len(), 1);
    /// # unsafe { pool.deallocate(b) };
    /// ```
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the pool has no live values.
    ///
    /// An empty pool still holds all the memory it has ever allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of values the pool can hold without allocating another block.
    ///
    /// This is the total number of slots in all blocks, including the slots of live values.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    /// use new_zealand::nz;
    ///
    /// let mut pool = FixedPool::<u8>::builder().block_capacity(nz!(2)).build();
    /// assert_eq!(pool.capacity(), 2);
    ///
    /// let items = [pool.allocate(1), pool.allocate(2), pool.allocate(3)];
    /// assert_eq!(pool.capacity(), 4);
    /// # for item in items { unsafe { pool.deallocate(item) } }
    /// ```
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of blocks the pool has allocated from the system allocator.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The number of slots in each block.
    #[must_use]
    pub fn block_capacity(&self) -> NonZero<usize> {
        self.slot_layout.block_capacity()
    }

    /// The number of bytes each slot occupies in a block.
    ///
    /// This is the size of `T` rounded up to a multiple of the pointer size (and to the alignment
    /// of `T`), because a slot must be able to hold a pointer once its value is deallocated.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let pool = FixedPool::<u8>::new();
    /// assert_eq!(pool.item_stride().get(), size_of::<usize>());
    ///
    /// let pool = FixedPool::<[u8; 9]>::new();
    /// assert!(pool.item_stride().get() >= 9);
    /// assert_eq!(pool.item_stride().get() % size_of::<usize>(), 0);
    /// ```
    #[must_use]
    pub fn item_stride(&self) -> NonZero<usize> {
        self.slot_layout.stride()
    }

    /// The [drop policy][DropPolicy] the pool was built with.
    #[must_use]
    pub fn drop_policy(&self) -> DropPolicy {
        self.drop_policy
    }

    /// Moves a value into the pool and returns its address.
    ///
    /// The address remains valid and the value stays in place until the pointer is passed to
    /// [`deallocate()`][1]. The most recently deallocated slot is reused first.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<i32>::new();
    ///
    /// let item = pool.allocate(42);
    ///
    /// // SAFETY: The value is live and nothing else references it exclusively.
    /// assert_eq!(unsafe { *item.as_ref() }, 42);
    /// # unsafe { pool.deallocate(item) };
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the capacity of the pool would exceed the address space. If the system
    /// allocator cannot provide a new block, the global allocation error handler is invoked,
    /// which aborts the process by default. Use [`try_allocate()`][2] to handle these cases.
    ///
    /// [1]: Self::deallocate
    /// [2]: Self::try_allocate
    #[must_use]
    pub fn allocate(&mut self, value: T) -> NonNull<T> {
        match self.try_allocate(value) {
            Ok(ptr) => ptr,
            Err(error) => error.raise(),
        }
    }

    /// Moves a value into the pool and returns its address, or returns an error if the pool
    /// needed to grow and could not.
    ///
    /// On error, the pool is left exactly as it was and the value is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`] or [`Error::BlockListGrowthFailed`] if the memory for
    /// a new block could not be allocated and [`Error::CapacityOverflow`] if the capacity of the
    /// pool would exceed the address space.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<String>::new();
    ///
    /// let item = pool.try_allocate("Hello".to_string())?;
    /// # unsafe { pool.deallocate(item) };
    /// # Ok::<(), fixed_pool::Error>(())
    /// ```
    pub fn try_allocate(&mut self, value: T) -> Result<NonNull<T>> {
        // SAFETY: The initializer fully initializes the slot.
        unsafe {
            self.try_allocate_with(|slot| {
                slot.write(value);
            })
        }
    }

    /// Allocates a slot and lets the caller construct the value directly in it.
    ///
    /// This avoids moving the value into the pool, which may be valuable for large values or
    /// for values that want to know their own address during construction.
    ///
    /// If the initializer panics, the slot is returned to the pool and nothing is dropped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::mem::MaybeUninit;
    ///
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<[u64; 64]>::new();
    ///
    /// // SAFETY: The initializer fully initializes the slot.
    /// let item = unsafe {
    ///     pool.allocate_with(|slot: &mut MaybeUninit<[u64; 64]>| {
    ///         slot.write([7; 64]);
    ///     })
    /// };
    ///
    /// // SAFETY: The value is live and nothing else references it exclusively.
    /// assert!(unsafe { item.as_ref() }.iter().all(|x| *x == 7));
    /// # unsafe { pool.deallocate(item) };
    /// ```
    ///
    /// # Panics
    ///
    /// Same as [`allocate()`][1].
    ///
    /// # Safety
    ///
    /// The initializer must fully initialize the `MaybeUninit<T>` before returning.
    ///
    /// [1]: Self::allocate
    #[must_use]
    pub unsafe fn allocate_with(&mut self, f: impl FnOnce(&mut MaybeUninit<T>)) -> NonNull<T> {
        // SAFETY: Forwarding guarantees from the caller.
        match unsafe { self.try_allocate_with(f) } {
            Ok(ptr) => ptr,
            Err(error) => error.raise(),
        }
    }

    /// Allocates a slot and lets the caller construct the value directly in it, or returns an
    /// error if the pool needed to grow and could not.
    ///
    /// The initializer is not called if an error is returned.
    ///
    /// # Errors
    ///
    /// Same as [`try_allocate()`][1].
    ///
    /// # Safety
    ///
    /// The initializer must fully initialize the `MaybeUninit<T>` before returning.
    ///
    /// [1]: Self::try_allocate
    pub unsafe fn try_allocate_with(
        &mut self,
        f: impl FnOnce(&mut MaybeUninit<T>),
    ) -> Result<NonNull<T>> {
        let slot = self.try_acquire_slot()?;

        // If the initializer panics, the slot goes back to the pool. Whatever the initializer
        // managed to write before panicking is leaked, not dropped, as it may be incomplete.
        let slot = scopeguard::guard(slot, |slot| {
            // SAFETY: We took the slot out of the pool above and it holds no complete value.
            unsafe {
                self.free_list.push(slot);
            }
        });

        // SAFETY: The slot is sized and aligned for `T` (guaranteed by `SlotLayout`) and is not
        // referenced by anyone else because it is neither live nor on the free list.
        let uninit = unsafe { slot.cast::<MaybeUninit<T>>().as_mut() };

        f(uninit);

        let slot = ScopeGuard::into_inner(slot);

        self.len = self
            .len
            .checked_add(1)
            .expect("guarded by len < capacity, which was checked when acquiring the slot");

        Ok(slot.cast())
    }

    /// Drops a value and returns its slot to the pool for reuse.
    ///
    /// The slot becomes the first candidate for the next allocation.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<String>::new();
    ///
    /// let first = pool.allocate("first".to_string());
    ///
    /// // SAFETY: The pointer came from this pool and is not used after this call.
    /// unsafe { pool.deallocate(first) };
    ///
    /// // The freed slot is reused.
    /// let second = pool.allocate("second".to_string());
    /// assert_eq!(first, second);
    /// # unsafe { pool.deallocate(second) };
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the pool has no live values, which always indicates a contract violation by
    /// the caller. If the destructor of the value panics, the slot is never reused.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that:
    ///
    /// * `ptr` was returned by an allocation from this same pool instance,
    /// * `ptr` has not been deallocated since it was returned,
    /// * no references to the value exist or are used after this call.
    ///
    /// Violating this contract is undefined behavior. The pool does not detect double frees or
    /// pointers from other pools.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<T>) {
        let len = self
            .len
            .checked_sub(1)
            .expect("deallocated more values than were allocated from the pool");

        // The value is dropped before its bytes are reused for the free list link,
        // so the destructor never observes a partially overwritten value.
        //
        // SAFETY: The caller guarantees that `ptr` points to a live value from this pool.
        unsafe {
            ptr.drop_in_place();
        }

        // SAFETY: The slot no longer holds a value. Every slot of this pool is sized and aligned
        // for a link and stays allocated until the pool is dropped.
        unsafe {
            self.free_list.push(ptr.cast());
        }

        self.len = len;
    }

    /// Takes a slot out of the pool, growing the pool if every slot is live.
    ///
    /// The slot is not counted as live until the caller has placed a value in it.
    fn try_acquire_slot(&mut self) -> Result<NonNull<u8>> {
        if self.len == self.capacity {
            self.try_grow()?;
        }

        if let Some(slot) = self.free_list.pop() {
            return Ok(slot);
        }

        let newest_block = self
            .blocks
            .last()
            .expect("a pool always has at least one block");

        // If there is no vacant slot and the newest block has no virgin slot left, all slots
        // are live, which the growth check above has already ruled out.
        let slot = newest_block.slot_ptr(self.next_virgin_index);

        self.next_virgin_index = self
            .next_virgin_index
            .checked_add(1)
            .expect("guarded by the bounds check in slot_ptr()");

        Ok(slot)
    }

    /// Adds one block to the pool. On error, the pool is left unchanged.
    #[cold]
    fn try_grow(&mut self) -> Result<()> {
        let capacity = self
            .capacity
            .checked_add(self.slot_layout.block_capacity().get())
            .ok_or(Error::CapacityOverflow)?;

        self.blocks.try_reserve(1)?;

        let block = Block::try_new(self.slot_layout)?;
        self.blocks.push(block);

        self.next_virgin_index = 0;
        self.capacity = capacity;

        debug!(
            item_type = type_name::<T>(),
            block_count = self.blocks.len(),
            capacity,
            "pool grew by one block"
        );

        Ok(())
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(test)]
    #[allow(
        clippy::arithmetic_side_effects,
        clippy::indexing_slicing,
        reason = "we do not need to worry about these things when writing test code"
    )]
    pub(crate) fn integrity_check(&self) {
        let block_capacity = self.slot_layout.block_capacity().get();

        assert!(!self.blocks.is_empty(), "pool of {} has no blocks", type_name::<T>());

        assert_eq!(
            self.capacity,
            self.blocks.len() * block_capacity,
            "capacity does not match the number of blocks in pool of {}",
            type_name::<T>()
        );

        assert!(
            self.len <= self.capacity,
            "len {} exceeds capacity {} in pool of {}",
            self.len,
            self.capacity,
            type_name::<T>()
        );

        assert!(
            self.next_virgin_index <= block_capacity,
            "bump cursor {} is beyond the end of the newest block in pool of {}",
            self.next_virgin_index,
            type_name::<T>()
        );

        let newest_block_index = self.blocks.len() - 1;
        let mut vacant_count = 0_usize;

        for slot in self.free_list.iter() {
            vacant_count += 1;

            assert!(
                vacant_count <= self.capacity,
                "free list of pool of {} is longer than its capacity, so it must contain a cycle",
                type_name::<T>()
            );

            let (block_index, slot_index) = self
                .blocks
                .iter()
                .enumerate()
                .find_map(|(block_index, block)| {
                    block
                        .slot_index_of(slot)
                        .map(|slot_index| (block_index, slot_index))
                })
                .unwrap_or_else(|| {
                    panic!(
                        "free list of pool of {} contains an address that is not a slot of the pool",
                        type_name::<T>()
                    )
                });

            if block_index == newest_block_index {
                assert!(
                    slot_index < self.next_virgin_index,
                    "free list of pool of {} contains virgin slot {slot_index}",
                    type_name::<T>()
                );
            }
        }

        let virgin_count = block_capacity - self.next_virgin_index;

        assert_eq!(
            self.len + vacant_count + virgin_count,
            self.capacity,
            "live {} + vacant {vacant_count} + virgin {virgin_count} slots do not add up to capacity {} in pool of {}",
            self.len,
            self.capacity,
            type_name::<T>()
        );

        if self.len == self.capacity {
            assert!(self.free_list.is_empty());
            assert_eq!(self.next_virgin_index, block_capacity);
        }
    }
}

impl<T> Default for FixedPool<T> {
    /// Creates a new [`FixedPool`] with the default configuration.
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FixedPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedPool")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("block_count", &self.blocks.len())
            .field("item_stride", &self.slot_layout.stride())
            .field("drop_policy", &self.drop_policy)
            .finish_non_exhaustive()
    }
}

impl<T> Drop for FixedPool<T> {
    fn drop(&mut self) {
        let leaked = self.len;

        debug!(
            item_type = type_name::<T>(),
            block_count = self.blocks.len(),
            leaked,
            "releasing pool memory"
        );

        // Newest block first. Live values are not dropped, only their memory is released.
        while let Some(block) = self.blocks.pop() {
            drop(block);
        }

        // We do this check at the end so we clean up the memory first. Mostly to make Miri happy.
        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if self.drop_policy == DropPolicy::MustNotLeakItems && !thread::panicking() {
            assert!(
                leaked == 0,
                "dropped a pool of {} holding {leaked} live values with a policy that says it must be empty when dropped",
                type_name::<T>()
            );
        }
    }
}

// SAFETY: The pool holds raw pointers to its own blocks and to values of type `T` only, with no
// thread-bound state, so it can move between threads as long as `T` itself can.
unsafe impl<T: Send> Send for FixedPool<T> {}
