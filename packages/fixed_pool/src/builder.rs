use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZero;

use new_zealand::nz;

use crate::{DropPolicy, FixedPool, Result};

/// Number of slots in each block of a pool unless configured otherwise.
#[cfg(not(miri))]
pub(crate) const DEFAULT_BLOCK_CAPACITY: NonZero<usize> = nz!(32);

// Under Miri, we use a smaller block capacity because Miri test runtime scales by memory usage.
#[cfg(miri)]
pub(crate) const DEFAULT_BLOCK_CAPACITY: NonZero<usize> = nz!(4);

/// Builder for creating an instance of [`FixedPool`].
///
/// You only need to use this builder if you want to customize the pool configuration.
/// The default configuration used by [`FixedPool::new()`][1] is sufficient for most use cases.
///
/// # Examples
///
/// ```
/// use fixed_pool::{DropPolicy, FixedPool};
/// use new_zealand::nz;
///
/// let pool = FixedPool::<u32>::builder()
///     .block_capacity(nz!(64))
///     .drop_policy(DropPolicy::MustNotLeakItems)
///     .build();
///
/// assert_eq!(pool.capacity(), 64);
/// ```
///
/// [1]: FixedPool::new
#[must_use]
pub struct FixedPoolBuilder<T> {
    block_capacity: NonZero<usize>,
    drop_policy: DropPolicy,

    _item: PhantomData<T>,
}

impl<T> fmt::Debug for FixedPoolBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedPoolBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("block_capacity", &self.block_capacity)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

impl<T> FixedPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            block_capacity: DEFAULT_BLOCK_CAPACITY,
            drop_policy: DropPolicy::default(),
            _item: PhantomData,
        }
    }

    /// Sets the number of slots in each block of the pool.
    ///
    /// The pool allocates memory from the system one block at a time, so this is both the
    /// initial capacity of the pool and the amount by which the capacity grows.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_pool::FixedPool;
    /// use new_zealand::nz;
    ///
    /// let pool = FixedPool::<u64>::builder().block_capacity(nz!(8)).build();
    ///
    /// assert_eq!(pool.block_capacity(), nz!(8));
    /// ```
    pub fn block_capacity(mut self, block_capacity: NonZero<usize>) -> Self {
        self.block_capacity = block_capacity;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs how
    /// to treat values that are still live when the pool is dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_pool::{DropPolicy, FixedPool};
    ///
    /// let pool = FixedPool::<u32>::builder()
    ///     .drop_policy(DropPolicy::MustNotLeakItems)
    ///     .build();
    ///
    /// assert_eq!(pool.drop_policy(), DropPolicy::MustNotLeakItems);
    /// ```
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the pool with the specified configuration, allocating its first block.
    ///
    /// # Panics
    ///
    /// Panics if a block of the configured capacity does not fit in the address space. If the
    /// system allocator cannot provide the first block, the global allocation error handler is
    /// invoked, which aborts the process by default.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_pool::FixedPool;
    ///
    /// let pool = FixedPool::<u32>::builder().build();
    ///
    /// assert!(pool.is_empty());
    /// ```
    #[must_use]
    pub fn build(self) -> FixedPool<T> {
        match self.try_build() {
            Ok(pool) => pool,
            Err(error) => error.raise(),
        }
    }

    /// Builds the pool with the specified configuration, allocating its first block, or
    /// returns an error if the first block cannot be allocated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`][1] if a block of the configured capacity does not fit
    /// in the address space and [`Error::AllocationFailed`][2] if the system allocator cannot
    /// provide it.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZero;
    ///
    /// use fixed_pool::{Error, FixedPool};
    ///
    /// let result = FixedPool::<u64>::builder()
    ///     .block_capacity(NonZero::new(usize::MAX).unwrap())
    ///     .try_build();
    ///
    /// assert!(matches!(result, Err(Error::CapacityOverflow)));
    /// ```
    ///
    /// [1]: crate::Error::CapacityOverflow
    /// [2]: crate::Error::AllocationFailed
    pub fn try_build(self) -> Result<FixedPool<T>> {
        FixedPool::try_new_inner(self.block_capacity, self.drop_policy)
    }
}
