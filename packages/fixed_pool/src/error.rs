use std::alloc::{Layout, handle_alloc_error};
use std::collections::TryReserveError;

use thiserror::Error;

use crate::Block;

/// Errors that can occur when a [`FixedPool`][crate::FixedPool] needs more memory.
///
/// Only growth of the pool can fail. Reusing a freed slot or handing out a never-used slot of an
/// existing block never fails.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The system allocator could not provide the buffer for a new block.
    #[error(
        "failed to allocate a pool block of {} bytes aligned to {}",
        .layout.size(),
        .layout.align()
    )]
    AllocationFailed {
        /// The layout of the block buffer that could not be allocated.
        layout: Layout,
    },

    /// The bookkeeping that tracks the blocks of the pool could not be grown.
    #[error("failed to grow the list of pool blocks")]
    BlockListGrowthFailed(#[from] TryReserveError),

    /// The requested block or pool size does not fit in the address space.
    #[error("pool capacity exceeds the addressable memory range")]
    CapacityOverflow,
}

impl Error {
    /// Reports the error the way the standard collections report a failure to grow: a failed
    /// system allocation goes to the global allocation error handler, anything else panics.
    #[cold]
    pub(crate) fn raise(self) -> ! {
        match self.out_of_memory_layout() {
            Some(layout) => handle_alloc_error(layout),
            None => panic!("{self}"),
        }
    }

    /// The layout to report to the allocation error handler if this error means the system
    /// allocator ran out of memory.
    ///
    /// The block list only fails to grow if its new buffer cannot be allocated, as its length
    /// is bounded by the pool capacity check that runs first. The exact size of that buffer is
    /// not exposed by `TryReserveError`, so the layout of one list entry stands in for it.
    fn out_of_memory_layout(&self) -> Option<Layout> {
        match self {
            Self::AllocationFailed { layout } => Some(*layout),
            Self::BlockListGrowthFailed(_) => Some(Layout::new::<Block>()),
            Self::CapacityOverflow => None,
        }
    }
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn allocation_failed_mentions_block_size() {
        let error = Error::AllocationFailed {
            layout: Layout::from_size_align(256, 8).unwrap(),
        };

        let message = error.to_string();
        assert!(message.contains("256 bytes"), "{message}");
        assert!(message.contains("aligned to 8"), "{message}");
    }

    #[test]
    fn block_list_growth_failed_exposes_source() {
        let reserve_error = Vec::<u64>::new().try_reserve(usize::MAX).unwrap_err();
        let error = Error::from(reserve_error);

        assert!(matches!(error, Error::BlockListGrowthFailed(_)));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn out_of_memory_errors_go_to_the_allocation_error_handler() {
        let layout = Layout::from_size_align(4096, 64).unwrap();
        let error = Error::AllocationFailed { layout };
        assert_eq!(error.out_of_memory_layout(), Some(layout));

        let reserve_error = Vec::<u64>::new().try_reserve(usize::MAX).unwrap_err();
        let error = Error::from(reserve_error);
        assert_eq!(error.out_of_memory_layout(), Some(Layout::new::<Block>()));
    }

    #[test]
    fn capacity_overflow_is_not_out_of_memory() {
        assert_eq!(Error::CapacityOverflow.out_of_memory_layout(), None);
    }

    #[test]
    #[should_panic]
    fn raise_capacity_overflow_panics() {
        Error::CapacityOverflow.raise();
    }
}
