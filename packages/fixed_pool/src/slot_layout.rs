use std::alloc::Layout;
use std::num::NonZero;

use crate::{Error, Link, Result};

/// Memory layout shared by all the blocks of one pool.
///
/// Every slot must be able to hold a free list link once its value is gone, so the stride is the
/// size of the item rounded up to a multiple of the link (pointer) size and never less than one
/// link. The item alignment is honored on top of that, which for any item aligned to at most the
/// pointer alignment changes nothing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct SlotLayout {
    /// Distance in bytes between the start of one slot and the start of the next.
    stride: NonZero<usize>,

    block_capacity: NonZero<usize>,

    /// Layout of the single buffer that backs one block.
    block: Layout,
}

impl SlotLayout {
    /// Calculates the slot and block layout for items of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if a block of `block_capacity` slots would not fit in
    /// the address space.
    pub(crate) fn of<T>(block_capacity: NonZero<usize>) -> Result<Self> {
        let size = size_of::<T>()
            .checked_next_multiple_of(size_of::<Link>())
            .ok_or(Error::CapacityOverflow)?
            .max(size_of::<Link>());

        let align = align_of::<T>().max(align_of::<Link>());

        let Ok(slot) = Layout::from_size_align(size, align) else {
            return Err(Error::CapacityOverflow);
        };

        // The alignment is a power of two no smaller than the link size, so padding to it keeps
        // the size a multiple of the link size.
        let stride = NonZero::new(slot.pad_to_align().size())
            .expect("slot size is at least one link, so it cannot be zero");

        let block_size = stride
            .get()
            .checked_mul(block_capacity.get())
            .ok_or(Error::CapacityOverflow)?;

        let Ok(block) = Layout::from_size_align(block_size, align) else {
            return Err(Error::CapacityOverflow);
        };

        Ok(Self {
            stride,
            block_capacity,
            block,
        })
    }

    #[must_use]
    pub(crate) fn stride(&self) -> NonZero<usize> {
        self.stride
    }

    #[must_use]
    pub(crate) fn block_capacity(&self) -> NonZero<usize> {
        self.block_capacity
    }

    #[must_use]
    pub(crate) fn block(&self) -> Layout {
        self.block
    }
}
