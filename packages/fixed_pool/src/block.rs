use std::alloc::{alloc, dealloc};
use std::ptr::NonNull;

use crate::{Error, Result, SlotLayout};

/// One contiguous buffer with room for a fixed number of slots.
///
/// A block only owns memory. It does not know which of its slots hold values, so dropping a block
/// releases the buffer without dropping anything stored in it. The buffer never moves, which is
/// what keeps the addresses handed out by the pool stable.
#[derive(Debug)]
pub(crate) struct Block {
    first_slot_ptr: NonNull<u8>,

    slot_layout: SlotLayout,
}

impl Block {
    /// Allocates the buffer for a new block. The contents of the slots are uninitialized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`] if the system allocator cannot provide the buffer.
    pub(crate) fn try_new(slot_layout: SlotLayout) -> Result<Self> {
        let layout = slot_layout.block();

        // SAFETY: The layout is not zero-sized because a block holds at least one slot
        // and a slot is never smaller than one link.
        let ptr = unsafe { alloc(layout) };

        let first_slot_ptr = NonNull::new(ptr).ok_or(Error::AllocationFailed { layout })?;

        Ok(Self {
            first_slot_ptr,
            slot_layout,
        })
    }

    /// Returns a pointer to the start of the slot at `index`.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    #[must_use]
    pub(crate) fn slot_ptr(&self, index: usize) -> NonNull<u8> {
        assert!(
            index < self.slot_layout.block_capacity().get(),
            "slot {index} index out of bounds in block of {} slots",
            self.slot_layout.block_capacity()
        );

        // Cannot overflow because the whole block fits in the address space.
        let offset = index.wrapping_mul(self.slot_layout.stride().get());

        // SAFETY: Guarded by the bounds check above, so the offset stays within the buffer.
        unsafe { self.first_slot_ptr.add(offset) }
    }

    /// Returns the index of the slot that starts at `ptr`, or `None` if `ptr` is not the start
    /// of a slot in this block.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn slot_index_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        let offset = ptr
            .as_ptr()
            .addr()
            .checked_sub(self.first_slot_ptr.as_ptr().addr())?;

        if offset >= self.slot_layout.block().size() {
            return None;
        }

        let stride = self.slot_layout.stride().get();

        if offset.checked_rem(stride)? != 0 {
            return None;
        }

        offset.checked_div(stride)
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: The layout must match between alloc and dealloc. It does.
        unsafe {
            dealloc(self.first_slot_ptr.as_ptr(), self.slot_layout.block());
        }
    }
}
