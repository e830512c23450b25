use std::ptr::NonNull;

/// The value stored in the first bytes of a vacant slot: the address of the next vacant slot,
/// or `None` at the end of the list.
pub(crate) type Link = Option<NonNull<u8>>;

/// Stack of the most recently freed slots of a pool, most recent on top.
///
/// The list has no storage of its own. Each vacant slot stores the address of the slot that was
/// freed before it, also known as an intrusive freelist.
#[derive(Debug)]
pub(crate) struct FreeList {
    head: Link,
}

impl FreeList {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self { head: None }
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Pushes a vacant slot onto the top of the stack, overwriting its first bytes with a link.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that `slot`:
    ///
    /// * is valid for writes of a [`Link`] and aligned for it,
    /// * holds no value that still needs to be read or dropped,
    /// * is not already in this or any other list,
    /// * stays allocated and untouched by anyone else until it is popped again.
    pub(crate) unsafe fn push(&mut self, slot: NonNull<u8>) {
        // SAFETY: Forwarding guarantees from the caller.
        unsafe {
            slot.cast::<Link>().write(self.head);
        }

        self.head = Some(slot);
    }

    /// Pops the most recently pushed slot, if any.
    ///
    /// The returned slot is no longer part of the list and the caller may overwrite it.
    #[must_use]
    pub(crate) fn pop(&mut self) -> Option<NonNull<u8>> {
        let slot = self.head?;

        // SAFETY: Every slot in the list had a link written into it by `push()` and the contract
        // of `push()` guarantees it has remained allocated and untouched since then.
        self.head = unsafe { slot.cast::<Link>().read() };

        Some(slot)
    }

    /// Walks the list from top to bottom without modifying it.
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = NonNull<u8>> {
        use std::iter;

        iter::successors(self.head, |slot| {
            // SAFETY: See `pop()`.
            unsafe { slot.cast::<Link>().read() }
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::indexing_slicing,
        reason = "we do not need to worry about these things when writing test code"
    )]

    use std::mem::MaybeUninit;

    use super::*;

    fn slots<const N: usize>(storage: &mut [MaybeUninit<Link>; N]) -> Vec<NonNull<u8>> {
        storage
            .iter_mut()
            .map(|slot| NonNull::from(slot).cast::<u8>())
            .collect()
    }

    #[test]
    fn new_is_empty() {
        let mut list = FreeList::new();

        assert!(list.is_empty());
        assert_eq!(list.pop(), None);
        assert_eq!(list.iter().count(), 0);
    }

    #[test]
    fn pops_in_reverse_push_order() {
        let mut storage = [MaybeUninit::<Link>::uninit(); 3];
        let slots = slots(&mut storage);

        let mut list = FreeList::new();

        for slot in &slots {
            // SAFETY: The slots are vacant, link-sized and outlive the list.
            unsafe {
                list.push(*slot);
            }
        }

        assert!(!list.is_empty());
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![slots[2], slots[1], slots[0]]);

        assert_eq!(list.pop(), Some(slots[2]));
        assert_eq!(list.pop(), Some(slots[1]));
        assert_eq!(list.pop(), Some(slots[0]));
        assert_eq!(list.pop(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn popped_slot_can_be_pushed_again() {
        let mut storage = [MaybeUninit::<Link>::uninit(); 2];
        let slots = slots(&mut storage);

        let mut list = FreeList::new();

        // SAFETY: The slots are vacant, link-sized and outlive the list.
        unsafe {
            list.push(slots[0]);
        }
        // SAFETY: As above.
        unsafe {
            list.push(slots[1]);
        }

        let top = list.pop().unwrap();
        assert_eq!(top, slots[1]);

        // SAFETY: We just popped it, so it is vacant again.
        unsafe {
            list.push(top);
        }

        assert_eq!(list.iter().collect::<Vec<_>>(), vec![slots[1], slots[0]]);
    }
}
