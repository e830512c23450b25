//! A pooling allocator for values of a single type, with O(1) allocation and deallocation.
//!
//! This crate provides [`FixedPool`], which stores values of one type `T` in large blocks of
//! memory obtained from the system allocator and hands out stable raw pointers to them.
//!
//! # Key Features
//!
//! - **O(1) allocation**: a freed slot is reused if there is one, otherwise the next never-used
//!   slot of the newest block is taken by bumping a cursor
//! - **O(1) deallocation**: the freed slot is pushed onto a free list that lives inside the freed
//!   slots themselves, so it costs no memory of its own
//! - **Stable addresses**: values never move, not even when the pool grows
//! - **Block-granular growth**: memory is requested from the system one block at a time and is
//!   only returned when the pool is dropped
//! - **Placement construction**: [`FixedPool::allocate_with()`] constructs a value directly in
//!   its slot
//! - **Fallible variants**: [`FixedPool::try_allocate()`] and [`FixedPoolBuilder::try_build()`]
//!   report allocation failure as an [`Error`] instead of aborting
//! - **Thread mobility**: the pool can be moved between threads (but not shared without
//!   synchronization)
//!
//! # Caller contract
//!
//! The pool does not track which pointers it has handed out. Passing a pointer to
//! [`FixedPool::deallocate()`] that did not come from the same pool, or passing the same pointer
//! twice, is undefined behavior. This is why deallocation is `unsafe`.
//!
//! Values that are still live when the pool is dropped are leaked: their memory is released but
//! their destructors do not run. Use [`DropPolicy::MustNotLeakItems`] to turn such leaks into
//! a panic.
//!
//! # Example
//!
//! ```rust
//! use fixed_pool::FixedPool;
//!
//! let mut pool = FixedPool::<i32>::new();
//!
//! let values: Vec<_> = (0..10).map(|i| pool.allocate(i * 7)).collect();
//!
//! for (i, value) in values.iter().enumerate() {
//!     // SAFETY: The value is live and nothing references it exclusively.
//!     assert_eq!(unsafe { *value.as_ref() }, i32::try_from(i).unwrap() * 7);
//! }
//!
//! for value in &values {
//!     // SAFETY: Each pointer came from this pool and is deallocated once.
//!     unsafe { pool.deallocate(*value) };
//! }
//!
//! // The freed slots are reused, most recently freed first.
//! let reused = pool.allocate(100);
//! assert_eq!(reused, values[9]);
//! # unsafe { pool.deallocate(reused) };
//! ```

mod block;
mod builder;
mod drop_policy;
mod error;
mod free_list;
mod pool;
mod slot_layout;

pub(crate) use block::*;
pub use builder::*;
pub use drop_policy::*;
pub use error::*;
pub(crate) use free_list::*;
pub use pool::FixedPool;
pub(crate) use slot_layout::*;
