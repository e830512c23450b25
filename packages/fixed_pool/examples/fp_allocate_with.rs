//! Constructing values directly in their pool slot with `allocate_with()`.
//!
//! This avoids building a large value on the stack only to move it into the pool.

use std::mem::MaybeUninit;

use fixed_pool::FixedPool;

const BUFFER_SIZE: usize = 4096;

struct Buffer {
    length: usize,
    bytes: [u8; BUFFER_SIZE],
}

fn main() {
    let mut pool = FixedPool::<Buffer>::new();

    // SAFETY: The initializer writes every field of the value before returning.
    let buffer = unsafe {
        pool.allocate_with(|slot: &mut MaybeUninit<Buffer>| {
            let ptr = slot.as_mut_ptr();

            // SAFETY: `ptr` is valid for writes and properly aligned for `Buffer`.
            unsafe {
                (&raw mut (*ptr).length).write(0);
            }

            // SAFETY: `ptr` is valid for writes and properly aligned for `Buffer`.
            unsafe {
                (&raw mut (*ptr).bytes).write_bytes(0, 1);
            }
        })
    };

    // SAFETY: The value is live and fully initialized.
    let (length, bytes_len) = unsafe {
        let buffer = buffer.as_ref();
        (buffer.length, buffer.bytes.len())
    };

    println!("Constructed a buffer in place: length {length} of {bytes_len} bytes");

    // SAFETY: The pointer came from this pool and is deallocated once.
    unsafe {
        pool.deallocate(buffer);
    }
}
