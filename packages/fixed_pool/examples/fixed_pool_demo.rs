//! Allocates ten integers from a pool, prints where each one lives, releases them all and
//! then does the same again.
//!
//! The second round reuses the slots freed by the first round, most recently freed first, so
//! the same addresses show up in reverse order and the pool never grows beyond its first block.
//!
//! The pool logs its block allocations at debug level, which this example prints to stdout.

use std::ptr::NonNull;

use fixed_pool::FixedPool;
use tracing::Level;

const ITEM_COUNT: i32 = 10;

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let mut pool = FixedPool::<i32>::new();

    for round in 1..=2 {
        println!("Round {round}:");

        let items = (0..ITEM_COUNT)
            .map(|i| pool.allocate(i.wrapping_mul(7)))
            .collect::<Vec<_>>();

        for item in &items {
            print_item(*item);
        }

        for item in items {
            // SAFETY: Every item came from this pool and is deallocated exactly once.
            unsafe {
                pool.deallocate(item);
            }
        }

        println!(
            "Pool has {} live items and a capacity of {} in {} block(s)",
            pool.len(),
            pool.capacity(),
            pool.block_count()
        );
    }
}

fn print_item(item: NonNull<i32>) {
    // SAFETY: The item is live until the caller deallocates it.
    let value = unsafe { item.read() };

    println!("{item:p} : {value}");
}
