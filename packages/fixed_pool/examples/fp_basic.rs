//! Basic usage of the `fixed_pool` crate:
//!
//! * Creating a pool.
//! * Allocating values.
//! * Accessing values through the returned pointers.
//! * Deallocating values.

use fixed_pool::FixedPool;

fn main() {
    let mut pool = FixedPool::<String>::new();

    // Allocating a value moves it into the pool and gives you a pointer to it.
    // The pointer stays valid until you give it back to the pool.
    let mut alice = pool.allocate("Alice".to_string());
    let bob = pool.allocate("Bob".to_string());
    let charlie = pool.allocate("Charlie".to_string());

    println!(
        "Pool contains {} items, with an auto-adjusting capacity of {}",
        pool.len(),
        pool.capacity()
    );

    // SAFETY: The value is live and nothing else references it.
    let alice_ref = unsafe { alice.as_ref() };
    println!("Retrieved item: {alice_ref}");

    // Deallocating drops the value and makes its slot available for reuse.
    // SAFETY: The pointer came from this pool and is deallocated once.
    unsafe {
        pool.deallocate(bob);
    }

    // SAFETY: The pointer came from this pool and is deallocated once.
    unsafe {
        pool.deallocate(charlie);
    }

    // Other values are not affected by deallocation, they never move.
    // SAFETY: The value is live and nothing else references it.
    let alice_ref = unsafe { alice.as_ref() };
    println!("Retrieved item after deallocation of other items: {alice_ref}");

    // You can also modify the values in-place.
    // SAFETY: The value is live and nothing else references it.
    let alice_mut = unsafe { alice.as_mut() };
    alice_mut.push_str(" Smith");
    println!("Modified item: {alice_mut}");

    // The most recently freed slot is the first to be reused.
    let dave = pool.allocate("Dave".to_string());
    assert_eq!(dave, charlie);

    // SAFETY: The pointer came from this pool and is deallocated once.
    unsafe {
        pool.deallocate(alice);
    }

    // SAFETY: The pointer came from this pool and is deallocated once.
    unsafe {
        pool.deallocate(dave);
    }
}
