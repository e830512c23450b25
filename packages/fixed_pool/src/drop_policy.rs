/// Determines how a pool treats values that are still live when the pool is dropped.
///
/// The pool never runs the destructors of values that were not returned through
/// [`deallocate()`][1]. Dropping the pool releases the memory of every block either way; the policy
/// only decides whether leaking the remaining values is acceptable.
///
/// # Examples
///
/// ```
/// use fixed_pool::{DropPolicy, FixedPool};
///
/// // The drop policy is set at pool creation time.
/// let pool = FixedPool::<u32>::builder()
///     .drop_policy(DropPolicy::MustNotLeakItems)
///     .build();
/// ```
///
/// [1]: crate::FixedPool::deallocate
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// Values still live when the pool is dropped are leaked: their storage is released but
    /// their destructors never run. This is the default.
    #[default]
    MayLeakItems,

    /// The pool will panic if it still contains live values when it is dropped.
    ///
    /// This is useful when the values own resources that must be released by their destructor,
    /// making every leak a bug in the code that uses the pool.
    MustNotLeakItems,
}
