//! Per-thread limits on how many threads the numeric kernels may fan out to.
//!
//! Parallel kernels check [`max_threads`] before dispatching work to rayon. The limit lives in a
//! thread local, so narrowing it on one thread never affects lookups running on another.

use std::{cell::Cell, marker::PhantomData};

thread_local! {
    static MAX_THREADS: Cell<Option<usize>> = const { Cell::new(None) };
}

/// The calling thread's current limit, rayon's pool size unless narrowed.
pub fn max_threads() -> usize {
    MAX_THREADS
        .with(Cell::get)
        .unwrap_or_else(rayon::current_num_threads)
}

/// Whether kernels running on this thread may go parallel.
pub fn parallel() -> bool {
    max_threads() > 1
}

/// Restricts the calling thread to serial kernels until dropped.
///
/// Single n-gram lookups work on matrices a few columns wide, dispatching them to a pool costs
/// more than computing them.
#[must_use = "the limit is lifted as soon as the guard is dropped"]
pub struct SingleThreaded {
    previous: Option<usize>,
    // Restoring must happen on the thread that narrowed the limit.
    _not_send: PhantomData<*const ()>,
}

impl SingleThreaded {
    pub fn enter() -> Self {
        let previous = MAX_THREADS.with(|max| max.replace(Some(1)));

        Self {
            previous,
            _not_send: PhantomData,
        }
    }
}

impl Drop for SingleThreaded {
    fn drop(&mut self) {
        MAX_THREADS.with(|max| max.set(self.previous));
    }
}
