//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When an observer runs, its id is pushed onto the stack. When the run
//! completes, it is popped.
//!
//! An entry may also be empty. `untrack`, `create_root` and
//! `run_with_owner` push an empty entry, which makes every read inside them
//! a plain peek. These are the documented reset points of the tracking
//! state: whatever observer was running outside is invisible inside.

use std::cell::RefCell;

use crate::graph::ObserverId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<ObserverId>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
#[must_use = "the context is exited as soon as the guard is dropped"]
pub struct ReactiveContext {
    observer: Option<ObserverId>,
}

impl ReactiveContext {
    /// Enter a tracking context for the given observer.
    ///
    /// While this context is active, any source that is read registers the
    /// observer as a subscriber.
    pub fn enter(observer: ObserverId) -> Self {
        Self::push(Some(observer))
    }

    /// Enter a context in which reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(observer: Option<ObserverId>) -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(observer));
        Self { observer }
    }

    /// Check if reads are currently tracked.
    pub fn is_active() -> bool {
        Self::current_observer().is_some()
    }

    /// Get the observer that reads are currently attributed to, if any.
    pub fn current_observer() -> Option<ObserverId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().copied().flatten())
    }

    /// Number of entries on the stack, tracked or not.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // `try_with`: guards can outlive the stack during thread teardown.
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry, self.observer,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.observer, entry
                );
            }
        });
    }
}
