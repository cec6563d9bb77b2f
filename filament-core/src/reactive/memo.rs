//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. Creating a memo does not run its computation.
//!
//! 2. On first access, the memo runs its computation and caches the result.
//!
//! 3. When a dependency changes, the memo is only marked stale, and the
//!    staleness is pushed on to whatever reads the memo. Nothing recomputes.
//!
//! 4. On next access, a stale memo recomputes from the current values of its
//!    dependencies, tracking them afresh.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation and makes
//! diamond-shaped graphs glitch-free:
//!
//! - A signal changes
//! - Two memos depend on it, and one effect reads both memos
//! - The effect is notified twice but queued once
//! - When it runs, each memo recomputes once, from the final signal value
//!
//! Memos that are never read stay stale; no work is wasted on them.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::panic::Location;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::runtime::{OwnerScope, Runtime};
use crate::graph::{CreationSite, ObserverId, OwnerId, SignalId};

/// Where a memo is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// Never read; the computation has not run.
    Uncomputed,

    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed since the last computation.
    Stale,

    /// The memo's owner was disposed. Reads return the last cached value.
    Disposed,
}

struct MemoInner<T> {
    id: ObserverId,
    source: SignalId,
    scope: OwnerId,
    compute: Box<dyn Fn() -> T>,
    cache: RefCell<Option<Rc<T>>>,
    computing: Cell<bool>,
    created_at: CreationSite,
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        Runtime::dispose_owner(self.scope);
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// Cloning a memo yields another handle to the same computation. When the
/// last handle is dropped the memo is disposed, as it is when its owner is.
pub struct Memo<T: 'static> {
    inner: Rc<MemoInner<T>>,
}

impl<T: 'static> Memo<T> {
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    #[track_caller]
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        let created_at = Location::caller();
        let (id, source, scope) = Runtime::create_memo(created_at);
        Self {
            inner: Rc::new(MemoInner {
                id,
                source,
                scope,
                compute: Box::new(compute),
                cache: RefCell::new(None),
                computing: Cell::new(false),
                created_at,
            }),
        }
    }

    /// Get the memo's observer ID.
    pub fn id(&self) -> ObserverId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// This is the main entry point for reading a memo's value. Inside a
    /// reactive context the read is tracked.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Get the current value, recomputing if necessary, without tracking.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.with_untracked(T::clone)
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        // A self-read must not leave an edge from the memo to itself.
        self.check_not_computing();
        Runtime::track(self.inner.source);
        self.with_untracked(f)
    }

    /// Borrow the current value without tracking the read.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.refresh();
        f(&value)
    }

    /// A closure reading this memo, for APIs that take accessors.
    pub fn accessor(&self) -> impl Fn() -> T + 'static
    where
        T: Clone,
    {
        let memo = self.clone();
        move || memo.get()
    }

    /// Make sure the cache is current and return it.
    fn refresh(&self) -> Rc<T> {
        self.check_not_computing();
        let cached = self.inner.cache.borrow().clone();
        match (Runtime::memo_is_stale(self.inner.id), cached) {
            (Some(false), Some(value)) => value,
            (Some(_), _) => self.recompute(),
            (None, Some(value)) => value,
            (None, None) => {
                // Disposed before it was ever read: compute once, untracked.
                tracing::debug!(observer = %self.inner.id, "reading a disposed memo");
                let value = {
                    let _owner = OwnerScope::enter(Some(self.inner.scope));
                    let _ctx = ReactiveContext::untracked();
                    Rc::new((self.inner.compute)())
                };
                self.store(value)
            }
        }
    }

    fn check_not_computing(&self) {
        if self.inner.computing.get() {
            panic!(
                "memo created at {} read itself while computing",
                self.inner.created_at
            );
        }
    }

    /// Recompute the memo's value.
    ///
    /// This runs the computation function within a reactive context to
    /// track dependencies. The stale flag is cleared before the computation
    /// starts, so a dependency written while it runs leaves the memo stale
    /// for the next read. If the computation panics, the memo stays stale.
    fn recompute(&self) -> Rc<T> {
        struct Computing<'a, U> {
            inner: &'a MemoInner<U>,
            finished: bool,
        }

        impl<U> Drop for Computing<'_, U> {
            fn drop(&mut self) {
                self.inner.computing.set(false);
                if !self.finished {
                    Runtime::mark_memo_stale(self.inner.id);
                }
            }
        }

        let inner = &*self.inner;
        inner.computing.set(true);
        let mut computing = Computing {
            inner,
            finished: false,
        };

        let Some(scope) = Runtime::prepare_run(inner.id) else {
            // Disposed by one of its own cleanups.
            let value = {
                let _ctx = ReactiveContext::untracked();
                Rc::new((inner.compute)())
            };
            computing.finished = true;
            drop(computing);
            return self.store(value);
        };
        Runtime::mark_memo_fresh(inner.id);

        let value = {
            let _owner = OwnerScope::enter(Some(scope));
            let _ctx = ReactiveContext::enter(inner.id);
            Rc::new((inner.compute)())
        };
        computing.finished = true;
        drop(computing);

        self.store(value)
    }

    fn store(&self, value: Rc<T>) -> Rc<T> {
        let previous = self.inner.cache.replace(Some(value.clone()));
        drop(previous);
        value
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> MemoState {
        match Runtime::memo_is_stale(self.inner.id) {
            None => MemoState::Disposed,
            Some(_) if !self.has_value() => MemoState::Uncomputed,
            Some(true) => MemoState::Stale,
            Some(false) => MemoState::Clean,
        }
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.cache.borrow().is_some()
    }

    /// Get the number of observers reading this memo.
    pub fn dependent_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.source)
    }
}

/// Create a memo; see [`Memo::new`].
#[track_caller]
pub fn memo<T: 'static>(compute: impl Fn() -> T + 'static) -> Memo<T> {
    Memo::new(compute)
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("cached", &self.inner.cache.borrow())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
