//! Ownership Tree
//!
//! Every effect and memo is created under an owner. Owners form a tree:
//! disposing one tears down its whole subtree, runs the cleanups registered
//! with [`on_cleanup`], and removes every dependency edge of the observers
//! inside it. This is what lets a renderer unmount a component, or an island
//! loader drop a hydrated island, with a single call.
//!
//! # Roots
//!
//! [`create_root`] starts a new tree. The closure receives a [`Disposer`] for
//! the root; nothing inside the root is released until it is called.
//!
//! # Restoring Owners
//!
//! The current owner is ambient state. Code that resumes later (after an
//! `.await`, from a timer callback) has lost it; capture it with
//! [`get_owner`] beforehand and re-enter with [`run_with_owner`].

use std::panic::Location;

use super::context::ReactiveContext;
use super::runtime::{OwnerScope, Runtime};
use crate::graph::OwnerId;

/// Handle to a node of the ownership tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner {
    id: OwnerId,
}

impl Owner {
    pub(crate) fn from_id(id: OwnerId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> OwnerId {
        self.id
    }

    /// Dispose this owner and everything below it. Idempotent.
    pub fn dispose(&self) {
        Runtime::dispose_owner(self.id);
    }

    pub fn is_disposed(&self) -> bool {
        !Runtime::owner_exists(self.id)
    }

    /// Number of live child owners (effects, memos and nested roots
    /// created directly under this owner).
    pub fn child_count(&self) -> usize {
        Runtime::child_count(self.id)
    }
}

/// Tears down a root or a single effect.
///
/// Dropping a `Disposer` does not dispose anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disposer {
    owner: Option<Owner>,
}

impl Disposer {
    pub(crate) fn new(owner: Option<OwnerId>) -> Self {
        Self {
            owner: owner.map(Owner::from_id),
        }
    }

    /// Dispose the owned subtree. Calling this more than once is a no-op.
    pub fn dispose(&self) {
        if let Some(owner) = self.owner {
            owner.dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.owner.map_or(true, |o| o.is_disposed())
    }

    /// The owner this disposer tears down. `None` for an effect that was
    /// never created because its owner was already disposed.
    pub fn owner(&self) -> Option<Owner> {
        self.owner
    }
}

/// Create a new root owner and run `f` inside it.
///
/// Reads inside `f` are not tracked, even when `create_root` is called from
/// inside an effect: the tracking context is reset at the root boundary.
///
/// # Example
///
/// ```rust
/// use filament_core::{create_root, effect, signal};
/// use std::{cell::RefCell, rc::Rc};
///
/// let count = signal(1);
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let dispose = create_root(|dispose| {
///     let (count, log) = (count.clone(), log.clone());
///     effect(move || log.borrow_mut().push(count.get()));
///     dispose
/// });
///
/// count.set(2);
/// dispose.dispose();
/// count.set(3);
/// assert_eq!(*log.borrow(), vec![1, 2]);
/// ```
#[track_caller]
pub fn create_root<T>(f: impl FnOnce(Disposer) -> T) -> T {
    let root = Runtime::create_owner(None, Location::caller());
    let _owner = OwnerScope::enter(Some(root));
    let _ctx = ReactiveContext::untracked();
    f(Disposer::new(Some(root)))
}

/// Register a callback to run when the current owner is disposed, or before
/// the enclosing effect or memo runs again.
///
/// Cleanups run in reverse registration order. Outside of any owner the
/// callback is dropped with a warning; under an owner that is already
/// disposed it runs immediately.
#[track_caller]
pub fn on_cleanup(f: impl FnOnce() + 'static) {
    Runtime::register_cleanup(Box::new(f), Location::caller());
}

/// The owner new effects and memos would be attached to.
pub fn get_owner() -> Option<Owner> {
    Runtime::current_owner().map(Owner::from_id)
}

/// Run `f` with `owner` as the current owner. Reads inside `f` are untracked.
///
/// If the owner has been disposed in the meantime, `f` still runs, but
/// effects created inside it are silently skipped and cleanups registered
/// inside it run immediately.
pub fn run_with_owner<T>(owner: Owner, f: impl FnOnce() -> T) -> T {
    let _owner = OwnerScope::enter(Some(owner.id));
    let _ctx = ReactiveContext::untracked();
    f()
}
