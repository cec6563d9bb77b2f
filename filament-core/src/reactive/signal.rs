//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value changes, all subscribers are notified. Effects
//!    re-run; memos are only marked stale.
//!
//! 3. Writing a value the equality policy considers unchanged does nothing.
//!
//! # Equality Policy
//!
//! [`Signal::new`] (and [`signal`]) require `PartialEq` and skip writes equal
//! to the current value. [`Signal::with_equals`] takes an explicit
//! comparator. [`Signal::always_notify`] accepts any `T` and notifies on
//! every write.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID into the runtime's graph (8 bytes)
//! - The value, behind an `Rc<RefCell<_>>` shared by all clones
//! - An optional equality comparator
//!
//! The subscriber set lives in the graph and is removed when the last clone
//! of the handle is dropped.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::runtime::Runtime;
use crate::error::ReactiveError;
use crate::graph::SignalId;

/// Comparator deciding whether a write is a change. Returns `true` when the
/// two values are considered equal.
pub type EqualsFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

struct SignalInner<T> {
    id: SignalId,
    value: RefCell<T>,
    equals: Option<EqualsFn<T>>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        Runtime::remove_signal(self.id);
    }
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use filament_core::signal;
///
/// let count = signal(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// assert_eq!(count.peek(), 5);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal that skips writes equal to the current value.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        let equals: EqualsFn<T> = Rc::new(|a: &T, b: &T| a == b);
        Self::from_parts(value, Some(equals))
    }

    /// Create a new signal with a custom equality comparator.
    pub fn with_equals(value: T, equals: impl Fn(&T, &T) -> bool + 'static) -> Self {
        let equals: EqualsFn<T> = Rc::new(equals);
        Self::from_parts(value, Some(equals))
    }

    /// Create a new signal that notifies on every write.
    pub fn always_notify(value: T) -> Self {
        Self::from_parts(value, None)
    }

    fn from_parts(value: T, equals: Option<EqualsFn<T>>) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: Runtime::create_signal(),
                value: RefCell::new(value),
                equals,
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.with_untracked(T::clone)
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::track(self.inner.id);
        self.with_untracked(f)
    }

    /// Borrow the current value without tracking the read.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Set a new value and notify subscribers.
    ///
    /// Returns `true` if the value was considered changed.
    ///
    /// # Panics
    ///
    /// Panics if the write starts an update cycle that does not settle (see
    /// [`Signal::try_set`]), or if called from inside [`Signal::with`] on the
    /// same signal.
    pub fn set(&self, value: T) -> bool {
        match self.try_set(value) {
            Ok(changed) => changed,
            Err(err) => panic!("{err}"),
        }
    }

    /// Set a new value, returning an error instead of panicking if the
    /// resulting flush detects a runaway update cycle.
    pub fn try_set(&self, value: T) -> Result<bool, ReactiveError> {
        if let Some(equals) = &self.inner.equals {
            if equals(&*self.inner.value.borrow(), &value) {
                return Ok(false);
            }
        }

        let previous = self.inner.value.replace(value);
        // The old value may own reactive handles; drop it before notifying.
        drop(previous);

        Runtime::notify_signal_change(self.inner.id)?;
        Ok(true)
    }

    /// Update the value using a function of the current one.
    ///
    /// The current value is read without tracking.
    ///
    /// # Panics
    ///
    /// Same as [`Signal::set`].
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = self.with_untracked(f);
        self.set(next)
    }

    /// Fallible form of [`Signal::update`].
    pub fn try_update(&self, f: impl FnOnce(&T) -> T) -> Result<bool, ReactiveError> {
        let next = self.with_untracked(f);
        self.try_set(next)
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.id)
    }
}

/// Create a signal that skips writes equal to the current value.
pub fn signal<T: PartialEq + 'static>(initial: T) -> Signal<T> {
    Signal::new(initial)
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
