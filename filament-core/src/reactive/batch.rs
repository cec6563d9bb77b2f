//! Batching and untracked reads.
//!
//! Without batching, each signal write runs the affected effects before it
//! returns. Inside a batch, writes still update values and mark dependents,
//! but effects wait until the outermost batch closes and then run once each.

use super::context::ReactiveContext;
use super::runtime::Runtime;
use crate::error::ReactiveError;

/// Batch multiple signal updates into a single flush.
///
/// # Example
///
/// ```rust
/// use filament_core::{batch, create_root, effect, signal};
/// use std::{cell::Cell, rc::Rc};
///
/// let a = signal(1);
/// let b = signal(2);
/// let runs = Rc::new(Cell::new(0));
///
/// create_root(|_| {
///     let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
///     effect(move || {
///         let _ = a.get() + b.get();
///         runs.set(runs.get() + 1);
///     });
/// });
///
/// batch(|| {
///     a.set(10);
///     b.set(20);
/// });
///
/// // Once on creation, once after the batch.
/// assert_eq!(runs.get(), 2);
/// ```
///
/// # Panics
///
/// Panics if the flush at the end of the batch detects an update cycle. The
/// batch is closed (and pending effects flushed) even if `f` panics.
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    match Runtime::try_batch(f) {
        Ok(value) => value,
        Err(err) => panic!("{err}"),
    }
}

/// Like [`batch`], returning flush errors instead of panicking.
pub fn try_batch<T>(f: impl FnOnce() -> T) -> Result<T, ReactiveError> {
    Runtime::try_batch(f)
}

/// Open a batch. Must be paired with [`batch_end`].
pub fn batch_start() {
    Runtime::batch_start();
}

/// Close a batch opened with [`batch_start`]. Closing the outermost batch
/// flushes the pending effects.
pub fn batch_end() -> Result<(), ReactiveError> {
    Runtime::batch_end()
}

/// Check if currently inside a batch.
pub fn is_batching() -> bool {
    Runtime::is_batching()
}

/// Read signals without creating dependencies.
///
/// # Example
///
/// ```rust
/// use filament_core::{create_root, effect, signal, untrack};
/// use std::{cell::Cell, rc::Rc};
///
/// let a = signal(1);
/// let b = signal(2);
/// let runs = Rc::new(Cell::new(0));
///
/// create_root(|_| {
///     let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
///     effect(move || {
///         a.get();
///         untrack(|| b.get());
///         runs.set(runs.get() + 1);
///     });
/// });
///
/// a.set(10); // re-runs
/// b.set(20); // does not
/// assert_eq!(runs.get(), 2);
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_root, effect, Signal};
    use std::cell::Cell;
    use std::rc::Rc;

    fn watch(signals: &[Signal<i32>]) -> Rc<Cell<usize>> {
        let runs = Rc::new(Cell::new(0));
        create_root(|_| {
            let signals = signals.to_vec();
            let runs = runs.clone();
            effect(move || {
                for s in &signals {
                    s.get();
                }
                runs.set(runs.get() + 1);
            });
        });
        runs
    }

    #[test]
    fn batch_defers_and_deduplicates() {
        let a = Signal::new(0);
        let b = Signal::new(0);
        let runs = watch(&[a.clone(), b.clone()]);

        batch(|| {
            a.set(1);
            b.set(1);
            a.set(2);
            assert_eq!(runs.get(), 1);
            assert!(is_batching());
        });

        assert_eq!(runs.get(), 2);
        assert!(!is_batching());
    }

    #[test]
    fn values_are_visible_inside_the_batch() {
        let a = Signal::new(0);
        batch(|| {
            a.set(5);
            assert_eq!(a.get(), 5);
        });
    }

    #[test]
    fn nested_batches_flush_once_at_the_outermost_end() {
        let a = Signal::new(0);
        let runs = watch(&[a.clone()]);

        batch_start();
        batch_start();
        a.set(1);
        batch_end().unwrap();
        assert_eq!(runs.get(), 1);
        a.set(2);
        batch_end().unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn batch_returns_value() {
        assert_eq!(batch(|| 7), 7);
        assert_eq!(try_batch(|| "ok").unwrap(), "ok");
    }

    #[test]
    fn batch_closes_when_body_panics() {
        let a = Signal::new(0);
        let runs = watch(&[a.clone()]);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            batch(|| {
                a.set(1);
                panic!("mid-batch");
            })
        }));

        assert!(result.is_err());
        assert!(!is_batching());
        // The write before the panic was still flushed.
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let a = Signal::new(0);
        let runs = Rc::new(Cell::new(0));

        create_root(|_| {
            let (a, runs) = (a.clone(), runs.clone());
            effect(move || {
                untrack(|| a.get());
                runs.set(runs.get() + 1);
            });
        });

        assert_eq!(a.subscriber_count(), 0);
        a.set(1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn untrack_passes_through_the_value() {
        let a = Signal::new(3);
        assert_eq!(untrack(|| a.get() * 2), 6);
    }
}
