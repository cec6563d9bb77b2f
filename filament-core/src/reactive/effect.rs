//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is scheduled to re-run.
//!
//! 3. Before re-running, the effect runs the cleanups registered during its
//!    previous run, disposes the effects and memos it created during that
//!    run, and drops its old dependencies. New ones are tracked during
//!    execution, so dependencies may differ from run to run.
//!
//! # Use Cases
//!
//! Effects are used to synchronize reactive state with the outside world:
//!
//! - Updating the DOM when state changes
//! - Logging state changes
//! - Making network requests
//! - Writing to files
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.
//!
//! # Panics in Effects
//!
//! A panic escaping the body is caught where the effect is run, logged with
//! the location the effect was created at, and does not prevent other
//! effects of the same flush from running.

use std::cell::RefCell;
use std::panic::Location;
use std::rc::Rc;

use super::owner::Disposer;
use super::runtime::Runtime;
use crate::error::ReactiveError;
use crate::graph::EffectFn;

/// Create an effect that runs `f` now and again whenever anything it read
/// during its latest run changes.
///
/// The effect is owned by the current owner. Without one, the effect becomes
/// its own root (a warning is logged) and lives until the returned
/// [`Disposer`] is called. Under an owner that is already disposed, nothing
/// is created.
///
/// # Example
///
/// ```rust
/// use filament_core::{create_root, effect, signal};
/// use std::{cell::RefCell, rc::Rc};
///
/// let s = signal(1);
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// create_root(|_| {
///     let (s, log) = (s.clone(), log.clone());
///     effect(move || log.borrow_mut().push(s.get()));
/// });
/// assert_eq!(*log.borrow(), vec![1]);
///
/// s.set(2);
/// assert_eq!(*log.borrow(), vec![1, 2]);
///
/// s.set(2);
/// assert_eq!(*log.borrow(), vec![1, 2]);
/// ```
///
/// # Panics
///
/// Panics if writes made by the first run start an update cycle that does
/// not settle. Use [`try_effect`] to get the error instead.
#[track_caller]
pub fn effect(f: impl FnMut() + 'static) -> Disposer {
    match try_effect(f) {
        Ok(disposer) => disposer,
        Err(err) => panic!("{err}"),
    }
}

/// Fallible form of [`effect`].
#[track_caller]
pub fn try_effect(f: impl FnMut() + 'static) -> Result<Disposer, ReactiveError> {
    let run: EffectFn = Rc::new(RefCell::new(f));
    let scope = Runtime::create_effect(run, Location::caller())?;
    Ok(Disposer::new(scope))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_root, memo, on_cleanup, Signal};
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<usize>>, impl Fn()) {
        let count = Rc::new(Cell::new(0));
        let inc = {
            let count = count.clone();
            move || count.set(count.get() + 1)
        };
        (count, inc)
    }

    #[test]
    fn effect_runs_on_creation() {
        let (runs, inc) = counter();
        create_root(|_| {
            effect(move || inc());
        });

        // Effect should have run once on creation
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let (runs, inc) = counter();
        let signal = Signal::new(0);

        create_root(|_| {
            let signal = signal.clone();
            effect(move || {
                signal.get();
                inc();
            });
        });

        signal.set(1);
        signal.set(2);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let (runs, inc) = counter();
        let signal = Signal::new(0);

        let dispose = create_root(|_| {
            let signal = signal.clone();
            effect(move || {
                signal.get();
                inc();
            })
        });

        dispose.dispose();
        assert!(dispose.is_disposed());

        signal.set(1);
        assert_eq!(runs.get(), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn dependencies_are_rebuilt_each_run() {
        let (runs, inc) = counter();
        let use_a = Signal::new(true);
        let a = Signal::new(0);
        let b = Signal::new(0);

        create_root(|_| {
            let (use_a, a, b) = (use_a.clone(), a.clone(), b.clone());
            effect(move || {
                if use_a.get() {
                    a.get();
                } else {
                    b.get();
                }
                inc();
            });
        });

        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 0);

        use_a.set(false);
        assert_eq!(runs.get(), 2);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 1);

        // The branch no longer taken does not trigger re-runs.
        a.set(5);
        assert_eq!(runs.get(), 2);
        b.set(5);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn cleanup_runs_before_each_rerun_and_on_dispose() {
        let (cleanups, inc) = counter();
        let inc = Rc::new(inc);
        let signal = Signal::new(0);

        let dispose = create_root(|dispose| {
            let signal = signal.clone();
            effect(move || {
                signal.get();
                let inc = inc.clone();
                on_cleanup(move || inc());
            });
            dispose
        });

        assert_eq!(cleanups.get(), 0);
        signal.set(1);
        assert_eq!(cleanups.get(), 1);
        signal.set(2);
        assert_eq!(cleanups.get(), 2);

        dispose.dispose();
        assert_eq!(cleanups.get(), 3);
    }

    #[test]
    fn nested_effects_do_not_accumulate() {
        let (inner_cleanups, inc) = counter();
        let inc = Rc::new(inc);
        let outer = Signal::new(0);
        let inner = Signal::new(0);
        let (inner_runs, inner_inc) = counter();
        let inner_inc = Rc::new(inner_inc);

        create_root(|_| {
            let (outer, inner) = (outer.clone(), inner.clone());
            effect(move || {
                outer.get();
                let (inner, inc, inner_inc) = (inner.clone(), inc.clone(), inner_inc.clone());
                effect(move || {
                    inner.get();
                    inner_inc();
                    let inc = inc.clone();
                    on_cleanup(move || inc());
                });
            });
        });

        assert_eq!(inner.subscriber_count(), 1);

        outer.set(1);
        assert_eq!(inner_cleanups.get(), 1);
        assert_eq!(inner.subscriber_count(), 1);

        // Only the live inner effect reacts.
        let before = inner_runs.get();
        inner.set(1);
        assert_eq!(inner_runs.get(), before + 1);
    }

    #[test]
    fn effect_without_owner_is_its_own_root() {
        let (runs, inc) = counter();
        let signal = Signal::new(0);

        let dispose = {
            let signal = signal.clone();
            effect(move || {
                signal.get();
                inc();
            })
        };
        assert!(!dispose.is_disposed());

        signal.set(1);
        assert_eq!(runs.get(), 2);

        dispose.dispose();
        signal.set(2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn effect_under_disposed_owner_is_skipped() {
        let (runs, inc) = counter();
        let disposer = create_root(|dispose| {
            dispose.dispose();
            effect(move || inc())
        });

        assert_eq!(runs.get(), 0);
        assert!(disposer.owner().is_none());
        assert!(disposer.is_disposed());
    }

    #[test]
    fn effect_can_dispose_itself() {
        let (runs, inc) = counter();
        let signal = Signal::new(0);
        let handle: Rc<Cell<Option<Disposer>>> = Rc::new(Cell::new(None));

        create_root(|_| {
            let (signal, handle_in) = (signal.clone(), handle.clone());
            let disposer = effect(move || {
                if signal.get() > 0 {
                    if let Some(d) = handle_in.get() {
                        d.dispose();
                    }
                }
                inc();
            });
            handle.set(Some(disposer));
        });

        signal.set(1);
        assert_eq!(runs.get(), 2);
        signal.set(2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn writes_from_an_effect_are_flushed_after_it() {
        let source = Signal::new(1);
        let doubled = Signal::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));

        create_root(|_| {
            let (source, doubled_w) = (source.clone(), doubled.clone());
            effect(move || {
                doubled_w.set(source.get() * 2);
            });

            let (doubled, seen) = (doubled.clone(), seen.clone());
            effect(move || seen.borrow_mut().push(doubled.get()));
        });

        assert_eq!(*seen.borrow(), vec![2]);
        source.set(5);
        assert_eq!(*seen.borrow(), vec![2, 10]);
    }

    #[test]
    fn memo_created_in_effect_is_disposed_on_rerun() {
        let trigger = Signal::new(0);
        let observers = Rc::new(Cell::new(0));

        create_root(|_| {
            let (trigger, observers) = (trigger.clone(), observers.clone());
            effect(move || {
                let t = trigger.get();
                let m = memo(move || t + 1);
                m.get();
                observers.set(Runtime::stats().observers);
            });
        });

        let first = observers.get();
        trigger.set(1);
        trigger.set(2);
        assert_eq!(observers.get(), first);
    }
}
