//! Filament Core
//!
//! This crate provides the reactive core of the Filament UI framework.
//! It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - Automatic, dynamic dependency tracking
//! - An ownership tree for scoped cleanup and disposal
//! - A batch scheduler with bounded, deduplicated flushes
//!
//! Rendering, hydration and build tooling live elsewhere and only talk to
//! this crate through the functions re-exported at the root.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Typed primitives and the per-thread runtime
//! - `graph`: Untyped dependency graph, ownership tree and scheduler state
//! - `config`: Process-wide runtime policy
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use filament_core::{create_root, effect, memo, signal};
//! use std::{cell::RefCell, rc::Rc};
//!
//! // Create a signal
//! let count = signal(0);
//!
//! // Create a derived value
//! let doubled = {
//!     let count = count.clone();
//!     memo(move || count.get() * 2)
//! };
//!
//! // Create an effect inside a root
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let dispose = create_root(|dispose| {
//!     let (count, doubled, log) = (count.clone(), doubled.clone(), log.clone());
//!     effect(move || log.borrow_mut().push((count.get(), doubled.get())));
//!     dispose
//! });
//!
//! // Update the signal; the effect runs before `set` returns
//! count.set(5);
//! assert_eq!(*log.borrow(), vec![(0, 0), (5, 10)]);
//!
//! dispose.dispose();
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use error::ReactiveError;
pub use reactive::{
    batch, batch_end, batch_start, create_root, effect, get_owner, is_batching, memo, on_cleanup,
    run_with_owner, signal, try_batch, try_effect, untrack, Disposer, Memo, MemoState, Owner,
    Runtime, RuntimeStats, Signal,
};
