//! Reactive Primitives
//!
//! Typed handles over the untyped graph: signals, memos, effects, owners and
//! batches, plus the per-thread [`Runtime`] that drives them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] holds a value. Reading it while an effect or memo is running
//! subscribes that computation; writing a different value notifies every
//! subscriber.
//!
//! ## Memos
//!
//! A [`Memo`] caches a derived value. A change upstream only marks it stale;
//! the computation runs again the next time somebody reads it.
//!
//! ## Effects
//!
//! An effect runs once when created and again after each change to what it
//! read last time. Effects push reactive state out to the host: DOM patches,
//! logging, network calls.
//!
//! ## Owners
//!
//! Effects and memos hang off an [`Owner`]. Disposing an owner disposes its
//! subtree and runs its [`on_cleanup`] callbacks.
//!
//! # Tracking
//!
//! Dependencies are discovered at run time. The [`ReactiveContext`] stack
//! names the observer reads are attributed to; [`untrack`] and
//! [`create_root`] push an empty entry so reads beneath them are not
//! recorded.

mod batch;
mod context;
mod effect;
mod memo;
mod owner;
mod runtime;
mod signal;

pub use batch::{batch, batch_end, batch_start, is_batching, try_batch, untrack};
pub use context::ReactiveContext;
pub use effect::{effect, try_effect};
pub use memo::{memo, Memo, MemoState};
pub use owner::{create_root, get_owner, on_cleanup, run_with_owner, Disposer, Owner};
pub use runtime::{Runtime, RuntimeStats};
pub use signal::{signal, EqualsFn, Signal};
