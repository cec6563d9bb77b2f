//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns the dependency graph and the scheduler and decides when
//! user code runs.
//!
//! # How It Works
//!
//! 1. When a signal is created, it registers a source node.
//!
//! 2. When a memo or effect reads a source, the runtime records the edge
//!    for the observer on top of the [`ReactiveContext`] stack.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Walks the graph, marking effects dirty and memos stale
//!    b. Queues the dirty effects in the scheduler
//!    c. Flushes the queue, epoch by epoch, unless a batch is open
//!    d. Leaves memos alone; they recompute on next access
//!
//! # Threading
//!
//! Every thread has its own runtime. Nothing here is `Send`: handles created
//! on one thread belong to that thread's graph. Within a thread the runtime is
//! re-entrant in the sense that user code may read, write and create
//! primitives freely; the runtime itself never calls user code (or drops a
//! user closure) while its graph is borrowed.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;

use super::context::ReactiveContext;
use crate::config::config;
use crate::error::ReactiveError;
use crate::graph::{
    Cleanup, CreationSite, Disposal, EffectFn, Graph, ObserverId, OwnerId, SignalId,
    UpdateScheduler,
};

thread_local! {
    static RUNTIME: RuntimeState = RuntimeState::default();
}

#[derive(Default)]
struct RuntimeState {
    graph: RefCell<Graph>,
    scheduler: RefCell<UpdateScheduler>,
    owner: Cell<Option<OwnerId>>,
}

/// Counters describing the current thread's runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuntimeStats {
    /// Live source nodes (signals plus memo sources).
    pub signals: usize,
    /// Live effects and memos.
    pub observers: usize,
    /// Live owners, roots included.
    pub owners: usize,
    /// Effects queued for the next flush epoch.
    pub pending: usize,
    /// Depth of open batches.
    pub batch_depth: usize,
}

/// Guard that installs an owner and restores the previous one when dropped.
pub(crate) struct OwnerScope {
    prev: Option<OwnerId>,
}

impl OwnerScope {
    pub(crate) fn enter(owner: Option<OwnerId>) -> Self {
        let prev = RUNTIME.with(|rt| rt.owner.replace(owner));
        Self { prev }
    }
}

impl Drop for OwnerScope {
    fn drop(&mut self) {
        let _ = RUNTIME.try_with(|rt| rt.owner.set(self.prev));
    }
}

/// The per-thread reactive runtime.
///
/// All state is thread-local; this type only groups the operations on it.
pub struct Runtime;

impl Runtime {
    fn with_graph<R>(f: impl FnOnce(&mut Graph) -> R) -> R {
        RUNTIME.with(|rt| f(&mut rt.graph.borrow_mut()))
    }

    /// Like `with_graph`, but for drop paths: does nothing while the thread is
    /// shutting down.
    fn try_with_graph<R>(f: impl FnOnce(&mut Graph) -> R) -> Option<R> {
        RUNTIME
            .try_with(|rt| match rt.graph.try_borrow_mut() {
                Ok(mut graph) => Some(f(&mut graph)),
                Err(_) => {
                    tracing::warn!("reactive graph busy during teardown; node leaked");
                    None
                }
            })
            .ok()
            .flatten()
    }

    fn with_scheduler<R>(f: impl FnOnce(&mut UpdateScheduler) -> R) -> R {
        RUNTIME.with(|rt| f(&mut rt.scheduler.borrow_mut()))
    }

    /// Snapshot of node counts and scheduler state.
    pub fn stats() -> RuntimeStats {
        let (signals, observers, owners) = Self::with_graph(|g| {
            (g.signal_count(), g.observer_count(), g.owner_count())
        });
        let (pending, batch_depth) =
            Self::with_scheduler(|s| (s.pending_count(), s.depth()));
        RuntimeStats {
            signals,
            observers,
            owners,
            pending,
            batch_depth,
        }
    }

    // ------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------

    /// Get the observer that reads are currently attributed to, if any.
    pub fn current_observer() -> Option<ObserverId> {
        ReactiveContext::current_observer()
    }

    /// Record a read of `source` by the current observer, if there is one.
    pub fn track(source: SignalId) {
        if let Some(observer) = ReactiveContext::current_observer() {
            Self::with_graph(|g| g.link(source, observer));
        }
    }

    // ------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------

    pub(crate) fn create_signal() -> SignalId {
        Self::with_graph(|g| g.add_signal())
    }

    pub(crate) fn remove_signal(id: SignalId) {
        Self::try_with_graph(|g| g.remove_signal(id));
    }

    /// Number of observers whose latest run read `source`.
    pub fn subscriber_count(source: SignalId) -> usize {
        Self::with_graph(|g| g.subscriber_count(source))
    }

    /// Notify all dependents that a source changed.
    ///
    /// This is the core update propagation mechanism. Outside a batch the
    /// affected effects have all run by the time this returns.
    pub fn notify_signal_change(source: SignalId) -> Result<(), ReactiveError> {
        let effects = Self::with_graph(|g| g.mark_dependents(source));
        if effects.is_empty() {
            return Ok(());
        }

        let defer = Self::with_scheduler(|s| {
            for id in effects {
                s.enqueue(id);
            }
            s.should_defer()
        });

        if defer {
            Ok(())
        } else {
            Self::flush()
        }
    }

    // ------------------------------------------------------------------
    // Owners
    // ------------------------------------------------------------------

    /// The owner new primitives are attached to.
    pub fn current_owner() -> Option<OwnerId> {
        RUNTIME.with(|rt| rt.owner.get())
    }

    /// Whether an owner is still alive.
    pub fn owner_exists(owner: OwnerId) -> bool {
        Self::with_graph(|g| g.contains_owner(owner))
    }

    /// Number of live child owners.
    pub fn child_count(owner: OwnerId) -> usize {
        Self::with_graph(|g| g.owner(owner).map_or(0, |o| o.children.len()))
    }

    pub(crate) fn create_owner(parent: Option<OwnerId>, created_at: CreationSite) -> OwnerId {
        Self::with_graph(|g| g.add_owner(parent, created_at))
    }

    /// Tear down an owner: children first (most recent first), then its own
    /// cleanups (most recent first), then its observer and every edge of it.
    ///
    /// Disposing an owner that is already gone does nothing.
    pub fn dispose_owner(owner: OwnerId) {
        let Some(disposal) = Self::try_with_graph(|g| g.remove_owner(owner)).flatten() else {
            return;
        };
        tracing::debug!(
            %owner,
            children = disposal.children.len(),
            cleanups = disposal.cleanups.len(),
            "disposing owner"
        );
        Self::finish_disposal(disposal);
    }

    fn finish_disposal(disposal: Disposal) {
        let Disposal {
            children,
            cleanups,
            observer,
            created_at,
        } = disposal;

        for child in children.into_iter().rev() {
            Self::dispose_owner(child);
        }
        Self::run_cleanups(cleanups, created_at);

        if let Some(observer) = observer {
            // Dropped here, after the borrow is released.
            let removed = Self::try_with_graph(|g| g.remove_observer(observer));
            drop(removed);
        }
    }

    /// Run an owner's cleanups and dispose its children, keeping the owner.
    fn reset_scope(scope: OwnerId) {
        let Some(disposal) = Self::with_graph(|g| g.reset_owner(scope)) else {
            return;
        };
        let Disposal {
            children,
            cleanups,
            created_at,
            ..
        } = disposal;

        Self::run_cleanups(cleanups, created_at);
        for child in children.into_iter().rev() {
            Self::dispose_owner(child);
        }
    }

    fn run_cleanups(cleanups: Vec<Cleanup>, created_at: CreationSite) {
        if cleanups.is_empty() {
            return;
        }
        let _owner = OwnerScope::enter(None);
        let _ctx = ReactiveContext::untracked();
        for cleanup in cleanups.into_iter().rev() {
            Self::guarded(created_at, cleanup);
        }
    }

    /// Attach a cleanup to the current owner.
    pub(crate) fn register_cleanup(cleanup: Cleanup, created_at: CreationSite) {
        let Some(owner) = Self::current_owner() else {
            tracing::warn!(
                %created_at,
                "on_cleanup called outside of any owner; the callback will never run"
            );
            return;
        };

        if let Err(cleanup) = Self::with_graph(|g| g.push_cleanup(owner, cleanup)) {
            tracing::debug!(%owner, "owner already disposed; running cleanup immediately");
            let _ctx = ReactiveContext::untracked();
            Self::guarded(created_at, cleanup);
        }
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Register an effect under the current owner and run it once.
    ///
    /// Returns the effect's scope, or `None` if the current owner is already
    /// disposed, in which case nothing is created.
    pub(crate) fn create_effect(
        run: EffectFn,
        created_at: CreationSite,
    ) -> Result<Option<OwnerId>, ReactiveError> {
        let parent = Self::current_owner();
        match parent {
            Some(owner) if !Self::owner_exists(owner) => {
                tracing::debug!(%owner, %created_at, "effect created under a disposed owner; skipped");
                return Ok(None);
            }
            None if config().warn_on_implicit_root => {
                tracing::warn!(
                    %created_at,
                    "effect created outside of any owner becomes its own root and is only \
                     disposed through its handle"
                );
            }
            _ => {}
        }

        let (id, scope) = Self::with_graph(|g| {
            let scope = g.add_owner(parent, created_at);
            (g.add_effect(scope, run, created_at), scope)
        });

        Self::try_batch(|| Self::run_effect(id))?;
        Ok(Some(scope))
    }

    /// Register a memo computation under the current owner.
    ///
    /// A memo created under a disposed owner becomes a root; its lifetime is
    /// then bounded by its handle alone.
    pub(crate) fn create_memo(created_at: CreationSite) -> (ObserverId, SignalId, OwnerId) {
        let parent = Self::current_owner();
        Self::with_graph(|g| {
            let scope = g.add_owner(parent, created_at);
            let (id, source) = g.add_memo(scope, created_at);
            (id, source, scope)
        })
    }

    /// Steps shared by every re-run: cleanups, child disposal, edge removal.
    ///
    /// Returns the scope to run the body in, or `None` if the observer was
    /// disposed along the way.
    pub(crate) fn prepare_run(observer: ObserverId) -> Option<OwnerId> {
        let scope = Self::with_graph(|g| g.observer(observer).map(|n| n.scope))?;
        Self::reset_scope(scope);
        Self::with_graph(|g| {
            g.clear_sources(observer);
            let node = g.observer_mut(observer)?;
            node.dirty = false;
            Some(node.scope)
        })
    }

    /// Re-run a dirty effect. Disposed or clean effects are skipped.
    pub(crate) fn run_effect(id: ObserverId) {
        let entry = Self::with_graph(|g| {
            g.observer(id)
                .map(|n| (n.is_effect() && n.dirty, n.run.clone(), n.created_at))
        });
        let Some((runnable, run, created_at)) = entry else {
            tracing::debug!(observer = %id, "skipping disposed effect");
            return;
        };
        let (true, Some(run)) = (runnable, run) else {
            return;
        };

        let Some(scope) = Self::prepare_run(id) else {
            return;
        };

        let _owner = OwnerScope::enter(Some(scope));
        let _ctx = ReactiveContext::enter(id);
        Self::guarded(created_at, || match run.try_borrow_mut() {
            Ok(mut body) => (&mut *body)(),
            Err(_) => tracing::warn!(observer = %id, "effect re-entered while running; skipped"),
        });
    }

    /// `Some(stale)` for a live memo, `None` once it has been disposed.
    pub(crate) fn memo_is_stale(id: ObserverId) -> Option<bool> {
        Self::with_graph(|g| g.observer(id).map(|n| n.stale))
    }

    /// Clear a memo's stale flag ahead of its computation. A notification
    /// arriving while the computation runs sets it again.
    pub(crate) fn mark_memo_fresh(id: ObserverId) {
        Self::set_memo_stale(id, false);
    }

    /// Put a memo back to stale after its computation unwound.
    pub(crate) fn mark_memo_stale(id: ObserverId) {
        Self::set_memo_stale(id, true);
    }

    fn set_memo_stale(id: ObserverId, stale: bool) {
        // Unwind path: the graph may be gone or busy.
        Self::try_with_graph(|g| {
            if let Some(node) = g.observer_mut(id) {
                node.stale = stale;
                node.dirty = stale;
            }
        });
    }

    /// Run user code, isolating panics if configured to.
    fn guarded(created_at: CreationSite, f: impl FnOnce()) {
        if !config().catch_effect_panics {
            f();
            return;
        }
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
            let err = ReactiveError::from_panic(created_at, payload.as_ref());
            tracing::error!(error = %err, "panic in reactive callback");
        }
    }

    // ------------------------------------------------------------------
    // Batching
    // ------------------------------------------------------------------

    /// Open a batch. Effects notified until the matching [`Runtime::batch_end`]
    /// are deferred.
    pub fn batch_start() {
        Self::with_scheduler(|s| s.enter_batch());
    }

    /// Close a batch. Closing the outermost batch flushes pending effects.
    pub fn batch_end() -> Result<(), ReactiveError> {
        match Self::with_scheduler(|s| s.exit_batch()) {
            None => {
                tracing::warn!("batch_end called without a matching batch_start");
                Ok(())
            }
            Some(0) => Self::flush(),
            Some(_) => Ok(()),
        }
    }

    pub fn is_batching() -> bool {
        Self::with_scheduler(|s| s.is_batching())
    }

    /// Run `f` inside a batch. The batch is closed even if `f` panics.
    pub fn try_batch<T>(f: impl FnOnce() -> T) -> Result<T, ReactiveError> {
        // Only armed while `f` runs; on the normal path the result of
        // `batch_end` is returned to the caller instead.
        struct BatchGuard {
            armed: bool,
        }

        impl Drop for BatchGuard {
            fn drop(&mut self) {
                if self.armed {
                    if let Err(err) = Runtime::batch_end() {
                        tracing::error!(error = %err, "flush after panicking batch failed");
                    }
                }
            }
        }

        Self::batch_start();
        let mut guard = BatchGuard { armed: true };
        let value = f();
        guard.armed = false;
        Self::batch_end()?;
        Ok(value)
    }

    /// Drain the pending queue.
    ///
    /// Each epoch runs the set of effects pending when it starts; effects
    /// notified meanwhile wait for the next epoch. Does nothing inside a
    /// batch or when a flush is already running further up the stack.
    pub fn flush() -> Result<(), ReactiveError> {
        struct FlushGuard;

        impl Drop for FlushGuard {
            fn drop(&mut self) {
                let _ = RUNTIME.try_with(|rt| rt.scheduler.borrow_mut().end_flush());
            }
        }

        let claimed = Self::with_scheduler(|s| !s.is_batching() && s.begin_flush());
        if !claimed {
            return Ok(());
        }
        let _guard = FlushGuard;

        let limit = config().max_flush_epochs;
        let mut epoch = 0;
        loop {
            let pending = Self::with_scheduler(|s| s.take_epoch());
            if pending.is_empty() {
                return Ok(());
            }

            epoch += 1;
            if epoch > limit {
                Self::with_scheduler(|s| s.clear_pending());
                let err = ReactiveError::CyclicUpdate { epochs: limit };
                tracing::error!(error = %err, dropped = pending.len(), "aborting flush");
                return Err(err);
            }

            tracing::trace!(epoch, effects = pending.len(), "flushing epoch");
            for id in pending {
                Self::run_effect(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::Location;
    use std::rc::Rc;

    fn counting_effect(counter: Rc<Cell<usize>>) -> EffectFn {
        Rc::new(RefCell::new(move || counter.set(counter.get() + 1)))
    }

    #[test]
    fn effects_are_registered_and_run_once() {
        let runs = Rc::new(Cell::new(0));
        let root = Runtime::create_owner(None, Location::caller());
        let _owner = OwnerScope::enter(Some(root));

        let scope = Runtime::create_effect(counting_effect(runs.clone()), Location::caller())
            .unwrap()
            .unwrap();

        assert_eq!(runs.get(), 1);
        assert_eq!(Runtime::child_count(root), 1);
        assert!(Runtime::owner_exists(scope));
    }

    #[test]
    fn notify_runs_subscribed_effects() {
        let runs = Rc::new(Cell::new(0));
        let source = Runtime::create_signal();
        let counter = runs.clone();
        let body: EffectFn = Rc::new(RefCell::new(move || {
            Runtime::track(source);
            counter.set(counter.get() + 1);
        }));

        let root = Runtime::create_owner(None, Location::caller());
        let _owner = OwnerScope::enter(Some(root));
        Runtime::create_effect(body, Location::caller()).unwrap();

        assert_eq!(Runtime::subscriber_count(source), 1);
        Runtime::notify_signal_change(source).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn notifications_inside_a_batch_are_deferred() {
        let runs = Rc::new(Cell::new(0));
        let source = Runtime::create_signal();
        let counter = runs.clone();
        let body: EffectFn = Rc::new(RefCell::new(move || {
            Runtime::track(source);
            counter.set(counter.get() + 1);
        }));

        let root = Runtime::create_owner(None, Location::caller());
        let _owner = OwnerScope::enter(Some(root));
        Runtime::create_effect(body, Location::caller()).unwrap();

        Runtime::batch_start();
        Runtime::notify_signal_change(source).unwrap();
        Runtime::notify_signal_change(source).unwrap();
        assert_eq!(runs.get(), 1);
        assert_eq!(Runtime::stats().pending, 1);

        Runtime::batch_end().unwrap();
        assert_eq!(runs.get(), 2);
        assert_eq!(Runtime::stats().pending, 0);
    }

    #[test]
    fn disposing_an_owner_clears_edges() {
        let source = Runtime::create_signal();
        let body: EffectFn = Rc::new(RefCell::new(move || Runtime::track(source)));

        let root = Runtime::create_owner(None, Location::caller());
        {
            let _owner = OwnerScope::enter(Some(root));
            Runtime::create_effect(body, Location::caller()).unwrap();
        }
        assert_eq!(Runtime::subscriber_count(source), 1);

        Runtime::dispose_owner(root);
        assert_eq!(Runtime::subscriber_count(source), 0);
        assert!(!Runtime::owner_exists(root));

        // Idempotent.
        Runtime::dispose_owner(root);
    }

    #[test]
    fn unbalanced_batch_end_is_harmless() {
        assert!(Runtime::batch_end().is_ok());
        assert!(!Runtime::is_batching());
    }

    #[test]
    fn owner_scope_restores_previous_owner() {
        let a = Runtime::create_owner(None, Location::caller());
        let b = Runtime::create_owner(None, Location::caller());

        let _outer = OwnerScope::enter(Some(a));
        {
            let _inner = OwnerScope::enter(Some(b));
            assert_eq!(Runtime::current_owner(), Some(b));
        }
        assert_eq!(Runtime::current_owner(), Some(a));
    }

    #[test]
    fn stats_reflect_graph_contents() {
        let before = Runtime::stats();
        let source = Runtime::create_signal();
        assert_eq!(Runtime::stats().signals, before.signals + 1);
        Runtime::remove_signal(source);
        assert_eq!(Runtime::stats(), before);
    }
}
