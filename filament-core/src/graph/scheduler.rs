//! Update Scheduler
//!
//! The scheduler holds effects that were notified but have not run yet.
//!
//! # Algorithm
//!
//! Effects are never run from inside a notification. Instead:
//!
//! 1. A write marks dependents through the graph and enqueues the dirty
//!    effects here. The queue is a set, so an effect notified through several
//!    paths is queued once.
//! 2. When no batch is open, the runtime drains the queue one *epoch* at a
//!    time: it takes the whole pending set, runs it, and anything those
//!    effects enqueue lands in a fresh set for the next epoch.
//! 3. Epochs are counted; a runaway chain of writes is cut off instead of
//!    recursing forever.
//!
//! The scheduler itself is plain bookkeeping. Running effects is the
//! runtime's job.

use indexmap::IndexSet;

use super::node::ObserverId;

/// Pending effects plus batch and flush state.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    /// Effects waiting for the next epoch, in notification order.
    pending: IndexSet<ObserverId>,

    /// Nesting depth of open batches.
    depth: usize,

    /// Whether a flush loop is currently draining the queue.
    flushing: bool,
}

impl UpdateScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a batch.
    pub fn enter_batch(&mut self) {
        self.depth += 1;
    }

    /// Close a batch and return the remaining depth.
    ///
    /// Returns `None` if no batch was open.
    pub fn exit_batch(&mut self) -> Option<usize> {
        self.depth = self.depth.checked_sub(1)?;
        Some(self.depth)
    }

    pub fn is_batching(&self) -> bool {
        self.depth > 0
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether new work should be deferred rather than flushed right away.
    pub fn should_defer(&self) -> bool {
        self.depth > 0 || self.flushing
    }

    /// Queue an effect. Returns `false` if it was already pending.
    pub fn enqueue(&mut self, id: ObserverId) -> bool {
        self.pending.insert(id)
    }

    /// Take everything queued so far as one epoch.
    pub fn take_epoch(&mut self) -> IndexSet<ObserverId> {
        std::mem::take(&mut self.pending)
    }

    /// Drop all pending work.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Claim the flush loop. Returns `false` if a flush is already running,
    /// in which case the running loop will pick up any new work.
    pub fn begin_flush(&mut self) -> bool {
        if self.flushing {
            return false;
        }
        self.flushing = true;
        true
    }

    pub fn end_flush(&mut self) {
        self.flushing = false;
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing
    }
}
