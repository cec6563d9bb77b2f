//! Dependency Graph
//!
//! This module implements the untyped dependency graph and ownership tree
//! that back the reactive primitives.
//!
//! # Overview
//!
//! The graph has three kinds of nodes, each indexed by a stable integer id:
//!
//! - Sources (signals, and the readable side of memos) with their subscriber sets
//! - Observers (effects and memo computations) with the sources they read
//! - Owners, forming the scope tree that decides when observers are torn down
//!
//! Edges are stored in both directions so that "forget every edge of X" is
//! proportional to the degree of X, not to the size of the graph.
//!
//! # Design Decisions
//!
//! 1. The graph never holds typed values or calls user code. The `reactive`
//!    module keeps values in its handles and drives the graph through the
//!    runtime.
//!
//! 2. Propagation is push-dirty only: a write marks effects dirty and memos
//!    stale. Memos recompute when they are pulled, which keeps diamond-shaped
//!    graphs glitch-free.
//!
//! 3. The scheduler defers effect execution into epochs so that writes made
//!    by effects never recurse into the notifier.

mod arena;
mod node;
mod scheduler;

pub use arena::{Disposal, Graph};
pub use node::{
    Cleanup, CreationSite, EffectFn, ObserverId, ObserverKind, ObserverNode, OwnerId, OwnerNode,
    SignalId, SignalNode,
};
pub use scheduler::UpdateScheduler;
