//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.
//! Nodes are untyped: they hold ids, flags and edges. Typed values stay in
//! the handles exposed by the `reactive` module.

use std::cell::RefCell;
use std::fmt;
use std::panic::Location;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use smallvec::SmallVec;

macro_rules! node_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Generate a new unique id.
            pub fn new() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(0);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            /// Get the raw id value.
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

node_id!(
    /// Identifier of a source node: a signal, or the readable side of a memo.
    SignalId,
    "signal"
);

node_id!(
    /// Identifier of an observer (an effect or a memo computation).
    ObserverId,
    "observer"
);

node_id!(
    /// Identifier of a node in the ownership tree.
    OwnerId,
    "owner"
);

/// The body of an effect, shared so it can be invoked without holding a
/// borrow of the graph.
pub type EffectFn = Rc<RefCell<dyn FnMut()>>;

/// A callback registered with `on_cleanup`.
pub type Cleanup = Box<dyn FnOnce()>;

/// Creation site recorded for diagnostics.
pub type CreationSite = &'static Location<'static>;

/// The kind of observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverKind {
    /// Eager: re-runs as soon as the scheduler gets to it.
    Effect,

    /// Lazy: only marked stale, recomputed when pulled.
    Memo,
}

/// A source of change notifications.
#[derive(Debug, Default)]
pub struct SignalNode {
    /// Observers whose most recent run read this source, in subscription order.
    pub subscribers: IndexSet<ObserverId>,
}

/// A computation that reads sources.
pub struct ObserverNode {
    pub kind: ObserverKind,

    /// The owner wrapping the body. Cleanups and nested owners created during
    /// a run are attached here.
    pub scope: OwnerId,

    /// Sources read during the most recent run.
    pub sources: SmallVec<[SignalId; 4]>,

    /// Set by notification, cleared right before the body runs.
    pub dirty: bool,

    /// Memo only: the cache must be recomputed before it is read.
    pub stale: bool,

    /// Memo only: the node readers of this memo subscribe to.
    pub source: Option<SignalId>,

    /// Effect only: the body to re-run.
    pub run: Option<EffectFn>,

    pub created_at: CreationSite,
}

impl ObserverNode {
    pub fn effect(scope: OwnerId, run: EffectFn, created_at: CreationSite) -> Self {
        Self {
            kind: ObserverKind::Effect,
            scope,
            sources: SmallVec::new(),
            dirty: true,
            stale: false,
            source: None,
            run: Some(run),
            created_at,
        }
    }

    pub fn memo(scope: OwnerId, source: SignalId, created_at: CreationSite) -> Self {
        Self {
            kind: ObserverKind::Memo,
            scope,
            sources: SmallVec::new(),
            dirty: true,
            stale: true,
            source: Some(source),
            run: None,
            created_at,
        }
    }

    pub fn is_effect(&self) -> bool {
        self.kind == ObserverKind::Effect
    }
}

impl fmt::Debug for ObserverNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverNode")
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("sources", &self.sources)
            .field("dirty", &self.dirty)
            .field("stale", &self.stale)
            .field("created_at", &format_args!("{}", self.created_at))
            .finish()
    }
}

/// A node in the ownership tree.
pub struct OwnerNode {
    pub parent: Option<OwnerId>,

    /// Child owners in creation order.
    pub children: Vec<OwnerId>,

    /// Cleanups in registration order.
    pub cleanups: Vec<Cleanup>,

    /// The observer whose body this owner wraps, if any.
    pub observer: Option<ObserverId>,

    pub created_at: CreationSite,
}

impl OwnerNode {
    pub fn new(parent: Option<OwnerId>, created_at: CreationSite) -> Self {
        Self {
            parent,
            children: Vec::new(),
            cleanups: Vec::new(),
            observer: None,
            created_at,
        }
    }
}

impl fmt::Debug for OwnerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerNode")
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("cleanups", &self.cleanups.len())
            .field("observer", &self.observer)
            .finish()
    }
}
