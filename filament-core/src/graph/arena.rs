//! Node Arena
//!
//! The arena owns every node of one runtime, indexed by id. All edge
//! bookkeeping happens here; nothing in this module calls user code, so the
//! runtime can hold a mutable borrow of the arena for the duration of any
//! method call.
//!
//! Methods that remove nodes hand the removed closures back to the caller.
//! The caller drops them after releasing its borrow, because dropping a
//! closure may drop a reactive handle which re-enters the runtime.

use std::collections::{HashMap, HashSet, VecDeque};

use smallvec::SmallVec;

use super::node::{
    Cleanup, CreationSite, EffectFn, ObserverId, ObserverKind, ObserverNode, OwnerId, OwnerNode,
    SignalId, SignalNode,
};

/// What an owner leaves behind when it is torn down.
pub struct Disposal {
    /// Children in creation order.
    pub children: Vec<OwnerId>,
    /// Cleanups in registration order.
    pub cleanups: Vec<Cleanup>,
    pub observer: Option<ObserverId>,
    pub created_at: CreationSite,
}

/// The dependency graph and ownership tree of one runtime.
#[derive(Debug, Default)]
pub struct Graph {
    signals: HashMap<SignalId, SignalNode>,
    observers: HashMap<ObserverId, ObserverNode>,
    owners: HashMap<OwnerId, OwnerNode>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------

    /// Allocate a source node with no subscribers.
    pub fn add_signal(&mut self) -> SignalId {
        let id = SignalId::new();
        self.signals.insert(id, SignalNode::default());
        id
    }

    /// Remove a source node and every edge pointing at it.
    pub fn remove_signal(&mut self, id: SignalId) {
        if let Some(node) = self.signals.remove(&id) {
            for observer in node.subscribers {
                if let Some(obs) = self.observers.get_mut(&observer) {
                    obs.sources.retain(|s| *s != id);
                }
            }
        }
    }

    pub fn signal(&self, id: SignalId) -> Option<&SignalNode> {
        self.signals.get(&id)
    }

    /// Number of observers currently subscribed to a source.
    pub fn subscriber_count(&self, id: SignalId) -> usize {
        self.signals.get(&id).map_or(0, |s| s.subscribers.len())
    }

    // ------------------------------------------------------------------
    // Owners
    // ------------------------------------------------------------------

    /// Allocate an owner. A parent that no longer exists is ignored and the
    /// new owner becomes a root.
    pub fn add_owner(&mut self, parent: Option<OwnerId>, created_at: CreationSite) -> OwnerId {
        let id = OwnerId::new();
        let parent = parent.filter(|p| self.owners.contains_key(p));
        if let Some(p) = parent.and_then(|p| self.owners.get_mut(&p)) {
            p.children.push(id);
        }
        self.owners.insert(id, OwnerNode::new(parent, created_at));
        id
    }

    pub fn owner(&self, id: OwnerId) -> Option<&OwnerNode> {
        self.owners.get(&id)
    }

    pub fn contains_owner(&self, id: OwnerId) -> bool {
        self.owners.contains_key(&id)
    }

    /// Append a cleanup. Gives the callback back if the owner is gone.
    pub fn push_cleanup(&mut self, owner: OwnerId, cleanup: Cleanup) -> Result<(), Cleanup> {
        match self.owners.get_mut(&owner) {
            Some(node) => {
                node.cleanups.push(cleanup);
                Ok(())
            }
            None => Err(cleanup),
        }
    }

    /// Take the cleanups and children of a live owner, leaving it empty but
    /// alive. Used before an observer re-runs its body.
    ///
    /// The returned disposal never carries the observer: it stays registered.
    pub fn reset_owner(&mut self, id: OwnerId) -> Option<Disposal> {
        let node = self.owners.get_mut(&id)?;
        Some(Disposal {
            children: std::mem::take(&mut node.children),
            cleanups: std::mem::take(&mut node.cleanups),
            observer: None,
            created_at: node.created_at,
        })
    }

    /// Remove an owner from the tree and detach it from its parent.
    ///
    /// Returns `None` if the owner was already disposed. The caller is
    /// responsible for disposing the returned children, running the cleanups
    /// and removing the observer.
    pub fn remove_owner(&mut self, id: OwnerId) -> Option<Disposal> {
        let node = self.owners.remove(&id)?;
        if let Some(parent) = node.parent.and_then(|p| self.owners.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        Some(Disposal {
            children: node.children,
            cleanups: node.cleanups,
            observer: node.observer,
            created_at: node.created_at,
        })
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Register an effect whose body runs inside `scope`.
    pub fn add_effect(&mut self, scope: OwnerId, run: EffectFn, created_at: CreationSite) -> ObserverId {
        let id = ObserverId::new();
        self.observers
            .insert(id, ObserverNode::effect(scope, run, created_at));
        if let Some(owner) = self.owners.get_mut(&scope) {
            owner.observer = Some(id);
        }
        id
    }

    /// Register a memo computation and the source its readers subscribe to.
    pub fn add_memo(&mut self, scope: OwnerId, created_at: CreationSite) -> (ObserverId, SignalId) {
        let id = ObserverId::new();
        let source = self.add_signal();
        self.observers
            .insert(id, ObserverNode::memo(scope, source, created_at));
        if let Some(owner) = self.owners.get_mut(&scope) {
            owner.observer = Some(id);
        }
        (id, source)
    }

    pub fn observer(&self, id: ObserverId) -> Option<&ObserverNode> {
        self.observers.get(&id)
    }

    pub fn observer_mut(&mut self, id: ObserverId) -> Option<&mut ObserverNode> {
        self.observers.get_mut(&id)
    }

    /// Remove an observer with all of its edges, including the source node of
    /// a memo. The node is returned so its closure is dropped by the caller.
    pub fn remove_observer(&mut self, id: ObserverId) -> Option<ObserverNode> {
        self.clear_sources(id);
        let node = self.observers.remove(&id)?;
        if let Some(source) = node.source {
            self.remove_signal(source);
        }
        Some(node)
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Record that `observer` read `source`. Both ends must exist.
    ///
    /// Returns `true` if a new edge was added.
    pub fn link(&mut self, source: SignalId, observer: ObserverId) -> bool {
        let (Some(signal), Some(obs)) = (
            self.signals.get_mut(&source),
            self.observers.get_mut(&observer),
        ) else {
            return false;
        };

        if !signal.subscribers.insert(observer) {
            return false;
        }
        obs.sources.push(source);
        true
    }

    /// Remove `observer` from every source it read and clear its source list.
    pub fn clear_sources(&mut self, observer: ObserverId) {
        let Some(obs) = self.observers.get_mut(&observer) else {
            return;
        };
        let sources = std::mem::take(&mut obs.sources);
        for source in sources {
            if let Some(signal) = self.signals.get_mut(&source) {
                signal.subscribers.shift_remove(&observer);
            }
        }
    }

    /// Propagate a change of `source` through the graph.
    ///
    /// Effects subscribed directly or through a chain of memos are marked
    /// dirty and returned in notification order, each once. Memos are only
    /// marked stale. Every memo on the way is walked, stale or not: a stale
    /// memo may still have readers that subscribed before a failed
    /// recompute.
    pub fn mark_dependents(&mut self, source: SignalId) -> Vec<ObserverId> {
        let mut effects = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([source]);

        while let Some(current) = queue.pop_front() {
            let Some(signal) = self.signals.get(&current) else {
                continue;
            };
            // Snapshot, the subscriber set is mutated below.
            let subscribers: SmallVec<[ObserverId; 8]> =
                signal.subscribers.iter().copied().collect();

            for id in subscribers {
                if !visited.insert(id) {
                    continue;
                }
                let Some(obs) = self.observers.get_mut(&id) else {
                    continue;
                };
                match obs.kind {
                    ObserverKind::Effect => {
                        obs.dirty = true;
                        effects.push(id);
                    }
                    ObserverKind::Memo => {
                        obs.stale = true;
                        obs.dirty = true;
                        if let Some(next) = obs.source {
                            queue.push_back(next);
                        }
                    }
                }
            }
        }

        effects
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }
}
