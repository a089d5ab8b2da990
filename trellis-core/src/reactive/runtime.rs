//! Reactive Runtime
//!
//! The runtime is the per-thread home of the reactive system: it owns the
//! node arena and the ambient execution context that ties signals, memos,
//! and effects together.
//!
//! # How It Works
//!
//! 1. Every signal, computation, and root scope lives in one arena,
//!    an `IndexMap` keyed by `NodeId`. Ids are never reused, so handles
//!    held past disposal miss the map instead of aliasing a new node.
//!
//! 2. Two ambient cells drive automatic dependency tracking: `owner` is
//!    the scope that adopts newly created nodes, and `listener` is the
//!    computation whose reads are currently being recorded as edges.
//!
//! 3. Three queue slots carry transaction state: `updates` (pure
//!    computations to re-run), `effects` (impure ones, drained after),
//!    and `pending` (signals staged by an active batch). A slot holding
//!    `Some` means the corresponding phase is active.
//!
//! # Re-entrancy
//!
//! The engine is single-threaded and synchronous, so nested evaluation
//! (a memo read inside an effect, a root created inside a memo) is the
//! normal case. Every nested entry saves the ambient cells and restores
//! them through a guard's `Drop`, which keeps the context correct even
//! when user code panics mid-run. Arena borrows are never held across
//! user code.

use std::cell::{Cell, RefCell};

use indexmap::IndexMap;

use crate::graph::node::{Node, NodeId};

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

/// Run a closure with the thread's runtime.
pub(crate) fn with_runtime<R>(f: impl FnOnce(&Runtime) -> R) -> R {
    RUNTIME.with(|rt| f(rt))
}

/// The per-thread reactive runtime.
pub(crate) struct Runtime {
    /// All live nodes, keyed by id.
    pub nodes: RefCell<IndexMap<NodeId, Node>>,

    /// Scope that adopts nodes created right now. `None` means top-level,
    /// detached execution.
    pub owner: Cell<Option<NodeId>>,

    /// Computation currently recording its reads. `None` means reads are
    /// untracked.
    pub listener: Cell<Option<NodeId>>,

    /// Signals staged by the active batch, in first-write order.
    pub pending: RefCell<Option<Vec<NodeId>>>,

    /// Pure computations queued by the active transaction.
    pub updates: RefCell<Option<Vec<NodeId>>>,

    /// Impure computations queued by the active transaction.
    pub effects: RefCell<Option<Vec<NodeId>>>,

    /// Monotonic transaction counter used to stamp completed runs.
    pub exec_count: Cell<u64>,
}

impl Runtime {
    fn new() -> Self {
        Self {
            nodes: RefCell::new(IndexMap::new()),
            owner: Cell::new(None),
            listener: Cell::new(None),
            pending: RefCell::new(None),
            updates: RefCell::new(None),
            effects: RefCell::new(None),
            exec_count: Cell::new(0),
        }
    }

    /// Insert a node into the arena and return its id.
    pub fn insert(&self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.borrow_mut().insert(id, node);
        id
    }

    /// Register `id` as owned by the current owner, if there is one.
    ///
    /// Owned nodes are disposed when the owner resets or is disposed.
    pub fn attach_to_owner(&self, id: NodeId) {
        let Some(owner_id) = self.owner.get() else {
            return;
        };
        let mut nodes = self.nodes.borrow_mut();
        if let Some(scope) = nodes.get_mut(&owner_id).and_then(Node::as_scope_mut) {
            scope.owned.push(id);
        }
    }

    /// Swap the ambient owner and listener, restoring both when the
    /// returned guard drops.
    pub fn enter(&self, owner: Option<NodeId>, listener: Option<NodeId>) -> TrackingGuard<'_> {
        let guard = TrackingGuard {
            runtime: self,
            prev_owner: self.owner.get(),
            prev_listener: self.listener.get(),
        };
        self.owner.set(owner);
        self.listener.set(listener);
        guard
    }

    /// Take the update queue out of service, restoring it when the
    /// returned guard drops.
    ///
    /// While paused, a write opens a fresh transaction that drains
    /// completely before the paused one resumes. This is what makes
    /// reading a stale memo resolve it fully before the read returns.
    pub fn pause_updates(&self) -> UpdatesPause<'_> {
        UpdatesPause {
            runtime: self,
            saved: self.updates.borrow_mut().take(),
        }
    }
}

/// Guard restoring the ambient owner and listener when dropped.
pub(crate) struct TrackingGuard<'rt> {
    runtime: &'rt Runtime,
    prev_owner: Option<NodeId>,
    prev_listener: Option<NodeId>,
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        self.runtime.owner.set(self.prev_owner);
        self.runtime.listener.set(self.prev_listener);
    }
}

/// Guard restoring a paused update queue when dropped.
pub(crate) struct UpdatesPause<'rt> {
    runtime: &'rt Runtime,
    saved: Option<Vec<NodeId>>,
}

impl Drop for UpdatesPause<'_> {
    fn drop(&mut self) {
        *self.runtime.updates.borrow_mut() = self.saved.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NodeState;
    use std::rc::Rc;

    #[test]
    fn runtime_starts_idle() {
        with_runtime(|rt| {
            assert!(rt.owner.get().is_none());
            assert!(rt.listener.get().is_none());
            assert!(rt.pending.borrow().is_none());
            assert!(rt.updates.borrow().is_none());
            assert!(rt.effects.borrow().is_none());
        });
    }

    #[test]
    fn enter_restores_context_on_drop() {
        with_runtime(|rt| {
            let a = NodeId::new();
            let b = NodeId::new();

            {
                let _guard = rt.enter(Some(a), Some(b));
                assert_eq!(rt.owner.get(), Some(a));
                assert_eq!(rt.listener.get(), Some(b));
            }

            assert!(rt.owner.get().is_none());
            assert!(rt.listener.get().is_none());
        });
    }

    #[test]
    fn nested_guards_unwind_in_order() {
        with_runtime(|rt| {
            let outer = NodeId::new();
            let inner = NodeId::new();

            {
                let _outer_guard = rt.enter(Some(outer), Some(outer));
                {
                    let _inner_guard = rt.enter(Some(inner), None);
                    assert_eq!(rt.owner.get(), Some(inner));
                    assert_eq!(rt.listener.get(), None);
                }
                assert_eq!(rt.owner.get(), Some(outer));
                assert_eq!(rt.listener.get(), Some(outer));
            }

            assert!(rt.owner.get().is_none());
        });
    }

    #[test]
    fn pause_updates_restores_queue() {
        with_runtime(|rt| {
            let queued = NodeId::new();
            *rt.updates.borrow_mut() = Some(vec![queued]);

            {
                let _pause = rt.pause_updates();
                assert!(rt.updates.borrow().is_none());
            }

            assert_eq!(rt.updates.borrow().as_deref(), Some(&[queued][..]));
            *rt.updates.borrow_mut() = None;
        });
    }

    #[test]
    fn attach_records_ownership_in_creation_order() {
        with_runtime(|rt| {
            let root = rt.insert(Node::scope(None));
            let _guard = rt.enter(Some(root), None);

            let first = rt.insert(Node::signal(Rc::new(1i32), None));
            rt.attach_to_owner(first);
            let second = rt.insert(Node::computation(
                Rc::new(|_| Ok(Rc::new(()) as _)),
                false,
                true,
                NodeState::Stale,
                None,
                Some(root),
            ));
            rt.attach_to_owner(second);

            let nodes = rt.nodes.borrow();
            let scope = nodes.get(&root).and_then(Node::as_scope).unwrap();
            assert_eq!(scope.owned, vec![first, second]);
        });
    }

    #[test]
    fn attach_without_owner_is_a_no_op() {
        with_runtime(|rt| {
            let id = rt.insert(Node::signal(Rc::new(0i32), None));
            rt.attach_to_owner(id);
            assert!(rt.nodes.borrow().contains_key(&id));
        });
    }
}
