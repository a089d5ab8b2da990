//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.
//!
//! Every reactive entity is one arena node: a signal (plain mutable cell),
//! a computation (effect, render effect, or memo), or a root scope. The
//! variants share two capabilities through embedded state records:
//!
//! - `CellState`: a readable value plus the observer half of the edge lists.
//!   Signals and computations have one; memos expose theirs to readers.
//! - `ScopeState`: the ownership capability. Computations and root scopes
//!   own the nodes created while they run and dispose of them on teardown.
//!
//! # Edge Representation
//!
//! Dependency edges are bidirectional and kept in parallel arrays. For a
//! source `s` and an observing computation `c`:
//!
//! ```text
//! s.observers[i] == c      s.observer_slots[i] == j
//! c.sources[j]   == s      c.source_slots[j]   == i
//! ```
//!
//! Each side stores the index of the matching entry on the other side, so
//! either side can detach an edge in O(1) by swapping it with the last entry
//! and patching the moved entry's back-slot. Duplicate edges (a computation
//! reading the same source twice in one run) are allowed; teardown removes
//! them one instance at a time.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

/// Erased value held by a reactive cell.
pub(crate) type Value = Rc<dyn Any>;

/// Erased error payload carried through the error channel.
pub type ErrorPayload = Rc<dyn Error>;

/// Erased computation body. Receives the previous value (if any) and
/// produces the next one, or an error for the owner chain to absorb.
pub(crate) type RunFn = Rc<dyn Fn(Option<Value>) -> Result<Value, ErrorPayload>>;

/// Erased equality comparator used for change suppression.
pub(crate) type Comparator = Rc<dyn Fn(&dyn Any, &dyn Any) -> bool>;

/// Cleanup callback registered via `on_cleanup`.
pub(crate) type CleanupFn = Box<dyn FnOnce()>;

/// Error handler registered via `on_error`.
pub(crate) type ErrorHandler = Rc<dyn Fn(&(dyn Error + 'static))>;

/// Unique identifier for a node in the dependency graph.
///
/// Ids are never reused, so a handle held after its node was disposed
/// simply misses the arena instead of aliasing an unrelated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Key into an owner's context map.
///
/// The error channel allocates one key lazily; further channels would
/// allocate their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ContextKey(u64);

impl ContextKey {
    /// Allocate a new distinct context key.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Scheduling state of a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// The node's value is up-to-date.
    Clean,

    /// A direct dependency changed. The node must re-run before its value
    /// can be read.
    Stale,

    /// Something further upstream changed. The node must validate its
    /// sources before its value can be read, and re-runs only if one of
    /// them actually produced a new value.
    Pending,
}

/// The readable half of a node: current value, staged batch value,
/// comparator, and the observer side of the edge lists.
pub(crate) struct CellState {
    /// Current committed value. `None` only before a computation-backed
    /// cell completes its first run.
    pub value: Option<Value>,

    /// Value staged by a write inside an active batch. `None` means
    /// nothing is staged.
    pub staged: Option<Value>,

    /// Change suppression comparator. `None` means every write propagates.
    pub equals: Option<Comparator>,

    /// Computations observing this cell.
    pub observers: SmallVec<[NodeId; 4]>,

    /// For each observer, the index of this cell in that observer's
    /// `sources` list.
    pub observer_slots: SmallVec<[usize; 4]>,
}

impl CellState {
    /// Create a cell with an initial value.
    pub fn with_value(value: Value, equals: Option<Comparator>) -> Self {
        Self {
            value: Some(value),
            staged: None,
            equals,
            observers: SmallVec::new(),
            observer_slots: SmallVec::new(),
        }
    }

    /// Create an empty cell that is filled by the owning computation's
    /// first run.
    pub fn empty(equals: Option<Comparator>) -> Self {
        Self {
            value: None,
            staged: None,
            equals,
            observers: SmallVec::new(),
            observer_slots: SmallVec::new(),
        }
    }
}

/// The ownership capability: parent link, owned children, cleanups, and
/// the lazily allocated context map.
pub(crate) struct ScopeState {
    /// Parent owner. `None` for detached roots and top-level nodes.
    pub owner: Option<NodeId>,

    /// Nodes created while this scope was the current owner, in creation
    /// order. Disposed before the scope's own cleanups run.
    pub owned: Vec<NodeId>,

    /// Cleanup callbacks, run in registration order on reset or disposal.
    pub cleanups: Vec<CleanupFn>,

    /// Context map. The error channel is its only tenant today, so the
    /// values are handler lists directly.
    pub context: Option<IndexMap<ContextKey, Vec<ErrorHandler>>>,
}

impl ScopeState {
    /// Create a scope under the given owner.
    pub fn new(owner: Option<NodeId>) -> Self {
        Self {
            owner,
            owned: Vec::new(),
            cleanups: Vec::new(),
            context: None,
        }
    }
}

/// A tracked computation: body, scheduling state, both halves of the edge
/// lists, an output cell, and an ownership scope.
pub(crate) struct ComputationState {
    /// The tracked body. Receives the previous value.
    pub run: RunFn,

    /// Current scheduling state.
    pub state: NodeState,

    /// Transaction stamp of the last completed run. Zero means the node
    /// has not run in a stamped transaction yet.
    pub updated_at: u64,

    /// Pure computations (memos) feed the graph and drain in the update
    /// queue; impure ones (effects) drain afterwards in the effect queue.
    pub pure: bool,

    /// User effects run after render effects within an effect drain.
    pub user: bool,

    /// Cells this computation read during its last run.
    pub sources: SmallVec<[NodeId; 4]>,

    /// For each source, the index of this computation in that source's
    /// `observers` list.
    pub source_slots: SmallVec<[usize; 4]>,

    /// Output cell. Memos expose it to readers; effects keep their
    /// previous value here for the next run.
    pub cell: CellState,

    /// Ownership capability. Every computation owns what it creates.
    pub scope: ScopeState,
}

/// The kind of node in the dependency graph.
pub(crate) enum NodeKind {
    /// A plain mutable cell. The leaves written by the outside world.
    Signal(CellState),

    /// A tracked computation: effect, render effect, or memo.
    Computation(Box<ComputationState>),

    /// A root scope created by `create_root`. No value, no body.
    Scope(ScopeState),
}

/// A node in the dependency graph.
pub(crate) struct Node {
    /// Unique identifier for this node.
    pub id: NodeId,

    /// What kind of node this is.
    pub kind: NodeKind,
}

impl Node {
    /// Create a signal node holding the given value.
    pub fn signal(value: Value, equals: Option<Comparator>) -> Self {
        Self {
            id: NodeId::new(),
            kind: NodeKind::Signal(CellState::with_value(value, equals)),
        }
    }

    /// Create a computation node in the given initial state, owned by
    /// `owner`. The node does not run here; the scheduler decides when.
    pub fn computation(
        run: RunFn,
        pure: bool,
        user: bool,
        state: NodeState,
        equals: Option<Comparator>,
        owner: Option<NodeId>,
    ) -> Self {
        Self {
            id: NodeId::new(),
            kind: NodeKind::Computation(Box::new(ComputationState {
                run,
                state,
                updated_at: 0,
                pure,
                user,
                sources: SmallVec::new(),
                source_slots: SmallVec::new(),
                cell: CellState::empty(equals),
                scope: ScopeState::new(owner),
            })),
        }
    }

    /// Create a root scope node under the given owner.
    pub fn scope(owner: Option<NodeId>) -> Self {
        Self {
            id: NodeId::new(),
            kind: NodeKind::Scope(ScopeState::new(owner)),
        }
    }

    /// The readable cell, if this node has one.
    pub fn as_cell(&self) -> Option<&CellState> {
        match &self.kind {
            NodeKind::Signal(cell) => Some(cell),
            NodeKind::Computation(comp) => Some(&comp.cell),
            NodeKind::Scope(_) => None,
        }
    }

    /// Mutable access to the readable cell, if this node has one.
    pub fn as_cell_mut(&mut self) -> Option<&mut CellState> {
        match &mut self.kind {
            NodeKind::Signal(cell) => Some(cell),
            NodeKind::Computation(comp) => Some(&mut comp.cell),
            NodeKind::Scope(_) => None,
        }
    }

    /// The computation record, if this node is one.
    pub fn as_computation(&self) -> Option<&ComputationState> {
        match &self.kind {
            NodeKind::Computation(comp) => Some(comp),
            _ => None,
        }
    }

    /// Mutable access to the computation record, if this node is one.
    pub fn as_computation_mut(&mut self) -> Option<&mut ComputationState> {
        match &mut self.kind {
            NodeKind::Computation(comp) => Some(comp),
            _ => None,
        }
    }

    /// The ownership scope, if this node has one.
    pub fn as_scope(&self) -> Option<&ScopeState> {
        match &self.kind {
            NodeKind::Computation(comp) => Some(&comp.scope),
            NodeKind::Scope(scope) => Some(scope),
            NodeKind::Signal(_) => None,
        }
    }

    /// Mutable access to the ownership scope, if this node has one.
    pub fn as_scope_mut(&mut self) -> Option<&mut ScopeState> {
        match &mut self.kind {
            NodeKind::Computation(comp) => Some(&mut comp.scope),
            NodeKind::Scope(scope) => Some(scope),
            NodeKind::Signal(_) => None,
        }
    }

    /// The node's scheduling state. Signals and scopes are always clean.
    pub fn state(&self) -> NodeState {
        match &self.kind {
            NodeKind::Computation(comp) => comp.state,
            _ => NodeState::Clean,
        }
    }

    /// The node's parent owner, if any.
    pub fn owner(&self) -> Option<NodeId> {
        self.as_scope().and_then(|scope| scope.owner)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            NodeKind::Signal(_) => "Signal",
            NodeKind::Computation(_) => "Computation",
            NodeKind::Scope(_) => "Scope",
        };
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &kind)
            .field("state", &self.state())
            .finish()
    }
}
