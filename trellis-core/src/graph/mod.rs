//! Dependency Graph
//!
//! This module implements the dependency graph the reactive primitives
//! hang off: the node arena and the update scheduler.
//!
//! # Overview
//!
//! The graph is directed and bidirectionally indexed:
//!
//! - Nodes are signals (values), computations (memos and effects), or
//!   root scopes, stored in one arena keyed by [`NodeId`].
//! - Edges run from sources to observers and are stored on both ends as
//!   parallel id/slot arrays, so either end detaches in O(1).
//!
//! When a signal commits a write, the scheduler marks the subgraph behind
//! it (direct observers [`Stale`](NodeState::Stale), everything further
//! [`Pending`](NodeState::Pending)) and queues it; the transaction then
//! drains the queues, re-running only what a changed value actually
//! reaches. Each node runs at most once per transaction.
//!
//! # Design Decisions
//!
//! 1. One central arena rather than `Rc`-linked nodes: disposal is an id
//!    removal, cycles cannot leak, and handles stay `Copy`.
//! 2. Edge lists are swap-remove arrays, not sets. Detach order does not
//!    matter, duplicates are tolerated, and teardown is O(edges).
//! 3. Ids are never reused, so stale handles miss the arena instead of
//!    aliasing a newer node.

pub(crate) mod node;
pub(crate) mod scheduler;

pub use node::{ErrorPayload, NodeId, NodeState};
