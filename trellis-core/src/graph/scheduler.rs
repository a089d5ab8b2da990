//! Update Scheduler
//!
//! The scheduler moves changes through the dependency graph in two phases,
//! so that no computation ever observes a half-updated world and none runs
//! more than once per transaction.
//!
//! # Algorithm
//!
//! 1. A committed write marks the signal's direct observers `Stale` and
//!    queues them: pure computations (memos) into the update queue, impure
//!    ones (effects) into the effect queue.
//!
//! 2. Everything reachable beyond the direct observers is marked `Pending`
//!    and queued as well. Marking stops at nodes that are already non-clean,
//!    which is what bounds the work to one visit per node and collapses
//!    diamond shapes into a single run.
//!
//! 3. The transaction then drains the update queue. A `Stale` entry re-runs.
//!    A `Pending` entry validates its sources first (`look_upstream`) and
//!    re-runs only if one of them actually produced a new value; otherwise
//!    it settles back to `Clean` untouched.
//!
//! 4. The effect queue drains last, render effects before user effects,
//!    inside a batch so that writes made by effects are staged and committed
//!    as a follow-up transaction.
//!
//! Reads pull: a non-clean memo read mid-transaction resolves itself on the
//! spot (with the update queue paused) before returning a value. Push for
//! scheduling, pull for consistency.

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::graph::node::{Comparator, ErrorPayload, Node, NodeId, NodeState, RunFn, Value};
use crate::reactive::error::{resolve_error, surface_error};
use crate::reactive::runtime::Runtime;

/// Hard cap on the pure update queue within one transaction. Marking past
/// this point drops the queued work wholesale instead of growing without
/// bound.
const UPDATE_QUEUE_LIMIT: usize = 1_000_000;

// ----------------------------------------------------------------------------
// Reads and writes
// ----------------------------------------------------------------------------

/// Read a cell's value, resolving it first if it is computation-backed and
/// out of date, and registering a dependency edge if a listener is active.
///
/// Panics if the cell was disposed, or if an unhandled error surfaces while
/// resolving it.
pub(crate) fn read_cell(rt: &Runtime, id: NodeId) -> Value {
    let state = {
        let nodes = rt.nodes.borrow();
        nodes
            .get(&id)
            .and_then(Node::as_computation)
            .map(|comp| comp.state)
    };
    match state {
        Some(NodeState::Stale) => {
            // re-run with the live queue: the commit joins the active
            // transaction and schedules other observers normally
            if let Err(err) = update_computation(rt, id) {
                surface_error(err);
            }
        }
        Some(NodeState::Pending) => {
            // validate upstream against a paused queue; any source that
            // proves stale re-runs in its own sub-transaction
            let pause = rt.pause_updates();
            let result = look_upstream(rt, id, None);
            drop(pause);
            if let Err(err) = result {
                surface_error(err);
            }
        }
        _ => {}
    }

    if let Some(listener) = rt.listener.get() {
        register_edge(rt, id, listener);
    }

    let nodes = rt.nodes.borrow();
    let cell = nodes
        .get(&id)
        .and_then(Node::as_cell)
        .expect("read of a disposed reactive cell");
    cell.value
        .clone()
        .expect("reactive cell read before it produced a value")
}

/// Read a cell's staged value if a batch staged one, else its current
/// value. Never tracks and never resolves; this is the view a setter's
/// closure gets.
pub(crate) fn peek_cell(rt: &Runtime, id: NodeId) -> Value {
    let nodes = rt.nodes.borrow();
    let cell = nodes
        .get(&id)
        .and_then(Node::as_cell)
        .expect("read of a disposed reactive cell");
    cell.staged
        .clone()
        .or_else(|| cell.value.clone())
        .expect("reactive cell read before it produced a value")
}

/// Write a value to a cell.
///
/// Inside an active batch the value is staged; the last write per cell
/// wins when the batch commits. Outside a batch, a write the comparator
/// judges equal is suppressed entirely, and any other write commits and
/// notifies observers within a transaction.
///
/// Panics if the cell was disposed, or if an unhandled error surfaces
/// while the transaction drains.
pub(crate) fn write_cell(rt: &Runtime, id: NodeId, value: Value) {
    if rt.pending.borrow().is_some() {
        let first_stage = {
            let mut nodes = rt.nodes.borrow_mut();
            let cell = nodes
                .get_mut(&id)
                .and_then(Node::as_cell_mut)
                .expect("write to a disposed reactive cell");
            let first = cell.staged.is_none();
            cell.staged = Some(value);
            first
        };
        if first_stage {
            if let Some(queue) = rt.pending.borrow_mut().as_mut() {
                queue.push(id);
            }
        }
        return;
    }

    let suppressed = {
        let (equals, current) = {
            let nodes = rt.nodes.borrow();
            let cell = nodes
                .get(&id)
                .and_then(Node::as_cell)
                .expect("write to a disposed reactive cell");
            (cell.equals.clone(), cell.value.clone())
        };
        match (equals, current) {
            (Some(equals), Some(current)) => equals(current.as_ref(), value.as_ref()),
            _ => false,
        }
    };
    if suppressed {
        return;
    }

    let notify = {
        let mut nodes = rt.nodes.borrow_mut();
        let cell = nodes
            .get_mut(&id)
            .and_then(Node::as_cell_mut)
            .expect("write to a disposed reactive cell");
        cell.value = Some(value);
        !cell.observers.is_empty()
    };
    if notify {
        run_updates(rt, false, || mark_observers(rt, id));
    }
}

/// Register a dependency edge from `source` to `observer`, recording each
/// side's index in the other's list so either can detach in O(1).
fn register_edge(rt: &Runtime, source: NodeId, observer: NodeId) {
    let mut nodes = rt.nodes.borrow_mut();
    let observer_slot = match nodes.get(&source).and_then(Node::as_cell) {
        Some(cell) => cell.observers.len(),
        None => return,
    };
    let source_slot = match nodes.get_mut(&observer).and_then(Node::as_computation_mut) {
        Some(comp) => {
            comp.sources.push(source);
            comp.source_slots.push(observer_slot);
            comp.sources.len() - 1
        }
        None => return,
    };
    if let Some(cell) = nodes.get_mut(&source).and_then(Node::as_cell_mut) {
        cell.observers.push(observer);
        cell.observer_slots.push(source_slot);
    }
}

// ----------------------------------------------------------------------------
// Computations
// ----------------------------------------------------------------------------

/// Allocate a computation node under the current owner. The caller decides
/// when it first runs.
pub(crate) fn create_computation(
    rt: &Runtime,
    run: RunFn,
    pure: bool,
    user: bool,
    state: NodeState,
    equals: Option<Comparator>,
) -> NodeId {
    let owner = rt.owner.get();
    if owner.is_none() {
        warn!("computation created outside a root; it will never be disposed");
    }
    let id = rt.insert(Node::computation(run, pure, user, state, equals, owner));
    rt.attach_to_owner(id);
    id
}

/// Reset a computation's edges and owned scope, then re-run its body with
/// itself as the ambient owner and listener.
///
/// An `Err` carries an error no ancestor handler absorbed.
pub(crate) fn update_computation(rt: &Runtime, id: NodeId) -> Result<(), ErrorPayload> {
    let is_computation = rt
        .nodes
        .borrow()
        .get(&id)
        .map_or(false, |node| node.as_computation().is_some());
    if !is_computation {
        return Ok(());
    }
    clean_node(rt, id);
    let time = rt.exec_count.get();
    let guard = rt.enter(Some(id), Some(id));
    let result = run_computation(rt, id, time);
    drop(guard);
    result
}

fn run_computation(rt: &Runtime, id: NodeId, time: u64) -> Result<(), ErrorPayload> {
    let (run, previous) = {
        let nodes = rt.nodes.borrow();
        let Some(comp) = nodes.get(&id).and_then(Node::as_computation) else {
            return Ok(());
        };
        (comp.run.clone(), comp.cell.value.clone())
    };

    let next = match run(previous) {
        Ok(next) => next,
        Err(err) => {
            // a handled failure keeps the previous value and notifies
            // nobody; the stamp still advances so the pass moves on
            resolve_error(rt, id, err)?;
            if is_fresh(rt, id, time) {
                stamp(rt, id, time);
            }
            return Ok(());
        }
    };

    if is_fresh(rt, id, time) {
        let notify = {
            let nodes = rt.nodes.borrow();
            nodes
                .get(&id)
                .and_then(Node::as_cell)
                .map_or(false, |cell| !cell.observers.is_empty())
        };
        if notify {
            write_cell(rt, id, next);
        } else {
            let mut nodes = rt.nodes.borrow_mut();
            if let Some(cell) = nodes.get_mut(&id).and_then(Node::as_cell_mut) {
                cell.value = Some(next);
            }
        }
        stamp(rt, id, time);
    }
    Ok(())
}

/// Whether the node has not already been re-run by a nested pass newer
/// than `time`.
fn is_fresh(rt: &Runtime, id: NodeId, time: u64) -> bool {
    let nodes = rt.nodes.borrow();
    nodes
        .get(&id)
        .and_then(Node::as_computation)
        .map_or(false, |comp| comp.updated_at == 0 || comp.updated_at <= time)
}

fn stamp(rt: &Runtime, id: NodeId, time: u64) {
    let mut nodes = rt.nodes.borrow_mut();
    if let Some(comp) = nodes.get_mut(&id).and_then(Node::as_computation_mut) {
        comp.updated_at = time;
    }
}

fn set_state(rt: &Runtime, id: NodeId, state: NodeState) {
    let mut nodes = rt.nodes.borrow_mut();
    if let Some(comp) = nodes.get_mut(&id).and_then(Node::as_computation_mut) {
        comp.state = state;
    }
}

fn node_state(rt: &Runtime, id: NodeId) -> Option<NodeState> {
    rt.nodes.borrow().get(&id).map(Node::state)
}

fn owner_of(rt: &Runtime, id: NodeId) -> Option<NodeId> {
    rt.nodes.borrow().get(&id).and_then(Node::owner)
}

fn stamp_and_state(rt: &Runtime, id: NodeId) -> Option<(u64, NodeState)> {
    let nodes = rt.nodes.borrow();
    let node = nodes.get(&id)?;
    match node.as_computation() {
        Some(comp) => Some((comp.updated_at, comp.state)),
        None => Some((0, NodeState::Clean)),
    }
}

// ----------------------------------------------------------------------------
// Marking (push phase)
// ----------------------------------------------------------------------------

/// Mark a written cell's observers and queue them for the active
/// transaction. Direct observers always end up `Stale`; everything further
/// downstream becomes `Pending`.
fn mark_observers(rt: &Runtime, id: NodeId) {
    let observers: SmallVec<[NodeId; 4]> = {
        let nodes = rt.nodes.borrow();
        match nodes.get(&id).and_then(Node::as_cell) {
            Some(cell) => cell.observers.clone(),
            None => return,
        }
    };

    for observer in observers {
        let snapshot = {
            let nodes = rt.nodes.borrow();
            nodes
                .get(&observer)
                .and_then(Node::as_computation)
                .map(|comp| (comp.state, comp.pure, !comp.cell.observers.is_empty()))
        };
        let Some((state, pure, fans_out)) = snapshot else {
            continue;
        };
        if state == NodeState::Clean {
            enqueue_for(rt, observer, pure);
            if fans_out {
                mark_downstream(rt, observer);
            }
        }
        set_state(rt, observer, NodeState::Stale);
    }

    let overflow = rt
        .updates
        .borrow()
        .as_ref()
        .map_or(false, |queue| queue.len() > UPDATE_QUEUE_LIMIT);
    if overflow {
        warn!(
            limit = UPDATE_QUEUE_LIMIT,
            "update queue overflow, dropping queued work"
        );
        if let Some(queue) = rt.updates.borrow_mut().as_mut() {
            queue.clear();
        }
    }
}

/// Mark everything downstream of `id` as `Pending` and queue it, stopping
/// at nodes that are already non-clean.
fn mark_downstream(rt: &Runtime, id: NodeId) {
    let observers: SmallVec<[NodeId; 4]> = {
        let nodes = rt.nodes.borrow();
        match nodes.get(&id).and_then(Node::as_cell) {
            Some(cell) => cell.observers.clone(),
            None => return,
        }
    };

    for observer in observers {
        let snapshot = {
            let nodes = rt.nodes.borrow();
            nodes
                .get(&observer)
                .and_then(Node::as_computation)
                .map(|comp| (comp.state, comp.pure, !comp.cell.observers.is_empty()))
        };
        let Some((state, pure, fans_out)) = snapshot else {
            continue;
        };
        if state == NodeState::Clean {
            set_state(rt, observer, NodeState::Pending);
            enqueue_for(rt, observer, pure);
            if fans_out {
                mark_downstream(rt, observer);
            }
        }
    }
}

fn enqueue_for(rt: &Runtime, id: NodeId, pure: bool) {
    if pure {
        rt.updates
            .borrow_mut()
            .as_mut()
            .expect("update queue active while marking")
            .push(id);
    } else {
        rt.effects
            .borrow_mut()
            .as_mut()
            .expect("effect queue active while marking")
            .push(id);
    }
}

// ----------------------------------------------------------------------------
// Transactions (consume phase)
// ----------------------------------------------------------------------------

/// Run `f` inside a transaction. Nested calls share the enclosing
/// transaction's queues and run `f` directly; the outermost call drains
/// the queues after `f` returns.
///
/// With `init` the pure queue is not allocated, which defers user effects
/// created by `f` to the end of `f` itself. Root bodies run this way.
///
/// Panics if an error reaches the end of the drain with no handler.
pub(crate) fn run_updates<R>(rt: &Runtime, init: bool, f: impl FnOnce() -> R) -> R {
    if rt.updates.borrow().is_some() {
        return f();
    }
    let mut wait = false;
    if !init {
        *rt.updates.borrow_mut() = Some(Vec::new());
    }
    if rt.effects.borrow().is_some() {
        wait = true;
    } else {
        *rt.effects.borrow_mut() = Some(Vec::new());
    }
    rt.exec_count.set(rt.exec_count.get() + 1);
    trace!(transaction = rt.exec_count.get(), "transaction begin");

    let guard = TransactionGuard {
        runtime: rt,
        clear_effects: !wait,
    };
    let result = f();
    let outcome = complete_updates(rt, wait);
    drop(guard);
    if let Err(err) = outcome {
        surface_error(err);
    }
    result
}

fn complete_updates(rt: &Runtime, wait: bool) -> Result<(), ErrorPayload> {
    if rt.updates.borrow().is_some() {
        run_queue(rt)?;
        *rt.updates.borrow_mut() = None;
    }
    if wait {
        return Ok(());
    }

    let has_effects = rt
        .effects
        .borrow()
        .as_ref()
        .map_or(false, |queue| !queue.is_empty());
    if has_effects {
        // effect-time writes stage into a batch and commit afterwards
        if rt.pending.borrow().is_some() {
            let drained = run_user_effects(rt);
            *rt.effects.borrow_mut() = None;
            drained?;
        } else {
            let reset = PendingReset::arm(rt);
            let drained = run_user_effects(rt);
            *rt.effects.borrow_mut() = None;
            let staged = reset.take();
            drained?;
            commit_staged(rt, staged);
        }
    } else {
        *rt.effects.borrow_mut() = None;
    }
    Ok(())
}

/// Drain the pure update queue. The queue stays live while draining:
/// entries appended mid-drain are processed in the same pass.
fn run_queue(rt: &Runtime) -> Result<(), ErrorPayload> {
    let mut i = 0;
    loop {
        let next = rt
            .updates
            .borrow()
            .as_ref()
            .and_then(|queue| queue.get(i).copied());
        let Some(id) = next else { break };
        run_top(rt, id)?;
        i += 1;
    }
    Ok(())
}

/// Drain the effect queue in two tiers: render effects first in queue
/// order (user effects are compacted to the front as they are skipped),
/// then the compacted user effects, then anything those appended.
fn run_user_effects(rt: &Runtime) -> Result<(), ErrorPayload> {
    let mut user_len = 0;
    let mut i = 0;
    loop {
        let next = rt
            .effects
            .borrow()
            .as_ref()
            .and_then(|queue| queue.get(i).copied());
        let Some(id) = next else { break };
        let is_user = rt
            .nodes
            .borrow()
            .get(&id)
            .and_then(Node::as_computation)
            .map_or(false, |comp| comp.user);
        if is_user {
            if let Some(queue) = rt.effects.borrow_mut().as_mut() {
                queue[user_len] = id;
            }
            user_len += 1;
        } else {
            run_top(rt, id)?;
        }
        i += 1;
    }

    let resume = rt.effects.borrow().as_ref().map_or(0, |queue| queue.len());
    for slot in 0..user_len {
        let next = rt
            .effects
            .borrow()
            .as_ref()
            .and_then(|queue| queue.get(slot).copied());
        if let Some(id) = next {
            run_top(rt, id)?;
        }
    }

    let mut tail = resume;
    loop {
        let next = rt
            .effects
            .borrow()
            .as_ref()
            .and_then(|queue| queue.get(tail).copied());
        let Some(id) = next else { break };
        run_top(rt, id)?;
        tail += 1;
    }
    Ok(())
}

/// Bring one queued node up to date, re-running any non-clean ancestors
/// first, topmost down. Ancestors already stamped by this transaction are
/// left alone.
fn run_top(rt: &Runtime, id: NodeId) -> Result<(), ErrorPayload> {
    match node_state(rt, id) {
        None | Some(NodeState::Clean) => return Ok(()),
        Some(NodeState::Pending) => return look_upstream(rt, id, None),
        Some(NodeState::Stale) => {}
    }

    let exec = rt.exec_count.get();
    let mut ancestors: SmallVec<[NodeId; 8]> = SmallVec::new();
    ancestors.push(id);
    let mut current = owner_of(rt, id);
    while let Some(ancestor) = current {
        let Some((updated_at, state)) = stamp_and_state(rt, ancestor) else {
            break;
        };
        if updated_at != 0 && updated_at >= exec {
            break;
        }
        if state != NodeState::Clean {
            ancestors.push(ancestor);
        }
        current = owner_of(rt, ancestor);
    }

    for &node in ancestors.iter().rev() {
        match node_state(rt, node) {
            Some(NodeState::Stale) => update_computation(rt, node)?,
            Some(NodeState::Pending) => {
                let pause = rt.pause_updates();
                let result = look_upstream(rt, node, Some(id));
                drop(pause);
                result?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Settle a `Pending` node: mark it clean, then force any genuinely stale
/// source to re-run and recurse into pending ones. If a re-run source
/// produces a new value, its write re-marks this node `Stale` and the
/// drain picks it back up.
fn look_upstream(rt: &Runtime, id: NodeId, ignore: Option<NodeId>) -> Result<(), ErrorPayload> {
    set_state(rt, id, NodeState::Clean);

    let mut i = 0;
    loop {
        let source = {
            let nodes = rt.nodes.borrow();
            nodes
                .get(&id)
                .and_then(Node::as_computation)
                .and_then(|comp| comp.sources.get(i).copied())
        };
        let Some(source_id) = source else { break };
        let source_state = {
            let nodes = rt.nodes.borrow();
            nodes
                .get(&source_id)
                .and_then(Node::as_computation)
                .map(|comp| comp.state)
        };
        match source_state {
            Some(NodeState::Stale) => {
                if Some(source_id) != ignore {
                    run_top(rt, source_id)?;
                }
            }
            Some(NodeState::Pending) => look_upstream(rt, source_id, ignore)?,
            _ => {}
        }
        i += 1;
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Batching
// ----------------------------------------------------------------------------

/// Run `f` with writes staged, then commit every staged cell in one
/// transaction. Nested batches join the enclosing one.
pub(crate) fn batch_in<R>(rt: &Runtime, f: impl FnOnce() -> R) -> R {
    if rt.pending.borrow().is_some() {
        return f();
    }
    let reset = PendingReset::arm(rt);
    let result = f();
    let staged = reset.take();
    commit_staged(rt, staged);
    result
}

fn commit_staged(rt: &Runtime, staged: Vec<NodeId>) {
    run_updates(rt, false, || {
        for id in staged {
            let value = {
                let mut nodes = rt.nodes.borrow_mut();
                nodes
                    .get_mut(&id)
                    .and_then(Node::as_cell_mut)
                    .and_then(|cell| cell.staged.take())
            };
            if let Some(value) = value {
                write_cell(rt, id, value);
            }
        }
    });
}

// ----------------------------------------------------------------------------
// Teardown
// ----------------------------------------------------------------------------

/// Reset a node: detach its source edges, dispose everything it owns,
/// run its cleanups, and settle it clean. The node itself stays in the
/// arena; this runs before every computation re-run.
pub(crate) fn clean_node(rt: &Runtime, id: NodeId) {
    detach_sources(rt, id);

    let owned = {
        let mut nodes = rt.nodes.borrow_mut();
        match nodes.get_mut(&id).and_then(Node::as_scope_mut) {
            Some(scope) => std::mem::take(&mut scope.owned),
            None => Vec::new(),
        }
    };
    for child in owned {
        dispose_node(rt, child);
    }

    let cleanups = {
        let mut nodes = rt.nodes.borrow_mut();
        match nodes.get_mut(&id).and_then(Node::as_scope_mut) {
            Some(scope) => std::mem::take(&mut scope.cleanups),
            None => Vec::new(),
        }
    };
    for cleanup in cleanups {
        cleanup();
    }

    let mut nodes = rt.nodes.borrow_mut();
    if let Some(comp) = nodes.get_mut(&id).and_then(Node::as_computation_mut) {
        comp.state = NodeState::Clean;
    }
    if let Some(scope) = nodes.get_mut(&id).and_then(Node::as_scope_mut) {
        scope.context = None;
    }
}

/// Reset a node and remove it from the arena. Disposing a node twice, or
/// one that never existed, is a no-op; a disposed node still queued for a
/// pass is skipped when the queue drains.
pub(crate) fn dispose_node(rt: &Runtime, id: NodeId) {
    if !rt.nodes.borrow().contains_key(&id) {
        return;
    }
    trace!(node = id.raw(), "disposing node");
    clean_node(rt, id);
    rt.nodes.borrow_mut().swap_remove(&id);
}

/// Detach every source edge of `id`, O(1) per edge: the edge's entry in
/// the source's observer list is swapped with the last entry and the moved
/// entry's back-slot is patched.
fn detach_sources(rt: &Runtime, id: NodeId) {
    loop {
        let popped = {
            let mut nodes = rt.nodes.borrow_mut();
            let Some(comp) = nodes.get_mut(&id).and_then(Node::as_computation_mut) else {
                return;
            };
            match (comp.sources.pop(), comp.source_slots.pop()) {
                (Some(source), Some(slot)) => Some((source, slot)),
                _ => None,
            }
        };
        let Some((source_id, index)) = popped else { break };

        let mut nodes = rt.nodes.borrow_mut();
        let mut moved: Option<(NodeId, usize)> = None;
        if let Some(cell) = nodes.get_mut(&source_id).and_then(Node::as_cell_mut) {
            if let (Some(last_observer), Some(last_slot)) =
                (cell.observers.pop(), cell.observer_slots.pop())
            {
                if index < cell.observers.len() {
                    cell.observers[index] = last_observer;
                    cell.observer_slots[index] = last_slot;
                    moved = Some((last_observer, last_slot));
                }
            }
        }
        if let Some((observer_id, slot)) = moved {
            if let Some(comp) = nodes.get_mut(&observer_id).and_then(Node::as_computation_mut) {
                if let Some(entry) = comp.source_slots.get_mut(slot) {
                    *entry = index;
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Guards
// ----------------------------------------------------------------------------

/// Clears the transaction queue slots when the outermost transaction ends,
/// including by panic.
struct TransactionGuard<'rt> {
    runtime: &'rt Runtime,
    clear_effects: bool,
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        *self.runtime.updates.borrow_mut() = None;
        if self.clear_effects {
            *self.runtime.effects.borrow_mut() = None;
        }
    }
}

/// Installs the batch staging queue and guarantees the slot is cleared
/// again even if the batch body panics. Values staged on cells survive
/// an unwind; only the commit order is discarded.
struct PendingReset<'rt> {
    runtime: &'rt Runtime,
    armed: bool,
}

impl<'rt> PendingReset<'rt> {
    fn arm(rt: &'rt Runtime) -> Self {
        *rt.pending.borrow_mut() = Some(Vec::new());
        Self {
            runtime: rt,
            armed: true,
        }
    }

    fn take(mut self) -> Vec<NodeId> {
        self.armed = false;
        self.runtime.pending.borrow_mut().take().unwrap_or_default()
    }
}

impl Drop for PendingReset<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.runtime.pending.borrow_mut() = None;
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
