//! Ownership and Roots
//!
//! Every node created while a computation or root body runs is owned by
//! it, forming a tree. Disposal cascades down that tree: children are
//! disposed first (depth-first, in creation order), then the owner's own
//! cleanups run, then its dependency edges detach. A computation re-runs
//! through the same teardown, which is why state created inside an effect
//! body never outlives the run that made it.
//!
//! Roots anchor the tree. [`create_root`] hands its body a [`Disposer`]
//! for the whole subtree; [`create_detached_root`] makes a fire-and-forget
//! scope that nothing ever disposes. A root is navigable from its parent
//! (errors still travel up through it) but is not owned by it, so an outer
//! root's disposal leaves inner roots alive.
//!
//! # Example
//!
//! ```
//! use trellis_core::reactive::{create_root, create_signal, on_cleanup};
//!
//! let disposer = create_root(|disposer| {
//!     let (count, set_count) = create_signal(1);
//!     on_cleanup(|| println!("tearing down"));
//!     set_count.set(2);
//!     assert_eq!(count.get(), 2);
//!     disposer
//! });
//! disposer.dispose();
//! ```

use tracing::trace;

use crate::graph::node::{Node, NodeId};
use crate::graph::scheduler::{batch_in, dispose_node, run_updates};
use crate::reactive::runtime::{with_runtime, Runtime};

/// Disposes a root's whole subtree. Cheap to copy around; disposing twice
/// is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct Disposer {
    id: NodeId,
}

impl Disposer {
    /// Dispose the root and everything it owns.
    pub fn dispose(&self) {
        with_runtime(|rt| dispose_node(rt, self.id));
    }
}

/// Run `f` inside a new root scope. The scope owns everything `f`
/// creates; the [`Disposer`] passed to `f` tears the whole subtree down.
///
/// The body runs through the transaction layer, so user effects created
/// inside are first run when the body returns.
pub fn create_root<T>(f: impl FnOnce(Disposer) -> T) -> T {
    with_runtime(|rt| {
        let parent = rt.owner.get();
        root_scope(rt, parent, f)
    })
}

/// Run `f` inside a fire-and-forget root scope: never auto-disposed, not
/// a child of anything, with no parent to route errors to.
pub fn create_detached_root<T>(f: impl FnOnce() -> T) -> T {
    with_runtime(|rt| root_scope(rt, None, |_| f()))
}

fn root_scope<T>(rt: &Runtime, parent: Option<NodeId>, f: impl FnOnce(Disposer) -> T) -> T {
    // navigable from the parent but never in its owned list
    let root = rt.insert(Node::scope(parent));
    let guard = rt.enter(Some(root), None);
    let result = run_updates(rt, true, || f(Disposer { id: root }));
    drop(guard);
    result
}

/// Register `f` on the current owner, to run when it is disposed or
/// re-run. Without an owner the callback can never fire and is dropped.
pub fn on_cleanup(f: impl FnOnce() + 'static) {
    with_runtime(|rt| {
        let Some(owner) = rt.owner.get() else {
            trace!("cleanup registered outside a root; it will never run");
            return;
        };
        let mut nodes = rt.nodes.borrow_mut();
        if let Some(scope) = nodes.get_mut(&owner).and_then(Node::as_scope_mut) {
            scope.cleanups.push(Box::new(f));
        }
    });
}

/// Run `f` with dependency tracking suspended. Reads inside see current
/// values but subscribe nothing; ownership is unaffected.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    with_runtime(|rt| {
        let guard = rt.enter(rt.owner.get(), None);
        let result = f();
        drop(guard);
        result
    })
}

/// Invoke a component function with its props, untracked. Construction
/// reads never subscribe the caller; only the effects and memos the
/// component creates do their own tracking.
pub fn create_component<P, R>(f: impl FnOnce(P) -> R, props: P) -> R {
    untrack(move || f(props))
}

/// Run `f` with writes staged, then commit them all in one transaction
/// when the outermost batch ends. Each signal notifies at most once per
/// batch, with the last value written to it; reads inside the batch still
/// see pre-batch values. Nested batches join the enclosing one.
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    with_runtime(|rt| batch_in(rt, f))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::create_effect;
    use crate::reactive::signal::create_signal;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn disposal_stops_reruns() {
        let (count, set_count) = create_signal(0);
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let disposer = create_root(|disposer| {
            create_effect(move |_: Option<&()>| {
                count.get();
                counter.set(counter.get() + 1);
            });
            disposer
        });
        set_count.set(1);
        assert_eq!(runs.get(), 2);

        disposer.dispose();
        set_count.set(2);
        assert_eq!(runs.get(), 2);
        assert_eq!(count.observer_count(), 0);
    }

    #[test]
    fn disposing_twice_is_a_no_op() {
        let disposer = create_root(|disposer| disposer);
        disposer.dispose();
        disposer.dispose();
    }

    #[test]
    fn cleanups_run_children_first_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let order = seen.clone();
        let disposer = create_root(|disposer| {
            let first = order.clone();
            let second = order.clone();
            on_cleanup(move || first.borrow_mut().push("root-first"));
            let child = order.clone();
            create_effect(move |_: Option<&()>| {
                let inner = child.clone();
                on_cleanup(move || inner.borrow_mut().push("child"));
            });
            on_cleanup(move || second.borrow_mut().push("root-second"));
            disposer
        });
        assert!(seen.borrow().is_empty());

        disposer.dispose();
        assert_eq!(
            seen.borrow().as_slice(),
            ["child", "root-first", "root-second"]
        );
    }

    #[test]
    fn re_runs_tear_down_the_previous_run() {
        let (count, set_count) = create_signal(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let order = seen.clone();
        create_effect(move |_: Option<&i32>| {
            let n = count.get();
            let log = order.clone();
            on_cleanup(move || log.borrow_mut().push(format!("drop {n}")));
            order.borrow_mut().push(format!("run {n}"));
            n
        });
        set_count.set(1);
        assert_eq!(
            seen.borrow().as_slice(),
            ["run 0".to_string(), "drop 0".to_string(), "run 1".to_string()]
        );
    }

    #[test]
    fn cleanup_without_an_owner_is_dropped() {
        on_cleanup(|| panic!("never runs"));
    }

    #[test]
    fn untracked_blocks_do_not_subscribe() {
        let (count, set_count) = create_signal(0);
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        create_effect(move |_: Option<&()>| {
            untrack(|| count.get());
            counter.set(counter.get() + 1);
        });
        set_count.set(1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn components_construct_untracked() {
        let (count, set_count) = create_signal(3);
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        create_effect(move |_: Option<&i32>| {
            let doubled = create_component(|factor: i32| count.get() * factor, 2);
            counter.set(counter.get() + 1);
            doubled
        });
        set_count.set(4);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn inner_roots_survive_the_outer_body() {
        let (count, set_count) = create_signal(0);
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let outer = create_root(|outer| {
            create_root(|_inner| {
                create_effect(move |_: Option<&()>| {
                    count.get();
                    counter.set(counter.get() + 1);
                });
            });
            outer
        });
        outer.dispose();

        // the inner root is not owned by the outer one
        set_count.set(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn batch_coalesces_writes() {
        let (count, set_count) = create_signal(0);
        let runs = Rc::new(Cell::new(0));
        let last = Rc::new(Cell::new(-1));
        let counter = runs.clone();
        let seen = last.clone();
        create_effect(move |_: Option<&()>| {
            seen.set(count.get());
            counter.set(counter.get() + 1);
        });
        batch(|| {
            set_count.set(1);
            set_count.set(2);
            set_count.set(3);
        });
        assert_eq!(runs.get(), 2);
        assert_eq!(last.get(), 3);
    }

    #[test]
    fn nested_batches_join_the_outer_one() {
        let (count, set_count) = create_signal(0);
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        create_effect(move |_: Option<&()>| {
            count.get();
            counter.set(counter.get() + 1);
        });
        batch(|| {
            set_count.set(1);
            batch(|| set_count.set(2));
            // the inner batch must not have committed anything
            assert_eq!(count.get_untracked(), 0);
        });
        assert_eq!(count.get_untracked(), 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn detached_roots_run_their_body() {
        let value = create_detached_root(|| {
            let (count, set_count) = create_signal(1);
            set_count.set(41);
            count.get() + 1
        });
        assert_eq!(value, 42);
    }
}
