//! Effects
//!
//! An effect is an impure computation run for its side effects. Every
//! signal or memo it reads subscribes it; any of them changing re-runs it.
//! The body receives the value it returned last time (`None` on the first
//! run), which gives teardown-free effects a place to diff against.
//!
//! Two kinds exist, differing only in when they run:
//!
//! - [`create_render_effect`] runs its body immediately during creation
//!   and, on updates, ahead of every user effect in the pass.
//! - [`create_effect`] defers its first run to the end of the enclosing
//!   root body or transaction, by which point sibling state exists. At top
//!   level, with nothing to defer to, it runs immediately too.
//!
//! Effects own what their bodies create. Each re-run first disposes the
//! previous run's signals, computations, and cleanups, so a body that
//! builds nested state does not leak it.

use std::rc::Rc;

use crate::graph::node::{ErrorPayload, NodeId, NodeState, RunFn, Value};
use crate::graph::scheduler::{create_computation, update_computation};
use crate::reactive::error::surface_error;
use crate::reactive::runtime::{with_runtime, Runtime};

/// Create a user effect. Defers inside a root body or transaction, runs
/// immediately otherwise.
pub fn create_effect<T: 'static>(f: impl Fn(Option<&T>) -> T + 'static) {
    create_effect_node(wrap_body(f), true);
}

/// Create a render effect. Runs immediately during creation and before
/// user effects on every update.
pub fn create_render_effect<T: 'static>(f: impl Fn(Option<&T>) -> T + 'static) {
    create_effect_node(wrap_body(f), false);
}

/// [`create_effect`] for a body that can fail. An `Err` travels up the
/// ownership tree to the nearest [`on_error`](super::on_error)
/// scope; the effect keeps its previous value and stays subscribed.
pub fn create_fallible_effect<T, E>(f: impl Fn(Option<&T>) -> Result<T, E> + 'static)
where
    T: 'static,
    E: std::error::Error + 'static,
{
    create_effect_node(wrap_fallible_body(f), true);
}

/// [`create_render_effect`] for a body that can fail.
pub fn create_fallible_render_effect<T, E>(f: impl Fn(Option<&T>) -> Result<T, E> + 'static)
where
    T: 'static,
    E: std::error::Error + 'static,
{
    create_effect_node(wrap_fallible_body(f), false);
}

fn create_effect_node(run: RunFn, user: bool) {
    with_runtime(|rt| {
        let id = create_computation(rt, run, false, user, NodeState::Stale, None);
        if user {
            let deferred = {
                let mut effects = rt.effects.borrow_mut();
                match effects.as_mut() {
                    Some(queue) => {
                        queue.push(id);
                        true
                    }
                    None => false,
                }
            };
            if !deferred {
                run_now(rt, id);
            }
        } else {
            run_now(rt, id);
        }
    });
}

fn run_now(rt: &Runtime, id: NodeId) {
    if let Err(err) = update_computation(rt, id) {
        surface_error(err);
    }
}

/// Adapt a typed body to the untyped runner a computation node stores.
pub(crate) fn wrap_body<T: 'static>(f: impl Fn(Option<&T>) -> T + 'static) -> RunFn {
    Rc::new(move |prev: Option<Value>| {
        let prev = prev.as_ref().and_then(|value| value.downcast_ref::<T>());
        Ok(Rc::new(f(prev)) as Value)
    })
}

/// Adapt a typed fallible body, erasing its error type as well.
pub(crate) fn wrap_fallible_body<T, E>(f: impl Fn(Option<&T>) -> Result<T, E> + 'static) -> RunFn
where
    T: 'static,
    E: std::error::Error + 'static,
{
    Rc::new(move |prev: Option<Value>| {
        let prev = prev.as_ref().and_then(|value| value.downcast_ref::<T>());
        match f(prev) {
            Ok(next) => Ok(Rc::new(next) as Value),
            Err(err) => Err(Rc::new(err) as ErrorPayload),
        }
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
