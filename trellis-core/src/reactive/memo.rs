//! Memos
//!
//! A memo is a pure computation whose result is cached in a cell and read
//! exactly like a signal. It runs once at creation, so it holds a value
//! before any reader consumes it, and re-runs when a dependency changes,
//! at most once per transaction.
//!
//! A memo that recomputes to an equal value (per `PartialEq`, or a custom
//! comparator) does not wake its observers, which is what stops equality
//! plateaus from rippling through a deep graph. Readers that catch a memo
//! mid-transaction still get a consistent answer: reading a marked memo
//! recomputes it on the spot before the value comes back.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::graph::node::{Comparator, Node, NodeId, NodeState, RunFn};
use crate::graph::scheduler::{create_computation, read_cell, update_computation};
use crate::reactive::effect::{wrap_body, wrap_fallible_body};
use crate::reactive::error::surface_error;
use crate::reactive::runtime::with_runtime;

/// Create a memo over `f`. Recomputing to a `PartialEq`-equal value does
/// not notify observers.
pub fn create_memo<T>(f: impl Fn(Option<&T>) -> T + 'static) -> Memo<T>
where
    T: PartialEq + 'static,
{
    let equals: Comparator = Rc::new(|a: &dyn Any, b: &dyn Any| {
        a.downcast_ref::<T>() == b.downcast_ref::<T>()
    });
    Memo::new(create_memo_node(wrap_body(f), Some(equals)))
}

/// [`create_memo`] with a custom equality for the cut-off. `|_, _| false`
/// makes every recomputation notify.
pub fn create_memo_with_equals<T: 'static>(
    f: impl Fn(Option<&T>) -> T + 'static,
    equals: impl Fn(&T, &T) -> bool + 'static,
) -> Memo<T> {
    let equals: Comparator = Rc::new(move |a: &dyn Any, b: &dyn Any| {
        match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
            (Some(a), Some(b)) => equals(a, b),
            _ => false,
        }
    });
    Memo::new(create_memo_node(wrap_body(f), Some(equals)))
}

/// [`create_memo`] for a body that can fail. An `Err` travels up the
/// ownership tree to the nearest [`on_error`](super::on_error)
/// scope and the memo keeps its previous value.
///
/// A memo whose first run fails holds no value at all; reading it before
/// a successful run panics.
pub fn create_fallible_memo<T, E>(f: impl Fn(Option<&T>) -> Result<T, E> + 'static) -> Memo<T>
where
    T: PartialEq + 'static,
    E: std::error::Error + 'static,
{
    let equals: Comparator = Rc::new(|a: &dyn Any, b: &dyn Any| {
        a.downcast_ref::<T>() == b.downcast_ref::<T>()
    });
    Memo::new(create_memo_node(wrap_fallible_body(f), Some(equals)))
}

fn create_memo_node(run: RunFn, equals: Option<Comparator>) -> NodeId {
    with_runtime(|rt| {
        let id = create_computation(rt, run, true, false, NodeState::Clean, equals);
        if let Err(err) = update_computation(rt, id) {
            surface_error(err);
        }
        id
    })
}

/// A cached derived value. Reads exactly like a [`ReadSignal`].
///
/// [`ReadSignal`]: super::ReadSignal
pub struct Memo<T> {
    id: NodeId,
    ty: PhantomData<fn() -> T>,
}

impl<T: 'static> Memo<T> {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            ty: PhantomData,
        }
    }

    /// Clone the current value, recomputing first if a dependency changed
    /// in the current transaction, and subscribing the active computation.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Run `f` against the current value, subscribing the active
    /// computation.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = with_runtime(|rt| read_cell(rt, self.id));
        let value = value
            .downcast_ref::<T>()
            .expect("reactive cell holds its declared type");
        f(value)
    }

    /// Clone the current value without subscribing anyone. Still
    /// recomputes first when marked; untracked reads stay consistent.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.with_untracked(T::clone)
    }

    /// Run `f` against the current value without subscribing anyone.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = with_runtime(|rt| {
            let guard = rt.enter(rt.owner.get(), None);
            let value = read_cell(rt, self.id);
            drop(guard);
            value
        });
        let value = value
            .downcast_ref::<T>()
            .expect("reactive cell holds its declared type");
        f(value)
    }

    /// How many computations currently subscribe to this memo.
    pub fn observer_count(&self) -> usize {
        with_runtime(|rt| {
            rt.nodes
                .borrow()
                .get(&self.id)
                .and_then(Node::as_cell)
                .map_or(0, |cell| cell.observers.len())
        })
    }

    /// The arena id behind this handle.
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Memo<T> {}

impl<T> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo").field("id", &self.id).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
