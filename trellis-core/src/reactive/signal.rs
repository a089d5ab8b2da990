//! Signals
//!
//! A signal is a reactive cell split into two handles: a [`ReadSignal`]
//! that tracks whoever reads it and a [`WriteSignal`] that notifies them.
//! Both handles are `Copy` ids into the thread's node arena, so they move
//! into closures freely and survive each other.
//!
//! # Example
//!
//! ```
//! use trellis_core::reactive::create_signal;
//!
//! let (count, set_count) = create_signal(3);
//! assert_eq!(count.get(), 3);
//! set_count.set(4);
//! assert_eq!(count.get(), 4);
//! ```
//!
//! Reads inside a computation subscribe it to the cell; writes outside a
//! batch commit immediately and re-run subscribers before returning.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::graph::node::{Comparator, Node, NodeId};
use crate::graph::scheduler::{peek_cell, read_cell, write_cell};
use crate::reactive::runtime::with_runtime;

/// Create a signal holding `value`. Writes of a value equal to the current
/// one (per `PartialEq`) are suppressed and notify nobody.
pub fn create_signal<T>(value: T) -> (ReadSignal<T>, WriteSignal<T>)
where
    T: PartialEq + 'static,
{
    let equals: Comparator = Rc::new(|a: &dyn Any, b: &dyn Any| {
        a.downcast_ref::<T>() == b.downcast_ref::<T>()
    });
    let id = create_signal_node(value, Some(equals));
    (ReadSignal::new(id), WriteSignal::new(id))
}

/// Create a signal with a custom equality. `equals` returning `true`
/// suppresses the write. Pass `|_, _| false` to notify on every write.
pub fn create_signal_with_equals<T: 'static>(
    value: T,
    equals: impl Fn(&T, &T) -> bool + 'static,
) -> (ReadSignal<T>, WriteSignal<T>) {
    let equals: Comparator = Rc::new(move |a: &dyn Any, b: &dyn Any| {
        match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
            (Some(a), Some(b)) => equals(a, b),
            _ => false,
        }
    });
    let id = create_signal_node(value, Some(equals));
    (ReadSignal::new(id), WriteSignal::new(id))
}

fn create_signal_node<T: 'static>(value: T, equals: Option<Comparator>) -> NodeId {
    with_runtime(|rt| {
        let id = rt.insert(Node::signal(Rc::new(value), equals));
        rt.attach_to_owner(id);
        id
    })
}

/// The reading half of a signal.
pub struct ReadSignal<T> {
    id: NodeId,
    ty: PhantomData<fn() -> T>,
}

impl<T: 'static> ReadSignal<T> {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            ty: PhantomData,
        }
    }

    /// Clone the current value, subscribing the active computation.
    ///
    /// Panics if the signal was disposed.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Run `f` against the current value, subscribing the active
    /// computation. Avoids the clone [`get`](Self::get) makes.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = with_runtime(|rt| read_cell(rt, self.id));
        let value = value
            .downcast_ref::<T>()
            .expect("reactive cell holds its declared type");
        f(value)
    }

    /// Clone the current value without subscribing anyone.
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

    /// How many computations currently subscribe to this signal.
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

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReadSignal<T> {}

impl<T> fmt::Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadSignal").field("id", &self.id).finish()
    }
}

/// The writing half of a signal.
pub struct WriteSignal<T> {
    id: NodeId,
    ty: PhantomData<fn(T)>,
}

impl<T: 'static> WriteSignal<T> {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            ty: PhantomData,
        }
    }

    /// Write `value`. Outside a batch this commits immediately and re-runs
    /// subscribers before returning; inside a batch it is staged and the
    /// last staged write wins at commit.
    ///
    /// Panics if the signal was disposed.
    pub fn set(&self, value: T) {
        with_runtime(|rt| write_cell(rt, self.id, Rc::new(value)));
    }

    /// Write the result of `f` applied to the current value. Inside a
    /// batch `f` sees the latest staged value, so consecutive updates
    /// compose. Never subscribes the caller.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let current = with_runtime(|rt| peek_cell(rt, self.id));
        let current = current
            .downcast_ref::<T>()
            .expect("reactive cell holds its declared type");
        let next = f(current);
        with_runtime(|rt| write_cell(rt, self.id, Rc::new(next)));
    }

    /// The arena id behind this handle.
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl<T> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for WriteSignal<T> {}

impl<T> fmt::Debug for WriteSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSignal").field("id", &self.id).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
