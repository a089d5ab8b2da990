//! Reactive Primitives
//!
//! This module is the public face of the engine: signals, memos, effects,
//! ownership scopes, batching, and the error channel.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A signal is a mutable cell split into a read handle and a write handle.
//! Reading inside a computation subscribes it; writing notifies exactly the
//! current subscribers. Writes of an equal value are suppressed.
//!
//! ## Memos
//!
//! A memo is a cached derived value. It recomputes at most once per
//! transaction, and only notifies its own observers when the result
//! actually changed, so equality plateaus stop propagation early.
//!
//! ## Effects
//!
//! An effect re-runs whenever a dependency changes. Render effects run
//! ahead of user effects in every pass, which keeps output-producing code
//! ordered before observation code.
//!
//! ## Ownership
//!
//! Whatever a computation or root body creates, it owns. Re-running or
//! disposing an owner first disposes everything it owns, depth-first, then
//! runs its cleanups. [`create_root`] anchors a tree and hands back its
//! [`Disposer`].
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic: the runtime keeps an ambient
//! "currently running computation" pointer in a thread-local, and every
//! signal read registers an edge against it. There are no weak references
//! and no garbage cycles; the graph lives in one arena and edges are plain
//! ids with back-slot indices for O(1) removal.

mod effect;
pub(crate) mod error;
mod memo;
mod owner;
pub(crate) mod runtime;
mod signal;

pub use crate::graph::node::ErrorPayload;
pub use effect::{
    create_effect, create_fallible_effect, create_fallible_render_effect, create_render_effect,
};
pub use error::{on_error, UnhandledError};
pub use memo::{create_fallible_memo, create_memo, create_memo_with_equals, Memo};
pub use owner::{
    batch, create_component, create_detached_root, create_root, on_cleanup, untrack, Disposer,
};
pub use signal::{create_signal, create_signal_with_equals, ReadSignal, WriteSignal};
