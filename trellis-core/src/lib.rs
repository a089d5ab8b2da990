//! Trellis Core
//!
//! This crate provides the core runtime for Trellis, a fine-grained
//! reactive engine. It implements:
//!
//! - Reactive primitives (signals, memos, effects, ownership scopes)
//! - A bidirectional dependency graph with O(1) edge removal
//! - A two-phase transaction scheduler with glitch-free propagation
//! - An ownership-scoped error channel
//!
//! The engine is single-threaded and fully synchronous: every write runs
//! its consequences to completion on the caller's stack before returning,
//! and each affected computation runs at most once per transaction.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: the public primitives and the thread-local runtime
//! - `graph`: the node arena and the update scheduler behind them
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use trellis_core::reactive::{batch, create_effect, create_root, create_signal};
//!
//! let seen = Rc::new(Cell::new(0));
//! let log = seen.clone();
//!
//! let disposer = create_root(|disposer| {
//!     let (count, set_count) = create_signal(1);
//!
//!     // re-runs whenever `count` changes
//!     create_effect(move |_: Option<&()>| log.set(count.get()));
//!
//!     // two writes, one notification
//!     batch(|| {
//!         set_count.set(2);
//!         set_count.set(3);
//!     });
//!
//!     disposer
//! });
//!
//! assert_eq!(seen.get(), 3);
//! disposer.dispose();
//! ```

pub mod graph;
pub mod reactive;
