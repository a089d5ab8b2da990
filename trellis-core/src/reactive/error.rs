//! Error Channel
//!
//! Computations can fail with any [`std::error::Error`]. A failure does not
//! unwind through the engine; it travels up the ownership tree instead,
//! looking for the nearest scope that registered handlers with
//! [`on_error`]. The first scope with handlers absorbs the error (every
//! handler on that scope runs), the failing computation keeps its previous
//! value, and the rest of the pass continues untouched.
//!
//! Only an error that reaches the top of the tree without meeting a
//! handler escapes, as a panic carrying [`UnhandledError`] at whichever
//! public call started the work.

use indexmap::IndexMap;
use std::rc::Rc;
use thiserror::Error;
use tracing::warn;

use crate::graph::node::{ContextKey, ErrorHandler, ErrorPayload, Node, NodeId};
use crate::reactive::runtime::{with_runtime, Runtime};

/// An error that crossed the whole ownership tree without finding a
/// handler. Carried by the panic that surfaces it.
#[derive(Debug, Error)]
#[error("unhandled reactive error: {message}")]
pub struct UnhandledError {
    message: String,
}

impl UnhandledError {
    pub(crate) fn new(source: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            message: source.to_string(),
        }
    }

    /// Rendering of the original error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The context slot error handlers live under.
pub(crate) fn error_key() -> ContextKey {
    use std::sync::OnceLock;
    static ERROR_KEY: OnceLock<ContextKey> = OnceLock::new();
    *ERROR_KEY.get_or_init(ContextKey::new)
}

/// Register an error handler on the current owner. Errors raised by the
/// owner itself or by anything it transitively owns reach this handler,
/// unless a closer scope handles them first.
///
/// Handlers registered by a computation are discarded when it re-runs, so
/// a body that registers one does not accumulate copies.
pub fn on_error(handler: impl Fn(&(dyn std::error::Error + 'static)) + 'static) {
    with_runtime(|rt| {
        let Some(owner) = rt.owner.get() else {
            warn!("error handler registered outside a root; it will never run");
            return;
        };
        let handler: ErrorHandler = Rc::new(handler);
        let mut nodes = rt.nodes.borrow_mut();
        if let Some(scope) = nodes.get_mut(&owner).and_then(Node::as_scope_mut) {
            scope
                .context
                .get_or_insert_with(IndexMap::new)
                .entry(error_key())
                .or_insert_with(Vec::new)
                .push(handler);
        }
    });
}

/// Walk the ownership chain from `origin` upward and hand `err` to the
/// first scope with registered handlers. Returns the error back if no
/// scope on the chain has any.
pub(crate) fn resolve_error(
    rt: &Runtime,
    origin: NodeId,
    err: ErrorPayload,
) -> Result<(), ErrorPayload> {
    let handlers = {
        let nodes = rt.nodes.borrow();
        let key = error_key();
        let mut current = Some(origin);
        let mut found: Option<Vec<ErrorHandler>> = None;
        while let Some(id) = current {
            let Some(node) = nodes.get(&id) else { break };
            match node.as_scope() {
                Some(scope) => {
                    let list = scope
                        .context
                        .as_ref()
                        .and_then(|context| context.get(&key))
                        .filter(|list| !list.is_empty());
                    if let Some(list) = list {
                        found = Some(list.clone());
                        break;
                    }
                    current = scope.owner;
                }
                None => current = node.owner(),
            }
        }
        found
    };

    match handlers {
        Some(handlers) => {
            for handler in handlers {
                handler(err.as_ref());
            }
            Ok(())
        }
        None => Err(err),
    }
}

/// Panic with [`UnhandledError`]. Reached only when a drain or a read
/// finished with an error no scope absorbed.
pub(crate) fn surface_error(err: ErrorPayload) -> ! {
    let err = UnhandledError::new(err.as_ref());
    panic!("{err}");
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
