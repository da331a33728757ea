//! Run-time half of the template engine.
//!
//! Compiled templates are trees of [`CompiledNode`]s. Invoking one takes a
//! [`Scope`] (the name resolver) and an [`ExecutionContext`] (the shared
//! budget and error policy for that invocation). Nothing here knows about
//! template syntax; that lives in the compiler crate.

mod execution;
mod iterator;
mod node;
mod scope;

pub use execution::{
    CallGuard, ExecutionContext, DEFAULT_EXECUTION_LIMIT, DEFAULT_MAX_CALL_DEPTH,
};
pub use iterator::{CompiledIterator, NodeIter};
pub use node::{CompiledNode, EvalResult, Probe, Validator};
pub use scope::{Lookup, Overlay, Scope};
