use std::cell::Cell;
use std::rc::Rc;

use jt_core::{CompilationContext, ErrorMode, TemplateError};

pub const DEFAULT_EXECUTION_LIMIT: u64 = 10_000_000;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;

#[derive(Debug)]
struct ExecutionState {
    count: Cell<u64>,
    limit: u64,
    depth: Cell<usize>,
    max_depth: usize,
    on_error: ErrorMode,
}

/// Budget and error policy shared by every node of one invocation.
///
/// Cloning is cheap and yields a handle to the same counters, which is how
/// callables created during an invocation keep charging that invocation.
#[derive(Debug, Clone)]
pub struct ExecutionContext(Rc<ExecutionState>);

impl ExecutionContext {
    pub fn new(limit: u64, max_depth: usize, on_error: ErrorMode) -> Self {
        Self(Rc::new(ExecutionState {
            count: Cell::new(0),
            limit,
            depth: Cell::new(0),
            max_depth,
            on_error,
        }))
    }

    pub fn count(&self) -> u64 {
        self.0.count.get()
    }

    pub fn limit(&self) -> u64 {
        self.0.limit
    }

    pub fn depth(&self) -> usize {
        self.0.depth.get()
    }

    /// Counts one visit of a non-static node.
    pub fn charge(&self, context: Option<&Rc<CompilationContext>>) -> Result<(), TemplateError> {
        let previous = self.0.count.get();
        self.0.count.set(previous + 1);
        if previous > self.0.limit {
            tracing::warn!(limit = self.0.limit, "execution limit exceeded");
            return Err(TemplateError::execution_limit(self.0.limit, context));
        }
        Ok(())
    }

    pub fn report(&self, error: TemplateError) -> Result<(), TemplateError> {
        self.0.on_error.report(error)
    }

    /// Enters a user function call. The depth is released when the guard drops.
    pub fn enter_call(
        &self,
        context: Option<&Rc<CompilationContext>>,
    ) -> Result<CallGuard, TemplateError> {
        let depth = self.0.depth.get() + 1;
        if depth > self.0.max_depth {
            return Err(TemplateError::call_depth(self.0.max_depth, context));
        }
        self.0.depth.set(depth);
        Ok(CallGuard(self.clone()))
    }
}

pub struct CallGuard(ExecutionContext);

impl Drop for CallGuard {
    fn drop(&mut self) {
        let state = &(self.0).0;
        state.depth.set(state.depth.get().saturating_sub(1));
    }
}
