use std::fmt;
use std::rc::Rc;

use jt_core::{TemplateError, Variable};
use serde_json::Value;

use crate::execution::ExecutionContext;
use crate::scope::Scope;

pub type EvalResult = Result<Option<Variable>, TemplateError>;

type Closure = Rc<dyn Fn(&Scope, &ExecutionContext) -> EvalResult>;

/// A compiled template fragment.
///
/// Static nodes carry a value known at compile time (`None` is `undefined`)
/// and cost nothing to run. Dynamic nodes are closures over the invocation's
/// scope and execution context.
#[derive(Clone)]
pub enum CompiledNode {
    Static(Option<Value>),
    Dynamic(Closure),
}

impl CompiledNode {
    pub fn undefined() -> Self {
        Self::Static(None)
    }

    pub fn value(value: Value) -> Self {
        Self::Static(Some(value))
    }

    pub fn dynamic(
        function: impl Fn(&Scope, &ExecutionContext) -> EvalResult + 'static,
    ) -> Self {
        Self::Dynamic(Rc::new(function))
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }

    /// The folded value of a static node; `None` for dynamic nodes.
    pub fn as_static(&self) -> Option<Option<&Value>> {
        match self {
            Self::Static(value) => Some(value.as_ref()),
            Self::Dynamic(_) => None,
        }
    }

    pub fn eval(&self, scope: &Scope, exec: &ExecutionContext) -> EvalResult {
        match self {
            Self::Static(value) => Ok(value.clone().map(Variable::Json)),
            Self::Dynamic(function) => function(scope, exec),
        }
    }

    /// Evaluates and drops callables, for positions that only take JSON.
    pub fn eval_json(
        &self,
        scope: &Scope,
        exec: &ExecutionContext,
    ) -> Result<Option<Value>, TemplateError> {
        Ok(self.eval(scope, exec)?.and_then(Variable::into_json))
    }
}

impl fmt::Debug for CompiledNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Borrowed view of a value handed to a [`Validator`].
#[derive(Debug, Clone, Copy)]
pub enum Probe<'a> {
    Undefined,
    Json(&'a Value),
    Callable,
}

impl<'a> Probe<'a> {
    pub fn of(value: Option<&'a Variable>) -> Self {
        match value {
            None => Self::Undefined,
            Some(Variable::Json(value)) => Self::Json(value),
            Some(Variable::Callable(_)) => Self::Callable,
        }
    }

    pub fn of_json(value: Option<&'a Value>) -> Self {
        value.map_or(Self::Undefined, Self::Json)
    }
}

/// A named predicate over node results. The name ends up in
/// `EXECUTION_INVALID_RESULT` messages.
#[derive(Clone, Copy)]
pub struct Validator {
    name: &'static str,
    check: fn(Probe<'_>) -> bool,
}

impl Validator {
    pub const fn new(name: &'static str, check: fn(Probe<'_>) -> bool) -> Self {
        Self { name, check }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn accepts(&self, probe: Probe<'_>) -> bool {
        (self.check)(probe)
    }

    /// Anything but a callable. `undefined` passes.
    pub const IS_JSON: Self = Self::new("isJson", |probe| !matches!(probe, Probe::Callable));

    pub const IS_DEFINED: Self =
        Self::new("isDefined", |probe| !matches!(probe, Probe::Undefined));

    pub const IS_STRING: Self =
        Self::new("isString", |probe| matches!(probe, Probe::Json(Value::String(_))));

    pub const IS_ARRAY: Self =
        Self::new("isArray", |probe| matches!(probe, Probe::Json(Value::Array(_))));

    pub const IS_OBJECT: Self =
        Self::new("isObject", |probe| matches!(probe, Probe::Json(Value::Object(_))));
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validator({})", self.name)
    }
}
