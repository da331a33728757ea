use std::rc::Rc;

use jt_core::{CompilationContext, TemplateError};
use serde_json::Value;

use crate::execution::ExecutionContext;
use crate::node::{CompiledNode, EvalResult, Probe, Validator};
use crate::scope::Scope;

/// A compiled list argument.
///
/// Literal arrays compile element by element and are pulled lazily, so
/// consumers that stop early never pay for the rest. Any other template is
/// evaluated once per iteration and must produce an array.
#[derive(Debug, Clone)]
pub enum CompiledIterator {
    Items(Rc<[CompiledNode]>),
    Evaluated {
        node: CompiledNode,
        validator: Option<Validator>,
        context: Rc<CompilationContext>,
    },
    Empty,
}

impl CompiledIterator {
    pub fn iter<'a>(
        &'a self,
        scope: &'a Scope,
        exec: &'a ExecutionContext,
    ) -> Result<NodeIter<'a>, TemplateError> {
        let state = match self {
            Self::Items(items) => State::Items(items.iter()),
            Self::Evaluated {
                node,
                validator,
                context,
            } => match node.eval_json(scope, exec)? {
                Some(Value::Array(items)) => State::Values {
                    items: items.into_iter(),
                    validator: *validator,
                    context,
                },
                _ => State::Done,
            },
            Self::Empty => State::Done,
        };
        Ok(NodeIter { state, scope, exec })
    }
}

enum State<'a> {
    Items(std::slice::Iter<'a, CompiledNode>),
    Values {
        items: std::vec::IntoIter<Value>,
        validator: Option<Validator>,
        context: &'a Rc<CompilationContext>,
    },
    Done,
}

/// Yields one result per element. Evaluated elements failing the element
/// validator are reported and come out as `undefined`.
pub struct NodeIter<'a> {
    state: State<'a>,
    scope: &'a Scope,
    exec: &'a ExecutionContext,
}

impl Iterator for NodeIter<'_> {
    type Item = EvalResult;

    fn next(&mut self) -> Option<EvalResult> {
        let result = match &mut self.state {
            State::Items(items) => items.next()?.eval(self.scope, self.exec),
            State::Values {
                items,
                validator,
                context,
            } => {
                let item = items.next()?;
                match validator {
                    Some(validator) if !validator.accepts(Probe::Json(&item)) => self
                        .exec
                        .report(TemplateError::execution(
                            "EXECUTION_INVALID_RESULT",
                            format!("Result is not valid for \"{}\"", validator.name()),
                            Some(*context),
                        ))
                        .map(|()| None),
                    _ => Ok(Some(item.into())),
                }
            }
            State::Done => return None,
        };
        if result.is_err() {
            self.state = State::Done;
        }
        Some(result)
    }
}
