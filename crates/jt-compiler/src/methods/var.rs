use std::rc::Rc;

use jt_core::{CompilationContext, TemplateError, Variable};
use jt_runtime::{CompiledNode, Validator};
use serde_json::Value;

use super::MethodCompiler;

/// Names that read as literals and never reach the scope.
enum Reserved {
    Literal(Option<Value>),
    Variable,
}

fn reserved(name: &str) -> Reserved {
    match name {
        "null" => Reserved::Literal(Some(Value::Null)),
        "undefined" => Reserved::Literal(None),
        "true" => Reserved::Literal(Some(Value::Bool(true))),
        "false" => Reserved::Literal(Some(Value::Bool(false))),
        _ => Reserved::Variable,
    }
}

pub(super) fn compile(
    compiler: &dyn MethodCompiler,
    argv: &Rc<CompilationContext>,
    _args: &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError> {
    let name_node = compiler.compile(argv, Some(Validator::IS_STRING))?;

    if compiler.optimize() {
        if let Some(Some(Value::String(text))) = name_node.as_static() {
            if let Reserved::Literal(value) = reserved(text) {
                return Ok(CompiledNode::Static(value));
            }
        }
    }

    Ok(CompiledNode::dynamic(move |scope, exec| {
        let Some(Variable::Json(Value::String(name))) = name_node.eval(scope, exec)? else {
            return Ok(None);
        };
        match reserved(&name) {
            Reserved::Literal(value) => Ok(value.map(Variable::Json)),
            Reserved::Variable => scope.resolve(&name),
        }
    }))
}
