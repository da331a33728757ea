use std::rc::Rc;

use jt_core::{stringify_scalar, CompilationContext, TemplateError, Variable};
use jt_runtime::{CompiledNode, Probe, Validator};
use serde_json::Value;

use super::MethodCompiler;

pub const IS_STRINGIFIABLE: Validator = Validator::new("isStringifiable", |probe| {
    matches!(
        probe,
        Probe::Json(Value::String(_) | Value::Number(_) | Value::Bool(_))
    )
});

pub const IS_SEPARATOR: Validator = Validator::new("isSeparator", |probe| {
    matches!(probe, Probe::Undefined | Probe::Json(Value::String(_)))
});

pub(super) fn compile(
    compiler: &dyn MethodCompiler,
    argv: &Rc<CompilationContext>,
    args: &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError> {
    let separator = compiler.compile_arg(args, "separator", false, Some(IS_SEPARATOR))?;
    let items = compiler.iterator(argv, Some(IS_STRINGIFIABLE))?;

    Ok(CompiledNode::dynamic(move |scope, exec| {
        let mut parts = Vec::new();
        for item in items.iter(scope, exec)? {
            if let Some(Variable::Json(value)) = item? {
                parts.extend(stringify_scalar(&value));
            }
        }

        let separator = match &separator {
            Some(node) => node.eval_json(scope, exec)?,
            None => None,
        };
        let separator = match &separator {
            Some(Value::String(text)) => text.as_str(),
            _ => "",
        };
        Ok(Some(Value::String(parts.join(separator)).into()))
    }))
}
