use std::rc::Rc;

use jt_core::{number_to_string, CompilationContext, JsonObject, TemplateError, Variable};
use jt_runtime::{CompiledNode, Probe, Validator};
use serde_json::Value;

use super::MethodCompiler;

/// `[key, value, ..]` where the key is a string or a number.
pub const IS_TUPLE: Validator = Validator::new("isTuple", |probe| match probe {
    Probe::Json(Value::Array(items)) => {
        items.len() >= 2 && matches!(items[0], Value::String(_) | Value::Number(_))
    }
    _ => false,
});

pub(super) fn compile(
    compiler: &dyn MethodCompiler,
    argv: &Rc<CompilationContext>,
    _args: &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError> {
    let tuples = compiler.iterator(argv, Some(IS_TUPLE))?;

    Ok(CompiledNode::dynamic(move |scope, exec| {
        let mut output = JsonObject::new();
        for item in tuples.iter(scope, exec)? {
            let Some(Variable::Json(Value::Array(mut tuple))) = item? else {
                continue;
            };
            if tuple.len() < 2 {
                continue;
            }
            let value = tuple.swap_remove(1);
            let key = match &tuple[0] {
                Value::String(key) => key.clone(),
                Value::Number(number) => number_to_string(number),
                _ => continue,
            };
            output.insert(key, value);
        }
        Ok(Some(Value::Object(output).into()))
    }))
}
