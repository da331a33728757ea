use std::rc::Rc;

use jt_core::{CompilationContext, TemplateError, Variable};
use jt_runtime::CompiledNode;
use serde_json::Value;

use super::MethodCompiler;

pub(super) fn compile(
    compiler: &dyn MethodCompiler,
    argv: &Rc<CompilationContext>,
    _args: &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError> {
    let items = compiler.iterator(argv, None)?;

    Ok(CompiledNode::dynamic(move |scope, exec| {
        for item in items.iter(scope, exec)? {
            match item? {
                None | Some(Variable::Json(Value::Null)) => continue,
                found => return Ok(found),
            }
        }
        Ok(Some(Value::Null.into()))
    }))
}
