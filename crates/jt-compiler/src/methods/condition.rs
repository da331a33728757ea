use std::rc::Rc;

use jt_core::{is_json_truthy, is_truthy, CompilationContext, TemplateError};
use jt_runtime::CompiledNode;

use super::MethodCompiler;

pub(super) fn compile(
    compiler: &dyn MethodCompiler,
    argv: &Rc<CompilationContext>,
    args: &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError> {
    let condition = compiler.compile(argv, None)?;
    let then_branch = compiler.compile_arg(args, "then", false, None)?;
    let else_branch = compiler.compile_arg(args, "else", false, None)?;

    if compiler.optimize() {
        if let Some(value) = condition.as_static() {
            let taken = if value.is_some_and(is_json_truthy) {
                then_branch
            } else {
                else_branch
            };
            return Ok(taken.unwrap_or_else(CompiledNode::undefined));
        }
    }

    Ok(CompiledNode::dynamic(move |scope, exec| {
        let value = condition.eval(scope, exec)?;
        let taken = if is_truthy(value.as_ref()) {
            &then_branch
        } else {
            &else_branch
        };
        match taken {
            Some(branch) => branch.eval(scope, exec),
            None => Ok(None),
        }
    }))
}
