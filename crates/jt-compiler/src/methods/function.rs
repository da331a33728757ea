use std::collections::BTreeMap;
use std::rc::Rc;

use jt_core::{Callable, CompilationContext, TemplateError, Variable};
use jt_runtime::CompiledNode;
use serde_json::Value;

use super::MethodCompiler;

pub(super) fn compile(
    compiler: &dyn MethodCompiler,
    argv: &Rc<CompilationContext>,
    _args: &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError> {
    let body = compiler.compile(argv, None)?;
    let context = compiler.error_context(argv);

    Ok(CompiledNode::dynamic(move |scope, exec| {
        let scope = scope.clone();
        let exec = exec.clone();
        let body = body.clone();
        let context = context.clone();
        let callable = Callable::new(move |argv, args| {
            let _depth = exec.enter_call(context.as_ref())?;
            let bindings = BTreeMap::from([
                ("$argv".to_string(), argv),
                ("$args".to_string(), Variable::Json(Value::Object(args))),
            ]);
            body.eval_json(&scope.with_bindings(bindings), &exec)
        });
        Ok(Some(Variable::Callable(callable)))
    }))
}
