use std::rc::Rc;

use jt_core::{is_json_truthy, CompilationContext, TemplateError};
use jt_runtime::CompiledNode;
use serde_json::Value;

use super::{fold_unary, MethodCompiler};

pub(super) fn compile_not(
    compiler: &dyn MethodCompiler,
    argv: &Rc<CompilationContext>,
    _args: &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError> {
    let argv = compiler.compile(argv, None)?;
    Ok(fold_unary(compiler, argv, |value| {
        Value::Bool(!value.is_some_and(is_json_truthy))
    }))
}

pub(super) fn compile_nullish(
    compiler: &dyn MethodCompiler,
    argv: &Rc<CompilationContext>,
    _args: &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError> {
    let argv = compiler.compile(argv, None)?;
    Ok(fold_unary(compiler, argv, |value| {
        Value::Bool(value.map_or(true, Value::is_null))
    }))
}

pub(super) fn compile_defined(
    compiler: &dyn MethodCompiler,
    argv: &Rc<CompilationContext>,
    _args: &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError> {
    let argv = compiler.compile(argv, None)?;
    Ok(fold_unary(compiler, argv, |value| Value::Bool(value.is_some())))
}

pub(super) fn compile_undefined(
    compiler: &dyn MethodCompiler,
    argv: &Rc<CompilationContext>,
    _args: &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError> {
    let argv = compiler.compile(argv, None)?;
    Ok(fold_unary(compiler, argv, |value| Value::Bool(value.is_none())))
}
