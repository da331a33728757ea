use std::rc::Rc;

use jt_core::{json_type_name, CompilationContext, TemplateError, Variable};
use jt_runtime::{CompiledNode, Lookup, Overlay, Probe, Scope, Validator};
use serde_json::{Number, Value};

use super::MethodCompiler;

pub const IS_VALID_ALIAS: Validator = Validator::new("isValidAlias", |probe| match probe {
    Probe::Undefined => true,
    Probe::Json(Value::String(text)) => !text.is_empty(),
    _ => false,
});

/// Longest array a number input may produce.
const MAX_LENGTH: u64 = u32::MAX as u64;

enum Source {
    Count(usize),
    Items(Vec<Value>),
    Entries(Vec<(String, Value)>),
}

impl Source {
    fn len(&self) -> usize {
        match self {
            Self::Count(count) => *count,
            Self::Items(items) => items.len(),
            Self::Entries(entries) => entries.len(),
        }
    }

    fn value(&self, index: usize) -> Option<Value> {
        match self {
            Self::Count(_) => Some(Value::from(index + 1)),
            Self::Items(items) => items.get(index).cloned(),
            Self::Entries(entries) => entries.get(index).map(|(_, value)| value.clone()),
        }
    }

    fn key(&self, index: usize) -> Option<Value> {
        match self {
            Self::Entries(entries) => entries.get(index).map(|(key, _)| Value::from(key.as_str())),
            _ => None,
        }
    }
}

struct LoopVariables {
    source: Rc<Source>,
    index: usize,
    alias: Option<Rc<str>>,
}

impl Overlay for LoopVariables {
    fn lookup(&self, name: &str, _parent: &Scope) -> Result<Lookup, TemplateError> {
        let name = match &self.alias {
            Some(alias) => match name.strip_prefix(alias.as_ref()) {
                Some(rest) => rest,
                None => return Ok(Lookup::Defer),
            },
            None => name,
        };
        let value = match name {
            "$value" => self.source.value(self.index),
            "$index" => Some(Value::from(self.index)),
            "$position" => Some(Value::from(self.index + 1)),
            "$key" => self.source.key(self.index),
            "$first" => Some(Value::Bool(self.index == 0)),
            "$last" => Some(Value::Bool(self.index + 1 == self.source.len())),
            _ => return Ok(Lookup::Defer),
        };
        Ok(Lookup::Found(value.map(Variable::Json)))
    }
}

pub(super) fn compile(
    compiler: &dyn MethodCompiler,
    argv: &Rc<CompilationContext>,
    args: &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError> {
    let body = compiler
        .compile_arg(args, "do", true, None)?
        .unwrap_or_else(CompiledNode::undefined);
    let input = compiler.compile(argv, None)?;
    let alias = compiler.compile_arg(args, "as", false, Some(IS_VALID_ALIAS))?;

    let method = argv.key_name().unwrap_or_default().to_string();
    let context = compiler.error_context(args);

    Ok(CompiledNode::dynamic(move |scope, exec| {
        let alias: Option<Rc<str>> = match &alias {
            Some(node) => match node.eval_json(scope, exec)? {
                Some(Value::String(text)) => Some(Rc::from(text)),
                _ => None,
            },
            None => None,
        };

        let source = match input.eval_json(scope, exec)? {
            Some(Value::Number(number)) => match loop_count(&number) {
                Some(count) => Source::Count(count),
                None => {
                    exec.report(TemplateError::execution(
                        "EXECUTION_INVALID_INPUT",
                        format!(
                            "{} input must be a non-negative integer (got: {})",
                            method, number
                        ),
                        context.as_ref(),
                    ))?;
                    return Ok(None);
                }
            },
            Some(Value::Array(items)) => Source::Items(items),
            Some(Value::Object(object)) => Source::Entries(object.into_iter().collect()),
            other => {
                let kind = other.as_ref().map_or("undefined", json_type_name);
                exec.report(TemplateError::execution(
                    "EXECUTION_INVALID_INPUT",
                    format!(
                        "{} input must be of type array, object or number (got: {})",
                        method, kind
                    ),
                    context.as_ref(),
                ))?;
                return Ok(None);
            }
        };

        let source = Rc::new(source);
        let mut results = Vec::new();
        for index in 0..source.len() {
            let variables = LoopVariables {
                source: Rc::clone(&source),
                index,
                alias: alias.clone(),
            };
            let frame = scope.overlay(Rc::new(variables));
            results.push(body.eval_json(&frame, exec)?.unwrap_or(Value::Null));
        }
        Ok(Some(Value::Array(results).into()))
    }))
}

fn loop_count(number: &Number) -> Option<usize> {
    if let Some(count) = number.as_u64() {
        return (count <= MAX_LENGTH).then(|| usize::try_from(count).ok()).flatten();
    }
    let value = number.as_f64()?;
    let valid = value >= 0.0 && value.fract() == 0.0 && value <= MAX_LENGTH as f64;
    valid.then_some(value as usize)
}
