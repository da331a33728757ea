use std::rc::Rc;
use std::sync::OnceLock;

use jt_core::{number_to_string, CompilationContext, TemplateError, Variable};
use jt_runtime::{CompiledIterator, CompiledNode, EvalResult, Probe, Validator};
use regex::Regex;
use serde_json::{Number, Value};

use super::MethodCompiler;

pub const IS_PATH_FRAGMENT: Validator = Validator::new("isPathFragment", |probe| {
    matches!(probe, Probe::Json(Value::String(_) | Value::Number(_)))
});

const FORBIDDEN_FRAGMENT: &str = "__proto__";

pub(super) fn compile(
    compiler: &dyn MethodCompiler,
    argv: &Rc<CompilationContext>,
    args: &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError> {
    let value = compiler.compile(argv, None)?;
    let path = compiler
        .iterator_arg(args, "path", true, Some(IS_PATH_FRAGMENT))?
        .unwrap_or(CompiledIterator::Empty);

    Ok(CompiledNode::dynamic(move |scope, exec| {
        let Some(value) = value.eval_json(scope, exec)? else {
            return Ok(None);
        };
        let found = get_path(value, path.iter(scope, exec)?)?;
        Ok(found.map(Variable::Json))
    }))
}

/// Walks `value` one fragment at a time. Fragments are pulled lazily, so a
/// dead end leaves the rest of the path unevaluated.
pub fn get_path(
    value: Value,
    fragments: impl IntoIterator<Item = EvalResult>,
) -> Result<Option<Value>, TemplateError> {
    let mut current = value;
    for fragment in fragments {
        let Some(Variable::Json(fragment)) = fragment? else {
            return Ok(None);
        };
        let next = match &fragment {
            Value::String(key) => step_by_key(current, key),
            Value::Number(number) => step_by_number(current, number),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

fn step_by_key(current: Value, key: &str) -> Option<Value> {
    if key == FORBIDDEN_FRAGMENT {
        return None;
    }
    match current {
        Value::String(text) if key == "length" => Some(Value::from(text.encode_utf16().count())),
        Value::Array(items) if key == "length" => Some(Value::from(items.len())),
        Value::Array(items) => {
            let index = parse_index(key)?;
            take_index(items, index)
        }
        Value::Object(mut object) => object.remove(key),
        _ => None,
    }
}

fn step_by_number(current: Value, number: &Number) -> Option<Value> {
    match current {
        Value::Array(items) => take_index(items, int32_index(number)?),
        Value::Object(mut object) => object.remove(&number_to_string(number)),
        _ => None,
    }
}

fn take_index(mut items: Vec<Value>, index: i64) -> Option<Value> {
    let length = items.len() as i64;
    let normalized = if index < 0 { length + index } else { index };
    if !(0..length).contains(&normalized) {
        return None;
    }
    Some(items.swap_remove(normalized as usize))
}

fn parse_index(key: &str) -> Option<i64> {
    if !index_regex().is_match(key) {
        return None;
    }
    key.parse().ok()
}

fn int32_index(number: &Number) -> Option<i64> {
    if let Some(index) = number.as_i64() {
        return i32::try_from(index).is_ok().then_some(index);
    }
    let value = number.as_f64()?;
    let in_range = value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX);
    (value.fract() == 0.0 && in_range).then_some(value as i64)
}

fn index_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^-?\d{1,15}$").expect("array index regex must compile"))
}
