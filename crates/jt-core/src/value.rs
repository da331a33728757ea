use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Number, Value};

use crate::error::TemplateError;

pub type JsonObject = Map<String, Value>;

pub type CallResult = Result<Option<Value>, TemplateError>;

/// A function stored in a scope: host provided, or produced by the `fn` method.
#[derive(Clone)]
pub struct Callable(Rc<dyn Fn(Variable, JsonObject) -> CallResult>);

impl Callable {
    pub fn new(function: impl Fn(Variable, JsonObject) -> CallResult + 'static) -> Self {
        Self(Rc::new(function))
    }

    pub fn call(&self, argv: Variable, args: JsonObject) -> CallResult {
        (self.0)(argv, args)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(..)")
    }
}

#[derive(Debug, Clone)]
pub enum Variable {
    Json(Value),
    Callable(Callable),
}

impl Variable {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Callable(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Callable(_) => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Self::Callable(callable) => Some(callable),
            Self::Json(_) => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Json(value) => json_type_name(value),
            Self::Callable(_) => "function",
        }
    }
}

impl From<Value> for Variable {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<Callable> for Variable {
    fn from(callable: Callable) -> Self {
        Self::Callable(callable)
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Json(left), Self::Json(right)) => left == right,
            (Self::Callable(left), Self::Callable(right)) => left.ptr_eq(right),
            _ => false,
        }
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// JavaScript truthiness: `undefined`, `null`, `false`, `0`, `NaN` and `""` are falsy.
pub fn is_truthy(value: Option<&Variable>) -> bool {
    match value {
        None => false,
        Some(Variable::Callable(_)) => true,
        Some(Variable::Json(value)) => is_json_truthy(value),
    }
}

pub fn is_json_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `None` for non-finite input: such numbers are treated as absent.
pub fn finite_number(value: f64) -> Option<Value> {
    Number::from_f64(value).map(Value::Number)
}

pub fn is_finite_number(number: &Number) -> bool {
    number.is_i64() || number.is_u64() || number.as_f64().is_some_and(f64::is_finite)
}

/// Formats a number the way `String(n)` does in JavaScript.
pub fn number_to_string(number: &Number) -> String {
    if let Some(value) = number.as_i64() {
        return value.to_string();
    }
    if let Some(value) = number.as_u64() {
        return value.to_string();
    }
    match number.as_f64() {
        Some(value) => format_f64(value),
        None => number.to_string(),
    }
}

pub fn format_f64(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs();
    if (1e-6..1e21).contains(&magnitude) {
        if value.fract() == 0.0 {
            return format!("{:.0}", value);
        }
        return value.to_string();
    }
    let formatted = format!("{:e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => formatted,
    }
}

/// Stringifies the values `concat` accepts: strings, numbers and booleans.
pub fn stringify_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number_to_string(number)),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
