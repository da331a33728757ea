use jt_core::{finite_number, JsonObject};
use jt_parser::{Literal, ParseHooks};
use serde_json::Value;

/// Builds call objects from a parsed `${ ... }` expression, using the
/// compiler's configured prefixes so the result compiles like any template.
pub(crate) struct CallHooks<'a> {
    argv_prefix: &'a str,
    args_prefix: &'a str,
}

impl<'a> CallHooks<'a> {
    pub(crate) fn new(argv_prefix: &'a str, args_prefix: &'a str) -> Self {
        Self {
            argv_prefix,
            args_prefix,
        }
    }

    fn call(&self, method: &str, argv: Value, args: Vec<(String, Value)>) -> Value {
        let mut object = JsonObject::new();
        object.insert(format!("{}{}", self.argv_prefix, method), argv);
        for (name, value) in args {
            object.insert(format!("{}{}", self.args_prefix, name), value);
        }
        Value::Object(object)
    }
}

impl ParseHooks for CallHooks<'_> {
    type Output = Value;

    fn variable(&mut self, name: &str) -> Value {
        self.call("var", Value::String(name.to_string()), Vec::new())
    }

    fn value(&mut self, literal: Literal) -> Value {
        match literal {
            Literal::Undefined => self.call("var", Value::from("undefined"), Vec::new()),
            Literal::Null => Value::Null,
            Literal::Bool(flag) => Value::Bool(flag),
            Literal::Number(number) if number.fract() == 0.0 && number.abs() < 9.0e15 => {
                Value::from(number as i64)
            }
            Literal::Number(number) => finite_number(number).unwrap_or(Value::Null),
            Literal::String(text) => Value::String(text),
        }
    }

    fn object_get(&mut self, object: Value, path: Vec<Value>) -> Value {
        self.call("get", object, vec![("path".to_string(), Value::Array(path))])
    }

    fn negation(&mut self, value: Value) -> Value {
        self.call("not", value, Vec::new())
    }

    fn concatenation(&mut self, values: Vec<Value>) -> Value {
        self.call("concat", Value::Array(values), Vec::new())
    }

    fn method_call(&mut self, name: &str, argv: Value, args: Vec<(String, Value)>) -> Value {
        self.call(name, argv, args)
    }
}
