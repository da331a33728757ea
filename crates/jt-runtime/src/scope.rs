use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use jt_core::{JsonObject, TemplateError, Variable};

const FORBIDDEN_NAME: &str = "__proto__";

/// Outcome of asking one [`Overlay`] for a name.
pub enum Lookup {
    Found(Option<Variable>),
    /// The overlay does not bind the name; ask the parent scope.
    Defer,
}

/// A scope layer computed at run time, such as loop variables or lazily
/// initialised definitions. `parent` is the scope the overlay was pushed on.
pub trait Overlay {
    fn lookup(&self, name: &str, parent: &Scope) -> Result<Lookup, TemplateError>;
}

enum Layer {
    Empty,
    Variables(BTreeMap<String, Variable>),
    Host(Box<dyn Fn(&str) -> Option<Variable>>),
    Overlay {
        overlay: Rc<dyn Overlay>,
        parent: Scope,
    },
}

/// Name resolver handed to a compiled template.
///
/// Scopes are immutable chains. Pushing a layer makes a new scope and leaves
/// the parent untouched, so cloning is cheap.
#[derive(Clone)]
pub struct Scope(Rc<Layer>);

impl Scope {
    pub fn empty() -> Self {
        Self(Rc::new(Layer::Empty))
    }

    /// Exposes each key of a JSON object as a variable.
    pub fn from_object(object: JsonObject) -> Self {
        Self::from_variables(
            object
                .into_iter()
                .map(|(name, value)| (name, Variable::Json(value))),
        )
    }

    pub fn from_variables<K: Into<String>>(
        variables: impl IntoIterator<Item = (K, Variable)>,
    ) -> Self {
        Self(Rc::new(Layer::Variables(
            variables
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )))
    }

    /// Resolves names through a host function.
    pub fn from_fn(resolver: impl Fn(&str) -> Option<Variable> + 'static) -> Self {
        Self(Rc::new(Layer::Host(Box::new(resolver))))
    }

    pub fn overlay(&self, overlay: Rc<dyn Overlay>) -> Self {
        Self(Rc::new(Layer::Overlay {
            overlay,
            parent: self.clone(),
        }))
    }

    /// Binds fixed names on top of this scope.
    pub fn with_bindings(&self, bindings: BTreeMap<String, Variable>) -> Self {
        self.overlay(Rc::new(Bindings(bindings)))
    }

    pub fn resolve(&self, name: &str) -> Result<Option<Variable>, TemplateError> {
        let mut current = self;
        loop {
            match current.0.as_ref() {
                Layer::Empty => return Ok(None),
                Layer::Variables(variables) => {
                    if name == FORBIDDEN_NAME {
                        return Ok(None);
                    }
                    return Ok(variables.get(name).cloned());
                }
                Layer::Host(resolver) => {
                    if name == FORBIDDEN_NAME {
                        return Ok(None);
                    }
                    return Ok(resolver(name));
                }
                Layer::Overlay { overlay, parent } => match overlay.lookup(name, parent)? {
                    Lookup::Found(value) => return Ok(value),
                    Lookup::Defer => current = parent,
                },
            }
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            Layer::Empty => f.write_str("Scope(empty)"),
            Layer::Variables(variables) => f
                .debug_set()
                .entries(variables.keys())
                .finish(),
            Layer::Host(_) => f.write_str("Scope(host)"),
            Layer::Overlay { parent, .. } => write!(f, "Overlay -> {:?}", parent),
        }
    }
}

struct Bindings(BTreeMap<String, Variable>);

impl Overlay for Bindings {
    fn lookup(&self, name: &str, _parent: &Scope) -> Result<Lookup, TemplateError> {
        Ok(match self.0.get(name) {
            Some(value) => Lookup::Found(Some(value.clone())),
            None => Lookup::Defer,
        })
    }
}

#[cfg(test)]
mod scope_tests {
    use super::*;
    use jt_core::Callable;
    use serde_json::json;

    fn object(value: serde_json::Value) -> JsonObject {
        match value {
            serde_json::Value::Object(object) => object,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn object_scopes_resolve_keys_and_hide_proto() {
        let scope = Scope::from_object(object(json!({"a": 1, "__proto__": 2})));
        assert_eq!(
            scope.resolve("a").expect("resolve should succeed"),
            Some(json!(1).into())
        );
        assert_eq!(scope.resolve("b").expect("resolve should succeed"), None);
        assert_eq!(scope.resolve("__proto__").expect("resolve should succeed"), None);
    }

    #[test]
    fn bindings_shadow_the_parent() {
        let parent = Scope::from_object(object(json!({"a": 1, "b": 2})));
        let child = parent.with_bindings(BTreeMap::from([("a".to_string(), json!(10).into())]));
        assert_eq!(child.resolve("a").expect("resolve"), Some(json!(10).into()));
        assert_eq!(child.resolve("b").expect("resolve"), Some(json!(2).into()));
        assert_eq!(parent.resolve("a").expect("resolve"), Some(json!(1).into()));
    }

    #[test]
    fn host_functions_can_provide_callables() {
        let double = Callable::new(|argv, _| {
            Ok(argv.as_json().and_then(|value| value.as_i64()).map(|n| json!(n * 2)))
        });
        let scope = Scope::from_fn(move |name| {
            (name == "double").then(|| Variable::Callable(double.clone()))
        });
        let resolved = scope.resolve("double").expect("resolve").expect("double is bound");
        let callable = resolved.as_callable().expect("double is callable");
        assert_eq!(
            callable.call(json!(21).into(), JsonObject::new()).expect("call"),
            Some(json!(42))
        );
        assert!(scope.resolve("missing").expect("resolve").is_none());
    }

    #[test]
    fn overlays_may_defer_or_answer() {
        struct Counter;
        impl Overlay for Counter {
            fn lookup(&self, name: &str, parent: &Scope) -> Result<Lookup, TemplateError> {
                if name != "twice" {
                    return Ok(Lookup::Defer);
                }
                let base = parent.resolve("base")?.and_then(|value| value.as_json()?.as_i64());
                Ok(Lookup::Found(base.map(|n| json!(n * 2).into())))
            }
        }
        let scope = Scope::from_object(object(json!({"base": 4}))).overlay(Rc::new(Counter));
        assert_eq!(scope.resolve("twice").expect("resolve"), Some(json!(8).into()));
        assert_eq!(scope.resolve("base").expect("resolve"), Some(json!(4).into()));
    }
}
