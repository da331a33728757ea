//! Built-in methods and the interface they compile their arguments through.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use jt_core::{CompilationContext, TemplateError};
use jt_runtime::{CompiledIterator, CompiledNode, Validator};

mod coalesce;
mod concat;
mod condition;
mod define;
mod for_each;
mod function;
mod get;
mod object;
mod predicates;
mod var;

pub use concat::{IS_SEPARATOR, IS_STRINGIFIABLE};
pub use for_each::IS_VALID_ALIAS;
pub use get::{get_path, IS_PATH_FRAGMENT};
pub use object::IS_TUPLE;

/// What a method compiler may ask of the compiler that invoked it.
pub trait MethodCompiler {
    /// Whether static folding is enabled.
    fn optimize(&self) -> bool;

    /// The context to attach to run-time errors, `None` outside debug mode.
    fn error_context(&self, context: &Rc<CompilationContext>) -> Option<Rc<CompilationContext>>;

    /// Routes a compile-time error through the configured policy.
    fn report(&self, error: TemplateError) -> Result<(), TemplateError>;

    fn compile(
        &self,
        context: &Rc<CompilationContext>,
        validator: Option<Validator>,
    ) -> Result<CompiledNode, TemplateError>;

    fn iterator(
        &self,
        context: &Rc<CompilationContext>,
        validator: Option<Validator>,
    ) -> Result<CompiledIterator, TemplateError>;

    /// Compiles the named argument of a call. A missing required argument is
    /// reported and replaced by a guarded node that always yields `undefined`.
    fn compile_arg(
        &self,
        args: &Rc<CompilationContext>,
        name: &str,
        required: bool,
        validator: Option<Validator>,
    ) -> Result<Option<CompiledNode>, TemplateError>;

    fn iterator_arg(
        &self,
        args: &Rc<CompilationContext>,
        name: &str,
        required: bool,
        validator: Option<Validator>,
    ) -> Result<Option<CompiledIterator>, TemplateError>;
}

type CompileFn = dyn Fn(
    &dyn MethodCompiler,
    &Rc<CompilationContext>,
    &Rc<CompilationContext>,
) -> Result<CompiledNode, TemplateError>;

/// Compiles one method from its `argv` context and the enclosing call object.
#[derive(Clone)]
pub struct MethodDefinition(Rc<CompileFn>);

impl MethodDefinition {
    pub fn new(
        compile: impl Fn(
                &dyn MethodCompiler,
                &Rc<CompilationContext>,
                &Rc<CompilationContext>,
            ) -> Result<CompiledNode, TemplateError>
            + 'static,
    ) -> Self {
        Self(Rc::new(compile))
    }

    pub fn compile(
        &self,
        compiler: &dyn MethodCompiler,
        argv: &Rc<CompilationContext>,
        args: &Rc<CompilationContext>,
    ) -> Result<CompiledNode, TemplateError> {
        (self.0)(compiler, argv, args)
    }
}

#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: BTreeMap<String, MethodDefinition>,
}

impl MethodRegistry {
    pub fn builtins() -> Self {
        let mut registry = Self::default();
        registry.insert("coalesce", MethodDefinition::new(coalesce::compile));
        registry.insert("concat", MethodDefinition::new(concat::compile));
        registry.insert("define", MethodDefinition::new(define::compile));
        registry.insert("defined", MethodDefinition::new(predicates::compile_defined));
        registry.insert("fn", MethodDefinition::new(function::compile));
        registry.insert("for", MethodDefinition::new(for_each::compile));
        registry.insert("get", MethodDefinition::new(get::compile));
        registry.insert("if", MethodDefinition::new(condition::compile));
        registry.insert("not", MethodDefinition::new(predicates::compile_not));
        registry.insert("nullish", MethodDefinition::new(predicates::compile_nullish));
        registry.insert("object", MethodDefinition::new(object::compile));
        registry.insert("undefined", MethodDefinition::new(predicates::compile_undefined));
        registry.insert("var", MethodDefinition::new(var::compile));
        registry
    }

    /// Registers `definition`, replacing any method with the same name.
    pub fn insert(&mut self, name: impl Into<String>, definition: MethodDefinition) {
        self.methods.insert(name.into(), definition);
    }

    pub fn extend(&mut self, other: MethodRegistry) {
        self.methods.extend(other.methods);
    }

    pub fn get(&self, name: &str) -> Option<&MethodDefinition> {
        self.methods.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Folds a single-argument method when its argument is known at compile time.
fn fold_unary(
    compiler: &dyn MethodCompiler,
    argv: CompiledNode,
    apply: fn(Option<&serde_json::Value>) -> serde_json::Value,
) -> CompiledNode {
    if compiler.optimize() {
        if let Some(value) = argv.as_static() {
            return CompiledNode::value(apply(value));
        }
    }
    CompiledNode::dynamic(move |scope, exec| {
        let value = argv.eval_json(scope, exec)?;
        Ok(Some(apply(value.as_ref()).into()))
    })
}
