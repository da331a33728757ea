use std::cell::OnceCell;
use std::rc::Rc;
use std::sync::OnceLock;

use jt_core::{is_finite_number, CompilationContext, ErrorMode, JsonObject, TemplateError, Variable};
use jt_runtime::{CompiledIterator, CompiledNode, Probe, Validator};
use regex::Regex;
use serde_json::Value;

use crate::hooks::CallHooks;
use crate::methods::{MethodCompiler, MethodRegistry};

pub const DEFAULT_ARGV_PREFIX: &str = "@";
pub const DEFAULT_ARGS_PREFIX: &str = "";

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Marks the key holding a call's primary argument.
    pub argv_prefix: String,
    /// Marks the keys holding a call's named arguments.
    pub args_prefix: String,
    pub on_error: ErrorMode,
    /// Keep template contexts in run-time errors.
    pub debug: bool,
    /// Fold nodes whose value is known at compile time.
    pub optimize: bool,
    /// Defer compiling a node until it first runs. Ignored when `optimize` is set.
    pub lazy: bool,
    pub methods: MethodRegistry,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            argv_prefix: DEFAULT_ARGV_PREFIX.to_string(),
            args_prefix: DEFAULT_ARGS_PREFIX.to_string(),
            on_error: ErrorMode::Throw,
            debug: true,
            optimize: true,
            lazy: false,
            methods: MethodRegistry::builtins(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Compiler {
    config: Rc<CompilerConfig>,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Result<Self, TemplateError> {
        if config.argv_prefix.is_empty() {
            return Err(TemplateError::option(
                "OPTION_INVALID_PREFIX",
                "argvPrefix is required",
            ));
        }
        if !prefix_regex().is_match(&config.argv_prefix) {
            return Err(TemplateError::option(
                "OPTION_INVALID_PREFIX",
                format!("{} is not a valid argvPrefix", config.argv_prefix),
            ));
        }
        Ok(Self {
            config: Rc::new(config),
        })
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn compile_template(&self, template: Value) -> Result<CompiledNode, TemplateError> {
        let context = CompilationContext::root(template);
        self.compile(&context, None)
    }

    fn compile_internal(
        &self,
        context: &Rc<CompilationContext>,
        validator: Option<Validator>,
    ) -> Result<CompiledNode, TemplateError> {
        let compiled = self.compile_json(context)?;
        Ok(self.with_checks(context, compiled, validator))
    }

    fn with_checks(
        &self,
        context: &Rc<CompilationContext>,
        compiled: CompiledNode,
        validator: Option<Validator>,
    ) -> CompiledNode {
        let validator = validator.unwrap_or(Validator::IS_JSON);
        if self.config.optimize {
            if let Some(value) = compiled.as_static() {
                if validator.accepts(Probe::of_json(value)) {
                    return compiled;
                }
                return CompiledNode::undefined();
            }
        }
        self.guard(context, compiled, validator)
    }

    /// Charges the budget, runs `compiled` and rejects results failing `validator`.
    fn guard(
        &self,
        context: &Rc<CompilationContext>,
        compiled: CompiledNode,
        validator: Validator,
    ) -> CompiledNode {
        let context = self.error_context(context);
        CompiledNode::dynamic(move |scope, exec| {
            exec.charge(context.as_ref())?;
            let result = compiled.eval(scope, exec)?;
            if validator.accepts(Probe::of(result.as_ref())) {
                return Ok(result);
            }
            exec.report(TemplateError::execution(
                "EXECUTION_INVALID_RESULT",
                format!("Result is not valid for \"{}\"", validator.name()),
                context.as_ref(),
            ))?;
            Ok(None)
        })
    }

    fn compile_json(&self, context: &Rc<CompilationContext>) -> Result<CompiledNode, TemplateError> {
        match context.template() {
            Value::Null | Value::Bool(_) => Ok(CompiledNode::value(context.template().clone())),
            Value::Number(number) => {
                if !is_finite_number(number) {
                    self.report(TemplateError::template(
                        "TEMPLATE_INVALID_NUMBER",
                        "Only finite numbers are allowed",
                        context,
                    ))?;
                    return Ok(CompiledNode::undefined());
                }
                Ok(CompiledNode::value(Value::Number(number.clone())))
            }
            Value::String(text) => self.compile_string(context, text),
            Value::Array(items) => self.compile_array(context, items.len()),
            Value::Object(object) => self.compile_object(context, object),
        }
    }

    fn compile_string(
        &self,
        context: &Rc<CompilationContext>,
        text: &str,
    ) -> Result<CompiledNode, TemplateError> {
        if context.is_literal_strings() || !jt_parser::has_interpolation(text) {
            return Ok(CompiledNode::value(Value::String(text.to_string())));
        }

        let mut hooks = CallHooks::new(&self.config.argv_prefix, &self.config.args_prefix);
        match jt_parser::parse(text, &mut hooks) {
            Ok(template) => {
                let parsed = CompilationContext::interpolated(context, template);
                self.compile_json(&parsed)
            }
            Err(error) => {
                self.report(TemplateError::template(
                    "TEMPLATE_INVALID_INTERPOLATION",
                    format!("Invalid template: {}", error),
                    context,
                ))?;
                Ok(CompiledNode::undefined())
            }
        }
    }

    fn compile_array(
        &self,
        context: &Rc<CompilationContext>,
        length: usize,
    ) -> Result<CompiledNode, TemplateError> {
        let items = (0..length)
            .filter_map(|index| context.index(index))
            .map(|child| self.compile_internal(&child, None))
            .collect::<Result<Vec<_>, _>>()?;

        if self.config.optimize && items.iter().all(CompiledNode::is_static) {
            let values = items
                .iter()
                .map(|item| item.as_static().flatten().cloned().unwrap_or(Value::Null))
                .collect();
            return Ok(CompiledNode::value(Value::Array(values)));
        }

        Ok(CompiledNode::dynamic(move |scope, exec| {
            let mut values = Vec::with_capacity(items.len());
            for item in &items {
                values.push(item.eval_json(scope, exec)?.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Array(values).into()))
        }))
    }

    fn compile_object(
        &self,
        context: &Rc<CompilationContext>,
        object: &JsonObject,
    ) -> Result<CompiledNode, TemplateError> {
        let prefix = self.config.argv_prefix.as_str();
        let call_keys: Vec<&String> = object.keys().filter(|key| key.starts_with(prefix)).collect();

        match call_keys.as_slice() {
            [] => self.compile_plain_object(context, object),
            [key] => self.compile_call(context, key),
            _ => {
                if self.config.argv_prefix == self.config.args_prefix {
                    let known = call_keys
                        .iter()
                        .find(|key| self.config.methods.contains(&key[prefix.len()..]));
                    if let Some(key) = known {
                        return self.compile_call(context, key);
                    }
                }
                self.report(TemplateError::template(
                    "TEMPLATE_AMBIGUOUS_CALL",
                    format!("No more than one key can start with \"{}\"", prefix),
                    context,
                ))?;
                Ok(CompiledNode::undefined())
            }
        }
    }

    fn compile_plain_object(
        &self,
        context: &Rc<CompilationContext>,
        object: &JsonObject,
    ) -> Result<CompiledNode, TemplateError> {
        let mut entries = Vec::with_capacity(object.len());
        for key in object.keys() {
            if let Some(child) = context.key(key) {
                entries.push((key.clone(), self.compile_internal(&child, None)?));
            }
        }

        if self.config.optimize && entries.iter().all(|(_, node)| node.is_static()) {
            let folded = entries
                .iter()
                .filter_map(|(key, node)| {
                    let value = node.as_static().flatten()?;
                    Some((key.clone(), value.clone()))
                })
                .collect();
            return Ok(CompiledNode::value(Value::Object(folded)));
        }

        Ok(CompiledNode::dynamic(move |scope, exec| {
            let mut result = JsonObject::new();
            for (key, node) in &entries {
                if let Some(value) = node.eval_json(scope, exec)? {
                    result.insert(key.clone(), value);
                }
            }
            Ok(Some(Value::Object(result).into()))
        }))
    }

    fn compile_call(
        &self,
        context: &Rc<CompilationContext>,
        key: &str,
    ) -> Result<CompiledNode, TemplateError> {
        let Some(argv) = context.key(key) else {
            return Ok(CompiledNode::undefined());
        };
        let name = &key[self.config.argv_prefix.len()..];
        match self.config.methods.get(name) {
            Some(definition) => definition.compile(self, &argv, context),
            None => {
                tracing::trace!(method = name, "no built-in method, calling through scope");
                self.compile_scope_call(context, key, name, &argv)
            }
        }
    }

    /// A call to a function looked up in scope when the template runs.
    fn compile_scope_call(
        &self,
        context: &Rc<CompilationContext>,
        key: &str,
        name: &str,
        argv: &Rc<CompilationContext>,
    ) -> Result<CompiledNode, TemplateError> {
        let argv_node = self.compile(argv, Some(Validator::IS_DEFINED))?;

        let args_prefix = self.config.args_prefix.as_str();
        let mut args = Vec::new();
        if let Value::Object(object) = context.template() {
            for arg_key in object.keys() {
                if arg_key == key || !arg_key.starts_with(args_prefix) {
                    continue;
                }
                if let Some(child) = context.key(arg_key) {
                    let arg_name = arg_key[args_prefix.len()..].to_string();
                    args.push((arg_name, self.compile(&child, None)?));
                }
            }
        }

        let key = key.to_string();
        let name = name.to_string();
        let call_context = self.error_context(context);
        let argv_context = self.error_context(argv);
        Ok(CompiledNode::dynamic(move |scope, exec| {
            let callable = match scope.resolve(&name)? {
                Some(Variable::Callable(callable)) => callable,
                _ => {
                    exec.report(TemplateError::execution(
                        "EXECUTION_METHOD_NOT_FOUND",
                        format!("Method not found {}", key),
                        call_context.as_ref(),
                    ))?;
                    return Ok(None);
                }
            };

            let Some(argv) = argv_node.eval(scope, exec)? else {
                exec.report(TemplateError::execution(
                    "EXECUTION_INVALID_ARGUMENT",
                    format!("Invalid argument for {}", key),
                    argv_context.as_ref(),
                ))?;
                return Ok(None);
            };

            let mut values = JsonObject::new();
            for (arg_name, node) in &args {
                if let Some(value) = node.eval_json(scope, exec)? {
                    values.insert(arg_name.clone(), value);
                }
            }

            Ok(callable.call(argv, values)?.map(Variable::Json))
        }))
    }
}

impl MethodCompiler for Compiler {
    fn optimize(&self) -> bool {
        self.config.optimize
    }

    fn error_context(&self, context: &Rc<CompilationContext>) -> Option<Rc<CompilationContext>> {
        self.config.debug.then(|| Rc::clone(context))
    }

    fn report(&self, error: TemplateError) -> Result<(), TemplateError> {
        self.config.on_error.report(error)
    }

    fn compile(
        &self,
        context: &Rc<CompilationContext>,
        validator: Option<Validator>,
    ) -> Result<CompiledNode, TemplateError> {
        if !self.config.lazy || self.config.optimize {
            return self.compile_internal(context, validator);
        }

        let compiler = self.clone();
        let context = Rc::clone(context);
        let compiled: OnceCell<CompiledNode> = OnceCell::new();
        Ok(CompiledNode::dynamic(move |scope, exec| {
            let node = match compiled.get() {
                Some(node) => node,
                None => {
                    tracing::trace!(path = %context.path_string(), "compiling deferred node");
                    let node = compiler.compile_internal(&context, validator)?;
                    compiled.get_or_init(|| node)
                }
            };
            node.eval(scope, exec)
        }))
    }

    fn iterator(
        &self,
        context: &Rc<CompilationContext>,
        validator: Option<Validator>,
    ) -> Result<CompiledIterator, TemplateError> {
        if let Value::Array(items) = context.template() {
            let nodes = (0..items.len())
                .filter_map(|index| context.index(index))
                .map(|child| self.compile(&child, validator))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(CompiledIterator::Items(nodes.into()));
        }

        Ok(CompiledIterator::Evaluated {
            node: self.compile(context, Some(Validator::IS_ARRAY))?,
            validator,
            context: Rc::clone(context),
        })
    }

    fn compile_arg(
        &self,
        args: &Rc<CompilationContext>,
        name: &str,
        required: bool,
        validator: Option<Validator>,
    ) -> Result<Option<CompiledNode>, TemplateError> {
        let key = format!("{}{}", self.config.args_prefix, name);
        if let Some(child) = args.key(&key) {
            return self.compile(&child, validator).map(Some);
        }
        if !required {
            return Ok(None);
        }
        self.report(missing_argument(&key, args))?;
        let placeholder = CompiledNode::undefined();
        Ok(Some(self.guard(args, placeholder, validator.unwrap_or(Validator::IS_JSON))))
    }

    fn iterator_arg(
        &self,
        args: &Rc<CompilationContext>,
        name: &str,
        required: bool,
        validator: Option<Validator>,
    ) -> Result<Option<CompiledIterator>, TemplateError> {
        let key = format!("{}{}", self.config.args_prefix, name);
        if let Some(child) = args.key(&key) {
            return self.iterator(&child, validator).map(Some);
        }
        if !required {
            return Ok(None);
        }
        self.report(missing_argument(&key, args))?;
        Ok(Some(CompiledIterator::Empty))
    }
}

fn missing_argument(key: &str, context: &Rc<CompilationContext>) -> TemplateError {
    TemplateError::template(
        "TEMPLATE_MISSING_ARGUMENT",
        format!("Missing argument \"{}\"", key),
        context,
    )
}

fn prefix_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[$a-zA-Z0-9_@^%:;.,?!&]+$").expect("argv prefix regex must compile")
    })
}
