//! JSON templates: compile once, execute against many scopes.
//!
//! ```ignore
//! let template = jt_api::compile(json!({"@concat": ["Hello ", "${ name }"]}), CompileOptions::default())?;
//! let scope = Scope::from_variables([("name", Variable::from(json!("World")))]);
//! assert_eq!(template.run(&scope)?, Some(json!("Hello World")));
//! ```

use jt_compiler::{Compiler, CompilerConfig, DEFAULT_ARGS_PREFIX, DEFAULT_ARGV_PREFIX};
use jt_runtime::{CompiledNode, ExecutionContext};
use serde_json::Value;

pub use jt_compiler::{
    CompiledIterator, MethodCompiler, MethodDefinition, MethodRegistry, Validator,
};
pub use jt_core::{
    CallResult, Callable, CompilationContext, ErrorLog, ErrorMode, JsonObject, TemplateError,
    Variable,
};
pub use jt_runtime::{
    EvalResult, Lookup, Overlay, Probe, Scope, DEFAULT_EXECUTION_LIMIT, DEFAULT_MAX_CALL_DEPTH,
};

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub execution_limit: u64,
    pub max_call_depth: usize,
    /// Run-time error policy. `None` reuses the policy the template was compiled with.
    pub on_error: Option<ErrorMode>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            execution_limit: DEFAULT_EXECUTION_LIMIT,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            on_error: None,
        }
    }
}

impl ExecuteOptions {
    pub fn with_execution_limit(mut self, limit: u64) -> Self {
        self.execution_limit = limit;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_on_error(mut self, on_error: ErrorMode) -> Self {
        self.on_error = Some(on_error);
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub argv_prefix: String,
    pub args_prefix: String,
    pub on_error: ErrorMode,
    pub debug: bool,
    pub optimize: bool,
    pub lazy: bool,
    /// Extra methods, merged over the built-in ones.
    pub methods: MethodRegistry,
    pub execute_defaults: ExecuteOptions,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            argv_prefix: DEFAULT_ARGV_PREFIX.to_string(),
            args_prefix: DEFAULT_ARGS_PREFIX.to_string(),
            on_error: ErrorMode::Throw,
            debug: true,
            optimize: true,
            lazy: false,
            methods: MethodRegistry::default(),
            execute_defaults: ExecuteOptions::default(),
        }
    }
}

impl CompileOptions {
    pub fn with_argv_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.argv_prefix = prefix.into();
        self
    }

    pub fn with_args_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.args_prefix = prefix.into();
        self
    }

    pub fn with_on_error(mut self, on_error: ErrorMode) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, definition: MethodDefinition) -> Self {
        self.methods.insert(name, definition);
        self
    }

    pub fn with_execute_defaults(mut self, defaults: ExecuteOptions) -> Self {
        self.execute_defaults = defaults;
        self
    }
}

#[derive(Debug, Clone)]
pub struct EvaluateOptions {
    pub argv_prefix: String,
    pub args_prefix: String,
    pub on_error: ErrorMode,
    pub execution_limit: u64,
    pub max_call_depth: usize,
    pub methods: MethodRegistry,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            argv_prefix: DEFAULT_ARGV_PREFIX.to_string(),
            args_prefix: DEFAULT_ARGS_PREFIX.to_string(),
            on_error: ErrorMode::Ignore,
            execution_limit: DEFAULT_EXECUTION_LIMIT,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            methods: MethodRegistry::default(),
        }
    }
}

impl EvaluateOptions {
    pub fn with_on_error(mut self, on_error: ErrorMode) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_execution_limit(mut self, limit: u64) -> Self {
        self.execution_limit = limit;
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, definition: MethodDefinition) -> Self {
        self.methods.insert(name, definition);
        self
    }
}

/// A compiled template, reusable across scopes and invocations.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    root: CompiledNode,
    on_error: ErrorMode,
    defaults: ExecuteOptions,
}

impl CompiledTemplate {
    /// Executes with the defaults given at compile time.
    pub fn run(&self, scope: &Scope) -> Result<Option<Value>, TemplateError> {
        self.execute(scope, &self.defaults)
    }

    pub fn execute(
        &self,
        scope: &Scope,
        options: &ExecuteOptions,
    ) -> Result<Option<Value>, TemplateError> {
        let on_error = options.on_error.clone().unwrap_or_else(|| self.on_error.clone());
        let exec = ExecutionContext::new(options.execution_limit, options.max_call_depth, on_error);
        let result = self.root.eval_json(scope, &exec);
        tracing::trace!(count = exec.count(), "template executed");
        result
    }

    /// The result, when it was fully known at compile time.
    pub fn static_value(&self) -> Option<Option<&Value>> {
        self.root.as_static()
    }
}

pub fn compile(template: Value, options: CompileOptions) -> Result<CompiledTemplate, TemplateError> {
    tracing::debug!(
        argv_prefix = %options.argv_prefix,
        optimize = options.optimize,
        lazy = options.lazy,
        debug = options.debug,
        "compiling template"
    );

    let mut methods = MethodRegistry::builtins();
    methods.extend(options.methods);
    let compiler = Compiler::new(CompilerConfig {
        argv_prefix: options.argv_prefix,
        args_prefix: options.args_prefix,
        on_error: options.on_error.clone(),
        debug: options.debug,
        optimize: options.optimize,
        lazy: options.lazy,
        methods,
    })?;

    Ok(CompiledTemplate {
        root: compiler.compile_template(template)?,
        on_error: options.on_error,
        defaults: options.execute_defaults,
    })
}

/// Compiles without folding and runs once. Every node counts toward the limit.
pub fn evaluate(
    template: Value,
    scope: &Scope,
    options: EvaluateOptions,
) -> Result<Option<Value>, TemplateError> {
    let compiled = compile(
        template,
        CompileOptions {
            argv_prefix: options.argv_prefix,
            args_prefix: options.args_prefix,
            on_error: options.on_error.clone(),
            debug: false,
            optimize: false,
            lazy: true,
            methods: options.methods,
            execute_defaults: ExecuteOptions::default(),
        },
    )?;
    compiled.execute(
        scope,
        &ExecuteOptions {
            execution_limit: options.execution_limit,
            max_call_depth: options.max_call_depth,
            on_error: Some(options.on_error),
        },
    )
}
