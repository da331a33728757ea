use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;

use crate::context::CompilationContext;
use crate::path::Path;

#[derive(Debug, Error, Clone)]
pub enum TemplateError {
    /// Raised while compiling: malformed call shapes, missing arguments, bad literals.
    #[error("{code}: {message}{}", at_path(.context))]
    Template {
        code: &'static str,
        message: String,
        context: Option<Rc<CompilationContext>>,
    },
    /// Raised while executing: a computed value failed a method's expectations.
    #[error("{code}: {message}{}", at_path(.context))]
    Execution {
        code: &'static str,
        message: String,
        context: Option<Rc<CompilationContext>>,
    },
    #[error("EXECUTION_LIMIT: Execution limit exceeded{} (limit: {limit})", at_path(.context))]
    ExecutionLimit {
        limit: u64,
        context: Option<Rc<CompilationContext>>,
    },
    #[error("EXECUTION_CALL_DEPTH: Maximum call depth exceeded{} (depth: {depth})", at_path(.context))]
    CallDepth {
        depth: usize,
        context: Option<Rc<CompilationContext>>,
    },
}

fn at_path(context: &Option<Rc<CompilationContext>>) -> String {
    match context {
        Some(context) => format!(" at {}", context.path_string()),
        None => String::new(),
    }
}

impl TemplateError {
    pub fn template(
        code: &'static str,
        message: impl Into<String>,
        context: &Rc<CompilationContext>,
    ) -> Self {
        Self::Template {
            code,
            message: message.into(),
            context: Some(Rc::clone(context)),
        }
    }

    pub fn option(code: &'static str, message: impl Into<String>) -> Self {
        Self::Template {
            code,
            message: message.into(),
            context: None,
        }
    }

    pub fn execution(
        code: &'static str,
        message: impl Into<String>,
        context: Option<&Rc<CompilationContext>>,
    ) -> Self {
        Self::Execution {
            code,
            message: message.into(),
            context: context.cloned(),
        }
    }

    pub fn execution_limit(limit: u64, context: Option<&Rc<CompilationContext>>) -> Self {
        Self::ExecutionLimit {
            limit,
            context: context.cloned(),
        }
    }

    pub fn call_depth(depth: usize, context: Option<&Rc<CompilationContext>>) -> Self {
        Self::CallDepth {
            depth,
            context: context.cloned(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Template { code, .. } | Self::Execution { code, .. } => code,
            Self::ExecutionLimit { .. } => "EXECUTION_LIMIT",
            Self::CallDepth { .. } => "EXECUTION_CALL_DEPTH",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Template { message, .. } | Self::Execution { message, .. } => message.clone(),
            Self::ExecutionLimit { .. } => "Execution limit exceeded".to_string(),
            Self::CallDepth { .. } => "Maximum call depth exceeded".to_string(),
        }
    }

    fn context(&self) -> Option<&Rc<CompilationContext>> {
        match self {
            Self::Template { context, .. }
            | Self::Execution { context, .. }
            | Self::ExecutionLimit { context, .. }
            | Self::CallDepth { context, .. } => context.as_ref(),
        }
    }

    /// Fatal errors signal unbounded work and are never routed through an [`ErrorMode`].
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ExecutionLimit { .. } | Self::CallDepth { .. })
    }

    pub fn is_execution(&self) -> bool {
        !matches!(self, Self::Template { .. })
    }

    pub fn path(&self) -> Option<Path> {
        self.context().map(|context| context.path())
    }

    pub fn path_string(&self) -> Option<String> {
        self.context().map(|context| context.path_string())
    }

    /// The offending template fragment, when the error kept its context.
    pub fn template_fragment(&self) -> Option<&Value> {
        self.context().map(|context| context.template())
    }
}

/// Shared sink for [`ErrorMode::Collect`].
#[derive(Debug, Clone, Default)]
pub struct ErrorLog(Rc<RefCell<Vec<TemplateError>>>);

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, error: TemplateError) {
        self.0.borrow_mut().push(error);
    }

    pub fn errors(&self) -> Vec<TemplateError> {
        self.0.borrow().clone()
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.0.borrow().iter().map(TemplateError::code).collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn take(&self) -> Vec<TemplateError> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// What happens to a non-fatal error once it is reported.
#[derive(Clone, Default)]
pub enum ErrorMode {
    /// Abort the whole compilation or evaluation.
    #[default]
    Throw,
    Log,
    Ignore,
    Collect(ErrorLog),
    Custom(Rc<dyn Fn(&TemplateError)>),
}

impl ErrorMode {
    pub fn custom(handler: impl Fn(&TemplateError) + 'static) -> Self {
        Self::Custom(Rc::new(handler))
    }

    /// `Err` only in [`ErrorMode::Throw`]; every other mode lets the caller substitute `undefined`.
    pub fn report(&self, error: TemplateError) -> Result<(), TemplateError> {
        match self {
            Self::Throw => Err(error),
            Self::Log => {
                tracing::warn!(
                    code = error.code(),
                    path = error.path_string().as_deref().unwrap_or("$"),
                    "{}",
                    error.message()
                );
                Ok(())
            }
            Self::Ignore => Ok(()),
            Self::Collect(log) => {
                log.push(error);
                Ok(())
            }
            Self::Custom(handler) => {
                handler(&error);
                Ok(())
            }
        }
    }
}

impl fmt::Debug for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Throw => f.write_str("Throw"),
            Self::Log => f.write_str("Log"),
            Self::Ignore => f.write_str("Ignore"),
            Self::Collect(log) => f.debug_tuple("Collect").field(&log.len()).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
