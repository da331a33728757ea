use std::path::Path;

use jt_api::{
    compile, evaluate, CompileOptions, ErrorLog, ErrorMode, EvaluateOptions, Scope, TemplateError,
};
use serde_json::Value;

use crate::{read_test_case, CaseMode, CaseOptions, JtToolError, Outcome, TestCase};

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: Outcome,
    /// Codes of the non-fatal errors reported during the run, when the case collects them.
    pub collected: Vec<String>,
}

pub fn run_case(case: &TestCase) -> RunReport {
    let log = ErrorLog::new();
    let on_error = case
        .collected_errors
        .as_ref()
        .map(|_| ErrorMode::Collect(log.clone()));
    let scope = Scope::from_object(case.scope.clone());

    let result = match case.mode {
        CaseMode::Compile => run_compiled(&case.template, &scope, &case.options, on_error),
        CaseMode::Evaluate => run_evaluated(&case.template, &scope, &case.options, on_error),
    };

    let outcome = match result {
        Ok(value) => Outcome::from(value),
        Err(error) => Outcome::Error {
            code: error.code().to_string(),
        },
    };
    RunReport {
        outcome,
        collected: log.codes().into_iter().map(str::to_string).collect(),
    }
}

fn run_compiled(
    template: &Value,
    scope: &Scope,
    options: &CaseOptions,
    on_error: Option<ErrorMode>,
) -> Result<Option<Value>, TemplateError> {
    let mut compile_options = CompileOptions::default();
    if let Some(prefix) = &options.argv_prefix {
        compile_options = compile_options.with_argv_prefix(prefix.clone());
    }
    if let Some(prefix) = &options.args_prefix {
        compile_options = compile_options.with_args_prefix(prefix.clone());
    }
    if let Some(optimize) = options.optimize {
        compile_options = compile_options.with_optimize(optimize);
    }
    if let Some(lazy) = options.lazy {
        compile_options = compile_options.with_lazy(lazy);
    }
    if let Some(on_error) = on_error {
        compile_options = compile_options.with_on_error(on_error);
    }
    let mut defaults = compile_options.execute_defaults.clone();
    if let Some(limit) = options.execution_limit {
        defaults = defaults.with_execution_limit(limit);
    }
    if let Some(depth) = options.max_call_depth {
        defaults = defaults.with_max_call_depth(depth);
    }

    compile(template.clone(), compile_options.with_execute_defaults(defaults))?.run(scope)
}

fn run_evaluated(
    template: &Value,
    scope: &Scope,
    options: &CaseOptions,
    on_error: Option<ErrorMode>,
) -> Result<Option<Value>, TemplateError> {
    let mut evaluate_options = EvaluateOptions::default();
    if let Some(prefix) = &options.argv_prefix {
        evaluate_options.argv_prefix = prefix.clone();
    }
    if let Some(prefix) = &options.args_prefix {
        evaluate_options.args_prefix = prefix.clone();
    }
    if let Some(on_error) = on_error {
        evaluate_options = evaluate_options.with_on_error(on_error);
    }
    if let Some(limit) = options.execution_limit {
        evaluate_options = evaluate_options.with_execution_limit(limit);
    }
    if let Some(depth) = options.max_call_depth {
        evaluate_options.max_call_depth = depth;
    }

    evaluate(template.clone(), scope, evaluate_options)
}

pub fn assert_case(case_path: &Path) -> Result<(), JtToolError> {
    let case = read_test_case(case_path)?;
    let report = run_case(&case);

    if report.outcome != case.expected {
        let expected =
            serde_json::to_string(&case.expected).map_err(JtToolError::OutcomeSerialize)?;
        let actual =
            serde_json::to_string(&report.outcome).map_err(JtToolError::OutcomeSerialize)?;
        return Err(JtToolError::OutcomeMismatch { expected, actual });
    }

    if let Some(expected) = case.collected_errors {
        if expected != report.collected {
            return Err(JtToolError::CollectedMismatch {
                expected,
                actual: report.collected,
            });
        }
    }

    Ok(())
}
