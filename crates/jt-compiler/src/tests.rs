use super::*;
use jt_core::{Callable, ErrorLog, ErrorMode, JsonObject, TemplateError, Variable};
use jt_runtime::{ExecutionContext, Scope, DEFAULT_MAX_CALL_DEPTH};
use serde_json::{json, Value};

fn scope(value: Value) -> Scope {
    match value {
        Value::Object(object) => Scope::from_object(object),
        other => panic!("scope fixture must be an object, got {}", other),
    }
}

fn compiler(config: CompilerConfig) -> Compiler {
    Compiler::new(config).expect("compiler config should be valid")
}

/// The settings used by one-shot evaluation.
fn evaluating() -> CompilerConfig {
    CompilerConfig {
        on_error: ErrorMode::Ignore,
        debug: false,
        optimize: false,
        lazy: true,
        ..CompilerConfig::default()
    }
}

fn exec_with(limit: u64, on_error: ErrorMode) -> ExecutionContext {
    ExecutionContext::new(limit, DEFAULT_MAX_CALL_DEPTH, on_error)
}

fn run(config: CompilerConfig, template: Value, scope: &Scope) -> Result<Option<Value>, TemplateError> {
    let node = compiler(config).compile_template(template)?;
    node.eval_json(scope, &exec_with(10_000, ErrorMode::Ignore))
}

fn compiled(template: Value, scope: &Scope) -> Option<Value> {
    run(CompilerConfig::default(), template, scope).expect("compiled template should run")
}

fn evaluated(template: Value, scope: &Scope) -> Option<Value> {
    run(evaluating(), template, scope).expect("evaluation should succeed")
}

#[test]
fn folding_does_not_change_results_of_plain_templates() {
    let templates = [
        json!(null),
        json!("text"),
        json!([1, [2, {"a": "b"}], {"c": [true]}]),
        json!({"nested": {"deep": [null, 1.5, "x"]}}),
    ];
    for template in templates {
        let scope = scope(json!({"a": 1}));
        assert_eq!(compiled(template.clone(), &scope), evaluated(template.clone(), &scope));
        assert_eq!(compiled(template.clone(), &scope), Some(template));
    }
}

#[test]
fn plain_templates_fold_to_static_nodes() {
    let node = compiler(CompilerConfig::default())
        .compile_template(json!({"a": [1, 2], "b": {"@not": false}}))
        .expect("template should compile");
    assert_eq!(node.as_static(), Some(Some(&json!({"a": [1, 2], "b": true}))));
}

#[test]
fn arrays_keep_their_length() {
    let scope = scope(json!({"x": "y"}));
    let template = json!([{"@var": "missing"}, {"@var": "x"}, {"@var": "undefined"}]);
    assert_eq!(compiled(template.clone(), &scope), Some(json!([null, "y", null])));
    assert_eq!(evaluated(template, &scope), Some(json!([null, "y", null])));
}

#[test]
fn objects_omit_undefined_members() {
    let scope = scope(json!({"x": "y"}));
    let template = json!({"a": {"@var": "missing"}, "b": {"@var": "x"}, "c": null});
    assert_eq!(compiled(template.clone(), &scope), Some(json!({"b": "y", "c": null})));
    assert_eq!(evaluated(template, &scope), Some(json!({"b": "y", "c": null})));
}

#[test]
fn var_resolves_scope_and_reserved_names() {
    let scope = scope(json!({"foo": "bar", "true": "shadowed"}));
    assert_eq!(evaluated(json!({"@var": "foo"}), &scope), Some(json!("bar")));
    assert_eq!(evaluated(json!({"@var": "true"}), &scope), Some(json!(true)));
    assert_eq!(evaluated(json!({"@var": "null"}), &scope), Some(json!(null)));
    assert_eq!(evaluated(json!({"@var": "undefined"}), &scope), None);
    assert_eq!(evaluated(json!({"@var": 12}), &scope), None);

    let folded = compiler(CompilerConfig::default())
        .compile_template(json!({"@var": "false"}))
        .expect("template should compile");
    assert_eq!(folded.as_static(), Some(Some(&json!(false))));
}

#[test]
fn get_walks_paths() {
    let scope = scope(json!({"list": ["a", "b"], "obj": {"__proto__": "x", "k": {"n": 1}}}));
    let get = |argv: Value, path: Value| {
        evaluated(json!({"@get": argv, "path": path}), &scope)
    };
    assert_eq!(get(json!({"@var": "list"}), json!([])), Some(json!(["a", "b"])));
    assert_eq!(get(json!({"@var": "list"}), json!([-1])), Some(json!("b")));
    assert_eq!(get(json!({"@var": "list"}), json!(["length"])), Some(json!(2)));
    assert_eq!(get(json!({"@var": "obj"}), json!(["__proto__"])), None);
    assert_eq!(get(json!({"@var": "obj"}), json!(["k", "n"])), Some(json!(1)));
    assert_eq!(get(json!({"@var": "obj"}), json!(["k", {"@var": "nope"}])), None);
    assert_eq!(get(json!({"@var": "nope"}), json!(["k"])), None);
}

#[test]
fn get_path_may_be_computed() {
    let scope = scope(json!({"obj": {"a": {"b": 3}}, "path": ["a", "b"]}));
    let template = json!({"@get": {"@var": "obj"}, "path": {"@var": "path"}});
    assert_eq!(compiled(template, &scope), Some(json!(3)));
}

#[test]
fn static_if_folds_to_the_taken_branch() {
    let compiler = compiler(CompilerConfig::default());
    let folded = compiler
        .compile_template(json!({"@if": true, "then": "yes", "else": {"@var": "x"}}))
        .expect("template should compile");
    assert_eq!(folded.as_static(), Some(Some(&json!("yes"))));

    let direct = compiler
        .compile_template(json!({"@var": "x"}))
        .expect("template should compile");
    let branch = compiler
        .compile_template(json!({"@if": false, "then": "yes", "else": {"@var": "x"}}))
        .expect("template should compile");
    let scope = scope(json!({"x": [1]}));
    let exec = exec_with(100, ErrorMode::Throw);
    assert_eq!(
        branch.eval_json(&scope, &exec).expect("branch should run"),
        direct.eval_json(&scope, &exec).expect("direct should run")
    );

    let missing = compiler
        .compile_template(json!({"@if": 0, "then": "yes"}))
        .expect("template should compile");
    assert_eq!(missing.as_static(), Some(None));
}

#[test]
fn dynamic_if_uses_truthiness() {
    let scope = scope(json!({"t": "x", "f": ""}));
    let template = |name: &str| json!({"@if": {"@var": name}, "then": 1, "else": 2});
    assert_eq!(compiled(template("t"), &scope), Some(json!(1)));
    assert_eq!(compiled(template("f"), &scope), Some(json!(2)));
    assert_eq!(compiled(template("missing"), &scope), Some(json!(2)));
}

#[test]
fn predicates_classify_values() {
    let scope = scope(json!({"n": null, "z": 0, "s": "s"}));
    let check = |method: &str, name: &str| {
        evaluated(json!({ format!("@{}", method): {"@var": name} }), &scope)
    };
    assert_eq!(check("nullish", "n"), Some(json!(true)));
    assert_eq!(check("nullish", "missing"), Some(json!(true)));
    assert_eq!(check("nullish", "z"), Some(json!(false)));
    assert_eq!(check("defined", "n"), Some(json!(true)));
    assert_eq!(check("defined", "missing"), Some(json!(false)));
    assert_eq!(check("undefined", "missing"), Some(json!(true)));
    assert_eq!(check("undefined", "n"), Some(json!(false)));
    assert_eq!(check("not", "z"), Some(json!(true)));
    assert_eq!(check("not", "s"), Some(json!(false)));
}

#[test]
fn coalesce_returns_first_present_item() {
    let scope = scope(json!({"x": "x", "list": [null, 0]}));
    assert_eq!(
        compiled(json!({"@coalesce": [null, {"@var": "nope"}, {"@var": "x"}]}), &scope),
        Some(json!("x"))
    );
    assert_eq!(compiled(json!({"@coalesce": []}), &scope), Some(json!(null)));
    assert_eq!(compiled(json!({"@coalesce": {"@var": "list"}}), &scope), Some(json!(0)));
    assert_eq!(compiled(json!({"@coalesce": {"@var": "x"}}), &scope), Some(json!(null)));
}

#[test]
fn coalesce_stops_pulling_after_a_match() {
    let node = compiler(evaluating())
        .compile_template(json!({"@coalesce": ["first", {"@for": 50}]}))
        .expect("template should compile");
    let exec = exec_with(10_000, ErrorMode::Ignore);
    assert_eq!(
        node.eval_json(&Scope::empty(), &exec).expect("coalesce should run"),
        Some(json!("first"))
    );
    assert!(exec.count() < 5, "unexpected count {}", exec.count());
}

#[test]
fn concat_joins_stringifiable_items() {
    let scope = Scope::empty();
    assert_eq!(
        compiled(json!({"@concat": [1, "a", true, null, [1], {}], "separator": ""}), &scope),
        Some(json!("1atrue"))
    );
    assert_eq!(
        evaluated(json!({"@concat": [1, "a", true, null, [1], {}]}), &scope),
        Some(json!("1atrue"))
    );
    assert_eq!(
        compiled(json!({"@concat": ["a", 1.5, "b"], "separator": "-"}), &scope),
        Some(json!("a-1.5-b"))
    );
}

#[test]
fn concat_reports_invalid_items() {
    let log = ErrorLog::new();
    let node = compiler(evaluating())
        .compile_template(json!({"@concat": {"@var": "items"}}))
        .expect("template should compile");
    let scope = scope(json!({"items": ["a", {}, "b"]}));
    let exec = exec_with(100, ErrorMode::Collect(log.clone()));
    assert_eq!(node.eval_json(&scope, &exec).expect("concat should run"), Some(json!("ab")));
    assert_eq!(log.codes(), vec!["EXECUTION_INVALID_RESULT"]);
}

#[test]
fn object_builds_from_tuples() {
    let scope = scope(json!({"pairs": [["x", 1], ["y"]]}));
    assert_eq!(
        compiled(json!({"@object": [["a", 1], [2, "b"], ["bad"], [true, 1]]}), &scope),
        Some(json!({"a": 1, "2": "b"}))
    );
    assert_eq!(compiled(json!({"@object": {"@var": "pairs"}}), &scope), Some(json!({"x": 1})));
}

#[test]
fn for_exposes_loop_variables() {
    let scope = Scope::empty();
    assert_eq!(
        evaluated(json!({"@for": 3, "do": {"@var": "$value"}}), &scope),
        Some(json!([1, 2, 3]))
    );
    assert_eq!(
        evaluated(json!({"@for": 2, "do": ["${ $index }", {"@var": "$first"}, {"@var": "$last"}]}), &scope),
        Some(json!([[0, true, false], [1, false, true]]))
    );
    assert_eq!(
        compiled(json!({"@for": {"b": 2, "a": 1}, "do": "${ $key }=${ $value }"}), &scope),
        Some(json!(["a=1", "b=2"]))
    );
    assert_eq!(
        compiled(json!({"@for": ["x", "y"], "do": {"@var": "$position"}}), &scope),
        Some(json!([1, 2]))
    );
}

#[test]
fn for_aliases_allow_nesting() {
    let template = json!({
        "@for": 2,
        "as": "a",
        "do": {
            "@for": 2,
            "as": "b",
            "do": "a:${ a$value }b:${ b$value }",
        },
    });
    assert_eq!(
        evaluated(template, &Scope::empty()),
        Some(json!([["a:1b:1", "a:1b:2"], ["a:2b:1", "a:2b:2"]]))
    );
}

#[test]
fn for_without_do_yields_nulls() {
    assert_eq!(evaluated(json!({"@for": 4}), &Scope::empty()), Some(json!([null, null, null, null])));
    let error = compiler(CompilerConfig::default())
        .compile_template(json!({"@for": 3}))
        .err()
        .expect("missing do should fail in throw mode");
    assert_eq!(error.code(), "TEMPLATE_MISSING_ARGUMENT");
    assert_eq!(error.message(), "Missing argument \"do\"");
}

#[test]
fn for_rejects_invalid_inputs() {
    let log = ErrorLog::new();
    let node = compiler(evaluating())
        .compile_template(json!([{"@for": "nope", "do": 1}, {"@for": -1, "do": 1}]))
        .expect("template should compile");
    let exec = exec_with(100, ErrorMode::Collect(log.clone()));
    assert_eq!(
        node.eval_json(&Scope::empty(), &exec).expect("for should run"),
        Some(json!([null, null]))
    );
    assert_eq!(log.codes(), vec!["EXECUTION_INVALID_INPUT", "EXECUTION_INVALID_INPUT"]);
}

#[test]
fn execution_limit_bounds_loops() {
    let limit = 1_000;
    let run_for = |count: u64| {
        let node = compiler(evaluating())
            .compile_template(json!({ "@for": count }))
            .expect("template should compile");
        node.eval_json(&Scope::empty(), &exec_with(limit, ErrorMode::Ignore))
    };
    let error = run_for(limit).expect_err("limit should be exceeded");
    assert_eq!(error.code(), "EXECUTION_LIMIT");
    assert!(error.is_fatal());
    assert!(run_for(limit - 1).is_ok());
}

#[test]
fn execution_limit_ignores_error_mode() {
    let node = compiler(evaluating())
        .compile_template(json!({"@for": 100, "do": 1}))
        .expect("template should compile");
    let log = ErrorLog::new();
    let error = node
        .eval_json(&Scope::empty(), &exec_with(50, ErrorMode::Collect(log.clone())))
        .expect_err("limit should be exceeded");
    assert_eq!(error.code(), "EXECUTION_LIMIT");
    assert!(log.is_empty());
}

#[test]
fn define_and_fn_support_recursion() {
    let template = json!({
        "@define": {
            "foo": {
                "@fn": {
                    "@if": {"@var": "$argv"},
                    "then": [1, {"@foo": false}, 3],
                    "else": 2,
                },
            },
        },
        "in": {"@foo": true},
    });
    assert_eq!(compiled(template.clone(), &Scope::empty()), Some(json!([1, 2, 3])));
    assert_eq!(evaluated(template, &Scope::empty()), Some(json!([1, 2, 3])));
}

#[test]
fn define_bindings_are_memoized_values() {
    let template = json!({
        "@define": {"greeting": "Hello ${ name }"},
        "in": ["${ greeting }!", {"@var": "greeting"}],
    });
    assert_eq!(
        compiled(template, &scope(json!({"name": "World"}))),
        Some(json!(["Hello World!", "Hello World"]))
    );
}

#[test]
fn define_siblings_do_not_see_each_other() {
    let template = json!({
        "@define": {"a": 1, "b": {"@var": "a"}},
        "in": [{"@var": "a"}, {"@var": "b"}],
    });
    assert_eq!(evaluated(template.clone(), &Scope::empty()), Some(json!([1, null])));
    assert_eq!(
        evaluated(template, &scope(json!({"a": "outer"}))),
        Some(json!([1, "outer"]))
    );
}

#[test]
fn define_requires_an_object() {
    let error = compiler(CompilerConfig::default())
        .compile_template(json!({"@define": [1], "in": 1}))
        .err()
        .expect("array definitions should fail");
    assert_eq!(error.code(), "TEMPLATE_INVALID_ARGUMENT");
    assert_eq!(error.path_string().as_deref(), Some("$.@define"));
}

#[test]
fn fn_exposes_args_and_closes_over_scope() {
    let template = json!({
        "@define": {
            "greet": {"@fn": "${ prefix } ${ $argv } ${ $args.suffix }"},
        },
        "in": {"@greet": "Bob", "suffix": "!"},
    });
    assert_eq!(
        compiled(template, &scope(json!({"prefix": "Hi"}))),
        Some(json!("Hi Bob !"))
    );
}

#[test]
fn infinite_recursion_hits_the_call_depth_guard() {
    let template = json!({
        "@define": {"loop": {"@fn": {"@loop": true}}},
        "in": {"@loop": true},
    });
    let node = compiler(CompilerConfig::default())
        .compile_template(template)
        .expect("template should compile");
    let exec = ExecutionContext::new(1_000_000, 16, ErrorMode::Ignore);
    let error = node
        .eval_json(&Scope::empty(), &exec)
        .expect_err("recursion should be bounded");
    assert_eq!(error.code(), "EXECUTION_CALL_DEPTH");
    assert_eq!(exec.depth(), 0);
}

#[test]
fn host_callables_receive_argv_and_args() {
    let join = Callable::new(|argv: Variable, args: JsonObject| {
        let base = argv.as_json().and_then(Value::as_str).unwrap_or_default().to_string();
        let suffix = args.get("suffix").and_then(Value::as_str).unwrap_or_default();
        Ok(Some(json!(format!("{}{}", base, suffix))))
    });
    let scope = Scope::from_variables([("join", Variable::Callable(join))]);
    assert_eq!(
        compiled(json!({"@join": "a", "suffix": "b", "skipped": {"@var": "nope"}}), &scope),
        Some(json!("ab"))
    );
}

#[test]
fn scope_calls_report_missing_functions() {
    let log = ErrorLog::new();
    let node = compiler(CompilerConfig::default())
        .compile_template(json!([{"@nothing": 1}, {"@value": 1}, {"@twice": {"@var": "nope"}}]))
        .expect("template should compile");
    let twice = Callable::new(|argv, _| Ok(argv.into_json()));
    let scope = Scope::from_variables([
        ("value", Variable::Json(json!(1))),
        ("twice", Variable::Callable(twice)),
    ]);
    let exec = exec_with(100, ErrorMode::Collect(log.clone()));
    assert_eq!(
        node.eval_json(&scope, &exec).expect("calls should run"),
        Some(json!([null, null, null]))
    );
    assert_eq!(
        log.codes(),
        vec![
            "EXECUTION_METHOD_NOT_FOUND",
            "EXECUTION_METHOD_NOT_FOUND",
            "EXECUTION_INVALID_RESULT",
            "EXECUTION_INVALID_ARGUMENT",
        ]
    );
}

#[test]
fn interpolation_compiles_expressions() {
    let scope = scope(json!({"name": "World", "user": {"tags": ["a", "b"]}, "flag": false}));
    assert_eq!(compiled(json!("Hello ${ name }!"), &scope), Some(json!("Hello World!")));
    assert_eq!(compiled(json!("${ user.tags[1] }"), &scope), Some(json!("b")));
    assert_eq!(compiled(json!("${ user.tags }"), &scope), Some(json!(["a", "b"])));
    assert_eq!(compiled(json!("${ flag ? 'on' : 'off' }"), &scope), Some(json!("off")));
    assert_eq!(compiled(json!("${ !flag }"), &scope), Some(json!(true)));
    assert_eq!(compiled(json!("${ undefined }"), &scope), None);
    assert_eq!(
        compiled(json!("${ { @concat: user.tags, separator: '+' } }"), &scope),
        Some(json!("a+b"))
    );
    assert_eq!(compiled(json!("no markers"), &scope), Some(json!("no markers")));
}

#[test]
fn interpolated_literals_are_not_parsed_again() {
    assert_eq!(compiled(json!("${ '${ nope }' }"), &Scope::empty()), Some(json!("${ nope }")));
}

#[test]
fn invalid_interpolation_is_a_template_error() {
    let error = compiler(CompilerConfig::default())
        .compile_template(json!({"a": "${ 9aze }"}))
        .err()
        .expect("invalid expression should fail");
    assert_eq!(error.code(), "TEMPLATE_INVALID_INTERPOLATION");
    assert_eq!(error.path_string().as_deref(), Some("$.a"));
    assert_eq!(error.template_fragment(), Some(&json!("${ 9aze }")));

    let ignoring = CompilerConfig {
        on_error: ErrorMode::Ignore,
        ..CompilerConfig::default()
    };
    assert_eq!(run(ignoring, json!({"a": "${ 9aze }"}), &Scope::empty()).expect("run"), Some(json!({})));
}

#[test]
fn two_call_keys_are_ambiguous() {
    let error = compiler(CompilerConfig::default())
        .compile_template(json!({"@var": "a", "@get": "b"}))
        .err()
        .expect("ambiguous call should fail");
    assert_eq!(error.code(), "TEMPLATE_AMBIGUOUS_CALL");
}

#[test]
fn shared_prefixes_pick_the_known_method() {
    let config = CompilerConfig {
        argv_prefix: "$".to_string(),
        args_prefix: "$".to_string(),
        ..CompilerConfig::default()
    };
    let scope = scope(json!({"x": 0}));
    assert_eq!(
        run(config.clone(), json!({"$if": {"$var": "x"}, "$then": 1, "$else": 2}), &scope)
            .expect("run"),
        Some(json!(2))
    );
    assert_eq!(
        run(config, json!("${ x ? 'a' : 'b' }"), &scope).expect("run"),
        Some(json!("b"))
    );
}

#[test]
fn argv_prefix_is_validated() {
    for prefix in ["", "a b", "@{"] {
        let config = CompilerConfig {
            argv_prefix: prefix.to_string(),
            ..CompilerConfig::default()
        };
        let error = Compiler::new(config).err().expect("prefix should be rejected");
        assert_eq!(error.code(), "OPTION_INVALID_PREFIX");
    }
    let config = CompilerConfig {
        argv_prefix: "$$".to_string(),
        ..CompilerConfig::default()
    };
    assert!(Compiler::new(config).is_ok());
}

#[test]
fn custom_methods_extend_the_builtins() {
    let mut config = CompilerConfig::default();
    config.methods.insert(
        "upper",
        MethodDefinition::new(|compiler, argv, _args| {
            let argv = compiler.compile(argv, Some(Validator::IS_STRING))?;
            Ok(CompiledNode::dynamic(move |scope, exec| {
                let text = argv.eval_json(scope, exec)?;
                Ok(text
                    .as_ref()
                    .and_then(Value::as_str)
                    .map(|text| json!(text.to_uppercase()).into()))
            }))
        }),
    );
    let scope = scope(json!({"name": "ada"}));
    assert_eq!(
        run(config, json!({"@upper": {"@var": "name"}, "n": {"@var": "name"}}), &scope)
            .expect("run"),
        Some(json!("ADA"))
    );
}

#[test]
fn lazy_compilation_defers_template_errors() {
    let log = ErrorLog::new();
    let config = CompilerConfig {
        on_error: ErrorMode::Collect(log.clone()),
        ..evaluating()
    };
    let node = compiler(config)
        .compile_template(json!({"@if": {"@var": "go"}, "then": "${ 1x }", "else": 0}))
        .expect("template should compile");
    assert!(log.is_empty());

    let exec = exec_with(100, ErrorMode::Ignore);
    node.eval_json(&scope(json!({"go": false})), &exec)
        .expect("else branch should run");
    assert!(log.is_empty());
    node.eval_json(&scope(json!({"go": true})), &exec)
        .expect("then branch should run");
    assert_eq!(log.codes(), vec!["TEMPLATE_INVALID_INTERPOLATION"]);
}

#[test]
fn non_debug_errors_drop_the_template_context() {
    let log = ErrorLog::new();
    let node = compiler(evaluating())
        .compile_template(json!({"@concat": [{"a": 1}]}))
        .expect("template should compile");
    let exec = exec_with(100, ErrorMode::Collect(log.clone()));
    node.eval_json(&Scope::empty(), &exec).expect("concat should run");
    let errors = log.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path_string(), None);

    let debug = CompilerConfig {
        debug: true,
        ..evaluating()
    };
    let log = ErrorLog::new();
    let node = compiler(debug)
        .compile_template(json!({"@concat": [{"a": 1}]}))
        .expect("template should compile");
    let exec = exec_with(100, ErrorMode::Collect(log.clone()));
    node.eval_json(&Scope::empty(), &exec).expect("concat should run");
    assert_eq!(log.errors()[0].path_string().as_deref(), Some("$.@concat[0]"));
}
