use jt_core::JsonObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TESTCASE_SCHEMA_V1: &str = "jt-tool-case.v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub schema_version: String,
    #[serde(default)]
    pub mode: CaseMode,
    pub template: Value,
    #[serde(default)]
    pub scope: JsonObject,
    #[serde(default)]
    pub options: CaseOptions,
    pub expected: Outcome,
    /// Codes of the non-fatal errors the run must collect, in report order.
    /// When absent, errors follow the mode's default policy.
    #[serde(default)]
    pub collected_errors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseMode {
    /// Compile once with folding, then execute.
    #[default]
    Compile,
    /// One-shot evaluation without folding.
    Evaluate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaseOptions {
    pub argv_prefix: Option<String>,
    pub args_prefix: Option<String>,
    pub optimize: Option<bool>,
    pub lazy: Option<bool>,
    pub execution_limit: Option<u64>,
    pub max_call_depth: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outcome {
    Value { value: Value },
    Undefined,
    Error { code: String },
}

impl Outcome {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Value { .. } => "value",
            Self::Undefined => "undefined",
            Self::Error { .. } => "error",
        }
    }
}

impl From<Option<Value>> for Outcome {
    fn from(result: Option<Value>) -> Self {
        match result {
            Some(value) => Self::Value { value },
            None => Self::Undefined,
        }
    }
}
