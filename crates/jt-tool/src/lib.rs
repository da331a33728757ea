mod case;
mod runner;
mod source;

pub use case::{CaseMode, CaseOptions, Outcome, TestCase, TESTCASE_SCHEMA_V1};
pub use runner::{assert_case, run_case, RunReport};
pub use source::{discover_cases, read_test_case};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JtToolError {
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse testcase {path}: {source}")]
    ParseCase {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid testcase schema version \"{found}\", expected \"{expected}\".")]
    InvalidSchemaVersion { expected: String, found: String },
    #[error("No testcase.json files under {path}.")]
    CasesEmpty { path: PathBuf },
    #[error("Outcome mismatch. expected={expected} actual={actual}")]
    OutcomeMismatch { expected: String, actual: String },
    #[error("Collected error mismatch. expected={expected:?} actual={actual:?}")]
    CollectedMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("Failed to serialize outcome for diff: {0}")]
    OutcomeSerialize(serde_json::Error),
}
