use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{JtToolError, TestCase, TESTCASE_SCHEMA_V1};

const TESTCASE_FILE_NAME: &str = "testcase.json";

/// Every `testcase.json` below `root`, in path order.
pub fn discover_cases(root: &Path) -> Result<Vec<PathBuf>, JtToolError> {
    let cases: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == TESTCASE_FILE_NAME)
        .map(|entry| entry.into_path())
        .collect();

    if cases.is_empty() {
        return Err(JtToolError::CasesEmpty {
            path: root.to_path_buf(),
        });
    }

    Ok(cases)
}

pub fn read_test_case(case_path: &Path) -> Result<TestCase, JtToolError> {
    let raw = fs::read_to_string(case_path).map_err(|source| JtToolError::ReadFile {
        path: case_path.to_path_buf(),
        source,
    })?;
    let parsed: TestCase = serde_json::from_str(&raw).map_err(|source| JtToolError::ParseCase {
        path: case_path.to_path_buf(),
        source,
    })?;

    if parsed.schema_version != TESTCASE_SCHEMA_V1 {
        return Err(JtToolError::InvalidSchemaVersion {
            expected: TESTCASE_SCHEMA_V1.to_string(),
            found: parsed.schema_version,
        });
    }

    Ok(parsed)
}
