//! Worker configuration.
//!
//! Defaults suit most libraries. A JSON config file can override any field and
//! `SHAPEFUZZ_*` environment variables override the result:
//!
//! | Variable                          | Field                          |
//! |-----------------------------------|--------------------------------|
//! | `SHAPEFUZZ_STRING_MAX_LENGTH`     | `string_max_length`            |
//! | `SHAPEFUZZ_MAX_ARRAY_LENGTH`      | `max_array_length`             |
//! | `SHAPEFUZZ_MAX_MAPPING_DEPTH`     | `max_object_mapping_depth`     |
//! | `SHAPEFUZZ_SKIP_UNKNOWN`          | `skip_endpoints_not_in_schema` |
//! | `SHAPEFUZZ_HEAVY_ASSERTIONS`      | `heavy_assertions`             |
//! | `SHAPEFUZZ_LOG_ERRORS`            | `log_errors`                   |

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Upper bound on synthesized string length, in bytes.
pub const STRING_MAX_LENGTH: usize = 128;

/// Upper bound on synthesized array length.
pub const MAX_ARRAY_LENGTH: usize = 16;

/// How deep reflection descends from the module exports looking for functions.
pub const MAX_OBJECT_MAPPING_DEPTH: usize = 2;

/// Declared object types with more properties than this are treated as unknown.
pub const MAX_OBJECT_PROPERTIES: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkerConfig {
    pub string_max_length: usize,
    pub max_array_length: usize,
    pub max_object_mapping_depth: usize,
    /// Only bind live functions whose names the schema already knows.
    pub skip_endpoints_not_in_schema: bool,
    /// Endpoint names reflection must never map.
    pub methods_to_skip: BTreeSet<String>,
    /// Message substrings of exceptions the oracle treats as expected.
    pub ignored_errors: Vec<String>,
    /// Verify structural invariants again after each graph run.
    pub heavy_assertions: bool,
    /// Log every exception caught by the oracle wrapper.
    pub log_errors: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            string_max_length: STRING_MAX_LENGTH,
            max_array_length: MAX_ARRAY_LENGTH,
            max_object_mapping_depth: MAX_OBJECT_MAPPING_DEPTH,
            skip_endpoints_not_in_schema: false,
            methods_to_skip: BTreeSet::new(),
            ignored_errors: Vec::new(),
            heavy_assertions: false,
            log_errors: false,
        }
    }
}

impl WorkerConfig {
    /// Read a JSON config file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Apply `SHAPEFUZZ_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_var("SHAPEFUZZ_STRING_MAX_LENGTH") {
            self.string_max_length = v;
        }
        if let Some(v) = env_var("SHAPEFUZZ_MAX_ARRAY_LENGTH") {
            self.max_array_length = v;
        }
        if let Some(v) = env_var("SHAPEFUZZ_MAX_MAPPING_DEPTH") {
            self.max_object_mapping_depth = v;
        }
        if let Some(v) = env_flag("SHAPEFUZZ_SKIP_UNKNOWN") {
            self.skip_endpoints_not_in_schema = v;
        }
        if let Some(v) = env_flag("SHAPEFUZZ_HEAVY_ASSERTIONS") {
            self.heavy_assertions = v;
        }
        if let Some(v) = env_flag("SHAPEFUZZ_LOG_ERRORS") {
            self.log_errors = v;
        }
        self
    }
}

fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// `1`/`true`/`yes` enable, `0`/`false`/`no` disable, anything else is ignored.
fn env_flag(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
