use serde::{Deserialize, Serialize};

use crate::context::{EnvironmentMap, VariableMap};
use crate::error::FatalKind;
use crate::request::RequestState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogChannel {
    Log,
    Error,
    Warn,
    Info,
}

/// One console call, in call order. Values are whatever the script passed,
/// captured as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub channel: LogChannel,
    pub values: Vec<serde_json::Value>,
}

/// One `test(name, fn)` invocation, in call order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

impl TestOutcome {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            failure_message: None,
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            failure_message: Some(message.into()),
        }
    }
}

/// The terminal output of a run. `environment`, `variables` and `request`
/// are complete working copies a caller can assign over its own state.
/// `test_outcomes` is present exactly when the run kind was `tests`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptResult {
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal_kind: Option<FatalKind>,
    pub logs: Vec<LogEntry>,
    pub environment: EnvironmentMap,
    pub variables: VariableMap,
    pub request: RequestState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_outcomes: Option<Vec<TestOutcome>>,
}
