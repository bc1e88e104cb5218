use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a run-aborting failure, carried on `ScriptResult`
/// alongside the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FatalKind {
    Compile,
    Runtime,
    Timeout,
    Cancelled,
}

/// A failure that terminates a script run. Assertion failures inside
/// `test(...)` callbacks are not errors at this level; they are recorded as
/// failed `TestOutcome`s and the run keeps going.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("{0}")]
    Compile(String),
    #[error("{0}")]
    Runtime(String),
    #[error("script exceeded the {limit_ms} ms run budget")]
    Timeout { limit_ms: u128 },
    #[error("script run was cancelled")]
    Cancelled,
}

impl ScriptError {
    pub fn timeout(limit: Duration) -> Self {
        Self::Timeout {
            limit_ms: limit.as_millis(),
        }
    }

    pub fn kind(&self) -> FatalKind {
        match self {
            Self::Compile(_) => FatalKind::Compile,
            Self::Runtime(_) => FatalKind::Runtime,
            Self::Timeout { .. } => FatalKind::Timeout,
            Self::Cancelled => FatalKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_error_displays_bare_message() {
        let error = ScriptError::Runtime("boom".to_string());
        assert_eq!(error.to_string(), "boom");
        assert_eq!(error.kind(), FatalKind::Runtime);
    }

    #[test]
    fn timeout_error_names_the_budget() {
        let error = ScriptError::timeout(Duration::from_millis(250));
        assert_eq!(error.to_string(), "script exceeded the 250 ms run budget");
        assert_eq!(error.kind(), FatalKind::Timeout);
    }

    #[test]
    fn fatal_kind_serializes_lowercase() {
        let json = serde_json::to_string(&FatalKind::Cancelled).expect("serialize kind");
        assert_eq!(json, "\"cancelled\"");
    }
}
