use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::request::{RequestState, ResponseState};

/// Environment and variable scopes share the same shape but are independent
/// namespaces with independent lifetimes on the caller side.
pub type EnvironmentMap = BTreeMap<String, String>;
pub type VariableMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptKind {
    #[serde(rename = "pre-request")]
    PreRequest,
    #[serde(rename = "tests")]
    Tests,
}

impl std::str::FromStr for ScriptKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pre-request" => Ok(Self::PreRequest),
            "tests" => Ok(Self::Tests),
            other => Err(format!(
                "unknown script kind \"{}\", expected \"pre-request\" or \"tests\"",
                other
            )),
        }
    }
}

/// Immutable input snapshot for one run. The engine clones working copies
/// out of it and never mutates the context itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptContext {
    pub request: RequestState,
    #[serde(default)]
    pub response: Option<ResponseState>,
    #[serde(default)]
    pub environment: EnvironmentMap,
    #[serde(default)]
    pub variables: VariableMap,
}

impl ScriptContext {
    pub fn pre_request(
        request: RequestState,
        environment: EnvironmentMap,
        variables: VariableMap,
    ) -> Self {
        Self {
            request,
            response: None,
            environment,
            variables,
        }
    }

    pub fn tests(
        request: RequestState,
        response: ResponseState,
        environment: EnvironmentMap,
        variables: VariableMap,
    ) -> Self {
        Self {
            request,
            response: Some(response),
            environment,
            variables,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_kind_uses_hyphenated_wire_names() {
        assert_eq!(
            serde_json::to_string(&ScriptKind::PreRequest).expect("serialize kind"),
            "\"pre-request\""
        );
        assert_eq!(
            serde_json::to_string(&ScriptKind::Tests).expect("serialize kind"),
            "\"tests\""
        );
    }

    #[test]
    fn script_kind_parses_from_cli_style_strings() {
        assert_eq!("pre-request".parse::<ScriptKind>(), Ok(ScriptKind::PreRequest));
        assert_eq!("tests".parse::<ScriptKind>(), Ok(ScriptKind::Tests));
        assert!("post-request".parse::<ScriptKind>().is_err());
    }

    #[test]
    fn context_without_response_parses_from_minimal_json() {
        let context: ScriptContext = serde_json::from_str(
            r#"{"request":{"url":"https://api.example.com","method":"GET"}}"#,
        )
        .expect("parse context");
        assert!(context.response.is_none());
        assert!(context.environment.is_empty());
        assert!(context.variables.is_empty());
    }
}
