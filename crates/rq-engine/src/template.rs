use std::sync::OnceLock;

use regex::Regex;
use rq_core::{EnvironmentMap, RequestState, VariableMap};

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder regex must compile"))
}

/// Substitutes `{{name}}` placeholders from the variable and environment
/// maps. Variables shadow environment entries; unknown names are left
/// verbatim. This is collaborator plumbing used before transmitting a
/// request — scripts cannot reach it.
pub fn resolve_placeholders(
    input: &str,
    environment: &EnvironmentMap,
    variables: &VariableMap,
) -> String {
    let regex = placeholder_regex();
    let mut output = String::new();
    let mut last_index = 0usize;
    for captures in regex.captures_iter(input) {
        let Some(full) = captures.get(0) else {
            continue;
        };
        let Some(name) = captures.get(1) else {
            continue;
        };
        output.push_str(&input[last_index..full.start()]);
        let key = name.as_str().trim();
        match variables.get(key).or_else(|| environment.get(key)) {
            Some(value) => output.push_str(value),
            None => output.push_str(full.as_str()),
        }
        last_index = full.end();
    }
    output.push_str(&input[last_index..]);
    output
}

/// Applies placeholder resolution to the url, header values and body of a
/// request, returning a resolved copy.
pub fn resolve_request_placeholders(
    request: &RequestState,
    environment: &EnvironmentMap,
    variables: &VariableMap,
) -> RequestState {
    let mut resolved = request.clone();
    resolved.url = resolve_placeholders(&request.url, environment, variables);
    for value in resolved.headers.values_mut() {
        *value = resolve_placeholders(value, environment, variables);
    }
    resolved.body = request
        .body
        .as_ref()
        .map(|body| resolve_placeholders(body, environment, variables));
    resolved
}
