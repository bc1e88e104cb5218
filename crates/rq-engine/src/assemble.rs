use rq_core::{
    EnvironmentMap, LogEntry, RequestState, ScriptContext, ScriptError, ScriptKind, ScriptResult,
    TestOutcome, VariableMap,
};

use crate::bridge::WorkingSet;

/// Pure assembly of the caller-facing result shape.
fn from_parts(
    kind: ScriptKind,
    request: RequestState,
    environment: EnvironmentMap,
    variables: VariableMap,
    logs: Vec<LogEntry>,
    outcomes: Vec<TestOutcome>,
    error: Option<ScriptError>,
) -> ScriptResult {
    ScriptResult {
        succeeded: error.is_none(),
        fatal_error: error.as_ref().map(ToString::to_string),
        fatal_kind: error.as_ref().map(ScriptError::kind),
        logs,
        environment,
        variables,
        request,
        test_outcomes: match kind {
            ScriptKind::Tests => Some(outcomes),
            ScriptKind::PreRequest => None,
        },
    }
}

pub(crate) fn empty(context: &ScriptContext, kind: ScriptKind) -> ScriptResult {
    from_parts(
        kind,
        context.request.clone(),
        context.environment.clone(),
        context.variables.clone(),
        Vec::new(),
        Vec::new(),
        None,
    )
}

pub(crate) fn success(working: &WorkingSet, kind: ScriptKind) -> ScriptResult {
    from_parts(
        kind,
        working.request.borrow().clone(),
        working.environment.borrow().clone(),
        working.variables.borrow().clone(),
        working.logs.borrow().clone(),
        working.outcomes.borrow().clone(),
        None,
    )
}

/// Timeout and cancellation discard the working copies (the result carries
/// unmodified copies of the input); every other fatal keeps whatever state
/// the script reached before it died. Captured logs and recorded outcomes
/// are observational history and survive in both cases.
pub(crate) fn fatal(
    working: &WorkingSet,
    context: &ScriptContext,
    kind: ScriptKind,
    error: ScriptError,
) -> ScriptResult {
    let discard = matches!(error, ScriptError::Timeout { .. } | ScriptError::Cancelled);
    let (request, environment, variables) = if discard {
        (
            context.request.clone(),
            context.environment.clone(),
            context.variables.clone(),
        )
    } else {
        (
            working.request.borrow().clone(),
            working.environment.borrow().clone(),
            working.variables.borrow().clone(),
        )
    };

    from_parts(
        kind,
        request,
        environment,
        variables,
        working.logs.borrow().clone(),
        working.outcomes.borrow().clone(),
        Some(error),
    )
}
