use std::time::Duration;

use rq_core::{
    EnvironmentMap, RequestState, ResponseState, ScriptContext, ScriptKind, ScriptResult,
    VariableMap,
};
use rq_engine::{CancelToken, RunnerOptions, ScriptRunner};

pub use rq_engine::{resolve_placeholders, resolve_request_placeholders};

#[derive(Debug, Clone, Default)]
pub struct RunScriptOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
    pub random_seed: Option<u32>,
}

/// Runs a script of the given kind against a caller-built context and
/// returns the terminal result. The context is never mutated; callers apply
/// the returned request/environment/variable copies over their own state.
pub fn run_script(
    script_text: &str,
    context: &ScriptContext,
    kind: ScriptKind,
    options: RunScriptOptions,
) -> ScriptResult {
    let runner = ScriptRunner::new(RunnerOptions {
        timeout: options.timeout,
        cancel: options.cancel,
        random_seed: options.random_seed,
    });
    runner.run(script_text, context, kind)
}

/// Request-builder hook: runs before the request is sent. The caller must
/// overwrite its own request/environment/variable state with the returned
/// copies before transmitting.
pub fn run_pre_request(
    script_text: &str,
    request: RequestState,
    environment: EnvironmentMap,
    variables: VariableMap,
) -> ScriptResult {
    let context = ScriptContext::pre_request(request, environment, variables);
    run_script(
        script_text,
        &context,
        ScriptKind::PreRequest,
        RunScriptOptions::default(),
    )
}

/// Test-runner hook: runs after a response was received. The caller renders
/// `logs` and `test_outcomes` and persists the updated
/// environment/variable maps.
pub fn run_tests(
    script_text: &str,
    request: RequestState,
    response: ResponseState,
    environment: EnvironmentMap,
    variables: VariableMap,
) -> ScriptResult {
    let context = ScriptContext::tests(request, response, environment, variables);
    run_script(
        script_text,
        &context,
        ScriptKind::Tests,
        RunScriptOptions::default(),
    )
}
