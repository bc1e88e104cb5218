use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rhai::{Dynamic, Engine, EvalAltResult};
use rq_core::{
    EnvironmentMap, RequestState, ResponseState, ScriptContext, ScriptError, ScriptKind,
    ScriptResult, VariableMap,
};

use crate::bridge::{self, thrown_message, WorkingSet};
use crate::{assemble, assertions, console, rng};

pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30);

/// Interpreter operation ceiling. A backstop far above anything a request
/// script legitimately needs; the wall-clock timeout is the primary bound.
const MAX_OPERATIONS: u64 = 100_000_000;

/// Wall-clock checks happen once per this many interpreter operations.
const PROGRESS_CHECK_MASK: u64 = 0x3FF;

const TIMEOUT_TOKEN: &str = "timeout";
const CANCEL_TOKEN: &str = "cancelled";

/// Cooperative cancellation handle. Clone it, hand the clone to another
/// thread, and `cancel()` aborts the run at the next interpreter
/// checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
    pub random_seed: Option<u32>,
}

/// Executes one script at a time against private working copies. A runner
/// holds no run state, so one instance may serve many sequential runs and
/// independent runners are freely concurrent.
pub struct ScriptRunner {
    timeout: Duration,
    cancel: CancelToken,
    random_seed: Option<u32>,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new(RunnerOptions::default())
    }
}

impl ScriptRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self {
            timeout: options.timeout.unwrap_or(DEFAULT_RUN_TIMEOUT),
            cancel: options.cancel.unwrap_or_default(),
            random_seed: options.random_seed,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs script text to a terminal `ScriptResult`. Never returns an
    /// error: every failure class ends up on the result as
    /// `fatal_error`/`fatal_kind`.
    pub fn run(&self, script_text: &str, context: &ScriptContext, kind: ScriptKind) -> ScriptResult {
        let started = Instant::now();
        tracing::debug!(?kind, "script run starting");

        if script_text.trim().is_empty() {
            return assemble::empty(context, kind);
        }

        let seed = self.random_seed.unwrap_or_else(rng::seed_from_clock);
        let working = WorkingSet::from_context(context, seed);

        if self.cancel.is_cancelled() {
            return assemble::fatal(&working, context, kind, ScriptError::Cancelled);
        }

        let mut engine = Engine::new();
        engine.set_strict_variables(true);
        engine.set_max_operations(MAX_OPERATIONS);

        let deadline = started + self.timeout;
        let cancel = self.cancel.clone();
        engine.on_progress(move |operations| {
            if cancel.is_cancelled() {
                return Some(Dynamic::from(CANCEL_TOKEN));
            }
            if operations & PROGRESS_CHECK_MASK == 0 && Instant::now() >= deadline {
                return Some(Dynamic::from(TIMEOUT_TOKEN));
            }
            None
        });

        bridge::install(&mut engine, &working);
        assertions::install(&mut engine);
        console::install(&mut engine);
        let mut scope = bridge::build_scope(&working, context, kind);

        let ast = match engine.compile_with_scope(&scope, script_text) {
            Ok(ast) => ast,
            Err(error) => {
                let failure = ScriptError::Compile(error.to_string());
                tracing::warn!(error = %failure, "script failed to compile");
                return assemble::fatal(&working, context, kind, failure);
            }
        };

        match engine.run_ast_with_scope(&mut scope, &ast) {
            Ok(()) => {
                tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "script run finished");
                assemble::success(&working, kind)
            }
            Err(error) => {
                let failure = self.classify(*error);
                tracing::warn!(error = %failure, "script run failed");
                assemble::fatal(&working, context, kind, failure)
            }
        }
    }

    /// Compile-only validation against the capability surface of the given
    /// run kind. No script code is executed.
    pub fn check(&self, script_text: &str, kind: ScriptKind) -> Result<(), ScriptError> {
        if script_text.trim().is_empty() {
            return Ok(());
        }

        let context = placeholder_context(kind);
        let working = WorkingSet::from_context(&context, 0);
        let mut engine = Engine::new();
        engine.set_strict_variables(true);
        bridge::install(&mut engine, &working);
        assertions::install(&mut engine);
        console::install(&mut engine);
        let scope = bridge::build_scope(&working, &context, kind);

        engine
            .compile_with_scope(&scope, script_text)
            .map(|_| ())
            .map_err(|error| ScriptError::Compile(error.to_string()))
    }

    fn classify(&self, error: EvalAltResult) -> ScriptError {
        match error {
            EvalAltResult::ErrorTerminated(token, _) => {
                let token = token.to_string();
                if token == CANCEL_TOKEN {
                    ScriptError::Cancelled
                } else {
                    ScriptError::timeout(self.timeout)
                }
            }
            EvalAltResult::ErrorTooManyOperations(_) => {
                ScriptError::Runtime("script exceeded the interpreter operation ceiling".to_string())
            }
            EvalAltResult::ErrorParsing(parse_error, _) => {
                ScriptError::Compile(parse_error.to_string())
            }
            other => ScriptError::Runtime(thrown_message(&other)),
        }
    }
}

fn placeholder_context(kind: ScriptKind) -> ScriptContext {
    let request = RequestState::new("GET", "https://placeholder.invalid");
    match kind {
        ScriptKind::PreRequest => {
            ScriptContext::pre_request(request, EnvironmentMap::new(), VariableMap::new())
        }
        ScriptKind::Tests => ScriptContext::tests(
            request,
            ResponseState {
                status_code: 0,
                status_text: String::new(),
                response_time_ms: 0.0,
                headers: BTreeMap::new(),
                body: String::new(),
            },
            EnvironmentMap::new(),
            VariableMap::new(),
        ),
    }
}
