mod assemble;
mod assertions;
mod bridge;
mod console;
mod executor;
mod rng;
mod template;

pub use executor::{CancelToken, RunnerOptions, ScriptRunner, DEFAULT_RUN_TIMEOUT};
pub use template::{resolve_placeholders, resolve_request_placeholders};
