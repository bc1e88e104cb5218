pub mod context;
pub mod error;
pub mod request;
pub mod result;

pub use context::{EnvironmentMap, ScriptContext, ScriptKind, VariableMap};
pub use error::{FatalKind, ScriptError};
pub use request::{HeaderMap, RequestState, ResponseState};
pub use result::{LogChannel, LogEntry, ScriptResult, TestOutcome};
