use std::cell::RefCell;
use std::rc::Rc;

use rhai::{Dynamic, Engine};
use rq_core::{LogChannel, LogEntry};

use crate::bridge::dynamic_to_json;

/// Captures `console.log/error/warn/info` calls as `LogEntry` rows, in call
/// order, interleaved with whatever state mutations happen between them.
#[derive(Clone)]
pub(crate) struct ConsoleProxy {
    logs: Rc<RefCell<Vec<LogEntry>>>,
}

impl ConsoleProxy {
    pub fn new(logs: Rc<RefCell<Vec<LogEntry>>>) -> Self {
        Self { logs }
    }

    fn record(&self, channel: LogChannel, values: &[Dynamic]) {
        self.logs.borrow_mut().push(LogEntry {
            channel,
            values: values.iter().map(dynamic_to_json).collect(),
        });
    }
}

pub(crate) fn install(engine: &mut Engine) {
    engine.register_type_with_name::<ConsoleProxy>("Console");
    register_channel(engine, "log", LogChannel::Log);
    register_channel(engine, "error", LogChannel::Error);
    register_channel(engine, "warn", LogChannel::Warn);
    register_channel(engine, "info", LogChannel::Info);
}

// rhai has no variadic functions, so each channel is registered once per
// supported arity.
fn register_channel(engine: &mut Engine, name: &str, channel: LogChannel) {
    engine.register_fn(name, move |console: &mut ConsoleProxy, a: Dynamic| {
        console.record(channel, &[a]);
    });
    engine.register_fn(
        name,
        move |console: &mut ConsoleProxy, a: Dynamic, b: Dynamic| {
            console.record(channel, &[a, b]);
        },
    );
    engine.register_fn(
        name,
        move |console: &mut ConsoleProxy, a: Dynamic, b: Dynamic, c: Dynamic| {
            console.record(channel, &[a, b, c]);
        },
    );
    engine.register_fn(
        name,
        move |console: &mut ConsoleProxy, a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| {
            console.record(channel, &[a, b, c, d]);
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_preserves_channel_and_argument_order() {
        let logs = Rc::new(RefCell::new(Vec::new()));
        let console = ConsoleProxy::new(logs.clone());
        console.record(LogChannel::Warn, &[Dynamic::from("slow"), Dynamic::from_int(900)]);

        let captured = logs.borrow();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].channel, LogChannel::Warn);
        assert_eq!(
            captured[0].values,
            vec![serde_json::json!("slow"), serde_json::json!(900)]
        );
    }
}
