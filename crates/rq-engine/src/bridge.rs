use std::cell::RefCell;
use std::rc::Rc;

use rhai::{
    Array, Dynamic, Engine, EvalAltResult, FnPtr, ImmutableString, Map, NativeCallContext,
    Position, Scope, FLOAT, INT,
};
use rq_core::{
    EnvironmentMap, LogEntry, RequestState, ResponseState, ScriptContext, ScriptKind, TestOutcome,
    VariableMap,
};
use uuid::Uuid;

use crate::rng::next_random_bounded;

/// Per-run mutable state shared between the bridge closures and the
/// executor. Scripts only ever touch these copies; the caller's context is
/// never reachable from inside the interpreter.
pub(crate) struct WorkingSet {
    pub request: Rc<RefCell<RequestState>>,
    pub environment: Rc<RefCell<EnvironmentMap>>,
    pub variables: Rc<RefCell<VariableMap>>,
    pub logs: Rc<RefCell<Vec<LogEntry>>>,
    pub outcomes: Rc<RefCell<Vec<TestOutcome>>>,
    pub rng: Rc<RefCell<u32>>,
}

impl WorkingSet {
    pub fn from_context(context: &ScriptContext, seed: u32) -> Self {
        Self {
            request: Rc::new(RefCell::new(context.request.clone())),
            environment: Rc::new(RefCell::new(context.environment.clone())),
            variables: Rc::new(RefCell::new(context.variables.clone())),
            logs: Rc::new(RefCell::new(Vec::new())),
            outcomes: Rc::new(RefCell::new(Vec::new())),
            rng: Rc::new(RefCell::new(seed)),
        }
    }
}

#[derive(Clone)]
struct EnvProxy {
    entries: Rc<RefCell<EnvironmentMap>>,
}

#[derive(Clone)]
struct VarProxy {
    entries: Rc<RefCell<VariableMap>>,
    rng: Rc<RefCell<u32>>,
}

#[derive(Clone)]
struct RequestProxy {
    state: Rc<RefCell<RequestState>>,
}

#[derive(Clone)]
struct HeadersProxy {
    state: Rc<RefCell<RequestState>>,
}

#[derive(Clone)]
struct ResponseProxy {
    state: Rc<ResponseState>,
}

pub(crate) fn script_error(message: impl Into<String>) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(message.into()),
        Position::NONE,
    ))
}

/// The message a script-level throw carries, without interpreter position
/// noise. `throw "boom"` surfaces as exactly "boom".
pub(crate) fn thrown_message(error: &EvalAltResult) -> String {
    match error {
        EvalAltResult::ErrorRuntime(value, _) => {
            if value.is::<ImmutableString>() {
                value.clone().cast::<ImmutableString>().to_string()
            } else if value.is_unit() {
                "runtime error".to_string()
            } else {
                value.to_string()
            }
        }
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => thrown_message(inner),
        other => other.to_string(),
    }
}

fn coerce_scalar_to_string(value: &Dynamic) -> Result<String, Box<EvalAltResult>> {
    if value.is::<ImmutableString>() {
        return Ok(value.clone().cast::<ImmutableString>().to_string());
    }
    if value.is::<INT>() {
        return Ok(value.clone().cast::<INT>().to_string());
    }
    if value.is::<FLOAT>() {
        let float = value.clone().cast::<FLOAT>();
        if float.fract().abs() < f64::EPSILON {
            return Ok((float as i64).to_string());
        }
        return Ok(float.to_string());
    }
    if value.is::<bool>() {
        return Ok(value.clone().cast::<bool>().to_string());
    }
    Err(script_error(format!(
        "cannot store a value of type {} in a string map",
        value.type_name()
    )))
}

pub(crate) fn json_to_dynamic(value: &serde_json::Value) -> Dynamic {
    match value {
        serde_json::Value::Null => Dynamic::UNIT,
        serde_json::Value::Bool(value) => Dynamic::from_bool(*value),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(int) => Dynamic::from_int(int),
            None => Dynamic::from_float(number.as_f64().unwrap_or(0.0)),
        },
        serde_json::Value::String(value) => Dynamic::from(value.clone()),
        serde_json::Value::Array(items) => {
            Dynamic::from_array(items.iter().map(json_to_dynamic).collect::<Array>())
        }
        serde_json::Value::Object(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                map.insert(key.clone().into(), json_to_dynamic(value));
            }
            Dynamic::from_map(map)
        }
    }
}

pub(crate) fn dynamic_to_json(value: &Dynamic) -> serde_json::Value {
    if value.is_unit() {
        return serde_json::Value::Null;
    }
    if value.is::<bool>() {
        return serde_json::Value::Bool(value.clone().cast::<bool>());
    }
    if value.is::<INT>() {
        return serde_json::Value::from(value.clone().cast::<INT>());
    }
    if value.is::<FLOAT>() {
        let float = value.clone().cast::<FLOAT>();
        return serde_json::Number::from_f64(float)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(float.to_string()));
    }
    if value.is::<ImmutableString>() {
        return serde_json::Value::String(value.clone().cast::<ImmutableString>().to_string());
    }
    if value.is::<Array>() {
        let array = value.clone().cast::<Array>();
        return serde_json::Value::Array(array.iter().map(dynamic_to_json).collect());
    }
    if value.is::<Map>() {
        let map = value.clone().cast::<Map>();
        let mut out = serde_json::Map::new();
        for (key, value) in &map {
            out.insert(key.to_string(), dynamic_to_json(value));
        }
        return serde_json::Value::Object(out);
    }
    serde_json::Value::String(value.to_string())
}

/// Registers the full capability surface on a fresh per-run engine. Every
/// closure captures working copies only.
pub(crate) fn install(engine: &mut Engine, working: &WorkingSet) {
    register_environment(engine);
    register_variables(engine);
    register_request(engine);
    register_response(engine);
    register_test(engine, working.outcomes.clone());
}

fn register_environment(engine: &mut Engine) {
    engine.register_type_with_name::<EnvProxy>("Environment");
    engine.register_fn("get", |env: &mut EnvProxy, key: ImmutableString| -> Dynamic {
        match env.entries.borrow().get(key.as_str()) {
            Some(value) => Dynamic::from(value.clone()),
            None => Dynamic::UNIT,
        }
    });
    engine.register_fn(
        "set",
        |env: &mut EnvProxy,
         key: ImmutableString,
         value: Dynamic|
         -> Result<(), Box<EvalAltResult>> {
            let text = coerce_scalar_to_string(&value)?;
            env.entries.borrow_mut().insert(key.to_string(), text);
            Ok(())
        },
    );
    engine.register_fn("unset", |env: &mut EnvProxy, key: ImmutableString| {
        env.entries.borrow_mut().remove(key.as_str());
    });
    engine.register_fn("has", |env: &mut EnvProxy, key: ImmutableString| -> bool {
        env.entries.borrow().contains_key(key.as_str())
    });
}

fn register_variables(engine: &mut Engine) {
    engine.register_type_with_name::<VarProxy>("Variables");
    engine.register_fn("get", |vars: &mut VarProxy, key: ImmutableString| -> Dynamic {
        match vars.entries.borrow().get(key.as_str()) {
            Some(value) => Dynamic::from(value.clone()),
            None => Dynamic::UNIT,
        }
    });
    engine.register_fn(
        "set",
        |vars: &mut VarProxy,
         key: ImmutableString,
         value: Dynamic|
         -> Result<(), Box<EvalAltResult>> {
            let text = coerce_scalar_to_string(&value)?;
            vars.entries.borrow_mut().insert(key.to_string(), text);
            Ok(())
        },
    );
    engine.register_fn("unset", |vars: &mut VarProxy, key: ImmutableString| {
        vars.entries.borrow_mut().remove(key.as_str());
    });
    engine.register_fn("has", |vars: &mut VarProxy, key: ImmutableString| -> bool {
        vars.entries.borrow().contains_key(key.as_str())
    });
    engine.register_fn("freshId", |_: &mut VarProxy| -> ImmutableString {
        Uuid::new_v4().to_string().into()
    });
    engine.register_fn("now", |_: &mut VarProxy| -> INT {
        chrono::Utc::now().timestamp_millis()
    });
    engine.register_fn(
        "randomInt",
        |vars: &mut VarProxy, min: INT, max: INT| -> Result<INT, Box<EvalAltResult>> {
            if min > max {
                return Err(script_error(format!(
                    "randomInt: min {} exceeds max {}",
                    min, max
                )));
            }
            let span = (max as i128) - (min as i128) + 1;
            if span > i128::from(u32::MAX) {
                return Err(script_error("randomInt: range is too large"));
            }
            let mut state = vars.rng.borrow_mut();
            let offset = next_random_bounded(&mut state, span as u32);
            Ok(min + offset as INT)
        },
    );
}

fn register_request(engine: &mut Engine) {
    engine.register_type_with_name::<RequestProxy>("Request");
    engine.register_type_with_name::<HeadersProxy>("Headers");

    engine.register_get_set(
        "url",
        |req: &mut RequestProxy| -> ImmutableString { req.state.borrow().url.clone().into() },
        |req: &mut RequestProxy, value: ImmutableString| {
            req.state.borrow_mut().url = value.to_string();
        },
    );
    engine.register_get_set(
        "method",
        |req: &mut RequestProxy| -> ImmutableString { req.state.borrow().method.clone().into() },
        |req: &mut RequestProxy, value: ImmutableString| {
            req.state.borrow_mut().method = value.to_string();
        },
    );
    engine.register_get("body", |req: &mut RequestProxy| -> Dynamic {
        match &req.state.borrow().body {
            Some(body) => Dynamic::from(body.clone()),
            None => Dynamic::UNIT,
        }
    });
    engine.register_set("body", |req: &mut RequestProxy, value: ImmutableString| {
        req.state.borrow_mut().body = Some(value.to_string());
    });
    engine.register_get_set(
        "headers",
        |req: &mut RequestProxy| -> HeadersProxy {
            HeadersProxy {
                state: req.state.clone(),
            }
        },
        // The headers proxy shares the request cell, so write-back after a
        // mutating method call is a no-op.
        |_req: &mut RequestProxy, _headers: HeadersProxy| {},
    );

    engine.register_fn(
        "add",
        |headers: &mut HeadersProxy, key: ImmutableString, value: ImmutableString| {
            headers
                .state
                .borrow_mut()
                .headers
                .insert(key.to_string(), value.to_string());
        },
    );
    engine.register_fn("remove", |headers: &mut HeadersProxy, key: ImmutableString| {
        headers.state.borrow_mut().headers.shift_remove(key.as_str());
    });
    engine.register_fn(
        "get",
        |headers: &mut HeadersProxy, key: ImmutableString| -> Dynamic {
            match headers.state.borrow().headers.get(key.as_str()) {
                Some(value) => Dynamic::from(value.clone()),
                None => Dynamic::UNIT,
            }
        },
    );
    engine.register_fn("asMap", |headers: &mut HeadersProxy| -> Map {
        let mut map = Map::new();
        for (key, value) in &headers.state.borrow().headers {
            map.insert(key.clone().into(), Dynamic::from(value.clone()));
        }
        map
    });
}

fn register_response(engine: &mut Engine) {
    engine.register_type_with_name::<ResponseProxy>("Response");
    engine.register_get("status_code", |response: &mut ResponseProxy| -> INT {
        response.state.status_code as INT
    });
    engine.register_get(
        "status_text",
        |response: &mut ResponseProxy| -> ImmutableString {
            response.state.status_text.clone().into()
        },
    );
    engine.register_get("response_time", |response: &mut ResponseProxy| -> FLOAT {
        response.state.response_time_ms
    });
    engine.register_get("headers", |response: &mut ResponseProxy| -> Map {
        let mut map = Map::new();
        for (key, value) in &response.state.headers {
            map.insert(key.clone().into(), Dynamic::from(value.clone()));
        }
        map
    });
    engine.register_fn("text", |response: &mut ResponseProxy| -> ImmutableString {
        response.state.body.clone().into()
    });
    engine.register_fn(
        "json",
        |response: &mut ResponseProxy| -> Result<Dynamic, Box<EvalAltResult>> {
            let parsed: serde_json::Value =
                serde_json::from_str(&response.state.body).map_err(|error| {
                    script_error(format!("response body is not valid JSON: {}", error))
                })?;
            Ok(json_to_dynamic(&parsed))
        },
    );
}

fn register_test(engine: &mut Engine, outcomes: Rc<RefCell<Vec<TestOutcome>>>) {
    engine.register_fn(
        "test",
        move |context: NativeCallContext, name: ImmutableString, callback: FnPtr| {
            let outcome = match callback.call_within_context::<Dynamic>(&context, ()) {
                Ok(_) => TestOutcome::passed(name.to_string()),
                Err(error) => TestOutcome::failed(name.to_string(), thrown_message(&error)),
            };
            outcomes.borrow_mut().push(outcome);
        },
    );
}

/// Builds the scope containing exactly the names a script may see. With
/// strict variables on, this is the whole reachable world.
pub(crate) fn build_scope(
    working: &WorkingSet,
    context: &ScriptContext,
    kind: ScriptKind,
) -> Scope<'static> {
    let mut scope = Scope::new();
    scope.push(
        "environment",
        EnvProxy {
            entries: working.environment.clone(),
        },
    );
    scope.push(
        "variables",
        VarProxy {
            entries: working.variables.clone(),
            rng: working.rng.clone(),
        },
    );
    scope.push(
        "request",
        RequestProxy {
            state: working.request.clone(),
        },
    );
    scope.push(
        "console",
        crate::console::ConsoleProxy::new(working.logs.clone()),
    );

    if kind == ScriptKind::Tests {
        if let Some(response) = &context.response {
            let mut header_map = Map::new();
            for (key, value) in &response.headers {
                header_map.insert(key.clone().into(), Dynamic::from(value.clone()));
            }
            scope.push(
                "response",
                ResponseProxy {
                    state: Rc::new(response.clone()),
                },
            );
            scope.push("responseBody", ImmutableString::from(response.body.clone()));
            scope.push("responseCode", response.status_code as INT);
            scope.push("responseTime", response.response_time_ms);
            scope.push("responseHeaders", header_map);
        }
    }

    scope
}
