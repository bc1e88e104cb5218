use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Map, FLOAT, INT};

use crate::bridge::script_error;

/// The value under assertion. `to`, `be` and `have` are chaining getters
/// that return the expectation unchanged; predicates either pass quietly or
/// raise an error naming the actual and expected values.
#[derive(Clone)]
struct Expectation {
    value: Dynamic,
}

pub(crate) fn install(engine: &mut Engine) {
    engine.register_type_with_name::<Expectation>("Expectation");
    engine.register_fn("expect", |value: Dynamic| Expectation { value });

    engine.register_get("to", |e: &mut Expectation| e.clone());
    engine.register_get("be", |e: &mut Expectation| e.clone());
    engine.register_get("have", |e: &mut Expectation| e.clone());

    // Truthiness check evaluated on bare property access.
    engine.register_get("ok", |e: &mut Expectation| -> Result<bool, Box<EvalAltResult>> {
        if is_truthy(&e.value) {
            Ok(true)
        } else {
            Err(script_error(format!(
                "expected {} to be truthy",
                describe(&e.value)
            )))
        }
    });

    engine.register_fn(
        "equal",
        |e: &mut Expectation, expected: Dynamic| -> Result<(), Box<EvalAltResult>> {
            if values_equal(&e.value, &expected) {
                Ok(())
            } else {
                Err(script_error(format!(
                    "expected {} to equal {}",
                    describe(&e.value),
                    describe(&expected)
                )))
            }
        },
    );

    engine.register_fn(
        "below",
        |e: &mut Expectation, bound: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let (actual, bound) = numeric_pair(&e.value, &bound, "below")?;
            if actual < bound {
                Ok(())
            } else {
                Err(script_error(format!(
                    "expected {} to be below {}",
                    describe(&e.value),
                    bound
                )))
            }
        },
    );

    engine.register_fn(
        "above",
        |e: &mut Expectation, bound: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let (actual, bound) = numeric_pair(&e.value, &bound, "above")?;
            if actual > bound {
                Ok(())
            } else {
                Err(script_error(format!(
                    "expected {} to be above {}",
                    describe(&e.value),
                    bound
                )))
            }
        },
    );

    // `true` and `false` are rhai keywords, so exact boolean identity is
    // invoked by name.
    engine.register_fn(
        "is_true",
        |e: &mut Expectation| -> Result<(), Box<EvalAltResult>> {
            boolean_identity(&e.value, true)
        },
    );
    engine.register_fn(
        "is_false",
        |e: &mut Expectation| -> Result<(), Box<EvalAltResult>> {
            boolean_identity(&e.value, false)
        },
    );

    engine.register_fn(
        "property",
        |e: &mut Expectation, name: ImmutableString| -> Result<(), Box<EvalAltResult>> {
            if !e.value.is::<Map>() {
                return Err(script_error(format!(
                    "expected a keyed structure, got {}",
                    e.value.type_name()
                )));
            }
            let map = e.value.clone().cast::<Map>();
            if map.contains_key(name.as_str()) {
                Ok(())
            } else {
                Err(script_error(format!(
                    "expected {} to have property \"{}\"",
                    describe(&e.value),
                    name
                )))
            }
        },
    );

    engine.register_fn(
        "include",
        |e: &mut Expectation, needle: Dynamic| -> Result<(), Box<EvalAltResult>> {
            if e.value.is::<ImmutableString>() {
                let haystack = e.value.clone().cast::<ImmutableString>();
                let needle_text = if needle.is::<ImmutableString>() {
                    needle.clone().cast::<ImmutableString>().to_string()
                } else {
                    needle.to_string()
                };
                if haystack.contains(needle_text.as_str()) {
                    return Ok(());
                }
                return Err(script_error(format!(
                    "expected {} to include {}",
                    describe(&e.value),
                    describe(&needle)
                )));
            }
            if e.value.is::<Array>() {
                let items = e.value.clone().cast::<Array>();
                if items.iter().any(|item| values_equal(item, &needle)) {
                    return Ok(());
                }
                return Err(script_error(format!(
                    "expected {} to include {}",
                    describe(&e.value),
                    describe(&needle)
                )));
            }
            Err(script_error(format!(
                "include expects a string or array, got {}",
                e.value.type_name()
            )))
        },
    );
}

fn boolean_identity(value: &Dynamic, expected: bool) -> Result<(), Box<EvalAltResult>> {
    if value.is::<bool>() && value.clone().cast::<bool>() == expected {
        Ok(())
    } else {
        Err(script_error(format!(
            "expected exactly {}, got {}",
            expected,
            describe(value)
        )))
    }
}

fn numeric(value: &Dynamic) -> Option<f64> {
    if value.is::<INT>() {
        return Some(value.clone().cast::<INT>() as f64);
    }
    if value.is::<FLOAT>() {
        return Some(value.clone().cast::<FLOAT>());
    }
    None
}

fn numeric_pair(
    actual: &Dynamic,
    bound: &Dynamic,
    predicate: &str,
) -> Result<(f64, f64), Box<EvalAltResult>> {
    let Some(actual) = numeric(actual) else {
        return Err(script_error(format!(
            "{} expects a numeric actual value, got {}",
            predicate,
            actual.type_name()
        )));
    };
    let Some(bound) = numeric(bound) else {
        return Err(script_error(format!(
            "{} expects a numeric bound, got {}",
            predicate,
            bound.type_name()
        )));
    };
    Ok((actual, bound))
}

fn is_truthy(value: &Dynamic) -> bool {
    if value.is_unit() {
        return false;
    }
    if value.is::<bool>() {
        return value.clone().cast::<bool>();
    }
    if value.is::<INT>() {
        return value.clone().cast::<INT>() != 0;
    }
    if value.is::<FLOAT>() {
        let float = value.clone().cast::<FLOAT>();
        return float != 0.0 && !float.is_nan();
    }
    if value.is::<ImmutableString>() {
        return !value.clone().cast::<ImmutableString>().is_empty();
    }
    // Arrays and maps are truthy regardless of content, matching the
    // source's host-language semantics.
    true
}

fn values_equal(left: &Dynamic, right: &Dynamic) -> bool {
    if let (Some(left), Some(right)) = (numeric(left), numeric(right)) {
        return left == right;
    }
    if left.is::<bool>() && right.is::<bool>() {
        return left.clone().cast::<bool>() == right.clone().cast::<bool>();
    }
    if left.is::<ImmutableString>() && right.is::<ImmutableString>() {
        return left.clone().cast::<ImmutableString>() == right.clone().cast::<ImmutableString>();
    }
    if left.is_unit() && right.is_unit() {
        return true;
    }
    if left.is::<Array>() && right.is::<Array>() {
        let left = left.clone().cast::<Array>();
        let right = right.clone().cast::<Array>();
        return left.len() == right.len()
            && left
                .iter()
                .zip(right.iter())
                .all(|(a, b)| values_equal(a, b));
    }
    if left.is::<Map>() && right.is::<Map>() {
        let left = left.clone().cast::<Map>();
        let right = right.clone().cast::<Map>();
        return left.len() == right.len()
            && left.iter().all(|(key, a)| {
                right
                    .get(key.as_str())
                    .map(|b| values_equal(a, b))
                    .unwrap_or(false)
            });
    }
    false
}

fn describe(value: &Dynamic) -> String {
    if value.is::<ImmutableString>() {
        return format!("\"{}\"", value.clone().cast::<ImmutableString>());
    }
    if value.is_unit() {
        return "undefined".to_string();
    }
    value.to_string()
}
