use std::time::Instant;

use once_cell::sync::Lazy;

use crate::value::{NativeFunction, NativeResult, Value};

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Native functions installed into the global scope of every interpreter.
pub fn standard_library() -> Vec<NativeFunction> {
    // make sure epoch is initialized before any script can observe it
    Lazy::force(&EPOCH);

    vec![
        NativeFunction {
            name: "clock",
            arity: 0,
            func: native_clock,
        },
        NativeFunction {
            name: "sqrt",
            arity: 1,
            func: native_sqrt,
        },
        NativeFunction {
            name: "toString",
            arity: 1,
            func: native_to_string,
        },
    ]
}

fn native_clock(_args: &[Value]) -> NativeResult {
    let duration = Instant::now() - *EPOCH;
    // lossy conversion to f64 here, shouldn't be an issue for a while though
    Ok(Value::from(duration.as_millis() as f64))
}

fn native_sqrt(args: &[Value]) -> NativeResult {
    match args {
        [Value::Number(value)] => Ok(Value::from(value.sqrt())),
        [other] => Err(format!("Expected number argument, got {}.", other.type_name())),
        _ => Err("Expected exactly one argument.".to_string()),
    }
}

fn native_to_string(args: &[Value]) -> NativeResult {
    match args {
        [value] => Ok(Value::from(value.to_string())),
        _ => Err("Expected exactly one argument.".to_string()),
    }
}
