//! Sample handlers shipped with the daemon.

use std::thread;
use std::time::Duration;

use busgate_jsonrpc::{NativeValue, Params};
use serde_json::{Number, Value};
use tracing::warn;

use super::METHODS_TARGET;
use super::handler::HandlerError;
use super::module::Module;
use super::source::StaticModuleSource;

/// Module source exposing the built-in root module:
///
/// * `echo(txt)` returns its argument;
/// * `add(a, b)` adds two numbers, strings or arrays;
/// * `plus(*values)` and `BuildIn.sum(*values)` sum numbers;
/// * `sleep(seconds)` blocks the worker;
/// * `exception(*args)` always fails;
/// * `warnlog(msg)` emits a warning log record.
#[must_use]
pub fn builtin_source() -> StaticModuleSource {
    StaticModuleSource::new().with_module("", builtin_module)
}

fn builtin_module() -> Module {
    Module::new()
        .with_method("echo", echo)
        .with_method("add", add)
        .with_method("plus", sum)
        .with_method("sleep", sleep)
        .with_method("exception", exception)
        .with_method("warnlog", warnlog)
        .with_namespace("BuildIn", Module::new().with_method("sum", sum))
}

fn echo(params: Params) -> Result<NativeValue, HandlerError> {
    params.expect_arity(1)?;
    Ok(NativeValue::Json(params.argument::<Value>(0, "txt")?))
}

fn add(params: Params) -> Result<NativeValue, HandlerError> {
    params.expect_arity(2)?;
    let left = params.argument::<Value>(0, "a")?;
    let right = params.argument::<Value>(1, "b")?;
    match (left, right) {
        (Value::String(left), Value::String(right)) => Ok(NativeValue::Text(left + &right)),
        (Value::Array(mut left), Value::Array(right)) => {
            left.extend(right);
            Ok(NativeValue::Json(Value::Array(left)))
        }
        (Value::Number(left), Value::Number(right)) => add_numbers(&left, &right),
        (left, right) => Err(unsupported_operands(&left, &right)),
    }
}

fn sum(params: Params) -> Result<NativeValue, HandlerError> {
    let values = params.variadic::<Value>()?;
    values
        .iter()
        .try_fold(NativeValue::Int(0), |total, value| match (total, value) {
            (NativeValue::Int(total), Value::Number(number)) => {
                add_numbers(&Number::from(total), number)
            }
            (NativeValue::Float(total), Value::Number(number)) => {
                Ok(NativeValue::Float(total + number.as_f64().unwrap_or(f64::NAN)))
            }
            (_, other) => Err(HandlerError::failure(
                "TypeError",
                format!("unsupported operand type for sum: {}", type_name(other)),
            )),
        })
}

fn add_numbers(left: &Number, right: &Number) -> Result<NativeValue, HandlerError> {
    if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
        return left
            .checked_add(right)
            .map(NativeValue::Int)
            .ok_or_else(|| HandlerError::failure("OverflowError", "integer addition overflowed"));
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(left), Some(right)) => Ok(NativeValue::Float(left + right)),
        _ => Err(HandlerError::failure(
            "TypeError",
            "operands are not representable as numbers",
        )),
    }
}

fn sleep(params: Params) -> Result<NativeValue, HandlerError> {
    params.expect_arity(1)?;
    let seconds = params.argument::<f64>(0, "seconds")?;
    let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
        HandlerError::failure("ValueError", "sleep length must be non-negative")
    })?;
    thread::sleep(duration);
    Ok(NativeValue::Null)
}

fn exception(params: Params) -> Result<NativeValue, HandlerError> {
    let message = params
        .positional_values()
        .iter()
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    Err(HandlerError::failure("Exception", message))
}

fn warnlog(params: Params) -> Result<NativeValue, HandlerError> {
    params.expect_arity(1)?;
    let message = params.argument::<Value>(0, "msg")?;
    match &message {
        Value::String(text) => warn!(target: METHODS_TARGET, "{text}"),
        other => warn!(target: METHODS_TARGET, "{other}"),
    }
    Ok(NativeValue::Null)
}

fn unsupported_operands(left: &Value, right: &Value) -> HandlerError {
    HandlerError::failure(
        "TypeError",
        format!(
            "unsupported operand types for +: {} and {}",
            type_name(left),
            type_name(right)
        ),
    )
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
