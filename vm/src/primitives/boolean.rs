use object::Value;

use crate::error::{RuntimeError, Unwind};
use crate::invoke::value_of;
use crate::primitives::arg;
use crate::Universe;

fn truth(receiver: &Value) -> Result<bool, RuntimeError> {
    match receiver {
        Value::True => Ok(true),
        Value::False => Ok(false),
        other => Err(RuntimeError::type_error("boolean", other)),
    }
}

pub fn if_true(u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    if truth(receiver)? {
        value_of(u, arg(args, 0)?)
    } else {
        Ok(Value::Nil)
    }
}

pub fn if_false(u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    if truth(receiver)? {
        Ok(Value::Nil)
    } else {
        value_of(u, arg(args, 0)?)
    }
}

pub fn if_true_if_false(u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    let branch = if truth(receiver)? { 0 } else { 1 };
    value_of(u, arg(args, branch)?)
}

pub fn if_false_if_true(u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    let branch = if truth(receiver)? { 1 } else { 0 };
    value_of(u, arg(args, branch)?)
}

pub fn not(_u: &Universe, receiver: &Value, _args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::boolean(!truth(receiver)?))
}

/// Short-circuits: the argument is only evaluated for `true`.
pub fn and(u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    if truth(receiver)? {
        value_of(u, arg(args, 0)?)
    } else {
        Ok(Value::False)
    }
}

pub fn or(u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    if truth(receiver)? {
        Ok(Value::True)
    } else {
        value_of(u, arg(args, 0)?)
    }
}
