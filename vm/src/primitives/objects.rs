use object::Value;

use crate::error::{RuntimeError, Unwind};
use crate::primitives::arg;
use crate::Universe;

pub fn identical(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::boolean(receiver.identical(arg(args, 0)?)))
}

pub fn value(_u: &Universe, receiver: &Value, _args: &[Value]) -> Result<Value, Unwind> {
    Ok(receiver.clone())
}

pub fn class(u: &Universe, receiver: &Value, _args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::Class(u.class_of(receiver)))
}

pub fn is_nil(_u: &Universe, receiver: &Value, _args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::boolean(receiver.is_nil()))
}

pub fn not_nil(_u: &Universe, receiver: &Value, _args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::boolean(!receiver.is_nil()))
}

/// Default `doesNotUnderstand:arguments:`. Classes that want to recover
/// override it; reaching this one ends the program.
pub fn does_not_understand(
    _u: &Universe,
    receiver: &Value,
    args: &[Value],
) -> Result<Value, Unwind> {
    let selector = match arg(args, 0)? {
        Value::Symbol(symbol) => symbol.as_str().to_string(),
        other => other.to_string(),
    };
    log::debug!("{receiver:?} does not understand #{selector}");
    Err(RuntimeError::MessageNotUnderstood {
        selector,
        receiver: format!("{receiver:?}"),
    }
    .into())
}

/// Default `escapedBlock:`.
pub fn escaped_block(_u: &Universe, _receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    log::warn!("unhandled escaped block {:?}", arg(args, 0)?);
    Err(RuntimeError::UnhandledNonLocalReturn.into())
}

/// Default `unknownGlobal:`.
pub fn unknown_global(_u: &Universe, _receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Err(RuntimeError::UndefinedGlobal {
        name: arg(args, 0)?.to_string(),
    }
    .into())
}
