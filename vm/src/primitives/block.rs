use object::Value;

use crate::error::{RuntimeError, Unwind};
use crate::invoke::{Invoke, value_of};
use crate::primitives::{arg, expect_block};
use crate::Universe;

pub fn value(u: &Universe, receiver: &Value, _args: &[Value]) -> Result<Value, Unwind> {
    expect_block(receiver)?.invoke_1(u, receiver.clone())
}

pub fn value_with(u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    expect_block(receiver)?.invoke_2(u, receiver.clone(), arg(args, 0)?.clone())
}

pub fn value_with_with(u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    expect_block(receiver)?.invoke_3(
        u,
        receiver.clone(),
        arg(args, 0)?.clone(),
        arg(args, 1)?.clone(),
    )
}

/// `[cond] whileTrue: [body]`, answering nil.
pub fn while_true(u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    let condition = expect_block(receiver)?;
    let body = arg(args, 0)?;
    loop {
        match condition.invoke_1(u, receiver.clone())? {
            Value::True => {
                value_of(u, body)?;
            }
            Value::False => return Ok(Value::Nil),
            other => return Err(RuntimeError::type_error("boolean", &other).into()),
        }
    }
}
