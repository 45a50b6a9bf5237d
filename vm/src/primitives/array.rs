use std::cell::RefCell;
use std::rc::Rc;

use object::Value;

use crate::error::{RuntimeError, Unwind};
use crate::invoke::Invoke;
use crate::primitives::{arg, expect_block, expect_class, expect_integer};
use crate::Universe;

fn expect_array(value: &Value) -> Result<&Rc<RefCell<Vec<Value>>>, RuntimeError> {
    match value {
        Value::Array(values) => Ok(values),
        other => Err(RuntimeError::type_error("array", other)),
    }
}

/// Zero-based slot of the one-based `index`.
fn slot(index: i64, len: usize) -> Result<usize, RuntimeError> {
    match usize::try_from(index) {
        Ok(index) if (1..=len).contains(&index) => Ok(index - 1),
        _ => Err(RuntimeError::IndexOutOfBounds { index, len }),
    }
}

/// `Array new: n`, filled with nil.
pub fn new(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    expect_class(receiver)?;
    let size = expect_integer(arg(args, 0)?)?;
    let size = usize::try_from(size).map_err(|_| RuntimeError::IndexOutOfBounds {
        index: size,
        len: 0,
    })?;
    Ok(Value::new_array(vec![Value::Nil; size]))
}

pub fn at(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    let values = expect_array(receiver)?.borrow();
    let idx = slot(expect_integer(arg(args, 0)?)?, values.len())?;
    Ok(values[idx].clone())
}

/// Answers the stored value.
pub fn at_put(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    let mut values = expect_array(receiver)?.borrow_mut();
    let idx = slot(expect_integer(arg(args, 0)?)?, values.len())?;
    let value = arg(args, 1)?.clone();
    values[idx] = value.clone();
    Ok(value)
}

pub fn length(_u: &Universe, receiver: &Value, _args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::Integer(expect_array(receiver)?.borrow().len() as i64))
}

/// `do:`. The block may grow or shrink the array while it runs; iteration
/// stops at the current end.
pub fn each(u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    let values = expect_array(receiver)?;
    let block_value = arg(args, 0)?;
    let block = expect_block(block_value)?;
    let mut idx = 0;
    loop {
        let element = match values.borrow().get(idx) {
            Some(element) => element.clone(),
            None => break,
        };
        block.invoke_2(u, block_value.clone(), element)?;
        idx += 1;
    }
    Ok(receiver.clone())
}
