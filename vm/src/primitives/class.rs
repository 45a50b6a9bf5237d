use object::{Instance, Value};

use crate::error::Unwind;
use crate::primitives::expect_class;
use crate::Universe;

pub fn new(_u: &Universe, receiver: &Value, _args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::Instance(Instance::new(expect_class(receiver)?)))
}

pub fn name(_u: &Universe, receiver: &Value, _args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::Symbol(expect_class(receiver)?.name().clone()))
}

pub fn superclass(_u: &Universe, receiver: &Value, _args: &[Value]) -> Result<Value, Unwind> {
    Ok(expect_class(receiver)?
        .superclass()
        .map_or(Value::Nil, |class| Value::Class(class.clone())))
}
