use std::rc::Rc;

use object::{Block, Class, Value};

use crate::error::{RuntimeError, Unwind};
use crate::Universe;

pub mod array;
pub mod block;
pub mod boolean;
pub mod class;
pub mod double;
pub mod integer;
pub mod objects;

pub type PrimitiveFn = fn(&Universe, &Value, &[Value]) -> Result<Value, Unwind>;

/// A native method and where it gets installed. A holder written as
/// `"Array class"` names the metaclass of `Array`.
#[derive(Clone, Copy)]
pub struct PrimitiveDesc {
    pub holder: &'static str,
    pub selector: &'static str,
    pub func: PrimitiveFn,
}

impl PrimitiveDesc {
    pub const fn new(holder: &'static str, selector: &'static str, func: PrimitiveFn) -> Self {
        Self {
            holder,
            selector,
            func,
        }
    }
}

pub fn default_primitives() -> Vec<PrimitiveDesc> {
    vec![
        PrimitiveDesc::new("Object", "==", objects::identical),
        PrimitiveDesc::new("Object", "=", objects::identical),
        PrimitiveDesc::new("Object", "value", objects::value),
        PrimitiveDesc::new("Object", "class", objects::class),
        PrimitiveDesc::new("Object", "isNil", objects::is_nil),
        PrimitiveDesc::new("Object", "notNil", objects::not_nil),
        PrimitiveDesc::new(
            "Object",
            "doesNotUnderstand:arguments:",
            objects::does_not_understand,
        ),
        PrimitiveDesc::new("Object", "escapedBlock:", objects::escaped_block),
        PrimitiveDesc::new("Object", "unknownGlobal:", objects::unknown_global),
        PrimitiveDesc::new("Integer", "+", integer::add),
        PrimitiveDesc::new("Integer", "-", integer::sub),
        PrimitiveDesc::new("Integer", "*", integer::mul),
        PrimitiveDesc::new("Integer", "/", integer::div),
        PrimitiveDesc::new("Integer", "\\\\", integer::modulo),
        PrimitiveDesc::new("Integer", "<", integer::lt),
        PrimitiveDesc::new("Integer", "<=", integer::le),
        PrimitiveDesc::new("Integer", ">", integer::gt),
        PrimitiveDesc::new("Integer", ">=", integer::ge),
        PrimitiveDesc::new("Integer", "=", integer::eq),
        PrimitiveDesc::new("Integer", "<>", integer::ne),
        PrimitiveDesc::new("Integer", "asDouble", integer::as_double),
        PrimitiveDesc::new("Integer", "to:do:", integer::to_do),
        PrimitiveDesc::new("Double", "+", double::add),
        PrimitiveDesc::new("Double", "-", double::sub),
        PrimitiveDesc::new("Double", "*", double::mul),
        PrimitiveDesc::new("Double", "/", double::div),
        PrimitiveDesc::new("Double", "//", double::div),
        PrimitiveDesc::new("Double", "<", double::lt),
        PrimitiveDesc::new("Double", ">", double::gt),
        PrimitiveDesc::new("Double", "=", double::eq),
        PrimitiveDesc::new("Boolean", "ifTrue:", boolean::if_true),
        PrimitiveDesc::new("Boolean", "ifFalse:", boolean::if_false),
        PrimitiveDesc::new("Boolean", "ifTrue:ifFalse:", boolean::if_true_if_false),
        PrimitiveDesc::new("Boolean", "ifFalse:ifTrue:", boolean::if_false_if_true),
        PrimitiveDesc::new("Boolean", "not", boolean::not),
        PrimitiveDesc::new("Boolean", "and:", boolean::and),
        PrimitiveDesc::new("Boolean", "or:", boolean::or),
        PrimitiveDesc::new("Block", "value", block::value),
        PrimitiveDesc::new("Block", "value:", block::value_with),
        PrimitiveDesc::new("Block", "value:with:", block::value_with_with),
        PrimitiveDesc::new("Block", "whileTrue:", block::while_true),
        PrimitiveDesc::new("Array class", "new:", array::new),
        PrimitiveDesc::new("Array", "at:", array::at),
        PrimitiveDesc::new("Array", "at:put:", array::at_put),
        PrimitiveDesc::new("Array", "length", array::length),
        PrimitiveDesc::new("Array", "do:", array::each),
        PrimitiveDesc::new("Class", "new", class::new),
        PrimitiveDesc::new("Class", "name", class::name),
        PrimitiveDesc::new("Class", "superclass", class::superclass),
    ]
}

/// Argument `idx`, not counting the receiver.
pub(crate) fn arg(args: &[Value], idx: usize) -> Result<&Value, RuntimeError> {
    args.get(idx).ok_or(RuntimeError::ArityMismatch {
        expected: idx + 2,
        got: args.len() + 1,
    })
}

pub(crate) fn expect_integer(value: &Value) -> Result<i64, RuntimeError> {
    value
        .as_integer()
        .ok_or_else(|| RuntimeError::type_error("integer", value))
}

pub(crate) fn expect_block(value: &Value) -> Result<&Rc<Block>, RuntimeError> {
    match value {
        Value::Block(block) => Ok(block),
        other => Err(RuntimeError::type_error("block", other)),
    }
}

pub(crate) fn expect_class(value: &Value) -> Result<&Rc<Class>, RuntimeError> {
    match value {
        Value::Class(class) => Ok(class),
        other => Err(RuntimeError::type_error("class", other)),
    }
}
