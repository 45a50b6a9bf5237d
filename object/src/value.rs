use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::block::Block;
use crate::class::Class;
use crate::instance::Instance;
use crate::invokable::{Invokable, Primitive};
use crate::method::Method;
use crate::symbol::Symbol;

/// A VM value.
///
/// Numbers and the three singletons are stored inline; everything else is
/// a reference-counted pointer. Cloning a value never copies an object.
#[derive(Clone)]
pub enum Value {
    Nil,
    True,
    False,
    Integer(i64),
    Double(f64),
    BigInteger(Rc<BigInt>),
    Symbol(Symbol),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Instance(Rc<Instance>),
    Class(Rc<Class>),
    Block(Rc<Block>),
    Method(Rc<Method>),
    Primitive(Rc<Primitive>),
}

impl Value {
    #[inline(always)]
    pub fn boolean(value: bool) -> Self {
        if value { Value::True } else { Value::False }
    }

    /// Wrap a big integer, demoting it to `Integer` when it fits.
    pub fn from_bigint(value: BigInt) -> Self {
        match value.to_i64() {
            Some(small) => Value::Integer(small),
            None => Value::BigInteger(Rc::new(value)),
        }
    }

    pub fn new_array(values: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    pub fn string(text: &str) -> Self {
        Value::String(Rc::from(text))
    }

    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    #[inline(always)]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_invokable(&self) -> Option<Invokable> {
        match self {
            Value::Method(method) => Some(Invokable::Method(method.clone())),
            Value::Primitive(primitive) => {
                Some(Invokable::Primitive(primitive.clone()))
            }
            _ => None,
        }
    }

    /// Short name of the variant, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::True | Value::False => "boolean",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::BigInteger(_) => "big integer",
            Value::Symbol(_) => "symbol",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Instance(_) => "instance",
            Value::Class(_) => "class",
            Value::Block(_) => "block",
            Value::Method(_) => "method",
            Value::Primitive(_) => "primitive",
        }
    }

    /// Identity comparison (`==` in the language).
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil)
            | (Value::True, Value::True)
            | (Value::False, Value::False) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::BigInteger(a), Value::BigInteger(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Block(a), Value::Block(b)) => Rc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => Rc::ptr_eq(a, b),
            (Value::Primitive(a), Value::Primitive(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::boolean(value)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::True => write!(f, "true"),
            Value::False => write!(f, "false"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Double(value) => write!(f, "{value:?}"),
            Value::BigInteger(value) => write!(f, "{value}"),
            Value::Symbol(symbol) => write!(f, "#{}", symbol.as_str()),
            Value::String(text) => write!(f, "{text:?}"),
            Value::Array(values) => f.debug_list().entries(values.borrow().iter()).finish(),
            Value::Instance(instance) => {
                write!(f, "a {}", instance.class().name().as_str())
            }
            Value::Class(class) => write!(f, "{}", class.name().as_str()),
            Value::Block(block) => {
                write!(f, "[block in {}]", block.method().signature().as_str())
            }
            Value::Method(method) => {
                write!(f, "<method {}>", method.signature().as_str())
            }
            Value::Primitive(primitive) => {
                write!(f, "<primitive {}>", primitive.signature().as_str())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(text) => write!(f, "{text}"),
            Value::Symbol(symbol) => write!(f, "{}", symbol.as_str()),
            other => write!(f, "{other:?}"),
        }
    }
}
