use object::Value;

use crate::error::Unwind;
use crate::primitives::arg;
use crate::primitives::integer::{ArithOp, arith, compare, equals};
use crate::Universe;

// Doubles share the numeric tower with integers; `arith` turns any mixed
// operation into a double operation.

pub fn add(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(arith(ArithOp::Add, receiver, arg(args, 0)?)?)
}

pub fn sub(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(arith(ArithOp::Sub, receiver, arg(args, 0)?)?)
}

pub fn mul(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(arith(ArithOp::Mul, receiver, arg(args, 0)?)?)
}

/// `/` and `//` both divide without rounding.
pub fn div(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(arith(ArithOp::Div, receiver, arg(args, 0)?)?)
}

pub fn lt(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::boolean(compare(receiver, arg(args, 0)?)?.is_lt()))
}

pub fn gt(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::boolean(compare(receiver, arg(args, 0)?)?.is_gt()))
}

pub fn eq(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::boolean(equals(receiver, arg(args, 0)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_divisor_still_divides_exactly() {
        let u = Universe::new(Default::default());
        let quotient = div(&u, &Value::Double(3.0), &[Value::Integer(2)]).unwrap();
        assert!(matches!(quotient, Value::Double(q) if q == 1.5));
    }
}
