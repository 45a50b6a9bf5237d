use std::cmp::Ordering;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use object::Value;

use crate::error::{RuntimeError, Unwind};
use crate::invoke::Invoke;
use crate::primitives::{arg, expect_block, expect_integer};
use crate::Universe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "\\\\",
        }
    }
}

fn value_from_i128(value: i128) -> Value {
    match i64::try_from(value) {
        Ok(small) => Value::Integer(small),
        Err(_) => Value::from_bigint(BigInt::from(value)),
    }
}

fn to_big(value: &Value) -> Option<BigInt> {
    match value {
        Value::Integer(small) => Some(BigInt::from(*small)),
        Value::BigInteger(big) => Some((**big).clone()),
        _ => None,
    }
}

pub(crate) fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(small) => Some(*small as f64),
        Value::Double(double) => Some(*double),
        Value::BigInteger(big) => big.to_f64(),
        _ => None,
    }
}

fn unsupported(operation: &'static str, lhs: &Value, rhs: &Value) -> RuntimeError {
    let culprit = if to_f64(lhs).is_none() { lhs } else { rhs };
    RuntimeError::NotYetImplemented {
        operation,
        kind: culprit.kind_name(),
    }
}

/// Integer results that leave the `i64` range become big integers; any
/// double operand makes the operation a double operation. `/` and `\\`
/// round towards negative infinity.
pub fn arith(op: ArithOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => small_arith(op, *a as i128, *b as i128),
        (Value::Double(_), _) | (_, Value::Double(_)) => match (to_f64(lhs), to_f64(rhs)) {
            (Some(a), Some(b)) => Ok(Value::Double(float_arith(op, a, b))),
            _ => Err(unsupported(op.name(), lhs, rhs)),
        },
        _ => match (to_big(lhs), to_big(rhs)) {
            (Some(a), Some(b)) => big_arith(op, a, b),
            _ => Err(unsupported(op.name(), lhs, rhs)),
        },
    }
}

fn small_arith(op: ArithOp, a: i128, b: i128) -> Result<Value, RuntimeError> {
    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div | ArithOp::Mod if b == 0 => return Err(RuntimeError::DivisionByZero),
        ArithOp::Div => {
            let quotient = a / b;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                quotient - 1
            } else {
                quotient
            }
        }
        ArithOp::Mod => {
            let rem = a % b;
            if rem != 0 && ((rem < 0) != (b < 0)) {
                rem + b
            } else {
                rem
            }
        }
    };
    Ok(value_from_i128(result))
}

fn big_arith(op: ArithOp, a: BigInt, b: BigInt) -> Result<Value, RuntimeError> {
    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div | ArithOp::Mod if b.is_zero() => {
            return Err(RuntimeError::DivisionByZero);
        }
        ArithOp::Div => {
            let quotient = &a / &b;
            let rem = &a % &b;
            if !rem.is_zero() && (rem.is_negative() != b.is_negative()) {
                quotient - BigInt::from(1)
            } else {
                quotient
            }
        }
        ArithOp::Mod => {
            let rem = &a % &b;
            if !rem.is_zero() && (rem.is_negative() != b.is_negative()) {
                rem + b
            } else {
                rem
            }
        }
    };
    Ok(Value::from_bigint(result))
}

fn float_arith(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
    }
}

pub fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering, RuntimeError> {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
        (Value::Double(_), _) | (_, Value::Double(_)) => match (to_f64(lhs), to_f64(rhs)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or(RuntimeError::NotYetImplemented {
                operation: "compare",
                kind: "NaN",
            }),
            _ => Err(unsupported("compare", lhs, rhs)),
        },
        _ => match (to_big(lhs), to_big(rhs)) {
            (Some(a), Some(b)) => Ok(a.cmp(&b)),
            _ => Err(unsupported("compare", lhs, rhs)),
        },
    }
}

/// Numeric equality; anything non-numeric is simply unequal.
pub fn equals(lhs: &Value, rhs: &Value) -> bool {
    matches!(compare(lhs, rhs), Ok(Ordering::Equal))
}

/// `value + delta` for the fused increment instructions.
pub fn increment(value: &Value, delta: i64, operation: &'static str) -> Result<Value, RuntimeError> {
    match value {
        Value::Integer(_) | Value::Double(_) | Value::BigInteger(_) => {
            arith(ArithOp::Add, value, &Value::Integer(delta))
        }
        other => Err(RuntimeError::NotYetImplemented {
            operation,
            kind: other.kind_name(),
        }),
    }
}

pub fn add(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(arith(ArithOp::Add, receiver, arg(args, 0)?)?)
}

pub fn sub(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(arith(ArithOp::Sub, receiver, arg(args, 0)?)?)
}

pub fn mul(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(arith(ArithOp::Mul, receiver, arg(args, 0)?)?)
}

pub fn div(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(arith(ArithOp::Div, receiver, arg(args, 0)?)?)
}

pub fn modulo(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(arith(ArithOp::Mod, receiver, arg(args, 0)?)?)
}

pub fn lt(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::boolean(compare(receiver, arg(args, 0)?)?.is_lt()))
}

pub fn le(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::boolean(compare(receiver, arg(args, 0)?)?.is_le()))
}

pub fn gt(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::boolean(compare(receiver, arg(args, 0)?)?.is_gt()))
}

pub fn ge(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::boolean(compare(receiver, arg(args, 0)?)?.is_ge()))
}

pub fn eq(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::boolean(equals(receiver, arg(args, 0)?)))
}

pub fn ne(_u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::boolean(!equals(receiver, arg(args, 0)?)))
}

pub fn as_double(_u: &Universe, receiver: &Value, _args: &[Value]) -> Result<Value, Unwind> {
    to_f64(receiver)
        .map(Value::Double)
        .ok_or_else(|| RuntimeError::type_error("integer", receiver).into())
}

/// `start to: limit do: block`, evaluated by the primitive rather than
/// inlined into the caller.
pub fn to_do(u: &Universe, receiver: &Value, args: &[Value]) -> Result<Value, Unwind> {
    let start = expect_integer(receiver)?;
    let limit = match arg(args, 0)? {
        Value::Double(limit) => limit.floor() as i64,
        other => expect_integer(other)?,
    };
    let block_value = arg(args, 1)?;
    let block = expect_block(block_value)?;
    let mut i = start;
    while i <= limit {
        block.invoke_2(u, block_value.clone(), Value::Integer(i))?;
        match i.checked_add(1) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(receiver.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: Value) -> i64 {
        value.as_integer().expect("integer result")
    }

    #[test]
    fn overflow_promotes_and_demotes() {
        let big = arith(ArithOp::Add, &Value::Integer(i64::MAX), &Value::Integer(1)).unwrap();
        assert!(matches!(big, Value::BigInteger(_)));
        let back = arith(ArithOp::Sub, &big, &Value::Integer(1)).unwrap();
        assert_eq!(int(back), i64::MAX);
        assert_eq!(compare(&big, &Value::Integer(i64::MAX)).unwrap(), Ordering::Greater);
    }

    #[test]
    fn division_rounds_down() {
        let div = |a, b| int(arith(ArithOp::Div, &Value::Integer(a), &Value::Integer(b)).unwrap());
        let rem = |a, b| int(arith(ArithOp::Mod, &Value::Integer(a), &Value::Integer(b)).unwrap());
        assert_eq!(div(7, 2), 3);
        assert_eq!(div(-7, 2), -4);
        assert_eq!(div(7, -2), -4);
        assert_eq!(rem(-7, 2), 1);
        assert_eq!(rem(7, -2), -1);
        assert!(matches!(
            arith(ArithOp::Div, &Value::Integer(1), &Value::Integer(0)),
            Err(RuntimeError::DivisionByZero)
        ));
    }

    #[test]
    fn doubles_are_contagious() {
        let sum = arith(ArithOp::Add, &Value::Integer(1), &Value::Double(0.5)).unwrap();
        assert!(matches!(sum, Value::Double(d) if d == 1.5));
        assert!(equals(&Value::Integer(2), &Value::Double(2.0)));
        assert!(!equals(&Value::Integer(2), &Value::Nil));
    }

    #[test]
    fn to_do_stops_at_the_largest_integer() {
        use object::LexicalScope;

        use crate::MethodBuilder;

        let u = Universe::default();
        let class = u.define_class("Counter", &u.classes.object, &["count"]);
        // run: n = ( count := 0. n to: n do: [ :i | count := count + 1 ]. ^ count )
        let scope = LexicalScope::new(None, &[false], &[], true);
        let mut body = MethodBuilder::block(&u, LexicalScope::new(Some(scope.clone()), &[false], &[], false));
        body.code().inc_field_push(0, 1);
        body.code().return_local();
        let body = body.finish().unwrap();

        let mut run = MethodBuilder::method(&u, "run:", scope);
        run.code().push_0();
        run.code().pop_field(0, 0);
        run.code().push_argument(1, 0);
        run.code().push_argument(1, 0);
        run.push_block(body).unwrap();
        run.send("to:do:").unwrap();
        run.code().pop();
        run.code().return_field(0);
        class.add_method(run.finish().unwrap().into());

        let receiver = Value::Instance(object::Instance::new(&class));
        let count = u.send(receiver, "run:", vec![Value::Integer(i64::MAX)]).unwrap();
        assert_eq!(count.as_integer(), Some(1));
    }

    #[test]
    fn increment_rejects_non_numbers() {
        assert_eq!(int(increment(&Value::Integer(4), -1, "dec").unwrap()), 3);
        assert!(matches!(
            increment(&Value::Nil, 1, "inc"),
            Err(RuntimeError::NotYetImplemented {
                operation: "inc",
                kind: "nil"
            })
        ));
    }
}
