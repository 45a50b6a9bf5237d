use std::rc::Rc;

use object::{Block, Invokable, Method, Primitive, Value};

use crate::activation;
use crate::error::{RuntimeError, Unwind};
use crate::frame::Frame;
use crate::Universe;

/// Arity-specialized calls. The count in the name includes the receiver.
pub trait Invoke {
    fn invoke_1(&self, u: &Universe, receiver: Value) -> Result<Value, Unwind>;

    fn invoke_2(&self, u: &Universe, receiver: Value, arg: Value) -> Result<Value, Unwind>;

    fn invoke_3(
        &self,
        u: &Universe,
        receiver: Value,
        arg1: Value,
        arg2: Value,
    ) -> Result<Value, Unwind>;

    fn invoke_n(&self, u: &Universe, receiver: Value, args: Vec<Value>) -> Result<Value, Unwind>;
}

impl Invoke for Rc<Method> {
    fn invoke_1(&self, u: &Universe, receiver: Value) -> Result<Value, Unwind> {
        activation::run(u, self, Frame::create_1(self, receiver))
    }

    fn invoke_2(&self, u: &Universe, receiver: Value, arg: Value) -> Result<Value, Unwind> {
        activation::run(u, self, Frame::create_2(self, receiver, arg))
    }

    fn invoke_3(
        &self,
        u: &Universe,
        receiver: Value,
        arg1: Value,
        arg2: Value,
    ) -> Result<Value, Unwind> {
        activation::run(u, self, Frame::create_3(self, receiver, arg1, arg2))
    }

    fn invoke_n(&self, u: &Universe, receiver: Value, args: Vec<Value>) -> Result<Value, Unwind> {
        match args.len() {
            0 => self.invoke_1(u, receiver),
            1 => {
                let mut args = args.into_iter();
                let arg = args.next().unwrap_or(Value::Nil);
                self.invoke_2(u, receiver, arg)
            }
            _ => activation::run(u, self, Frame::create_n(self, receiver, args)),
        }
    }
}

impl Invoke for Primitive {
    fn invoke_1(&self, u: &Universe, receiver: Value) -> Result<Value, Unwind> {
        self.invoke_n(u, receiver, Vec::new())
    }

    fn invoke_2(&self, u: &Universe, receiver: Value, arg: Value) -> Result<Value, Unwind> {
        call_primitive(u, self, &receiver, &[arg])
    }

    fn invoke_3(
        &self,
        u: &Universe,
        receiver: Value,
        arg1: Value,
        arg2: Value,
    ) -> Result<Value, Unwind> {
        call_primitive(u, self, &receiver, &[arg1, arg2])
    }

    fn invoke_n(&self, u: &Universe, receiver: Value, args: Vec<Value>) -> Result<Value, Unwind> {
        call_primitive(u, self, &receiver, &args)
    }
}

fn call_primitive(
    u: &Universe,
    primitive: &Primitive,
    receiver: &Value,
    args: &[Value],
) -> Result<Value, Unwind> {
    let desc = u.primitive(primitive.index()).ok_or(RuntimeError::NotYetImplemented {
        operation: "primitive",
        kind: "unregistered index",
    })?;
    (desc.func)(u, receiver, args)
}

impl Invoke for Invokable {
    fn invoke_1(&self, u: &Universe, receiver: Value) -> Result<Value, Unwind> {
        match self {
            Invokable::Method(method) => method.invoke_1(u, receiver),
            Invokable::Primitive(primitive) => primitive.invoke_1(u, receiver),
        }
    }

    fn invoke_2(&self, u: &Universe, receiver: Value, arg: Value) -> Result<Value, Unwind> {
        match self {
            Invokable::Method(method) => method.invoke_2(u, receiver, arg),
            Invokable::Primitive(primitive) => primitive.invoke_2(u, receiver, arg),
        }
    }

    fn invoke_3(
        &self,
        u: &Universe,
        receiver: Value,
        arg1: Value,
        arg2: Value,
    ) -> Result<Value, Unwind> {
        match self {
            Invokable::Method(method) => method.invoke_3(u, receiver, arg1, arg2),
            Invokable::Primitive(primitive) => primitive.invoke_3(u, receiver, arg1, arg2),
        }
    }

    fn invoke_n(&self, u: &Universe, receiver: Value, args: Vec<Value>) -> Result<Value, Unwind> {
        match self {
            Invokable::Method(method) => method.invoke_n(u, receiver, args),
            Invokable::Primitive(primitive) => primitive.invoke_n(u, receiver, args),
        }
    }
}

/// Blocks are evaluated with the block value itself as receiver, so
/// `receiver` is normally `Value::Block` of `self`.
impl Invoke for Rc<Block> {
    fn invoke_1(&self, u: &Universe, receiver: Value) -> Result<Value, Unwind> {
        check_block_arity(self, 1)?;
        self.method().invoke_1(u, receiver)
    }

    fn invoke_2(&self, u: &Universe, receiver: Value, arg: Value) -> Result<Value, Unwind> {
        check_block_arity(self, 2)?;
        self.method().invoke_2(u, receiver, arg)
    }

    fn invoke_3(
        &self,
        u: &Universe,
        receiver: Value,
        arg1: Value,
        arg2: Value,
    ) -> Result<Value, Unwind> {
        check_block_arity(self, 3)?;
        self.method().invoke_3(u, receiver, arg1, arg2)
    }

    fn invoke_n(&self, u: &Universe, receiver: Value, args: Vec<Value>) -> Result<Value, Unwind> {
        check_block_arity(self, args.len() + 1)?;
        self.method().invoke_n(u, receiver, args)
    }
}

fn check_block_arity(block: &Block, got: usize) -> Result<(), RuntimeError> {
    match block.arity() {
        expected if expected == got => Ok(()),
        expected => Err(RuntimeError::ArityMismatch { expected, got }),
    }
}

/// Evaluate a block, or answer any other value as is (`Object>>value`).
pub fn value_of(u: &Universe, value: &Value) -> Result<Value, Unwind> {
    match value {
        Value::Block(block) => block.invoke_1(u, value.clone()),
        other => Ok(other.clone()),
    }
}
