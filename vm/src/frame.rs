use std::rc::Rc;

use object::{Block, Context, Method, Value, VarLocation};

use crate::error::RuntimeError;

/// Local part of an activation.
///
/// Slot 0 is the receiver (the block itself for block activations),
/// followed by the arguments and locals no nested block captures. The
/// captured ones live in `context`, which blocks created by this
/// activation share.
#[derive(Debug)]
pub struct Frame {
    slots: Box<[Value]>,
    context: Option<Rc<Context>>,
}

impl Frame {
    fn new(method: &Method, receiver: Value) -> Self {
        let context = match method.inner_size() {
            0 => None,
            size => Some(Context::new(size, receiver.clone())),
        };
        let mut slots = vec![Value::Nil; method.frame_size().max(1)].into_boxed_slice();
        slots[0] = receiver;
        Self { slots, context }
    }

    fn place(&mut self, location: VarLocation, value: Value) {
        match location {
            VarLocation::Frame(idx) => self.slots[idx] = value,
            VarLocation::Inner(idx) => {
                if let Some(context) = &self.context {
                    context.set(idx, value);
                }
            }
        }
    }

    pub fn create_1(method: &Method, receiver: Value) -> Self {
        debug_assert_eq!(method.num_args(), 1);
        Self::new(method, receiver)
    }

    pub fn create_2(method: &Method, receiver: Value, arg: Value) -> Self {
        debug_assert_eq!(method.num_args(), 2);
        let mut frame = Self::new(method, receiver);
        frame.place(method.argument_locations()[0], arg);
        frame
    }

    pub fn create_3(method: &Method, receiver: Value, arg1: Value, arg2: Value) -> Self {
        debug_assert_eq!(method.num_args(), 3);
        let mut frame = Self::new(method, receiver);
        let locations = method.argument_locations();
        frame.place(locations[0], arg1);
        frame.place(locations[1], arg2);
        frame
    }

    pub fn create_n(method: &Method, receiver: Value, args: Vec<Value>) -> Self {
        debug_assert_eq!(method.num_args(), args.len() + 1);
        let mut frame = Self::new(method, receiver);
        for (&location, arg) in method.argument_locations().iter().zip(args) {
            frame.place(location, arg);
        }
        frame
    }

    #[inline(always)]
    pub fn receiver(&self) -> &Value {
        &self.slots[0]
    }

    #[inline(always)]
    pub fn get(&self, idx: usize) -> Value {
        self.slots[idx].clone()
    }

    #[inline(always)]
    pub fn set(&mut self, idx: usize, value: Value) {
        self.slots[idx] = value;
    }

    pub fn context(&self) -> Option<&Rc<Context>> {
        self.context.as_ref()
    }

    fn own_context(&self) -> Result<&Rc<Context>, RuntimeError> {
        self.context.as_ref().ok_or(RuntimeError::TypeError {
            expected: "activation with a context",
            got: "activation without one",
        })
    }

    /// Block `level` steps out: level 1 is the running block itself, each
    /// further level is the receiver of the enclosing context.
    pub fn block_at(&self, level: u8) -> Result<Rc<Block>, RuntimeError> {
        let mut block = match self.receiver() {
            Value::Block(block) => block.clone(),
            other => return Err(RuntimeError::type_error("block", other)),
        };
        for _ in 1..level {
            let outer = block
                .get_from_outer(0)
                .ok_or(RuntimeError::type_error("block with a context", &Value::Nil))?;
            block = match outer {
                Value::Block(outer) => outer,
                other => return Err(RuntimeError::type_error("block", &other)),
            };
        }
        Ok(block)
    }

    /// Context `level` lexical scopes out; level 0 is this activation's.
    pub fn context_at(&self, level: u8) -> Result<Rc<Context>, RuntimeError> {
        if level == 0 {
            return self.own_context().cloned();
        }
        let block = self.block_at(level)?;
        block
            .context()
            .cloned()
            .ok_or(RuntimeError::type_error("block with a context", &Value::Nil))
    }

    /// `self` as seen `level` lexical scopes out.
    pub fn self_at(&self, level: u8) -> Result<Value, RuntimeError> {
        match level {
            0 => Ok(self.receiver().clone()),
            level => Ok(self.context_at(level)?.receiver()),
        }
    }

    /// Receiver of the method this activation is lexically nested in.
    pub fn dynamic_self(&self) -> Value {
        let mut value = self.receiver().clone();
        while let Value::Block(block) = &value {
            match block.get_from_outer(0) {
                Some(outer) => value = outer,
                None => break,
            }
        }
        value
    }

    /// Mark the context as no longer running. Non-local returns aimed at it
    /// from now on take the escaped-block path.
    pub fn finish(&self) {
        if let Some(context) = &self.context {
            context.mark_off_stack();
        }
    }
}
