use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::method::Method;
use crate::value::Value;

/// Heap part of an activation: variables captured by nested blocks plus
/// the marker non-local returns check.
///
/// Slot 0 holds the activation's receiver.
#[derive(Debug)]
pub struct Context {
    on_stack: Cell<bool>,
    slots: RefCell<Box<[Value]>>,
}

impl Context {
    pub fn new(size: usize, receiver: Value) -> Rc<Self> {
        let mut slots = vec![Value::Nil; size.max(1)];
        slots[0] = receiver;
        Rc::new(Self {
            on_stack: Cell::new(true),
            slots: RefCell::new(slots.into_boxed_slice()),
        })
    }

    #[inline(always)]
    pub fn get(&self, idx: usize) -> Value {
        self.slots.borrow()[idx].clone()
    }

    #[inline(always)]
    pub fn set(&self, idx: usize, value: Value) {
        self.slots.borrow_mut()[idx] = value;
    }

    pub fn receiver(&self) -> Value {
        self.get(0)
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the owning activation is still running.
    pub fn is_on_stack(&self) -> bool {
        self.on_stack.get()
    }

    pub fn mark_off_stack(&self) {
        self.on_stack.set(false);
    }
}

/// A closure: block method plus the context it was created in.
pub struct Block {
    method: Rc<Method>,
    context: Option<Rc<Context>>,
}

impl Block {
    pub fn new(method: Rc<Method>, context: Option<Rc<Context>>) -> Rc<Self> {
        Rc::new(Self { method, context })
    }

    pub fn method(&self) -> &Rc<Method> {
        &self.method
    }

    pub fn context(&self) -> Option<&Rc<Context>> {
        self.context.as_ref()
    }

    /// Number of values the block takes, itself included.
    pub fn arity(&self) -> usize {
        self.method.num_args()
    }

    /// Read slot `idx` of the enclosing context.
    pub fn get_from_outer(&self, idx: usize) -> Option<Value> {
        self.context.as_ref().map(|context| context.get(idx))
    }

    /// Whether the enclosing activation is still running.
    pub fn is_outer_on_stack(&self) -> bool {
        self.context
            .as_ref()
            .is_some_and(|context| context.is_on_stack())
    }
}
