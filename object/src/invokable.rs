use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::class::Class;
use crate::method::Method;
use crate::symbol::Symbol;

/// A method implemented by the VM. `index` selects the native function in
/// the VM's primitive table.
pub struct Primitive {
    signature: Symbol,
    index: usize,
    holder: RefCell<Weak<Class>>,
}

impl Primitive {
    pub fn new(signature: Symbol, index: usize) -> Rc<Self> {
        Rc::new(Self {
            signature,
            index,
            holder: RefCell::new(Weak::new()),
        })
    }

    pub fn signature(&self) -> &Symbol {
        &self.signature
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn holder(&self) -> Option<Rc<Class>> {
        self.holder.borrow().upgrade()
    }

    pub fn set_holder(&self, class: &Rc<Class>) {
        *self.holder.borrow_mut() = Rc::downgrade(class);
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Primitive({}, {})", self.signature, self.index)
    }
}

/// Anything a send can land on.
#[derive(Debug, Clone)]
pub enum Invokable {
    Method(Rc<Method>),
    Primitive(Rc<Primitive>),
}

impl Invokable {
    pub fn signature(&self) -> &Symbol {
        match self {
            Invokable::Method(method) => method.signature(),
            Invokable::Primitive(primitive) => primitive.signature(),
        }
    }

    pub fn holder(&self) -> Option<Rc<Class>> {
        match self {
            Invokable::Method(method) => method.holder(),
            Invokable::Primitive(primitive) => primitive.holder(),
        }
    }

    pub fn set_holder(&self, class: &Rc<Class>) {
        match self {
            Invokable::Method(method) => method.set_holder(class),
            Invokable::Primitive(primitive) => primitive.set_holder(class),
        }
    }

    pub fn ptr_eq(&self, other: &Invokable) -> bool {
        match (self, other) {
            (Invokable::Method(a), Invokable::Method(b)) => Rc::ptr_eq(a, b),
            (Invokable::Primitive(a), Invokable::Primitive(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Rc<Method>> for Invokable {
    fn from(method: Rc<Method>) -> Self {
        Invokable::Method(method)
    }
}

impl From<Rc<Primitive>> for Invokable {
    fn from(primitive: Rc<Primitive>) -> Self {
        Invokable::Primitive(primitive)
    }
}
