use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::invokable::Invokable;
use crate::shape::{FieldKind, Shape};
use crate::symbol::Symbol;

/// A class: method dictionary, superclass link and the current shape of
/// its instances.
pub struct Class {
    name: Symbol,
    superclass: Option<Rc<Class>>,
    metaclass: RefCell<Option<Rc<Class>>>,
    field_names: Box<[Symbol]>,
    methods: RefCell<HashMap<Symbol, Invokable, ahash::RandomState>>,
    layout: RefCell<Rc<Shape>>,
}

impl Class {
    pub fn new(
        name: Symbol,
        superclass: Option<Rc<Class>>,
        field_names: Vec<Symbol>,
    ) -> Rc<Self> {
        let layout = Shape::new(field_names.len());
        Rc::new(Self {
            name,
            superclass,
            metaclass: RefCell::new(None),
            field_names: field_names.into_boxed_slice(),
            methods: RefCell::new(HashMap::default()),
            layout: RefCell::new(layout),
        })
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn superclass(&self) -> Option<&Rc<Class>> {
        self.superclass.as_ref()
    }

    /// The class of this class, if bootstrap has attached one.
    pub fn metaclass(&self) -> Option<Rc<Class>> {
        self.metaclass.borrow().clone()
    }

    pub fn set_metaclass(&self, metaclass: Rc<Class>) {
        *self.metaclass.borrow_mut() = Some(metaclass);
    }

    pub fn field_count(&self) -> usize {
        self.field_names.len()
    }

    pub fn field_index(&self, name: &Symbol) -> Option<usize> {
        self.field_names.iter().position(|field| field == name)
    }

    /// Install `invokable` under its signature and make this class its
    /// holder, including the block methods nested in it.
    pub fn add_method(self: &Rc<Self>, invokable: Invokable) {
        invokable.set_holder(self);
        self.methods
            .borrow_mut()
            .insert(invokable.signature().clone(), invokable);
    }

    /// Method defined directly in this class.
    pub fn local_method(&self, selector: &Symbol) -> Option<Invokable> {
        self.methods.borrow().get(selector).cloned()
    }

    /// Methods defined directly in this class, ordered by selector.
    pub fn local_methods(&self) -> Vec<Invokable> {
        let mut methods: Vec<Invokable> = self.methods.borrow().values().cloned().collect();
        methods.sort_by(|a, b| a.signature().as_str().cmp(b.signature().as_str()));
        methods
    }

    /// Full lookup through the superclass chain.
    pub fn lookup_invokable(&self, selector: &Symbol) -> Option<Invokable> {
        let mut class = Some(self);
        while let Some(current) = class {
            if let Some(found) = current.local_method(selector) {
                return Some(found);
            }
            class = current.superclass.as_deref();
        }
        None
    }

    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut class = Some(self);
        while let Some(current) = class {
            if std::ptr::eq(current, other) {
                return true;
            }
            class = current.superclass.as_deref();
        }
        false
    }

    /// Current shape for instances of this class.
    pub fn instance_layout(&self) -> Rc<Shape> {
        self.layout.borrow().clone()
    }

    /// Widen the class shape so field `idx` accepts `kind`.
    pub fn update_layout_with_initialized_field(
        &self,
        idx: usize,
        kind: FieldKind,
    ) -> Rc<Shape> {
        let current = self.instance_layout();
        let next = current.with_initialized_field(idx, kind);
        self.publish(&current, next)
    }

    /// Widen field `idx` of the class shape to `Reference`.
    pub fn update_layout_with_generalized_field(&self, idx: usize) -> Rc<Shape> {
        let current = self.instance_layout();
        let next = current.with_generalized_field(idx);
        self.publish(&current, next)
    }

    fn publish(&self, current: &Rc<Shape>, next: Rc<Shape>) -> Rc<Shape> {
        if !Rc::ptr_eq(current, &next) {
            log::trace!("{}: new instance shape {next:?}", self.name);
            *self.layout.borrow_mut() = next.clone();
        }
        next
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field(
                "superclass",
                &self.superclass.as_ref().map(|class| class.name.clone()),
            )
            .field("fields", &self.field_names)
            .finish_non_exhaustive()
    }
}
