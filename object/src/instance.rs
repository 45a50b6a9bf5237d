use std::cell::RefCell;
use std::rc::Rc;

use crate::class::Class;
use crate::shape::{FieldKind, Shape, StorageLocation};
use crate::value::Value;

/// An instance of a user class.
///
/// Integer and double fields live unboxed in `primitives` as bit patterns;
/// `None` marks a primitive slot holding `nil`.
pub struct Instance {
    class: Rc<Class>,
    shape: RefCell<Rc<Shape>>,
    primitives: RefCell<Vec<Option<u64>>>,
    references: RefCell<Vec<Value>>,
}

impl Instance {
    pub fn new(class: &Rc<Class>) -> Rc<Self> {
        let shape = class.instance_layout();
        Rc::new(Self {
            class: class.clone(),
            primitives: RefCell::new(vec![None; shape.primitive_count()]),
            references: RefCell::new(vec![Value::Nil; shape.reference_count()]),
            shape: RefCell::new(shape),
        })
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn shape(&self) -> Rc<Shape> {
        self.shape.borrow().clone()
    }

    pub fn field_count(&self) -> usize {
        self.class.field_count()
    }

    /// The shape moved on since this object last adopted it.
    #[inline(always)]
    pub fn is_layout_stale(&self) -> bool {
        !self.shape.borrow().is_latest()
    }

    pub fn get_field(&self, idx: usize) -> Value {
        let shape = self.shape.borrow();
        match shape.physical_slot(idx) {
            StorageLocation::Unwritten => Value::Nil,
            StorageLocation::Reference(slot) => self.references.borrow()[slot].clone(),
            StorageLocation::Primitive(slot) => {
                match (self.primitives.borrow()[slot], shape.field_kind(idx)) {
                    (None, _) => Value::Nil,
                    (Some(bits), FieldKind::Double) => Value::Double(f64::from_bits(bits)),
                    (Some(bits), _) => Value::Integer(bits as i64),
                }
            }
        }
    }

    pub fn set_field(&self, idx: usize, value: Value) {
        if self.is_layout_stale() {
            self.migrate_to_class_layout();
        }
        if self.write(idx, &value) {
            return;
        }
        let next = match self.shape().field_kind(idx) {
            FieldKind::Unwritten => self
                .class
                .update_layout_with_initialized_field(idx, FieldKind::of(&value)),
            _ => self.class.update_layout_with_generalized_field(idx),
        };
        self.relayout(next);
        self.set_field(idx, value);
    }

    /// Adopt the class's current shape, carrying every field value over.
    pub fn migrate_to_class_layout(&self) {
        let target = self.class.instance_layout();
        if !Rc::ptr_eq(&target, &self.shape()) {
            self.relayout(target);
        }
    }

    /// Store `value` if the current shape accepts it as is.
    fn write(&self, idx: usize, value: &Value) -> bool {
        let shape = self.shape.borrow();
        if !shape.field_kind(idx).accepts(value) {
            return false;
        }
        match shape.physical_slot(idx) {
            StorageLocation::Unwritten => {}
            StorageLocation::Reference(slot) => {
                self.references.borrow_mut()[slot] = value.clone();
            }
            StorageLocation::Primitive(slot) => {
                let bits = match value {
                    Value::Integer(v) => Some(*v as u64),
                    Value::Double(d) => Some(d.to_bits()),
                    _ => None,
                };
                self.primitives.borrow_mut()[slot] = bits;
            }
        }
        true
    }

    fn relayout(&self, next: Rc<Shape>) {
        let values: Vec<Value> =
            (0..self.field_count()).map(|idx| self.get_field(idx)).collect();
        *self.primitives.borrow_mut() = vec![None; next.primitive_count()];
        *self.references.borrow_mut() = vec![Value::Nil; next.reference_count()];
        *self.shape.borrow_mut() = next;
        for (idx, value) in values.into_iter().enumerate() {
            if !value.is_nil() && !self.write(idx, &value) {
                self.set_field(idx, value);
            }
        }
    }
}
