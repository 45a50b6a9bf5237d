use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// What a field has held so far.
///
/// Kinds only ever widen: `Unwritten` to a numeric kind or `Reference`,
/// and a numeric kind to `Reference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Unwritten,
    Integer,
    Double,
    Reference,
}

impl FieldKind {
    /// The narrowest kind able to store `value`. `nil` fits every kind.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Nil => FieldKind::Unwritten,
            Value::Integer(_) => FieldKind::Integer,
            Value::Double(_) => FieldKind::Double,
            _ => FieldKind::Reference,
        }
    }

    pub fn is_primitive(self) -> bool {
        matches!(self, FieldKind::Integer | FieldKind::Double)
    }

    /// Whether a field of this kind can hold `value` without a transition.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Nil) => true,
            (FieldKind::Integer, Value::Integer(_)) => true,
            (FieldKind::Double, Value::Double(_)) => true,
            (FieldKind::Reference, _) => true,
            _ => false,
        }
    }
}

/// Physical home of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageLocation {
    /// Never written; reads yield `nil`.
    Unwritten,
    /// Index into the unboxed primitive storage.
    Primitive(usize),
    /// Index into the reference storage.
    Reference(usize),
}

/// Field layout shared by the instances of one class.
///
/// A shape never changes once created, except for its `latest` flag: a
/// transition produces a new shape and marks the old one stale. Objects
/// still pointing at a stale shape are migrated before dispatch trusts
/// their layout.
pub struct Shape {
    kinds: Box<[FieldKind]>,
    locations: Box<[StorageLocation]>,
    primitive_count: usize,
    reference_count: usize,
    latest: Cell<bool>,
}

impl Shape {
    /// A shape with `field_count` unwritten fields.
    pub fn new(field_count: usize) -> Rc<Self> {
        Rc::new(Self::from_kinds(vec![FieldKind::Unwritten; field_count]))
    }

    fn from_kinds(kinds: Vec<FieldKind>) -> Self {
        let mut primitive_count = 0;
        let mut reference_count = 0;
        let locations = kinds
            .iter()
            .map(|kind| match kind {
                FieldKind::Unwritten => StorageLocation::Unwritten,
                FieldKind::Integer | FieldKind::Double => {
                    primitive_count += 1;
                    StorageLocation::Primitive(primitive_count - 1)
                }
                FieldKind::Reference => {
                    reference_count += 1;
                    StorageLocation::Reference(reference_count - 1)
                }
            })
            .collect();
        Self {
            kinds: kinds.into_boxed_slice(),
            locations,
            primitive_count,
            reference_count,
            latest: Cell::new(true),
        }
    }

    pub fn field_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn field_kind(&self, idx: usize) -> FieldKind {
        self.kinds[idx]
    }

    /// Storage class and index of field `idx`.
    pub fn physical_slot(&self, idx: usize) -> StorageLocation {
        self.locations[idx]
    }

    pub fn primitive_count(&self) -> usize {
        self.primitive_count
    }

    pub fn reference_count(&self) -> usize {
        self.reference_count
    }

    #[inline(always)]
    pub fn is_latest(&self) -> bool {
        self.latest.get()
    }

    /// Same per-field kinds, regardless of identity.
    pub fn same_layout(&self, other: &Shape) -> bool {
        self.kinds == other.kinds
    }

    /// Record that field `idx` received a value of `kind`.
    ///
    /// Returns `self` when the field already accepts the kind. Writing the
    /// other numeric kind into a numeric field generalizes it instead.
    pub fn with_initialized_field(
        self: &Rc<Self>,
        idx: usize,
        kind: FieldKind,
    ) -> Rc<Self> {
        let current = self.kinds[idx];
        let next = match (current, kind) {
            (_, FieldKind::Unwritten) => return self.clone(),
            (FieldKind::Reference, _) => return self.clone(),
            (current, kind) if current == kind => return self.clone(),
            (FieldKind::Unwritten, kind) => kind,
            _ => FieldKind::Reference,
        };
        self.transition(idx, next)
    }

    /// Force field `idx` to `Reference`.
    pub fn with_generalized_field(self: &Rc<Self>, idx: usize) -> Rc<Self> {
        if self.kinds[idx] == FieldKind::Reference {
            return self.clone();
        }
        self.transition(idx, FieldKind::Reference)
    }

    fn transition(&self, idx: usize, kind: FieldKind) -> Rc<Self> {
        let mut kinds = self.kinds.to_vec();
        kinds[idx] = kind;
        self.latest.set(false);
        log::trace!("shape transition: field {idx} {:?} -> {kind:?}", self.kinds[idx]);
        Rc::new(Self::from_kinds(kinds))
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("kinds", &self.kinds)
            .field("latest", &self.latest.get())
            .finish()
    }
}
