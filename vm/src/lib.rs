pub mod activation;
pub mod compile;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod invoke;
pub mod ops;
pub mod primitives;
pub mod programs;
pub mod stack;
pub mod threaded;
pub mod tier1;
pub mod tier2;
pub mod tiers;
pub mod tstack;

use std::cell::{Cell, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use object::{Class, Invokable, Method, MethodId, Primitive, Shape, Symbol, SymbolTable, Value};

pub use compile::{CompileError, MethodBuilder};
pub use error::{RuntimeError, Unwind};
pub use invoke::Invoke;
pub use tiers::{TierConfig, TierMode};

use primitives::PrimitiveDesc;
use threaded::ThreadedProgram;
use tstack::TStackPool;

/// Classes the engine itself needs to know about.
pub struct CoreClasses {
    pub object: Rc<Class>,
    pub class: Rc<Class>,
    pub nil: Rc<Class>,
    pub boolean: Rc<Class>,
    pub true_class: Rc<Class>,
    pub false_class: Rc<Class>,
    pub integer: Rc<Class>,
    pub double: Rc<Class>,
    pub string: Rc<Class>,
    pub symbol: Rc<Class>,
    pub array: Rc<Class>,
    pub block: Rc<Class>,
    pub method: Rc<Class>,
    pub primitive: Rc<Class>,
}

/// Selectors the engine sends on its own.
pub struct Selectors {
    pub does_not_understand: Symbol,
    pub escaped_block: Symbol,
    pub unknown_global: Symbol,
}

/// All state shared by the activations of one program run.
pub struct Universe {
    pub symbols: SymbolTable,
    pub classes: CoreClasses,
    pub selectors: Selectors,
    globals: RefCell<HashMap<Symbol, Value, ahash::RandomState>>,
    primitives: Vec<PrimitiveDesc>,
    config: TierConfig,
    tstacks: RefCell<TStackPool>,
    threaded: RefCell<HashMap<MethodId, Rc<ThreadedProgram>, ahash::RandomState>>,
    depth: Cell<usize>,
    transfers: Cell<TransferCounts>,
}

/// How often activations changed tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferCounts {
    pub to_tier2: u32,
    pub to_tier1: u32,
}

/// Leaves one activation level when dropped.
pub struct DepthGuard<'u> {
    depth: &'u Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

impl Universe {
    /// Bootstrap the core classes and install the primitive library.
    pub fn new(config: TierConfig) -> Self {
        let symbols = SymbolTable::new();
        let object = Class::new(symbols.intern("Object"), None, vec![]);
        let subclass = |name: &str, superclass: &Rc<Class>| {
            Class::new(symbols.intern(name), Some(superclass.clone()), vec![])
        };
        let class = subclass("Class", &object);
        let boolean = subclass("Boolean", &object);
        let classes = CoreClasses {
            nil: subclass("Nil", &object),
            true_class: subclass("True", &boolean),
            false_class: subclass("False", &boolean),
            integer: subclass("Integer", &object),
            double: subclass("Double", &object),
            string: subclass("String", &object),
            symbol: subclass("Symbol", &object),
            array: subclass("Array", &object),
            block: subclass("Block", &object),
            method: subclass("Method", &object),
            primitive: subclass("Primitive", &object),
            object,
            class,
            boolean,
        };
        let selectors = Selectors {
            does_not_understand: symbols.intern("doesNotUnderstand:arguments:"),
            escaped_block: symbols.intern("escapedBlock:"),
            unknown_global: symbols.intern("unknownGlobal:"),
        };
        let universe = Self {
            symbols,
            classes,
            selectors,
            globals: RefCell::new(HashMap::default()),
            primitives: primitives::default_primitives(),
            config,
            tstacks: RefCell::new(TStackPool::new()),
            threaded: RefCell::new(HashMap::default()),
            depth: Cell::new(0),
            transfers: Cell::new(TransferCounts::default()),
        };
        universe.register_core_classes();
        universe.install_primitives();
        universe
    }

    fn register_core_classes(&self) {
        let c = &self.classes;
        for class in [
            &c.object,
            &c.class,
            &c.nil,
            &c.boolean,
            &c.true_class,
            &c.false_class,
            &c.integer,
            &c.double,
            &c.string,
            &c.symbol,
            &c.array,
            &c.block,
            &c.method,
            &c.primitive,
        ] {
            self.attach_metaclass(class);
            self.globals
                .borrow_mut()
                .insert(class.name().clone(), Value::Class(class.clone()));
        }
        self.set_global("nil", Value::Nil);
        self.set_global("true", Value::True);
        self.set_global("false", Value::False);
    }

    /// `X class`, inheriting from the superclass's metaclass or from
    /// `Class` at the root.
    fn attach_metaclass(&self, class: &Rc<Class>) {
        let superclass = class
            .superclass()
            .and_then(|superclass| superclass.metaclass())
            .unwrap_or_else(|| self.classes.class.clone());
        let name = self.intern(&format!("{} class", class.name()));
        class.set_metaclass(Class::new(name, Some(superclass), vec![]));
    }

    fn install_primitives(&self) {
        for (index, desc) in self.primitives.iter().enumerate() {
            let (name, meta) = match desc.holder.strip_suffix(" class") {
                Some(name) => (name, true),
                None => (desc.holder, false),
            };
            let holder = match self.global(&self.intern(name)) {
                Some(Value::Class(class)) if meta => class.metaclass(),
                Some(Value::Class(class)) => Some(class),
                _ => None,
            };
            let Some(holder) = holder else {
                log::warn!("no class {} for primitive {}", desc.holder, desc.selector);
                continue;
            };
            let primitive = Primitive::new(self.intern(desc.selector), index);
            holder.add_method(Invokable::Primitive(primitive));
        }
        log::debug!("installed {} primitives", self.primitives.len());
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    pub fn intern(&self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    pub fn class_of(&self, value: &Value) -> Rc<Class> {
        let c = &self.classes;
        match value {
            Value::Nil => c.nil.clone(),
            Value::True => c.true_class.clone(),
            Value::False => c.false_class.clone(),
            Value::Integer(_) | Value::BigInteger(_) => c.integer.clone(),
            Value::Double(_) => c.double.clone(),
            Value::Symbol(_) => c.symbol.clone(),
            Value::String(_) => c.string.clone(),
            Value::Array(_) => c.array.clone(),
            Value::Instance(instance) => instance.class().clone(),
            Value::Class(class) => class.metaclass().unwrap_or_else(|| c.class.clone()),
            Value::Block(_) => c.block.clone(),
            Value::Method(_) => c.method.clone(),
            Value::Primitive(_) => c.primitive.clone(),
        }
    }

    /// Shape dispatch caches key on: the object's own shape for instances,
    /// the class layout for everything else.
    pub fn shape_of(&self, value: &Value, class: &Class) -> Rc<Shape> {
        match value {
            Value::Instance(instance) => instance.shape(),
            _ => class.instance_layout(),
        }
    }

    pub fn global(&self, name: &Symbol) -> Option<Value> {
        self.globals.borrow().get(name).cloned()
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.globals.borrow_mut().insert(self.intern(name), value);
    }

    /// Create a class with a metaclass and bind it as a global.
    pub fn define_class(&self, name: &str, superclass: &Rc<Class>, fields: &[&str]) -> Rc<Class> {
        let fields = fields.iter().map(|field| self.intern(field)).collect();
        let class = Class::new(self.intern(name), Some(superclass.clone()), fields);
        self.attach_metaclass(&class);
        self.set_global(name, Value::Class(class.clone()));
        class
    }

    pub fn primitive(&self, index: usize) -> Option<&PrimitiveDesc> {
        self.primitives.get(index)
    }

    /// Account for one more nested activation.
    pub fn enter(&self) -> Result<DepthGuard<'_>, RuntimeError> {
        let depth = self.depth.get() + 1;
        if depth > self.config.max_depth {
            return Err(RuntimeError::StackOverflow { depth });
        }
        self.depth.set(depth);
        Ok(DepthGuard { depth: &self.depth })
    }

    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    pub fn transfers(&self) -> TransferCounts {
        self.transfers.get()
    }

    pub(crate) fn count_transfer(&self, to_tier2: bool) {
        let mut counts = self.transfers.get();
        if to_tier2 {
            counts.to_tier2 += 1;
        } else {
            counts.to_tier1 += 1;
        }
        self.transfers.set(counts);
    }

    pub fn tstacks(&self) -> RefMut<'_, TStackPool> {
        self.tstacks.borrow_mut()
    }

    /// Threaded program of `method`, built on first use once the method
    /// is warm. Cold methods get `None`.
    pub fn threaded_program(
        &self,
        method: &Method,
    ) -> Result<Option<Rc<ThreadedProgram>>, RuntimeError> {
        if method.invocations() < self.config.warm_threshold {
            return Ok(None);
        }
        if let Some(program) = self.threaded.borrow().get(&method.id()) {
            return Ok(Some(program.clone()));
        }
        let program = Rc::new(threaded::compile(self, method)?);
        self.threaded
            .borrow_mut()
            .insert(method.id(), program.clone());
        Ok(Some(program))
    }

    /// Uncached send, for callers outside the interpreter loops.
    pub fn send(&self, receiver: Value, selector: &str, args: Vec<Value>) -> Result<Value, Unwind> {
        dispatch::send_message(self, receiver, &self.intern(selector), args)
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new(TierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_of_literals() {
        let u = Universe::default();
        assert_eq!(u.class_of(&Value::Integer(3)).name().as_str(), "Integer");
        assert_eq!(u.class_of(&Value::True).name().as_str(), "True");
        assert_eq!(u.class_of(&Value::Nil).name().as_str(), "Nil");
        let array = Value::Class(u.classes.array.clone());
        assert_eq!(u.class_of(&array).name().as_str(), "Array class");
    }

    #[test]
    fn metaclasses_follow_the_class_hierarchy() {
        let u = Universe::default();
        let point = u.define_class("Point", &u.classes.object, &["x", "y"]);
        let meta = point.metaclass().unwrap();
        assert!(meta.is_subclass_of(&u.classes.object.metaclass().unwrap()));
        assert!(meta.is_subclass_of(&u.classes.class));
        assert!(meta.lookup_invokable(&u.intern("new")).is_some());
        assert!(matches!(u.global(&u.intern("Point")), Some(Value::Class(_))));
    }

    #[test]
    fn primitives_land_on_their_holders() {
        let u = Universe::default();
        let plus = u.intern("+");
        assert!(u.classes.integer.local_method(&plus).is_some());
        assert!(u.classes.double.local_method(&plus).is_some());
        let new = u.intern("new:");
        let array_meta = u.classes.array.metaclass().unwrap();
        assert!(array_meta.local_method(&new).is_some());
        assert!(u.classes.array.local_method(&new).is_none());
        assert!(u
            .classes
            .true_class
            .lookup_invokable(&u.intern("ifTrue:"))
            .is_some());
    }

    #[test]
    fn depth_is_limited_and_restored() {
        let u = Universe::new(TierConfig::default().with_max_depth(2));
        {
            let _a = u.enter().unwrap();
            let _b = u.enter().unwrap();
            assert!(matches!(
                u.enter(),
                Err(RuntimeError::StackOverflow { depth: 3 })
            ));
        }
        assert_eq!(u.depth(), 0);
    }
}
