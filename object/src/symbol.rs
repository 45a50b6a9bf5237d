use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

/// An interned selector or global name.
///
/// Symbols from the same [`SymbolTable`] compare and hash by id only.
#[derive(Clone)]
pub struct Symbol {
    id: SymbolId,
    text: Arc<str>,
}

impl Symbol {
    pub fn id(&self) -> SymbolId {
        self.id
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of stack values a send of this selector consumes, counting
    /// the receiver.
    pub fn arity(&self) -> usize {
        selector_arity(&self.text)
    }
}

fn selector_arity(selector: &str) -> usize {
    let Some(first) = selector.chars().next() else {
        return 1;
    };
    if !first.is_alphabetic() && first != '_' {
        return 2;
    }
    1 + selector.chars().filter(|&c| c == ':').count()
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.text)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

struct SymbolTableImpl {
    by_id: Vec<Arc<str>>,
    by_name: HashMap<Arc<str>, SymbolId, ahash::RandomState>,
}

impl SymbolTableImpl {
    fn new() -> Self {
        Self {
            by_id: Vec::new(),
            by_name: HashMap::default(),
        }
    }

    fn get_or_add(&mut self, value: &str) -> Symbol {
        if let Some((text, &id)) = self.by_name.get_key_value(value) {
            return Symbol { id, text: text.clone() };
        }
        let id = SymbolId(self.by_id.len() as u32);
        let text: Arc<str> = Arc::from(value);
        self.by_id.push(text.clone());
        self.by_name.insert(text.clone(), id);
        Symbol { id, text }
    }
}

/// Interning table shared by everything that names selectors and globals.
///
/// Cloning the table yields another handle to the same symbols.
#[derive(Clone)]
pub struct SymbolTable(Arc<RwLock<SymbolTableImpl>>);

impl SymbolTable {
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(SymbolTableImpl::new())))
    }

    pub fn intern(&self, value: &str) -> Symbol {
        if let Some(symbol) = self.lookup(value) {
            return symbol;
        }
        self.0.write().get_or_add(value)
    }

    /// The symbol for `value` if it was interned before.
    pub fn lookup(&self, value: &str) -> Option<Symbol> {
        let table = self.0.read();
        let (text, &id) = table.by_name.get_key_value(value)?;
        Some(Symbol { id, text: text.clone() })
    }

    pub fn get(&self, id: SymbolId) -> Option<Symbol> {
        let table = self.0.read();
        let text = table.by_id.get(id.0 as usize)?.clone();
        Some(Symbol { id, text })
    }

    pub fn len(&self) -> usize {
        self.0.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
