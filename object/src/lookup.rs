use std::cell::RefCell;
use std::rc::Rc;

use crate::class::Class;
use crate::invokable::Invokable;
use crate::shape::Shape;
use crate::symbol::Symbol;

/// One observed (receiver shape, target) pair.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub shape: Rc<Shape>,
    pub target: Invokable,
}

/// Two-entry polymorphic inline cache of one send site.
///
/// The primary entry is filled by the first lookup and then kept; every
/// later miss overwrites the secondary entry.
#[derive(Debug, Default)]
pub struct InlineCache {
    primary: RefCell<Option<CacheEntry>>,
    secondary: RefCell<Option<CacheEntry>>,
}

impl InlineCache {
    pub fn primary(&self) -> Option<CacheEntry> {
        self.primary.borrow().clone()
    }

    pub fn secondary(&self) -> Option<CacheEntry> {
        self.secondary.borrow().clone()
    }

    #[inline(always)]
    fn check(slot: &RefCell<Option<CacheEntry>>, shape: &Rc<Shape>) -> Option<Invokable> {
        match &*slot.borrow() {
            Some(entry) if Rc::ptr_eq(&entry.shape, shape) => Some(entry.target.clone()),
            _ => None,
        }
    }

    /// Drop entries whose shape has been superseded.
    pub fn invalidate_stale(&self) {
        for slot in [&self.primary, &self.secondary] {
            let mut slot = slot.borrow_mut();
            if slot.as_ref().is_some_and(|entry| !entry.shape.is_latest()) {
                *slot = None;
            }
        }
    }

    pub fn clear(&self) {
        *self.primary.borrow_mut() = None;
        *self.secondary.borrow_mut() = None;
    }
}

/// Find the target of `selector` for a receiver of `class` laid out as
/// `shape`, consulting and filling `cache`.
///
/// A primary entry whose shape has been superseded counts as empty and
/// is refilled. Failed lookups are not cached.
pub fn lookup(
    class: &Class,
    shape: &Rc<Shape>,
    selector: &Symbol,
    cache: &InlineCache,
) -> Option<Invokable> {
    if let Some(target) = InlineCache::check(&cache.primary, shape) {
        return Some(target);
    }
    let primary_free = cache
        .primary
        .borrow()
        .as_ref()
        .is_none_or(|entry| !entry.shape.is_latest());
    if primary_free {
        let target = class.lookup_invokable(selector)?;
        log::trace!("{}>>{selector}: primary cache fill", class.name());
        *cache.primary.borrow_mut() = Some(CacheEntry {
            shape: shape.clone(),
            target: target.clone(),
        });
        return Some(target);
    }
    if let Some(target) = InlineCache::check(&cache.secondary, shape) {
        return Some(target);
    }
    let target = class.lookup_invokable(selector)?;
    log::trace!("{}>>{selector}: secondary cache fill", class.name());
    *cache.secondary.borrow_mut() = Some(CacheEntry {
        shape: shape.clone(),
        target: target.clone(),
    });
    Some(target)
}
