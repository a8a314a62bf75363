//! The component registry maps manifest names back to constructible types.
//!
//! Saving only needs a component's manifest; loading additionally needs to
//! build a blank instance of the right type from a record's name. Types opt
//! in by implementing [`Persist`], and every persisted type must be
//! registered before a load can resolve its records.

use std::any::TypeId;
use std::collections::HashMap;
use std::rc::Rc;

use crate::component::Component;
use crate::entity::PendingComponent;
use crate::error::SaveError;
use crate::save::manifest::Manifest;
use crate::system::EntityContext;

/// A component type that participates in save/load.
///
/// `manifest` describes the persisted fields; `blank` builds the instance a
/// load pass starts from, before any stored field is applied. `blank` runs
/// through the normal build path, so it may resolve siblings in `init` like
/// any other constructor.
pub trait Persist: Component + Sized {
    fn manifest() -> Rc<Manifest>;
    fn blank(cx: &mut EntityContext<'_>) -> Self;
}

/// One registered type: its manifest plus an erased blank constructor.
pub struct RegistryEntry {
    manifest: Rc<Manifest>,
    type_id: TypeId,
    type_name: &'static str,
    construct: Rc<dyn Fn(&mut EntityContext<'_>) -> Box<dyn Component>>,
}

impl RegistryEntry {
    fn of<T: Persist>() -> Self {
        Self {
            manifest: T::manifest(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            construct: Rc::new(|cx| Box::new(T::blank(cx))),
        }
    }

    #[must_use]
    pub fn manifest(&self) -> &Rc<Manifest> {
        &self.manifest
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn pending(&self) -> PendingComponent {
        let construct = Rc::clone(&self.construct);
        PendingComponent {
            type_id: self.type_id,
            type_name: self.type_name,
            construct: Box::new(move |cx| construct(cx)),
        }
    }
}

/// Registry of every [`Persist`] type a save pass may meet, keyed by
/// manifest name.
///
/// Registration is last-write-wins until [`finish`](Self::finish) seals the
/// registry; further registration attempts then fail.
#[derive(Default)]
pub struct ComponentRegistry {
    entries: HashMap<&'static str, Rc<RegistryEntry>>,
    finished: bool,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its manifest name.
    pub fn register<T: Persist>(&mut self) -> Result<(), SaveError> {
        if self.finished {
            return Err(SaveError::RegistryFinished);
        }
        let entry = Rc::new(RegistryEntry::of::<T>());
        self.entries.insert(entry.manifest.name(), entry);
        Ok(())
    }

    /// Copy every entry of `other` into this registry.
    pub fn include(&mut self, other: &ComponentRegistry) -> Result<(), SaveError> {
        if self.finished {
            return Err(SaveError::RegistryFinished);
        }
        for (name, entry) in &other.entries {
            self.entries.insert(name, Rc::clone(entry));
        }
        Ok(())
    }

    /// Look up the entry for a manifest name.
    pub fn get(&self, name: &str) -> Result<&RegistryEntry, SaveError> {
        self.entries
            .get(name)
            .map(Rc::as_ref)
            .ok_or_else(|| SaveError::UnknownComponent(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Whether `name` is registered to the exact type `type_id`. Saving uses
    /// this to reject components whose manifest name is claimed by another
    /// type (or by nothing).
    pub(crate) fn entry_matches(&self, name: &str, type_id: TypeId) -> bool {
        self.entries
            .get(name)
            .is_some_and(|entry| entry.type_id == type_id)
    }

    /// Seal the registry against further registration.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
