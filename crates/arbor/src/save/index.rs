//! Scoped bidirectional mapping between live entities and stable string ids.
//!
//! A [`SavingIndex`] lives for the duration of one save or one load pass.
//! During save, ids are freshly generated; during load, ids come from the
//! record so that forward references in later records resolve against the
//! same id space.

use std::collections::HashMap;

use uuid::Uuid;

use crate::entity::EntityId;
use crate::error::SaveError;

/// Entity ↔ id mapping valid for one save or load operation.
#[derive(Debug, Default)]
pub struct SavingIndex {
    ids: HashMap<EntityId, String>,
    entities: HashMap<String, EntityId>,
}

impl SavingIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity under a freshly generated id. Registering an
    /// already-indexed entity is a no-op.
    pub fn register(&mut self, entity: EntityId) -> &str {
        if !self.ids.contains_key(&entity) {
            let id = self.fresh_id();
            self.entities.insert(id.clone(), entity);
            self.ids.insert(entity, id);
        }
        &self.ids[&entity]
    }

    /// Register an entity under a caller-chosen id (the load path). A no-op
    /// for an already-indexed entity; assigning an id twice is an error.
    pub fn register_as(&mut self, entity: EntityId, id: &str) -> Result<(), SaveError> {
        if self.ids.contains_key(&entity) {
            return Ok(());
        }
        if self.entities.contains_key(id) {
            return Err(SaveError::DuplicateId(id.to_string()));
        }
        self.entities.insert(id.to_string(), entity);
        self.ids.insert(entity, id.to_string());
        Ok(())
    }

    /// The id assigned to `entity`, or an error if it was never registered.
    pub fn get_id(&self, entity: EntityId) -> Result<&str, SaveError> {
        self.ids
            .get(&entity)
            .map(String::as_str)
            .ok_or(SaveError::EntityNotIndexed)
    }

    /// The entity registered under `id`, or an error for an unknown id.
    pub fn get_entity(&self, id: &str) -> Result<EntityId, SaveError> {
        self.entities
            .get(id)
            .copied()
            .ok_or_else(|| SaveError::UnknownId(id.to_string()))
    }

    #[must_use]
    pub fn try_get_id(&self, entity: EntityId) -> Option<&str> {
        self.ids.get(&entity).map(String::as_str)
    }

    #[must_use]
    pub fn try_get_entity(&self, id: &str) -> Option<EntityId> {
        self.entities.get(id).copied()
    }

    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.ids.contains_key(&entity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn fresh_id(&self) -> String {
        // Caller-registered ids share this id space.
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.entities.contains_key(&id) {
                return id;
            }
        }
    }
}
