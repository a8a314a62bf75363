//! Whole-system save and load passes.
//!
//! Saving walks every live component, serializes the ones that expose a
//! manifest, and records the parent edges between their entities. Loading
//! rebuilds the graph in record order through the normal entity build path,
//! then resolves parents and deferred reference fields once every record
//! exists, so stored graphs may reference entities in any order.

use std::any::TypeId;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::component::Component;
use crate::entity::{EntityBuilder, EntityId};
use crate::error::SaveError;
use crate::save::data::{EntityRecord, SaveData};
use crate::save::index::SavingIndex;
use crate::save::manifest::Manifest;
use crate::save::registry::ComponentRegistry;
use crate::system::EntitySystem;

/// A stored field whose application waits until the whole graph is built.
struct DeferredField {
    entity: EntityId,
    type_id: TypeId,
    manifest: Rc<Manifest>,
    field_index: usize,
    value: Value,
}

/// What a load pass produced, grouped by component type.
#[derive(Default)]
pub struct LoadReport {
    components: HashMap<TypeId, Vec<EntityId>>,
}

impl LoadReport {
    /// The entities that received a loaded `T`, in record order.
    #[must_use]
    pub fn loaded<T: Component>(&self) -> &[EntityId] {
        self.components
            .get(&TypeId::of::<T>())
            .map_or(&[], Vec::as_slice)
    }

    /// Total number of components loaded.
    #[must_use]
    pub fn total(&self) -> usize {
        self.components.values().map(Vec::len).sum()
    }
}

/// Drives save and load passes against a sealed view of a registry.
pub struct EntitySaver {
    registry: ComponentRegistry,
}

impl EntitySaver {
    #[must_use]
    pub fn new(registry: ComponentRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Serialize every manifested component in `system`.
    ///
    /// Entities carrying at least one manifested component get a record;
    /// entities with none are invisible to the pass. A manifested component
    /// whose type is not registered under its manifest name is an error, as
    /// is a recorded entity whose parent carries no manifested component
    /// (the edge could not be restored).
    pub fn save(&self, system: &EntitySystem) -> Result<SaveData, SaveError> {
        let mut index = SavingIndex::new();
        let mut order: Vec<EntityId> = Vec::new();
        let mut groups: HashMap<EntityId, Vec<(Rc<Manifest>, &dyn Component)>> = HashMap::new();

        for (entity, component) in system.all_components() {
            let Some(manifest) = component.save_manifest() else {
                continue;
            };
            if !self
                .registry
                .entry_matches(manifest.name(), component.as_any().type_id())
            {
                return Err(SaveError::SerializableComponentNotRegistered(
                    manifest.name().to_string(),
                ));
            }
            if !groups.contains_key(&entity) {
                order.push(entity);
                index.register(entity);
            }
            groups.entry(entity).or_default().push((manifest, component));
        }

        let mut entities = Vec::with_capacity(order.len());
        for entity in order {
            let parent = match system.parent(entity)? {
                Some(parent) => Some(
                    index
                        .try_get_id(parent)
                        .ok_or_else(|| SaveError::NonSerializableParent(parent.to_string()))?
                        .to_string(),
                ),
                None => None,
            };
            let components = groups
                .remove(&entity)
                .unwrap_or_default()
                .into_iter()
                .map(|(manifest, component)| manifest.save_component(component, &index))
                .collect();
            let id = match index.try_get_id(entity) {
                Some(id) => id.to_string(),
                None => return Err(SaveError::EntityNotIndexed),
            };
            entities.push(EntityRecord {
                id,
                parent,
                components,
            });
        }

        tracing::debug!(entities = entities.len(), "saved entity graph");
        Ok(SaveData { entities })
    }

    /// Rebuild a stored graph inside `system`.
    ///
    /// Each record builds a fresh entity whose components start from their
    /// registered blank constructors, so `init` runs exactly as it does for
    /// hand-built entities. Plain fields apply immediately after the build;
    /// parent edges and deferred reference fields apply after every record
    /// has been built, in record order.
    pub fn load(&self, system: &mut EntitySystem, data: &SaveData) -> Result<LoadReport, SaveError> {
        let mut index = SavingIndex::new();
        let mut deferred_parents: Vec<(EntityId, String)> = Vec::new();
        let mut deferred_fields: Vec<DeferredField> = Vec::new();
        let mut report = LoadReport::default();

        for record in &data.entities {
            let mut builder = EntityBuilder::new();
            let mut manifests: Vec<(Rc<Manifest>, TypeId)> = Vec::new();
            for component_record in &record.components {
                let entry = self.registry.get(&component_record.name)?;
                manifests.push((Rc::clone(entry.manifest()), entry.type_id()));
                builder = builder.add_registered(entry)?;
            }
            let entity = builder.with_system(system).build()?;
            index.register_as(entity, &record.id)?;
            if let Some(parent_id) = &record.parent {
                deferred_parents.push((entity, parent_id.clone()));
            }

            for (component_record, (manifest, type_id)) in
                record.components.iter().zip(manifests)
            {
                report
                    .components
                    .entry(type_id)
                    .or_default()
                    .push(entity);
                for (field_index, field) in manifest.fields().iter().enumerate() {
                    let Some(value) = component_record.data.get(field.name()) else {
                        continue;
                    };
                    if field.save_type().defer() {
                        deferred_fields.push(DeferredField {
                            entity,
                            type_id,
                            manifest: Rc::clone(&manifest),
                            field_index,
                            value: value.clone(),
                        });
                    } else {
                        apply_one(system, &index, entity, type_id, &manifest, field_index, value)?;
                    }
                }
            }
        }

        for (child, parent_id) in deferred_parents {
            let parent = index.get_entity(&parent_id)?;
            system.add_child(parent, child)?;
        }

        for deferred in deferred_fields {
            apply_one(
                system,
                &index,
                deferred.entity,
                deferred.type_id,
                &deferred.manifest,
                deferred.field_index,
                &deferred.value,
            )?;
        }

        tracing::debug!(
            entities = data.entities.len(),
            components = report.total(),
            "loaded entity graph"
        );
        Ok(report)
    }
}

/// Take the component out of its slot, apply one stored field, restore it.
fn apply_one(
    system: &mut EntitySystem,
    index: &SavingIndex,
    entity: EntityId,
    type_id: TypeId,
    manifest: &Manifest,
    field_index: usize,
    value: &Value,
) -> Result<(), SaveError> {
    let mut component = system.take_component(entity, type_id)?;
    let result = manifest.apply_field(field_index, component.as_mut(), value, index, system);
    system.restore_component(entity, type_id, component)?;
    result
}
