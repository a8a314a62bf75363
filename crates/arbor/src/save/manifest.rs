//! Manifests describe exactly which fields of a component round-trip and how.
//!
//! A [`Manifest`] binds a registry-unique name to an ordered field list. Each
//! field carries a [`SaveType`] strategy — a pair of type-erased save/load
//! closures over `&dyn Component`, the manual stand-in for field reflection.
//! The built-in strategies are the primitives (`string`, `number`,
//! `boolean`) and `component(...)`, the deferred reference type.

use std::any::TypeId;
use std::rc::Rc;

use serde_json::Value;

use crate::component::{Component, ComponentHandle};
use crate::error::{EntityError, SaveError};
use crate::save::data::ComponentRecord;
use crate::save::index::SavingIndex;
use crate::system::EntitySystem;

/// Context handed to a [`SaveType`]'s save closure.
pub struct SavePayload<'a> {
    field: &'static str,
    index: &'a SavingIndex,
}

impl<'a> SavePayload<'a> {
    /// The name of the field being serialized.
    #[must_use]
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// The saving index for the current pass.
    #[must_use]
    pub fn index(&self) -> &SavingIndex {
        self.index
    }
}

/// Context handed to a [`SaveType`]'s load closure.
pub struct LoadPayload<'a> {
    field: &'static str,
    value: &'a Value,
    index: &'a SavingIndex,
    system: &'a EntitySystem,
}

impl<'a> LoadPayload<'a> {
    /// The name of the field being applied.
    #[must_use]
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// The stored value for this field.
    #[must_use]
    pub fn value(&self) -> &Value {
        self.value
    }

    /// The saving index for the current pass.
    #[must_use]
    pub fn index(&self) -> &SavingIndex {
        self.index
    }

    /// The system the graph is being loaded into.
    #[must_use]
    pub fn system(&self) -> &EntitySystem {
        self.system
    }
}

type SaveFn = Box<dyn Fn(&dyn Component, &SavePayload<'_>) -> Option<Value>>;
type LoadFn = Box<dyn Fn(&mut dyn Component, &LoadPayload<'_>) -> Result<(), SaveError>>;

/// A field serialization strategy.
///
/// `save` produces the stored value (or nothing, in which case the field is
/// omitted from the record); `load` applies a stored value back onto the
/// component. Deferred strategies are applied only after the whole graph has
/// been reconstructed, because they reference entities that may not exist
/// yet in record order.
pub struct SaveType {
    defer: bool,
    save: SaveFn,
    load: LoadFn,
}

impl SaveType {
    /// Whether this strategy's load must wait for the whole graph.
    #[must_use]
    pub fn defer(&self) -> bool {
        self.defer
    }

    /// Direct-copy string field. Loading tolerates (skips) a stored value of
    /// the wrong primitive kind.
    #[must_use]
    pub fn string<C: Component>(get: fn(&C) -> String, set: fn(&mut C, String)) -> Self {
        Self {
            defer: false,
            save: Box::new(move |component, _| {
                let component = component.as_any().downcast_ref::<C>()?;
                Some(Value::String(get(component)))
            }),
            load: Box::new(move |component, payload| {
                if let (Some(component), Some(value)) = (
                    component.as_any_mut().downcast_mut::<C>(),
                    payload.value().as_str(),
                ) {
                    set(component, value.to_string());
                }
                Ok(())
            }),
        }
    }

    /// Direct-copy numeric field.
    #[must_use]
    pub fn number<C: Component>(get: fn(&C) -> f64, set: fn(&mut C, f64)) -> Self {
        Self {
            defer: false,
            save: Box::new(move |component, _| {
                let component = component.as_any().downcast_ref::<C>()?;
                serde_json::Number::from_f64(get(component)).map(Value::Number)
            }),
            load: Box::new(move |component, payload| {
                if let (Some(component), Some(value)) = (
                    component.as_any_mut().downcast_mut::<C>(),
                    payload.value().as_f64(),
                ) {
                    set(component, value);
                }
                Ok(())
            }),
        }
    }

    /// Direct-copy boolean field.
    #[must_use]
    pub fn boolean<C: Component>(get: fn(&C) -> bool, set: fn(&mut C, bool)) -> Self {
        Self {
            defer: false,
            save: Box::new(move |component, _| {
                let component = component.as_any().downcast_ref::<C>()?;
                Some(Value::Bool(get(component)))
            }),
            load: Box::new(move |component, payload| {
                if let (Some(component), Some(value)) = (
                    component.as_any_mut().downcast_mut::<C>(),
                    payload.value().as_bool(),
                ) {
                    set(component, value);
                }
                Ok(())
            }),
        }
    }

    /// Reference to a component of type `T` on another (or the same) entity.
    ///
    /// Saving writes the referenced component's owning-entity id; an absent
    /// reference, or one whose target entity was never indexed, writes
    /// nothing. Loading is deferred: the stored id is resolved through the
    /// pass's index once every record has been built, the target entity must
    /// hold a `T`, and the field receives a bound [`ComponentHandle`].
    #[must_use]
    pub fn component<C: Component, T: Component>(
        get: fn(&C) -> Option<ComponentHandle<T>>,
        set: fn(&mut C, ComponentHandle<T>),
    ) -> Self {
        Self {
            defer: true,
            save: Box::new(move |component, payload| {
                let component = component.as_any().downcast_ref::<C>()?;
                let handle = get(component)?;
                let id = payload.index().try_get_id(handle.entity())?;
                Some(Value::String(id.to_string()))
            }),
            load: Box::new(move |component, payload| {
                let id = payload
                    .value()
                    .as_str()
                    .ok_or_else(|| SaveError::MalformedReference(payload.field().to_string()))?;
                let entity = payload.index().get_entity(id)?;
                // Slot presence, not a full lookup: for a self-reference the
                // component under application is out of its own slot right
                // now, and the handle is liveness-checked at deref anyway.
                if !payload
                    .system()
                    .has_component_slot(entity, TypeId::of::<T>())
                {
                    return Err(SaveError::Entity(EntityError::ComponentNotFound(
                        std::any::type_name::<T>(),
                    )));
                }
                if let Some(component) = component.as_any_mut().downcast_mut::<C>() {
                    set(component, ComponentHandle::new(entity));
                }
                Ok(())
            }),
        }
    }
}

/// One manifested field: its record name and its strategy.
pub struct Field {
    name: &'static str,
    save_type: SaveType,
}

impl Field {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn save_type(&self) -> &SaveType {
        &self.save_type
    }
}

/// Serialization metadata for one component type: a registry-unique name and
/// an ordered field list.
pub struct Manifest {
    name: &'static str,
    fields: Vec<Field>,
}

impl Manifest {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    /// Append a field. Order is the order fields appear in records.
    #[must_use]
    pub fn field(mut self, name: &'static str, save_type: SaveType) -> Self {
        self.fields.push(Field { name, save_type });
        self
    }

    /// Finish building, producing the shared form components hand out from
    /// `save_manifest`.
    #[must_use]
    pub fn shared(self) -> Rc<Self> {
        Rc::new(self)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Serialize one component into a record against the active index.
    pub(crate) fn save_component(
        &self,
        component: &dyn Component,
        index: &SavingIndex,
    ) -> ComponentRecord {
        let mut data = serde_json::Map::new();
        for field in &self.fields {
            let payload = SavePayload {
                field: field.name,
                index,
            };
            if let Some(value) = (field.save_type.save)(component, &payload) {
                data.insert(field.name.to_string(), value);
            }
        }
        ComponentRecord {
            name: self.name.to_string(),
            data,
        }
    }

    /// Apply one stored field value onto a component. Out-of-range indices
    /// and absent values are ignored (the field simply keeps its default).
    pub(crate) fn apply_field(
        &self,
        field_index: usize,
        component: &mut dyn Component,
        value: &Value,
        index: &SavingIndex,
        system: &EntitySystem,
    ) -> Result<(), SaveError> {
        let Some(field) = self.fields.get(field_index) else {
            return Ok(());
        };
        let payload = LoadPayload {
            field: field.name,
            value,
            index,
            system,
        };
        (field.save_type.load)(component, &payload)
    }
}

impl std::fmt::Debug for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifest")
            .field("name", &self.name)
            .field("fields", &self.fields.iter().map(Field::name).collect::<Vec<_>>())
            .finish()
    }
}
