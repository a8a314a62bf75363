//! The per-graph registry: entity storage, polymorphic component index,
//! hierarchy, event channels, and disposal cascades.
//!
//! One [`EntitySystem`] owns one independent object graph. All state is
//! mutated in place by the single calling thread; the runtime is synchronous
//! and has no suspension points.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use crate::component::{Component, TypeKey};
use crate::entity::{EntityBuilder, EntityId, PendingComponent, Prefab};
use crate::error::EntityError;
use crate::event::{AnyChannel, EventChannel, EventDef};

/// One component's storage slot on an entity.
///
/// The box is `None` only while the component's own `init` or a field
/// application runs against it; every public accessor treats a taken slot as
/// absent.
struct ComponentSlot {
    type_id: TypeId,
    type_name: &'static str,
    component: Option<Box<dyn Component>>,
}

#[derive(Default)]
struct EntityData {
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    components: Vec<ComponentSlot>,
}

/// Address of one live component in the type index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ComponentAddr {
    entity: EntityId,
    type_id: TypeId,
}

/// Construction and `init` context handed to component constructors and
/// lifecycle hooks: the owning entity plus mutable access to the system.
pub struct EntityContext<'a> {
    entity: EntityId,
    system: &'a mut EntitySystem,
}

impl<'a> EntityContext<'a> {
    /// The entity owning the component under construction/initialization.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    #[must_use]
    pub fn system(&self) -> &EntitySystem {
        self.system
    }

    #[must_use]
    pub fn system_mut(&mut self) -> &mut EntitySystem {
        self.system
    }

    /// Exact-type lookup of a sibling component on the owning entity.
    pub fn get_component<T: Component>(&self) -> Result<&T, EntityError> {
        self.system.get_component::<T>(self.entity)
    }

    /// Like [`EntityContext::get_component`], but absent siblings yield `None`.
    #[must_use]
    pub fn try_get_component<T: Component>(&self) -> Option<&T> {
        self.system.try_get_component::<T>(self.entity)
    }
}

/// Process-wide registry for one object graph.
///
/// Indexes every live component under its full kind chain, tracks root
/// entities for cascade disposal, and owns the per-definition event channels.
#[derive(Default)]
pub struct EntitySystem {
    next_id: u64,
    entities: BTreeMap<EntityId, EntityData>,
    roots: Vec<EntityId>,
    index: HashMap<TypeKey, Vec<ComponentAddr>>,
    events: HashMap<u64, Box<dyn AnyChannel>>,
}

impl EntitySystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Entity lifecycle --

    /// Open a builder for a root entity of this system.
    #[must_use]
    pub fn entity_builder(&mut self) -> crate::entity::ReadyBuilder<'_> {
        EntityBuilder::new().with_system(self)
    }

    /// Build a root entity from a prefab.
    pub fn spawn<P: Prefab>(&mut self, prefab: P) -> Result<EntityId, EntityError> {
        let builder = EntityBuilder::new().with_system(self);
        prefab.populate(builder)
    }

    /// Build an entity from a prefab, parented to `parent`.
    pub fn add_child_prefab<P: Prefab>(
        &mut self,
        parent: EntityId,
        prefab: P,
    ) -> Result<EntityId, EntityError> {
        let builder = EntityBuilder::new().with_parent(self, parent)?;
        prefab.populate(builder)
    }

    pub(crate) fn build_entity(
        &mut self,
        parent: Option<EntityId>,
        pending: Vec<PendingComponent>,
    ) -> Result<EntityId, EntityError> {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.entities.insert(id, EntityData::default());
        trace!(entity = %id, components = pending.len(), "building entity");

        if let Err(e) = self.construct_and_init(id, pending) {
            // Tear the half-built entity back down so the index never holds
            // components of an entity that was never observable.
            let _ = self.dispose_entity(id);
            return Err(e);
        }

        self.roots.push(id);
        if let Some(parent) = parent {
            if let Err(e) = self.add_child(parent, id) {
                let _ = self.dispose_entity(id);
                return Err(e);
            }
        }
        Ok(id)
    }

    fn construct_and_init(
        &mut self,
        id: EntityId,
        pending: Vec<PendingComponent>,
    ) -> Result<(), EntityError> {
        let count = pending.len();

        // Phase one: construct every declared component, in declaration
        // order. No init runs yet, so constructors never observe siblings.
        for declaration in pending {
            let boxed = {
                let mut cx = EntityContext {
                    entity: id,
                    system: self,
                };
                (declaration.construct)(&mut cx)
            };
            let data = self
                .entities
                .get_mut(&id)
                .ok_or(EntityError::EntityNotFound(id))?;
            data.components.push(ComponentSlot {
                type_id: declaration.type_id,
                type_name: declaration.type_name,
                component: Some(boxed),
            });
            self.register_component(id, declaration.type_id)?;
        }

        // Phase two: init every component, in declaration order. Each hook
        // observes all of its siblings.
        for slot_index in 0..count {
            let mut component = self.take_slot(id, slot_index)?;
            let result = {
                let mut cx = EntityContext {
                    entity: id,
                    system: self,
                };
                component.init(&mut cx)
            };
            self.restore_slot(id, slot_index, component)?;
            result?;
        }
        Ok(())
    }

    /// Dynamically add a component to a live entity. The component is
    /// constructed and initialized immediately — there is no sibling batch
    /// in flight.
    pub fn add_component<T, F>(&mut self, entity: EntityId, ctor: F) -> Result<(), EntityError>
    where
        T: Component,
        F: FnOnce(&mut EntityContext<'_>) -> T,
    {
        let data = self
            .entities
            .get(&entity)
            .ok_or(EntityError::EntityNotFound(entity))?;
        if data.components.iter().any(|s| s.type_id == TypeId::of::<T>()) {
            return Err(EntityError::DuplicateComponent(std::any::type_name::<T>()));
        }

        let boxed: Box<dyn Component> = {
            let mut cx = EntityContext {
                entity,
                system: self,
            };
            Box::new(ctor(&mut cx))
        };
        let data = self
            .entities
            .get_mut(&entity)
            .ok_or(EntityError::EntityNotFound(entity))?;
        data.components.push(ComponentSlot {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            component: Some(boxed),
        });
        let slot_index = data.components.len() - 1;
        self.register_component(entity, TypeId::of::<T>())?;

        let mut component = self.take_slot(entity, slot_index)?;
        let result = {
            let mut cx = EntityContext {
                entity,
                system: self,
            };
            component.init(&mut cx)
        };
        self.restore_slot(entity, slot_index, component)?;
        result
    }

    /// Dispose an entity: detach it from its parent, dispose every owned
    /// component (unregistering each from the index), then recursively
    /// dispose every child. Disposing an unknown entity is an error.
    pub fn dispose_entity(&mut self, entity: EntityId) -> Result<(), EntityError> {
        let data = self
            .entities
            .remove(&entity)
            .ok_or(EntityError::EntityNotFound(entity))?;
        debug!(entity = %entity, "disposing entity");

        // Detach first so a half-disposed entity is never revisited through
        // its parent's iteration.
        if let Some(parent) = data.parent {
            if let Some(parent_data) = self.entities.get_mut(&parent) {
                parent_data.children.retain(|c| *c != entity);
            }
        } else if let Some(position) = self.roots.iter().position(|r| *r == entity) {
            self.roots.remove(position);
        }

        // Subscriptions owned by this entity die with it.
        for channel in self.events.values_mut() {
            channel.remove_owner(entity);
        }

        for slot in data.components {
            if let Some(component) = slot.component {
                self.unregister_component(entity, slot.type_id, component.as_ref())?;
            }
        }

        for child in data.children {
            self.dispose_entity(child)?;
        }
        Ok(())
    }

    /// Tear the whole system down: drop every event channel, dispose every
    /// root entity (cascading through the hierarchy), clear all state.
    /// A disposed system is not restartable.
    pub fn dispose(&mut self) -> Result<(), EntityError> {
        debug!(roots = self.roots.len(), "disposing entity system");
        self.events.clear();
        let roots = self.roots.clone();
        for root in roots {
            self.dispose_entity(root)?;
        }
        self.entities.clear();
        self.roots.clear();
        self.index.clear();
        Ok(())
    }

    // -- Hierarchy --

    /// Attach `child` under `parent`. Idempotent if already a child of
    /// `parent`; otherwise the child is atomically detached from its current
    /// parent (or the root set) first — it is never present in two child
    /// sets at once.
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> Result<(), EntityError> {
        if !self.entities.contains_key(&parent) {
            return Err(EntityError::EntityNotFound(parent));
        }
        let current = self
            .entities
            .get(&child)
            .ok_or(EntityError::EntityNotFound(child))?
            .parent;

        match current {
            Some(existing) if existing == parent => return Ok(()),
            Some(existing) => {
                if let Some(old_parent) = self.entities.get_mut(&existing) {
                    old_parent.children.retain(|c| *c != child);
                }
            }
            None => self.untrack_root(child)?,
        }

        if let Some(child_data) = self.entities.get_mut(&child) {
            child_data.parent = Some(parent);
        }
        if let Some(parent_data) = self.entities.get_mut(&parent) {
            parent_data.children.push(child);
        }
        Ok(())
    }

    /// The entity's parent, or `None` for roots.
    pub fn parent(&self, entity: EntityId) -> Result<Option<EntityId>, EntityError> {
        self.entities
            .get(&entity)
            .map(|d| d.parent)
            .ok_or(EntityError::EntityNotFound(entity))
    }

    /// The entity's direct children, in attachment order.
    pub fn children(&self, entity: EntityId) -> Result<&[EntityId], EntityError> {
        self.entities
            .get(&entity)
            .map(|d| d.children.as_slice())
            .ok_or(EntityError::EntityNotFound(entity))
    }

    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    fn untrack_root(&mut self, entity: EntityId) -> Result<(), EntityError> {
        let position = self
            .roots
            .iter()
            .position(|r| *r == entity)
            .ok_or(EntityError::EntityNotTracked)?;
        self.roots.remove(position);
        Ok(())
    }

    // -- Entity-local component access --

    /// Exact-type component lookup on an entity. Not polymorphic.
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Result<&T, EntityError> {
        let data = self
            .entities
            .get(&entity)
            .ok_or(EntityError::EntityNotFound(entity))?;
        data.components
            .iter()
            .find(|s| s.type_id == TypeId::of::<T>())
            .and_then(|s| s.component.as_deref())
            .and_then(|c| c.as_any().downcast_ref::<T>())
            .ok_or(EntityError::ComponentNotFound(std::any::type_name::<T>()))
    }

    /// Exact-type mutable component lookup on an entity.
    pub fn get_component_mut<T: Component>(
        &mut self,
        entity: EntityId,
    ) -> Result<&mut T, EntityError> {
        let data = self
            .entities
            .get_mut(&entity)
            .ok_or(EntityError::EntityNotFound(entity))?;
        data.components
            .iter_mut()
            .find(|s| s.type_id == TypeId::of::<T>())
            .and_then(|s| s.component.as_deref_mut())
            .and_then(|c| c.as_any_mut().downcast_mut::<T>())
            .ok_or(EntityError::ComponentNotFound(std::any::type_name::<T>()))
    }

    /// Exact-type lookup returning `None` instead of an error.
    #[must_use]
    pub fn try_get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.get_component::<T>(entity).ok()
    }

    // -- Polymorphic index queries --

    /// The first live instance of `T` anywhere in the system, or an error
    /// naming the type.
    pub fn find_component<T: Component>(&self) -> Result<&T, EntityError> {
        self.iterate_components::<T>()
            .next()
            .ok_or(EntityError::NoInstance(std::any::type_name::<T>()))
    }

    /// Every live instance of `T`, in registration order.
    #[must_use]
    pub fn find_components<T: Component>(&self) -> Vec<&T> {
        self.iterate_components::<T>().collect()
    }

    /// Iterate every live instance of `T`, in registration order.
    pub fn iterate_components<T: Component>(&self) -> impl Iterator<Item = &T> + '_ {
        self.bucket(TypeKey::of::<T>())
            .iter()
            .filter_map(move |addr| {
                self.component_at(*addr)?.as_any().downcast_ref::<T>()
            })
    }

    /// The number of live instances registered under `T`'s key.
    #[must_use]
    pub fn count_components<T: Component>(&self) -> usize {
        self.bucket(TypeKey::of::<T>()).len()
    }

    /// Every live component registered under `key`, including instances of
    /// other concrete types that list `key` among their kinds.
    #[must_use]
    pub fn components_of_kind(&self, key: TypeKey) -> Vec<(EntityId, &dyn Component)> {
        self.bucket(key)
            .iter()
            .filter_map(|addr| Some((addr.entity, self.component_at(*addr)?)))
            .collect()
    }

    /// The number of live components registered under `key`.
    #[must_use]
    pub fn count_kind(&self, key: TypeKey) -> usize {
        self.bucket(key).len()
    }

    // -- Enumeration --

    /// Every live component, grouped by entity in creation order. Each
    /// component appears exactly once, in its declaration order.
    pub fn all_components(&self) -> impl Iterator<Item = (EntityId, &dyn Component)> + '_ {
        self.entities.iter().flat_map(|(id, data)| {
            data.components
                .iter()
                .filter_map(move |slot| Some((*id, slot.component.as_deref()?)))
        })
    }

    /// Every live entity id, in creation order.
    pub fn all_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// The root entities (no parent), in the order they became roots.
    #[must_use]
    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // -- Events --

    /// The event channel for `def`, created on first request. Channel
    /// identity is per system instance, keyed by the definition's identity.
    pub fn on<T: 'static>(&mut self, def: &EventDef<T>) -> &mut EventChannel<T> {
        let slot = self
            .events
            .entry(def.id())
            .or_insert_with(|| Box::new(EventChannel::<T>::new(def.name())));
        channel_mut(slot, def.name())
    }

    // -- Index internals --

    fn register_component(&mut self, entity: EntityId, type_id: TypeId) -> Result<(), EntityError> {
        let keys = {
            let component = self
                .slot_component(entity, type_id)
                .ok_or(EntityError::EntityNotFound(entity))?;
            Self::key_chain(type_id, component)
        };
        let addr = ComponentAddr { entity, type_id };
        for key in keys {
            self.index.entry(key).or_default().push(addr);
        }
        Ok(())
    }

    fn unregister_component(
        &mut self,
        entity: EntityId,
        type_id: TypeId,
        component: &dyn Component,
    ) -> Result<(), EntityError> {
        let addr = ComponentAddr { entity, type_id };
        for key in Self::key_chain(type_id, component) {
            let bucket = self
                .index
                .get_mut(&key)
                .ok_or(EntityError::ComponentNotRegistered)?;
            let position = bucket
                .iter()
                .position(|a| *a == addr)
                .ok_or(EntityError::ComponentNotRegistered)?;
            bucket.remove(position);
        }
        Ok(())
    }

    /// The full key chain a component is indexed under: its concrete type
    /// plus every kind it declares. The abstract component base has no key.
    fn key_chain(type_id: TypeId, component: &dyn Component) -> Vec<TypeKey> {
        let mut keys = vec![TypeKey::from_id(type_id)];
        keys.extend(component.kinds());
        keys
    }

    fn bucket(&self, key: TypeKey) -> &[ComponentAddr] {
        self.index.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn component_at(&self, addr: ComponentAddr) -> Option<&dyn Component> {
        self.entities
            .get(&addr.entity)?
            .components
            .iter()
            .find(|s| s.type_id == addr.type_id)?
            .component
            .as_deref()
    }

    fn slot_component(&self, entity: EntityId, type_id: TypeId) -> Option<&dyn Component> {
        self.component_at(ComponentAddr { entity, type_id })
    }

    /// Whether `entity` holds a slot for `type_id`, counting a slot whose
    /// box is currently taken out for a lifecycle pass.
    pub(crate) fn has_component_slot(&self, entity: EntityId, type_id: TypeId) -> bool {
        self.entities
            .get(&entity)
            .is_some_and(|d| d.components.iter().any(|s| s.type_id == type_id))
    }

    pub(crate) fn take_component(
        &mut self,
        entity: EntityId,
        type_id: TypeId,
    ) -> Result<Box<dyn Component>, EntityError> {
        let data = self
            .entities
            .get_mut(&entity)
            .ok_or(EntityError::EntityNotFound(entity))?;
        let slot = data
            .components
            .iter_mut()
            .find(|s| s.type_id == type_id)
            .ok_or(EntityError::EntityNotFound(entity))?;
        slot.component
            .take()
            .ok_or(EntityError::ComponentNotFound(slot.type_name))
    }

    pub(crate) fn restore_component(
        &mut self,
        entity: EntityId,
        type_id: TypeId,
        component: Box<dyn Component>,
    ) -> Result<(), EntityError> {
        let data = self
            .entities
            .get_mut(&entity)
            .ok_or(EntityError::EntityNotFound(entity))?;
        let slot = data
            .components
            .iter_mut()
            .find(|s| s.type_id == type_id)
            .ok_or(EntityError::EntityNotFound(entity))?;
        slot.component = Some(component);
        Ok(())
    }

    fn take_slot(
        &mut self,
        entity: EntityId,
        slot_index: usize,
    ) -> Result<Box<dyn Component>, EntityError> {
        let data = self
            .entities
            .get_mut(&entity)
            .ok_or(EntityError::EntityNotFound(entity))?;
        let slot = data
            .components
            .get_mut(slot_index)
            .ok_or(EntityError::EntityNotFound(entity))?;
        slot.component
            .take()
            .ok_or(EntityError::ComponentNotFound(slot.type_name))
    }

    fn restore_slot(
        &mut self,
        entity: EntityId,
        slot_index: usize,
        component: Box<dyn Component>,
    ) -> Result<(), EntityError> {
        let data = self
            .entities
            .get_mut(&entity)
            .ok_or(EntityError::EntityNotFound(entity))?;
        let slot = data
            .components
            .get_mut(slot_index)
            .ok_or(EntityError::EntityNotFound(entity))?;
        slot.component = Some(component);
        Ok(())
    }
}

/// Typed access to one channel slot. A definition id is process-unique, so
/// a slot only ever holds the payload type it was created with; rather than
/// trusting that, a mismatched slot is replaced with a fresh channel before
/// the downcast.
fn channel_mut<'a, T: 'static>(
    slot: &'a mut Box<dyn AnyChannel>,
    name: &'static str,
) -> &'a mut EventChannel<T> {
    if !(**slot).as_any().is::<EventChannel<T>>() {
        *slot = Box::new(EventChannel::<T>::new(name));
    }
    match (**slot).as_any_mut().downcast_mut::<EventChannel<T>>() {
        Some(channel) => channel,
        // Dead arm: the slot was type-checked (and replaced if needed) just
        // above.
        None => unreachable!("channel slot holds a different payload type"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Tag;
    impl Component for Tag {}

    struct Health {
        current: f64,
    }
    impl Component for Health {}

    /// Abstract kind marker standing in for a superclass.
    struct Collider;

    struct BoxCollider;
    impl Component for BoxCollider {
        fn kinds(&self) -> Vec<TypeKey> {
            vec![TypeKey::of::<Collider>()]
        }
    }

    struct SphereCollider;
    impl Component for SphereCollider {
        fn kinds(&self) -> Vec<TypeKey> {
            vec![TypeKey::of::<Collider>()]
        }
    }

    fn spawn_tagged(system: &mut EntitySystem) -> EntityId {
        EntityBuilder::new()
            .add_component(|_| Tag)
            .unwrap()
            .with_system(system)
            .build()
            .unwrap()
    }

    #[test]
    fn test_init_observes_all_siblings() {
        struct Probe {
            saw_health: Rc<RefCell<bool>>,
        }
        impl Component for Probe {
            fn init(&mut self, cx: &mut EntityContext<'_>) -> Result<(), EntityError> {
                *self.saw_health.borrow_mut() = cx.try_get_component::<Health>().is_some();
                Ok(())
            }
        }

        // Probe declared before Health, and after.
        for probe_first in [true, false] {
            let mut system = EntitySystem::new();
            let saw = Rc::new(RefCell::new(false));
            let flag = saw.clone();
            let mut builder = EntityBuilder::new();
            if probe_first {
                builder = builder
                    .add_component(move |_| Probe { saw_health: flag })
                    .unwrap()
                    .add_component(|_| Health { current: 1.0 })
                    .unwrap();
            } else {
                builder = builder
                    .add_component(|_| Health { current: 1.0 })
                    .unwrap()
                    .add_component(move |_| Probe { saw_health: flag })
                    .unwrap();
            }
            builder.with_system(&mut system).build().unwrap();
            assert!(*saw.borrow(), "probe_first={probe_first}");
        }
    }

    #[test]
    fn test_children_attach_after_init() {
        // The init hook runs before the entity is parented, so a child
        // being built must not be visible on the parent during init.
        struct ChildCounter {
            parent: EntityId,
            seen: Rc<RefCell<usize>>,
        }
        impl Component for ChildCounter {
            fn init(&mut self, cx: &mut EntityContext<'_>) -> Result<(), EntityError> {
                *self.seen.borrow_mut() = cx.system().children(self.parent)?.len();
                Ok(())
            }
        }

        let mut system = EntitySystem::new();
        let parent = spawn_tagged(&mut system);
        let seen = Rc::new(RefCell::new(usize::MAX));
        let seen_in_init = seen.clone();
        EntityBuilder::new()
            .add_component(move |_| ChildCounter {
                parent,
                seen: seen_in_init,
            })
            .unwrap()
            .with_parent(&mut system, parent)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(*seen.borrow(), 0);
        assert_eq!(system.children(parent).unwrap().len(), 1);
    }

    #[test]
    fn test_get_component_is_exact_type() {
        let mut system = EntitySystem::new();
        let entity = EntityBuilder::new()
            .add_component(|_| BoxCollider)
            .unwrap()
            .with_system(&mut system)
            .build()
            .unwrap();

        assert!(system.get_component::<BoxCollider>(entity).is_ok());
        assert!(matches!(
            system.get_component::<SphereCollider>(entity),
            Err(EntityError::ComponentNotFound(_))
        ));
        assert!(system.try_get_component::<SphereCollider>(entity).is_none());
    }

    #[test]
    fn test_kind_queries_are_polymorphic() {
        let mut system = EntitySystem::new();
        EntityBuilder::new()
            .add_component(|_| BoxCollider)
            .unwrap()
            .with_system(&mut system)
            .build()
            .unwrap();
        EntityBuilder::new()
            .add_component(|_| SphereCollider)
            .unwrap()
            .with_system(&mut system)
            .build()
            .unwrap();

        assert_eq!(system.count_components::<BoxCollider>(), 1);
        assert_eq!(system.count_components::<SphereCollider>(), 1);
        assert_eq!(system.count_kind(TypeKey::of::<Collider>()), 2);
        assert_eq!(system.components_of_kind(TypeKey::of::<Collider>()).len(), 2);
    }

    #[test]
    fn test_find_component_errors_and_find_components_is_empty() {
        let system = EntitySystem::new();
        assert!(matches!(
            system.find_component::<Health>(),
            Err(EntityError::NoInstance(name)) if name.contains("Health")
        ));
        assert!(system.find_components::<Health>().is_empty());
        assert_eq!(system.count_components::<Health>(), 0);
    }

    #[test]
    fn test_add_child_is_idempotent() {
        let mut system = EntitySystem::new();
        let parent = spawn_tagged(&mut system);
        let child = spawn_tagged(&mut system);

        system.add_child(parent, child).unwrap();
        system.add_child(parent, child).unwrap();
        assert_eq!(system.children(parent).unwrap(), &[child]);
        assert_eq!(system.parent(child).unwrap(), Some(parent));
        assert_eq!(system.roots(), &[parent]);
    }

    #[test]
    fn test_reparenting_never_leaves_double_membership() {
        let mut system = EntitySystem::new();
        let first = spawn_tagged(&mut system);
        let second = spawn_tagged(&mut system);
        let child = spawn_tagged(&mut system);

        system.add_child(first, child).unwrap();
        system.add_child(second, child).unwrap();

        assert!(system.children(first).unwrap().is_empty());
        assert_eq!(system.children(second).unwrap(), &[child]);
        assert_eq!(system.parent(child).unwrap(), Some(second));
    }

    #[test]
    fn test_dispose_cascades_and_empties_the_index() {
        let mut system = EntitySystem::new();
        let root = EntityBuilder::new()
            .add_component(|_| Health { current: 10.0 })
            .unwrap()
            .add_component(|_| Tag)
            .unwrap()
            .with_system(&mut system)
            .build()
            .unwrap();
        let child = EntityBuilder::new()
            .add_component(|_| Health { current: 5.0 })
            .unwrap()
            .with_parent(&mut system, root)
            .unwrap()
            .build()
            .unwrap();
        let _grandchild = EntityBuilder::new()
            .add_component(|_| BoxCollider)
            .unwrap()
            .with_parent(&mut system, child)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(system.count_components::<Health>(), 2);
        system.dispose_entity(root).unwrap();

        assert_eq!(system.count_components::<Health>(), 0);
        assert_eq!(system.count_components::<Tag>(), 0);
        assert_eq!(system.count_kind(TypeKey::of::<Collider>()), 0);
        assert_eq!(system.entity_count(), 0);
        assert!(system.roots().is_empty());
    }

    #[test]
    fn test_dispose_detaches_from_parent_child_set() {
        let mut system = EntitySystem::new();
        let parent = spawn_tagged(&mut system);
        let child = spawn_tagged(&mut system);
        system.add_child(parent, child).unwrap();

        system.dispose_entity(child).unwrap();
        assert!(system.children(parent).unwrap().is_empty());
        assert!(system.contains(parent));
    }

    #[test]
    fn test_double_disposal_is_an_error() {
        let mut system = EntitySystem::new();
        let entity = spawn_tagged(&mut system);
        system.dispose_entity(entity).unwrap();
        assert!(matches!(
            system.dispose_entity(entity),
            Err(EntityError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_dynamic_add_component_inits_immediately() {
        struct Tracker {
            inited: Rc<RefCell<bool>>,
        }
        impl Component for Tracker {
            fn init(&mut self, _cx: &mut EntityContext<'_>) -> Result<(), EntityError> {
                *self.inited.borrow_mut() = true;
                Ok(())
            }
        }

        let mut system = EntitySystem::new();
        let entity = spawn_tagged(&mut system);
        let inited = Rc::new(RefCell::new(false));
        let flag = inited.clone();
        system
            .add_component(entity, move |_| Tracker { inited: flag })
            .unwrap();
        assert!(*inited.borrow());

        // A second addition of the same type is rejected.
        let flag = inited.clone();
        assert!(matches!(
            system.add_component(entity, move |_| Tracker { inited: flag }),
            Err(EntityError::DuplicateComponent(_))
        ));
    }

    #[test]
    fn test_failed_build_leaves_no_trace() {
        struct Faulty;
        impl Component for Faulty {
            fn init(&mut self, _cx: &mut EntityContext<'_>) -> Result<(), EntityError> {
                Err(EntityError::NoInstance("faulty"))
            }
        }

        let mut system = EntitySystem::new();
        let result = EntityBuilder::new()
            .add_component(|_| Tag)
            .unwrap()
            .add_component(|_| Faulty)
            .unwrap()
            .with_system(&mut system)
            .build();

        assert!(result.is_err());
        assert_eq!(system.entity_count(), 0);
        assert_eq!(system.count_components::<Tag>(), 0);
        assert!(system.roots().is_empty());
    }

    #[test]
    fn test_event_channels_keyed_by_definition_identity() {
        let mut system = EntitySystem::new();
        let first: EventDef<u32> = EventDef::new("msg");
        let second: EventDef<u32> = EventDef::new("msg");

        let hits = Rc::new(RefCell::new((0u32, 0u32)));
        let a = hits.clone();
        system.on(&first).subscribe(move |v| {
            assert_eq!(*v, 7);
            a.borrow_mut().0 += 1;
        });
        let b = hits.clone();
        system.on(&second).subscribe(move |v| {
            assert_eq!(*v, 9);
            b.borrow_mut().1 += 1;
        });

        system.on(&first).emit(&7);
        assert_eq!(*hits.borrow(), (1, 0));
        system.on(&second).emit(&9);
        assert_eq!(*hits.borrow(), (1, 1));
    }

    #[test]
    fn test_channels_of_different_payload_types_coexist() {
        let mut system = EntitySystem::new();
        let numbers: EventDef<u32> = EventDef::new("feed");
        let words: EventDef<&'static str> = EventDef::new("feed");

        let seen = Rc::new(RefCell::new((0u32, "")));
        let n = seen.clone();
        system.on(&numbers).subscribe(move |v| n.borrow_mut().0 = *v);
        let w = seen.clone();
        system.on(&words).subscribe(move |v| w.borrow_mut().1 = *v);

        // Repeated lookups resolve to the same channel with its
        // subscriptions intact.
        system.on(&numbers).emit(&11);
        system.on(&words).emit(&"eleven");
        assert_eq!(*seen.borrow(), (11, "eleven"));
        assert_eq!(system.on(&numbers).len(), 1);
        assert_eq!(system.on(&words).len(), 1);
    }

    #[test]
    fn test_entity_disposal_drops_its_subscriptions() {
        struct Listener;
        impl Component for Listener {}

        let mut system = EntitySystem::new();
        let update: EventDef<&'static str> = EventDef::new("update");

        let hits = Rc::new(RefCell::new(0));
        let entity = spawn_tagged(&mut system);
        let count = hits.clone();
        system.on(&update).subscribe_owned(entity, move |v| {
            assert_eq!(*v, "go");
            *count.borrow_mut() += 1;
        });

        system.on(&update).emit(&"go");
        assert_eq!(*hits.borrow(), 1);

        system.dispose_entity(entity).unwrap();
        system.on(&update).emit(&"go");
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_system_dispose_is_total() {
        let mut system = EntitySystem::new();
        let tick: EventDef<()> = EventDef::new("tick");
        system.on(&tick).subscribe(|_| {});

        let root = spawn_tagged(&mut system);
        EntityBuilder::new()
            .add_component(|_| Health { current: 3.0 })
            .unwrap()
            .with_parent(&mut system, root)
            .unwrap()
            .build()
            .unwrap();

        system.dispose().unwrap();
        assert_eq!(system.entity_count(), 0);
        assert_eq!(system.count_components::<Tag>(), 0);
        assert_eq!(system.count_components::<Health>(), 0);
        assert!(system.on(&tick).is_empty());
    }
}
