//! Core [`Component`] trait and the reference types that point at components.
//!
//! Components are units of behavior exclusively owned by one entity. They are
//! stored type-erased as `Box<dyn Component>`; exact-type access goes through
//! [`AsAny`] downcasts. Cross-component references are never raw pointers:
//! [`ComponentHandle`] is a weak lookup key (owning entity + component type)
//! checked for liveness at dereference time, and [`SiblingRef`] is the
//! deferred-binding placeholder for same-entity references that are declared
//! before the sibling exists.

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::rc::Rc;

use crate::entity::EntityId;
use crate::error::EntityError;
use crate::save::manifest::Manifest;
use crate::system::{EntityContext, EntitySystem};

/// An index key identifying a component type or an abstract component kind.
///
/// Concrete component types are keyed by their own `TypeId`. Abstract kinds
/// (the stand-in for superclasses in a language without inheritance) are
/// plain marker types; a component lists the kinds it belongs to via
/// [`Component::kinds`], and the system indexes it under every one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey(TypeId);

impl TypeKey {
    /// The key for a type `K` — a concrete component or a kind marker.
    #[must_use]
    pub fn of<K: 'static>() -> Self {
        Self(TypeId::of::<K>())
    }

    pub(crate) fn from_id(id: TypeId) -> Self {
        Self(id)
    }
}

/// Upcast support for type-erased component storage.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of behavior owned by exactly one entity for its entire lifetime.
pub trait Component: AsAny {
    /// Lifecycle hook called exactly once per instance, after every sibling
    /// component on the same entity has been constructed (the entity's
    /// children do not exist yet at this point).
    ///
    /// The default does nothing. Implementations typically bind
    /// [`SiblingRef`] fields here.
    fn init(&mut self, cx: &mut EntityContext<'_>) -> Result<(), EntityError> {
        let _ = cx;
        Ok(())
    }

    /// Extra index keys this component is registered under, beyond its own
    /// concrete type. Lookups by any returned kind find this instance.
    fn kinds(&self) -> Vec<TypeKey> {
        Vec::new()
    }

    /// The serialization manifest for this component type, if it round-trips.
    fn save_manifest(&self) -> Option<Rc<Manifest>> {
        None
    }
}

/// A weak, non-owning reference to a component of type `T`.
///
/// The handle is a lookup key — the owning entity's id plus the component
/// type — not a pointer. Disposing the referent does not invalidate the
/// handle; liveness is checked on every dereference.
pub struct ComponentHandle<T: Component> {
    entity: EntityId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> ComponentHandle<T> {
    /// A handle to the `T` owned by `entity`.
    #[must_use]
    pub fn new(entity: EntityId) -> Self {
        Self {
            entity,
            _marker: PhantomData,
        }
    }

    /// The entity owning the referenced component.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Resolve the handle against `system`.
    pub fn get<'a>(&self, system: &'a EntitySystem) -> Result<&'a T, EntityError> {
        system.get_component::<T>(self.entity)
    }

    /// Resolve the handle mutably against `system`.
    pub fn get_mut<'a>(&self, system: &'a mut EntitySystem) -> Result<&'a mut T, EntityError> {
        system.get_component_mut::<T>(self.entity)
    }
}

impl<T: Component> Clone for ComponentHandle<T> {
    fn clone(&self) -> Self {
        Self::new(self.entity)
    }
}

impl<T: Component> Copy for ComponentHandle<T> {}

impl<T: Component> std::fmt::Debug for ComponentHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ComponentHandle<{}>({})",
            std::any::type_name::<T>(),
            self.entity
        )
    }
}

/// A deferred reference to a sibling component on the same entity.
///
/// Component fields are populated at construction time, before sibling
/// components exist. A field declared as `SiblingRef<T>` starts out
/// [pending](SiblingRef::pending) and is [bound](SiblingRef::bind) during the
/// owning component's `init`, at which point every sibling is guaranteed to
/// exist regardless of declaration order.
pub struct SiblingRef<T: Component> {
    state: RefState,
    _marker: PhantomData<fn() -> T>,
}

#[derive(Debug, Clone, Copy)]
enum RefState {
    Pending,
    Bound(EntityId),
}

impl<T: Component> SiblingRef<T> {
    /// An unbound placeholder.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            state: RefState::Pending,
            _marker: PhantomData,
        }
    }

    /// Bind the placeholder to the sibling `T` on the context's entity.
    ///
    /// Fails with [`EntityError::ComponentNotFound`] if the entity holds no
    /// component of that exact type.
    pub fn bind(&mut self, cx: &EntityContext<'_>) -> Result<(), EntityError> {
        if cx.system().try_get_component::<T>(cx.entity()).is_none() {
            return Err(EntityError::ComponentNotFound(std::any::type_name::<T>()));
        }
        self.state = RefState::Bound(cx.entity());
        Ok(())
    }

    /// Whether the reference has been bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        matches!(self.state, RefState::Bound(_))
    }

    /// The bound weak handle, if binding has happened.
    #[must_use]
    pub fn handle(&self) -> Option<ComponentHandle<T>> {
        match self.state {
            RefState::Pending => None,
            RefState::Bound(entity) => Some(ComponentHandle::new(entity)),
        }
    }

    /// Dereference the bound sibling.
    pub fn get<'a>(&self, system: &'a EntitySystem) -> Result<&'a T, EntityError> {
        match self.state {
            RefState::Pending => Err(EntityError::UnresolvedRef(std::any::type_name::<T>())),
            RefState::Bound(entity) => system.get_component::<T>(entity),
        }
    }
}

impl<T: Component> Default for SiblingRef<T> {
    fn default() -> Self {
        Self::pending()
    }
}

impl<T: Component> std::fmt::Debug for SiblingRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SiblingRef<{}>({:?})",
            std::any::type_name::<T>(),
            self.state
        )
    }
}
