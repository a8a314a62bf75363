//! Entity identifiers and the two-stage entity builder.
//!
//! An [`EntityId`] is a lightweight `u64` handle; all entity state lives in
//! the owning [`EntitySystem`](crate::system::EntitySystem). Entities are
//! constructed through a typestate builder: an [`EntityBuilder`] accumulates
//! component declarations but cannot build until a system (or a parent, which
//! implies its system) is attached, producing a [`ReadyBuilder`].
//!
//! Construction is two-phase: every declared component is constructed
//! first, in declaration order, and only then does the `init` pass run,
//! so `init` can look up any sibling regardless of order.

use std::any::TypeId;

use crate::component::Component;
use crate::error::EntityError;
use crate::save::registry::RegistryEntry;
use crate::system::{EntityContext, EntitySystem};

/// A unique entity identifier within one [`EntitySystem`](crate::system::EntitySystem).
///
/// Entities are pure identifiers — components attached to them give them
/// meaning. Ids are never reused within one system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) u64);

impl EntityId {
    /// The null / invalid entity sentinel. Never allocated.
    pub const INVALID: EntityId = EntityId(0);

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) entity id.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// A pending component declaration inside a builder.
pub(crate) struct PendingComponent {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) construct: Box<dyn FnOnce(&mut EntityContext<'_>) -> Box<dyn Component>>,
}

fn push_pending(
    pending: &mut Vec<PendingComponent>,
    declaration: PendingComponent,
) -> Result<(), EntityError> {
    if pending.iter().any(|p| p.type_id == declaration.type_id) {
        return Err(EntityError::DuplicateComponent(declaration.type_name));
    }
    pending.push(declaration);
    Ok(())
}

fn pending_for<T, F>(ctor: F) -> PendingComponent
where
    T: Component,
    F: FnOnce(&mut EntityContext<'_>) -> T + 'static,
{
    PendingComponent {
        type_id: TypeId::of::<T>(),
        type_name: std::any::type_name::<T>(),
        construct: Box::new(move |cx| Box::new(ctor(cx))),
    }
}

/// An entity builder without a system bound. Cannot build yet.
///
/// Component declarations are accumulated in order; nothing is constructed
/// until [`ReadyBuilder::build`].
#[derive(Default)]
pub struct EntityBuilder {
    pending: Vec<PendingComponent>,
}

impl EntityBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Declare a component of type `T`, constructed by `ctor` during build.
    ///
    /// Declaring the same type twice is rejected, naming the type.
    pub fn add_component<T, F>(mut self, ctor: F) -> Result<Self, EntityError>
    where
        T: Component,
        F: FnOnce(&mut EntityContext<'_>) -> T + 'static,
    {
        push_pending(&mut self.pending, pending_for(ctor))?;
        Ok(self)
    }

    pub(crate) fn add_registered(mut self, entry: &RegistryEntry) -> Result<Self, EntityError> {
        push_pending(&mut self.pending, entry.pending())?;
        Ok(self)
    }

    /// Bind the builder to a system; the entity will be built as a root.
    pub fn with_system(self, system: &mut EntitySystem) -> ReadyBuilder<'_> {
        ReadyBuilder {
            system,
            parent: None,
            pending: self.pending,
        }
    }

    /// Bind the builder to a parent entity, inheriting the parent's system.
    /// The entity is attached as a child only after its components have been
    /// constructed and initialized.
    pub fn with_parent(
        self,
        system: &mut EntitySystem,
        parent: EntityId,
    ) -> Result<ReadyBuilder<'_>, EntityError> {
        if !system.contains(parent) {
            return Err(EntityError::EntityNotFound(parent));
        }
        Ok(ReadyBuilder {
            system,
            parent: Some(parent),
            pending: self.pending,
        })
    }
}

/// A builder with a system (and optionally a parent) bound, ready to build.
pub struct ReadyBuilder<'a> {
    system: &'a mut EntitySystem,
    parent: Option<EntityId>,
    pending: Vec<PendingComponent>,
}

impl<'a> ReadyBuilder<'a> {
    /// Declare a component of type `T`, constructed by `ctor` during build.
    pub fn add_component<T, F>(mut self, ctor: F) -> Result<Self, EntityError>
    where
        T: Component,
        F: FnOnce(&mut EntityContext<'_>) -> T + 'static,
    {
        push_pending(&mut self.pending, pending_for(ctor))?;
        Ok(self)
    }

    pub(crate) fn add_registered(mut self, entry: &RegistryEntry) -> Result<Self, EntityError> {
        push_pending(&mut self.pending, entry.pending())?;
        Ok(self)
    }

    /// Build the entity: construct every declared component in declaration
    /// order, run the `init` pass over all of them, then attach the entity
    /// to its parent (or track it as a root).
    ///
    /// If any constructor or `init` fails, the partially built entity is
    /// disposed before the error is returned.
    pub fn build(self) -> Result<EntityId, EntityError> {
        self.system.build_entity(self.parent, self.pending)
    }
}

/// A reusable entity template: populates a ready builder and builds it.
///
/// Any `Fn(ReadyBuilder) -> Result<EntityId, EntityError>` closure is a
/// prefab, so templates compose naturally:
///
/// ```ignore
/// let torch = |b: ReadyBuilder| {
///     b.add_component(|_| Light::new(0.6))?.build()
/// };
/// let entity = system.spawn(torch)?;
/// ```
pub trait Prefab {
    fn populate(&self, builder: ReadyBuilder<'_>) -> Result<EntityId, EntityError>;
}

impl<F> Prefab for F
where
    F: for<'a> Fn(ReadyBuilder<'a>) -> Result<EntityId, EntityError>,
{
    fn populate(&self, builder: ReadyBuilder<'_>) -> Result<EntityId, EntityError> {
        self(builder)
    }
}
