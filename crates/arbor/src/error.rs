//! Error types for the entity/component runtime and the save engine.

use crate::entity::EntityId;

/// Errors raised by entity/component lifecycle and index operations.
///
/// Every failure is a distinct variant so callers can branch on kind.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    /// The entity already holds a component of this type.
    #[error("entity already contains a component of type \"{0}\"")]
    DuplicateComponent(&'static str),

    /// Exact-type lookup on an entity found nothing.
    #[error("entity does not contain a component of type \"{0}\"")]
    ComponentNotFound(&'static str),

    /// System-wide lookup found no live instance of the type.
    #[error("failed to find a component of type \"{0}\"")]
    NoInstance(&'static str),

    /// The entity id does not name a live entity.
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    /// A component was unregistered from the index without being registered.
    /// Indicates double disposal or index corruption.
    #[error("tried to unregister a component that was never registered")]
    ComponentNotRegistered,

    /// A root entity was untracked without being tracked.
    #[error("tried to unregister an entity that was never registered")]
    EntityNotTracked,

    /// A sibling reference was dereferenced before being bound.
    #[error("sibling reference to \"{0}\" was never bound")]
    UnresolvedRef(&'static str),
}

/// Errors raised while saving or loading an object graph.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// A component carries a manifest but its type is missing from the
    /// configured registry. Treated as a configuration bug, not a skip.
    #[error("found serializable component \"{0}\", but it is not registered in the registry")]
    SerializableComponentNotRegistered(String),

    /// A saved entity's parent holds no manifested component, so the record
    /// format cannot represent the child's parent edge.
    #[error("serialized entity {0} has a parent that is not serialized")]
    NonSerializableParent(String),

    /// A component record names a type unknown to the registry.
    #[error("no registered component with name \"{0}\"")]
    UnknownComponent(String),

    /// An entity was looked up in a saving index it was never registered in.
    #[error("tried to get id of an entity not registered in the saving index")]
    EntityNotIndexed,

    /// An id was looked up in a saving index that never assigned it.
    #[error("no entity with id \"{0}\" found")]
    UnknownId(String),

    /// Two entities were registered under the same id during one load.
    #[error("duplicate id \"{0}\" for registered entity")]
    DuplicateId(String),

    /// A registry was modified after `finish()` locked it.
    #[error("component registry is finished and no longer accepts registrations")]
    RegistryFinished,

    /// A stored reference field held something other than an id string.
    #[error("malformed reference value for field \"{0}\"")]
    MalformedReference(String),

    /// An entity/component operation failed while reconstructing the graph.
    #[error(transparent)]
    Entity(#[from] EntityError),
}
