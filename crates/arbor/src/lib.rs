//! An entity-component runtime with manifest-driven persistence.
//!
//! Entities are plain [`EntityId`] handles; every piece of state lives in an
//! [`EntitySystem`]. Entities are assembled through a two-phase builder:
//! component constructors run first, in declaration order, then every
//! component's `init` hook runs with full access to its siblings, so
//! components may wire themselves to each other regardless of declaration
//! order. Disposal cascades through the child tree and keeps the system's
//! type index and event subscriptions consistent.
//!
//! The [`save`] module round-trips entity graphs through [`SaveData`]:
//! components opt in with a [`Manifest`](save::Manifest) describing their
//! persisted fields, and cross-entity references are resolved in a deferred
//! pass so stored graphs may reference entities in any record order.

pub mod component;
pub mod entity;
pub mod error;
pub mod event;
pub mod save;
pub mod system;

pub use component::{Component, ComponentHandle, SiblingRef, TypeKey};
pub use entity::{EntityBuilder, EntityId, Prefab, ReadyBuilder};
pub use error::{EntityError, SaveError};
pub use event::{EventChannel, EventDef, SubscriptionId};
pub use save::{ComponentRegistry, EntitySaver, LoadReport, Persist, SaveData};
pub use system::{EntityContext, EntitySystem};
