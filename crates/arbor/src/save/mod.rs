//! Manifest-driven save and load for entity graphs.

pub mod data;
pub mod index;
pub mod manifest;
pub mod registry;
pub mod saver;

pub use data::{ComponentRecord, EntityRecord, SaveData};
pub use index::SavingIndex;
pub use manifest::{Field, LoadPayload, Manifest, SavePayload, SaveType};
pub use registry::{ComponentRegistry, Persist, RegistryEntry};
pub use saver::{EntitySaver, LoadReport};
