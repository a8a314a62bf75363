//! The portable save record: an ordered sequence of entity records.
//!
//! This is the abstract map-of-fields shape, not a wire format — it derives
//! serde, so callers pick the encoding (the demo binary uses JSON). Ids are
//! strings unique within one record and must survive a save → load round
//! trip verbatim; load never renumbers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A snapshot of one object graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveData {
    pub entities: Vec<EntityRecord>,
}

/// One saved entity: its id, its parent's id (`None` for roots), and its
/// manifested components in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub parent: Option<String>,
    pub components: Vec<ComponentRecord>,
}

/// One saved component: its registry name and its manifested field values.
///
/// Field values are strings, numbers, booleans, or id strings referencing
/// another entity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub name: String,
    pub data: serde_json::Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trips_through_json() {
        let mut data = serde_json::Map::new();
        data.insert("label".into(), Value::String("lantern".into()));
        data.insert("lit".into(), Value::Bool(true));

        let record = SaveData {
            entities: vec![EntityRecord {
                id: "0".into(),
                parent: None,
                components: vec![ComponentRecord {
                    name: "lamp".into(),
                    data,
                }],
            }],
        };

        let json = serde_json::to_string(&record).unwrap();
        let restored: SaveData = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.entities.len(), 1);
        assert_eq!(restored.entities[0].id, "0");
        assert!(restored.entities[0].parent.is_none());
        assert_eq!(restored.entities[0].components[0].name, "lamp");
        assert_eq!(
            restored.entities[0].components[0].data["label"],
            Value::String("lantern".into())
        );
    }
}
