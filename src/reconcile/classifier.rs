//! Identity and change classification for one collection.

use crate::core::{Entry, RemoteId, Snapshot, Value};
use crate::model::Resource;
use crate::store::Payload;
use serde::Serialize;
use std::collections::HashSet;

/// Field carrying an item's 0-based position in its collection.
pub const POSITION_FIELD: &str = "position";

/// A working item without identity, to be created at `slot`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedCreate {
    pub slot: usize,
    pub payload: Payload,
}

/// A persisted item whose fields or position changed.
///
/// The payload carries only the changed fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedUpdate {
    pub slot: usize,
    pub id: RemoteId,
    pub payload: Payload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Classification {
    pub to_create: Vec<PlannedCreate>,
    pub to_update: Vec<PlannedUpdate>,
    pub to_delete: Vec<RemoteId>,
    pub unchanged: Vec<RemoteId>,
    /// Working slots repeating an identity already classified at an earlier slot
    pub duplicates: Vec<usize>,
}

impl Classification {
    pub fn operation_count(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }

    pub fn creates_slot(&self, slot: usize) -> bool {
        self.to_create.iter().any(|create| create.slot == slot)
    }

    pub fn updates_slot(&self, slot: usize) -> bool {
        self.to_update.iter().any(|update| update.slot == slot)
    }
}

/// Fields of `new` whose value differs from the same key in `old`, in `new` order.
pub fn changed_fields(
    old: &[(&'static str, Value)],
    new: Vec<(&'static str, Value)>,
) -> Vec<(&'static str, Value)> {
    new.into_iter()
        .filter(|(key, value)| {
            old.iter()
                .find(|(old_key, _)| old_key == key)
                .map(|(_, old_value)| old_value != value)
                .unwrap_or(true)
        })
        .collect()
}

fn position_value(slot: usize) -> Value {
    Value::Integer(slot as i64)
}

fn full_payload<T: Resource>(item: &T, slot: usize) -> Payload {
    let mut payload = Payload {
        fields: item.fields(),
        upload: None,
    };
    payload.set(POSITION_FIELD, position_value(slot));
    payload
}

/// Classifies a working collection against its snapshot.
///
/// Every snapshot identity missing from `working` is deleted exactly once.
/// Pending items are created with all fields and their position. Persisted
/// items are compared field by field, position included; only differences
/// are sent. A persisted identity the snapshot does not know is sent as a
/// full update.
pub fn classify<T: Resource>(snapshot: &Snapshot<T>, working: &[Entry<T>]) -> Classification {
    let mut classification = Classification::default();
    let present: HashSet<RemoteId> = working.iter().filter_map(Entry::id).collect();

    classification.to_delete = snapshot
        .iter()
        .map(|stored| stored.id)
        .filter(|id| !present.contains(id))
        .collect();

    let mut seen = HashSet::new();
    for (slot, entry) in working.iter().enumerate() {
        match entry {
            Entry::Pending { item } => {
                let mut payload = full_payload(item, slot);
                payload.upload = item.upload().cloned();
                classification.to_create.push(PlannedCreate { slot, payload });
            }
            Entry::Persisted { id, item } => {
                if !seen.insert(*id) {
                    classification.duplicates.push(slot);
                    continue;
                }

                let Some(stored) = snapshot.get(*id) else {
                    classification.to_update.push(PlannedUpdate {
                        slot,
                        id: *id,
                        payload: full_payload(item, slot),
                    });
                    continue;
                };

                let mut payload = Payload::new();
                payload.fields = changed_fields(&stored.item.fields(), item.fields());
                if stored.position != slot {
                    payload.set(POSITION_FIELD, position_value(slot));
                }

                if payload.is_empty() {
                    classification.unchanged.push(*id);
                } else {
                    classification.to_update.push(PlannedUpdate {
                        slot,
                        id: *id,
                        payload,
                    });
                }
            }
        }
    }

    classification
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Stored;
    use crate::model::{ColorImage, ColorVariant, FeatureTag, Upload};

    fn red() -> ColorVariant {
        ColorVariant::new("Red", "#FF0000", 3)
    }

    #[test]
    fn test_no_edits_no_operations() {
        let snapshot = Snapshot::from_stored(vec![
            Stored::new(RemoteId(5), 0, red()),
            Stored::new(RemoteId(6), 1, ColorVariant::new("Green", "#00FF00", 1)),
        ]);
        let working = snapshot.to_entries();

        let classification = classify(&snapshot, &working);
        assert!(classification.is_empty());
        assert_eq!(classification.unchanged, vec![RemoteId(5), RemoteId(6)]);
    }

    #[test]
    fn test_red_blue_scenario() {
        let snapshot = Snapshot::from_stored(vec![Stored::new(RemoteId(5), 0, red())]);
        let working = vec![
            Entry::pending(ColorVariant::new("Blue", "#0000FF", 2)),
            Entry::persisted(RemoteId(5), red()),
        ];

        let classification = classify(&snapshot, &working);
        assert!(classification.to_delete.is_empty());

        assert_eq!(classification.to_update.len(), 1);
        let update = &classification.to_update[0];
        assert_eq!(update.id, RemoteId(5));
        assert_eq!(update.payload.field_names(), vec!["position"]);
        assert_eq!(update.payload.get("position"), Some(&Value::Integer(1)));

        assert_eq!(classification.to_create.len(), 1);
        let create = &classification.to_create[0];
        assert_eq!(create.slot, 0);
        assert_eq!(create.payload.get("name"), Some(&Value::from("Blue")));
        assert_eq!(create.payload.get("position"), Some(&Value::Integer(0)));
    }

    #[test]
    fn test_field_edit_sends_only_changed_fields() {
        let snapshot = Snapshot::from_stored(vec![Stored::new(RemoteId(5), 0, red())]);
        let mut edited = red();
        edited.stock = 9;

        let classification = classify(&snapshot, &[Entry::persisted(RemoteId(5), edited)]);
        assert_eq!(classification.to_update[0].payload.field_names(), vec!["stock"]);
    }

    #[test]
    fn test_removed_items_deleted_once() {
        let snapshot = Snapshot::from_stored(vec![
            Stored::new(RemoteId(1), 0, FeatureTag::new("a")),
            Stored::new(RemoteId(2), 1, FeatureTag::new("b")),
            Stored::new(RemoteId(3), 2, FeatureTag::new("c")),
        ]);
        let working = vec![Entry::persisted(RemoteId(2), FeatureTag::new("b"))];

        let classification = classify(&snapshot, &working);
        assert_eq!(classification.to_delete, vec![RemoteId(1), RemoteId(3)]);
        assert_eq!(classification.to_update.len(), 1);
        assert_eq!(classification.to_update[0].payload.field_names(), vec!["position"]);
    }

    #[test]
    fn test_duplicate_identity_classified_once() {
        let snapshot = Snapshot::from_stored(vec![Stored::new(RemoteId(1), 0, FeatureTag::new("a"))]);
        let working = vec![
            Entry::persisted(RemoteId(1), FeatureTag::new("a")),
            Entry::persisted(RemoteId(1), FeatureTag::new("a")),
        ];

        let classification = classify(&snapshot, &working);
        assert_eq!(classification.unchanged, vec![RemoteId(1)]);
        assert_eq!(classification.duplicates, vec![1]);
        assert!(classification.is_empty());
    }

    #[test]
    fn test_unknown_identity_gets_full_update() {
        let classification = classify(
            &Snapshot::empty(),
            &[Entry::persisted(RemoteId(8), FeatureTag::new("x"))],
        );
        assert_eq!(classification.to_update[0].payload.field_names(), vec!["name", "position"]);
    }

    #[test]
    fn test_image_create_carries_upload() {
        let upload = Upload::new("a.png", "image/png", vec![1, 2, 3]);
        let snapshot = Snapshot::from_stored(vec![Stored::new(RemoteId(40), 0, ColorImage::stored("x.png"))]);
        let working = vec![
            Entry::pending(ColorImage::upload(upload.clone())),
            Entry::persisted(RemoteId(40), ColorImage::stored("x.png")),
        ];

        let classification = classify(&snapshot, &working);
        assert_eq!(classification.to_create[0].payload.upload, Some(upload));
        assert_eq!(classification.to_create[0].payload.field_names(), vec!["position"]);
        assert_eq!(classification.to_update[0].payload.field_names(), vec!["position"]);
    }
}
