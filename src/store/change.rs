// ============================================================================
// Store Change Journal
// ============================================================================
//
// Every mutation accepted by the in-memory store is recorded as a Change.
// A change carries two sequence numbers taken from one shared counter: when
// the call started and when it finished. A child create whose `started`
// is greater than its parent's `finished` was dispatched after the parent
// completed.
//
// ============================================================================

use super::{Collection, OpKind};
use crate::core::{RemoteId, Value};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub type ChangeKind = OpKind;

/// A single mutation applied by the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub collection: Collection,
    /// Identity of the affected resource (assigned identity for creates)
    pub id: RemoteId,
    /// Parent identity the call was addressed to, for child creates
    pub parent: Option<RemoteId>,
    /// Field names sent with the call, in payload order
    pub fields: Vec<String>,
    /// Field values sent with the call
    #[serde(skip)]
    pub values: Vec<(String, Value)>,
    pub with_upload: bool,
    pub started: u64,
    pub finished: u64,
    pub recorded_at: DateTime<Utc>,
}

impl Change {
    /// Get the collection name affected by this change
    pub fn collection_name(&self) -> &'static str {
        self.collection.as_str()
    }

    pub fn is_create(&self) -> bool {
        self.kind == ChangeKind::Create
    }

    pub fn is_update(&self) -> bool {
        self.kind == ChangeKind::Update
    }

    pub fn is_delete(&self) -> bool {
        self.kind == ChangeKind::Delete
    }

    /// Value sent for `field`, if the call carried it
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Whether this call was dispatched only after `other` had completed
    pub fn happened_after(&self, other: &Change) -> bool {
        self.started > other.finished
    }

    /// Whether the two calls were in flight at the same time
    pub fn overlaps(&self, other: &Change) -> bool {
        self.started < other.finished && other.started < self.finished
    }
}
