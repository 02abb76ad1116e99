use super::graph::TaskNode;
use crate::core::{RemoteId, Snapshot, StoreError};
use crate::model::{ColorImage, Record};
use crate::store::{Collection, OpKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A store call that failed during a save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationError {
    pub collection: Collection,
    pub kind: OpKind,
    /// Working slot of the item, for creates and updates
    pub slot: Option<usize>,
    pub id: Option<RemoteId>,
    /// Owning color slot, for image calls
    pub color_slot: Option<usize>,
    #[serde(serialize_with = "serialize_display")]
    pub error: StoreError,
}

fn serialize_display<S: serde::Serializer>(error: &StoreError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

impl OperationError {
    pub fn new(collection: Collection, kind: OpKind, error: StoreError) -> Self {
        Self {
            collection,
            kind,
            slot: None,
            id: None,
            color_slot: None,
            error,
        }
    }

    pub fn slot(mut self, slot: Option<usize>) -> Self {
        self.slot = slot;
        self
    }

    pub fn id(mut self, id: Option<RemoteId>) -> Self {
        self.id = id;
        self
    }

    pub fn color_slot(mut self, color_slot: Option<usize>) -> Self {
        self.color_slot = color_slot;
        self
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.collection)?;
        if let Some(color_slot) = self.color_slot {
            write!(f, " of colors[{}]", color_slot)?;
        }
        if let Some(id) = self.id {
            write!(f, " #{}", id)?;
        }
        if let Some(slot) = self.slot {
            write!(f, " at {}", slot)?;
        }
        write!(f, " failed: {}", self.error)
    }
}

impl std::error::Error for OperationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A successful create or update, with the representation the store returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Confirmed {
    pub slot: usize,
    pub id: RemoteId,
    pub record: Record,
}

/// Results of one collection's operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionOutcome {
    pub created: Vec<Confirmed>,
    pub updated: Vec<Confirmed>,
    pub deleted: Vec<RemoteId>,
    pub failures: Vec<OperationError>,
}

impl CollectionOutcome {
    pub fn succeeded(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn created_at(&self, slot: usize) -> Option<&Confirmed> {
        self.created.iter().find(|confirmed| confirmed.slot == slot)
    }
}

/// Results of one color's image reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageOutcome {
    pub color_slot: usize,
    pub color_id: RemoteId,
    /// Image list the diff ran against; `None` when it could not be read
    pub baseline: Option<Snapshot<ColorImage>>,
    pub outcome: CollectionOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductOutcome {
    pub created: Option<RemoteId>,
    /// Representation returned by a successful create or update
    pub record: Option<Record>,
    pub failure: Option<OperationError>,
}

/// A node that never ran because one of its barriers failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    pub node: TaskNode,
    pub reason: String,
}

/// Everything a save did, per collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileResults {
    pub product_id: Option<RemoteId>,
    pub product: ProductOutcome,
    pub colors: CollectionOutcome,
    pub images: Vec<ImageOutcome>,
    pub sizes: CollectionOutcome,
    pub features: CollectionOutcome,
    pub skipped: Vec<Skipped>,
}

impl ReconcileResults {
    pub fn new(product_id: Option<RemoteId>) -> Self {
        Self {
            product_id,
            ..Self::default()
        }
    }

    pub fn failures(&self) -> Vec<&OperationError> {
        self.product
            .failure
            .iter()
            .chain(self.colors.failures.iter())
            .chain(self.images.iter().flat_map(|images| images.outcome.failures.iter()))
            .chain(self.sizes.failures.iter())
            .chain(self.features.failures.iter())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failures().is_empty() && self.skipped.is_empty()
    }

    pub fn image_outcome(&self, color_slot: usize) -> Option<&ImageOutcome> {
        self.images.iter().find(|images| images.color_slot == color_slot)
    }

    pub fn report(&self) -> SaveReport {
        let mut collections = BTreeMap::new();
        collections.insert(Collection::Colors, CollectionCounts::from(&self.colors));
        collections.insert(Collection::Sizes, CollectionCounts::from(&self.sizes));
        collections.insert(Collection::Features, CollectionCounts::from(&self.features));

        let mut images = CollectionCounts::default();
        for outcome in &self.images {
            images.add(&outcome.outcome);
        }
        collections.insert(Collection::ColorImages, images);

        SaveReport {
            product_id: self.product_id,
            product_created: self.product.created.is_some(),
            collections,
            failures: self.failures().iter().map(|err| err.to_string()).collect(),
            skipped: self
                .skipped
                .iter()
                .map(|skipped| format!("{}: {}", skipped.node, skipped.reason))
                .collect(),
            success: self.is_success(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl CollectionCounts {
    fn add(&mut self, outcome: &CollectionOutcome) {
        self.created += outcome.created.len();
        self.updated += outcome.updated.len();
        self.deleted += outcome.deleted.len();
        self.failed += outcome.failures.len();
    }
}

impl From<&CollectionOutcome> for CollectionCounts {
    fn from(outcome: &CollectionOutcome) -> Self {
        let mut counts = Self::default();
        counts.add(outcome);
        counts
    }
}

/// Printable summary of a save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveReport {
    pub product_id: Option<RemoteId>,
    pub product_created: bool,
    pub collections: BTreeMap<Collection, CollectionCounts>,
    pub failures: Vec<String>,
    pub skipped: Vec<String>,
    pub success: bool,
}
