use super::classifier::{Classification, changed_fields, classify};
use crate::core::{RemoteId, Snapshot};
use crate::model::{ColorImage, ProductFields, Resource};
use crate::session::{SessionSnapshot, WorkingCopy};
use crate::store::{Collection, OpKind, Payload};
use serde::Serialize;

/// What happens to the root product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", content = "payload", rename_all = "snake_case")]
pub enum ProductChange {
    Create(Payload),
    Update(Payload),
    Unchanged,
}

impl ProductChange {
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Create(payload) | Self::Update(payload) => Some(payload),
            Self::Unchanged => None,
        }
    }
}

/// Image changes of the color at `color_slot`, against the session's images.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagePlan {
    pub color_slot: usize,
    pub color_id: Option<RemoteId>,
    /// Images the session knows for this color; empty for new colors
    #[serde(skip)]
    pub baseline: Snapshot<ColorImage>,
    pub changes: Classification,
}

/// Every operation a save would issue, before any of it runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavePlan {
    pub product_id: Option<RemoteId>,
    pub product: ProductChange,
    pub colors: Classification,
    pub images: Vec<ImagePlan>,
    pub sizes: Classification,
    pub features: Classification,
}

/// One line of a plan, flattened for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedOperation {
    pub collection: Collection,
    pub kind: OpKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RemoteId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_slot: Option<usize>,
    pub fields: Vec<&'static str>,
    pub upload: bool,
}

fn plan_product(snapshot: &SessionSnapshot, product: &ProductFields) -> ProductChange {
    let mut payload = Payload::new();
    payload.upload = product.image.clone();

    match (snapshot.product_id, &snapshot.product) {
        (Some(_), Some(stored)) => {
            payload.fields = changed_fields(&stored.fields(), product.fields());
            if payload.is_empty() {
                ProductChange::Unchanged
            } else {
                ProductChange::Update(payload)
            }
        }
        (Some(_), None) => {
            payload.fields = product.fields();
            ProductChange::Update(payload)
        }
        (None, _) => {
            payload.fields = product.fields();
            ProductChange::Create(payload)
        }
    }
}

impl SavePlan {
    /// Diffs a working copy against the session snapshot. Pure.
    pub fn build(snapshot: &SessionSnapshot, working: &WorkingCopy) -> Self {
        let colors = classify(&snapshot.colors, &working.colors);

        let images = working
            .colors
            .iter()
            .enumerate()
            .filter(|(slot, _)| !colors.duplicates.contains(slot))
            .filter_map(|(slot, entry)| {
                let baseline = entry
                    .id()
                    .map(|id| snapshot.images_of(id))
                    .unwrap_or_default();
                let changes = classify(&baseline, &entry.item().images);
                (!changes.is_empty()).then_some(ImagePlan {
                    color_slot: slot,
                    color_id: entry.id(),
                    baseline,
                    changes,
                })
            })
            .collect();

        Self {
            product_id: snapshot.product_id,
            product: plan_product(snapshot, &working.product),
            colors,
            images,
            sizes: classify(&snapshot.sizes, &working.sizes),
            features: classify(&snapshot.features, &working.features),
        }
    }

    pub fn image_plan(&self, color_slot: usize) -> Option<&ImagePlan> {
        self.images.iter().find(|plan| plan.color_slot == color_slot)
    }

    pub fn operation_count(&self) -> usize {
        let product = usize::from(self.product != ProductChange::Unchanged);
        product
            + self.colors.operation_count()
            + self
                .images
                .iter()
                .map(|plan| plan.changes.operation_count())
                .sum::<usize>()
            + self.sizes.operation_count()
            + self.features.operation_count()
    }

    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }

    /// Flat list of the planned calls: product first, then each collection
    /// with deletes before creates and updates.
    pub fn operations(&self) -> Vec<PlannedOperation> {
        let mut operations = Vec::new();

        if let Some(payload) = self.product.payload() {
            operations.push(PlannedOperation {
                collection: Collection::Products,
                kind: if self.product.is_create() {
                    OpKind::Create
                } else {
                    OpKind::Update
                },
                slot: None,
                id: self.product_id,
                color_slot: None,
                fields: payload.field_names(),
                upload: payload.upload.is_some(),
            });
        }

        push_collection(&mut operations, Collection::Colors, &self.colors, None);
        for plan in &self.images {
            push_collection(&mut operations, Collection::ColorImages, &plan.changes, Some(plan.color_slot));
        }
        push_collection(&mut operations, Collection::Sizes, &self.sizes, None);
        push_collection(&mut operations, Collection::Features, &self.features, None);
        operations
    }
}

fn push_collection(
    operations: &mut Vec<PlannedOperation>,
    collection: Collection,
    classification: &Classification,
    color_slot: Option<usize>,
) {
    for id in &classification.to_delete {
        operations.push(PlannedOperation {
            collection,
            kind: OpKind::Delete,
            slot: None,
            id: Some(*id),
            color_slot,
            fields: Vec::new(),
            upload: false,
        });
    }
    for create in &classification.to_create {
        operations.push(PlannedOperation {
            collection,
            kind: OpKind::Create,
            slot: Some(create.slot),
            id: None,
            color_slot,
            fields: create.payload.field_names(),
            upload: create.payload.upload.is_some(),
        });
    }
    for update in &classification.to_update {
        operations.push(PlannedOperation {
            collection,
            kind: OpKind::Update,
            slot: Some(update.slot),
            id: Some(update.id),
            color_slot,
            fields: update.payload.field_names(),
            upload: false,
        });
    }
}
