//! Folding save results back into a session.

use super::state::{SessionSnapshot, WorkingCopy, without_images};
use crate::core::{Entry, RemoteId, Snapshot, Stored};
use crate::model::{ProductFields, Record, Resource, record};
use crate::reconcile::{CollectionOutcome, ReconcileResults};
use std::collections::HashSet;

fn adopt_record<T: Resource>(item: &mut T, record: &Record) {
    if let Ok(confirmed) = T::from_record(record) {
        item.adopt(confirmed);
    }
}

/// Patches identities and confirmed values into `working` and derives the
/// collection's next snapshot from `old`.
///
/// Created and updated items take their working slot as position. Items
/// whose update or delete failed keep their old snapshot entry; failed
/// creates stay pending.
pub fn merge_collection<T: Resource>(
    old: &Snapshot<T>,
    working: &mut [Entry<T>],
    outcome: &CollectionOutcome,
) -> Snapshot<T> {
    for created in &outcome.created {
        let Some(entry) = working.get_mut(created.slot) else { continue };
        if entry.is_pending() {
            let mut item = entry.item().clone();
            adopt_record(&mut item, &created.record);
            *entry = Entry::persisted(created.id, item);
        }
    }
    for updated in &outcome.updated {
        let Some(entry) = working.get_mut(updated.slot) else { continue };
        if entry.id() == Some(updated.id) {
            adopt_record(entry.item_mut(), &updated.record);
        }
    }

    let deleted: HashSet<RemoteId> = outcome.deleted.iter().copied().collect();
    let confirmed: Vec<(usize, RemoteId)> = outcome
        .created
        .iter()
        .chain(outcome.updated.iter())
        .map(|confirmed| (confirmed.slot, confirmed.id))
        .collect();
    let refreshed: HashSet<RemoteId> = confirmed.iter().map(|(_, id)| *id).collect();

    let mut stored: Vec<Stored<T>> = old
        .iter()
        .filter(|stored| !deleted.contains(&stored.id) && !refreshed.contains(&stored.id))
        .cloned()
        .collect();
    for (slot, id) in confirmed {
        if let Some(entry) = working.get(slot).filter(|entry| entry.id() == Some(id)) {
            stored.push(Stored::new(id, slot, entry.item().clone()));
        }
    }

    Snapshot::from_stored(stored)
}

fn merge_product(snapshot: &mut SessionSnapshot, product: &mut ProductFields, results: &ReconcileResults) {
    let Some(record) = &results.product.record else { return };

    match ProductFields::from_record(record) {
        Ok(confirmed) => product.adopt(confirmed),
        Err(_) => {
            product.image = None;
            if let Some(url) = record::opt_text(record, "image") {
                product.image_url = Some(url);
            }
        }
    }

    snapshot.product_id = results.product_id;
    snapshot.product = Some(product.clone());
}

/// Applies `results` to a session's snapshot and working copy.
pub fn apply(snapshot: &mut SessionSnapshot, working: &mut WorkingCopy, results: &ReconcileResults) {
    merge_product(snapshot, &mut working.product, results);

    let colors = merge_collection(&snapshot.colors, &mut working.colors, &results.colors);
    snapshot.colors = Snapshot::from_stored(colors.iter().map(|stored| Stored {
        item: without_images(&stored.item),
        ..stored.clone()
    }));
    for id in &results.colors.deleted {
        snapshot.color_images.remove(id);
    }

    for images in &results.images {
        let Some(baseline) = &images.baseline else { continue };
        let Some(color) = working.colors.get_mut(images.color_slot) else { continue };
        if color.id() != Some(images.color_id) {
            continue;
        }
        let merged = merge_collection(baseline, &mut color.item_mut().images, &images.outcome);
        snapshot.color_images.insert(images.color_id, merged);
    }

    snapshot.sizes = merge_collection(&snapshot.sizes, &mut working.sizes, &results.sizes);
    snapshot.features = merge_collection(&snapshot.features, &mut working.features, &results.features);
}
