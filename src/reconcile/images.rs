//! Image sub-reconciler: one color's images, run once the color has an identity.

use super::classifier::classify;
use super::config::ImageBaseline;
use super::plan::ImagePlan;
use super::results::{CollectionOutcome, ImageOutcome, OperationError};
use super::scheduler::Scheduler;
use crate::core::{RemoteId, Snapshot};
use crate::model::{ColorImage, snapshot_from_records};
use crate::session::WorkingCopy;
use crate::store::{Collection, OpKind};
use tracing::{Instrument, Level, event, info_span};

/// Reconciles the images of the color at `plan.color_slot`.
///
/// A color created in this save starts from an empty baseline. A persisted
/// color diffs against the session's images or, with
/// [`ImageBaseline::Remote`], against the store's current list for it.
pub(crate) async fn reconcile_images(
    scheduler: &Scheduler<'_>,
    plan: &ImagePlan,
    color_id: RemoteId,
    color_is_new: bool,
    working: &WorkingCopy,
) -> ImageOutcome {
    let span = info_span!("catalog.images", color = %color_id, slot = plan.color_slot);

    async {
        let images = working
            .colors
            .get(plan.color_slot)
            .map(|entry| entry.item().images.as_slice())
            .unwrap_or(&[]);

        let (baseline, changes) = if color_is_new {
            (Snapshot::empty(), plan.changes.clone())
        } else {
            match scheduler.config().image_baseline {
                ImageBaseline::Session => (plan.baseline.clone(), plan.changes.clone()),
                ImageBaseline::Remote => {
                    let listed = scheduler
                        .list(Collection::ColorImages, color_id)
                        .await
                        .and_then(|records| snapshot_from_records::<ColorImage>(&records));
                    match listed {
                        Ok(remote) => {
                            let changes = classify(&remote, images);
                            if remote != plan.baseline {
                                event!(
                                    Level::INFO,
                                    session = plan.baseline.len(),
                                    remote = remote.len(),
                                    "store images differ from session"
                                );
                            }
                            (remote, changes)
                        }
                        Err(err) => {
                            event!(Level::WARN, error = %err, "listing color images failed");
                            let failure = OperationError::new(Collection::ColorImages, OpKind::List, err)
                                .id(Some(color_id))
                                .color_slot(Some(plan.color_slot));
                            return ImageOutcome {
                                color_slot: plan.color_slot,
                                color_id,
                                baseline: None,
                                outcome: CollectionOutcome {
                                    failures: vec![failure],
                                    ..CollectionOutcome::default()
                                },
                            };
                        }
                    }
                }
            }
        };

        let outcome = scheduler
            .run_collection(Collection::ColorImages, color_id, &changes, Some(plan.color_slot))
            .await;

        ImageOutcome {
            color_slot: plan.color_slot,
            color_id,
            baseline: Some(baseline),
            outcome,
        }
    }
    .instrument(span)
    .await
}
