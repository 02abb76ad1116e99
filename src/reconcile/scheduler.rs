//! Cascading persistence scheduler.
//!
//! Runs a [`SavePlan`] against a store in one task. Independent work is
//! dispatched together and awaited jointly; a node only dispatches after its
//! barriers completed. Within a collection deletes go first, then creates
//! and updates together. Failures are recorded and never stop siblings.

use super::classifier::Classification;
use super::config::ReconcileConfig;
use super::graph::{Barrier, TaskGraph, TaskNode};
use super::images::reconcile_images;
use super::plan::{ImagePlan, ProductChange, SavePlan};
use super::results::{
    CollectionOutcome, Confirmed, ImageOutcome, OperationError, ReconcileResults, Skipped,
};
use crate::core::{ReconcileError, RemoteId, Result, StoreError, StoreResult};
use crate::model::{Record, record};
use crate::session::WorkingCopy;
use crate::store::{CatalogStore, Collection, OpKind, Payload};
use futures::future::{BoxFuture, FutureExt, join_all};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{Instrument, Level, event, info_span};

type OpResult<T> = std::result::Result<T, OperationError>;

enum ImageWork {
    None,
    Done(ImageOutcome),
    Skipped(Skipped),
}

struct ColorTask {
    write: Option<(OpKind, OpResult<Confirmed>)>,
    images: ImageWork,
}

pub struct Scheduler<'a> {
    store: &'a dyn CatalogStore,
    config: &'a ReconcileConfig,
    permits: Semaphore,
}

impl<'a> Scheduler<'a> {
    pub fn new(store: &'a dyn CatalogStore, config: &'a ReconcileConfig) -> Self {
        Self {
            store,
            config,
            permits: Semaphore::new(config.max_concurrent_requests.max(1)),
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        self.config
    }

    async fn permit(&self) -> StoreResult<SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| StoreError::Transport("in-flight semaphore closed".to_string()))
    }

    pub(crate) async fn list(&self, collection: Collection, parent: RemoteId) -> StoreResult<Vec<Record>> {
        let _permit = self.permit().await?;
        self.store.list(collection, Some(parent)).await
    }

    async fn create(&self, collection: Collection, parent: Option<RemoteId>, slot: usize, payload: &Payload) -> OpResult<Confirmed> {
        let fail = |error| OperationError::new(collection, OpKind::Create, error).slot(Some(slot));
        let created = async {
            let _permit = self.permit().await?;
            let record = self.store.create(collection, parent, payload).await?;
            let id = record::record_id(&record)?;
            StoreResult::Ok(Confirmed { slot, id, record })
        }
        .await;

        match created {
            Ok(confirmed) => {
                event!(Level::DEBUG, collection = %collection, id = %confirmed.id, slot, "created");
                Ok(confirmed)
            }
            Err(err) => {
                event!(Level::WARN, collection = %collection, slot, error = %err, "create failed");
                Err(fail(err))
            }
        }
    }

    async fn update(&self, collection: Collection, slot: usize, id: RemoteId, payload: &Payload) -> OpResult<Confirmed> {
        let updated = async {
            let _permit = self.permit().await?;
            self.store.update(collection, id, payload).await
        }
        .await;

        match updated {
            Ok(record) => {
                event!(Level::DEBUG, collection = %collection, id = %id, fields = ?payload.field_names(), "updated");
                Ok(Confirmed { slot, id, record })
            }
            Err(err) => {
                event!(Level::WARN, collection = %collection, id = %id, error = %err, "update failed");
                Err(OperationError::new(collection, OpKind::Update, err)
                    .slot(Some(slot))
                    .id(Some(id)))
            }
        }
    }

    async fn delete(&self, collection: Collection, id: RemoteId) -> OpResult<RemoteId> {
        let deleted = async {
            let _permit = self.permit().await?;
            self.store.delete(collection, id).await
        }
        .await;

        match deleted {
            Ok(()) => {
                event!(Level::DEBUG, collection = %collection, id = %id, "deleted");
                Ok(id)
            }
            Err(err) => {
                event!(Level::WARN, collection = %collection, id = %id, error = %err, "delete failed");
                Err(OperationError::new(collection, OpKind::Delete, err).id(Some(id)))
            }
        }
    }

    fn record_deletes(outcome: &mut CollectionOutcome, results: Vec<OpResult<RemoteId>>, color_slot: Option<usize>) {
        for result in results {
            match result {
                Ok(id) => outcome.deleted.push(id),
                Err(err) => outcome.failures.push(err.color_slot(color_slot)),
            }
        }
    }

    fn record_write(outcome: &mut CollectionOutcome, kind: OpKind, result: OpResult<Confirmed>, color_slot: Option<usize>) {
        match (kind, result) {
            (OpKind::Create, Ok(confirmed)) => outcome.created.push(confirmed),
            (_, Ok(confirmed)) => outcome.updated.push(confirmed),
            (_, Err(err)) => outcome.failures.push(err.color_slot(color_slot)),
        }
    }

    /// Runs one child collection's operations under `parent`.
    pub(crate) async fn run_collection(
        &self,
        collection: Collection,
        parent: RemoteId,
        classification: &Classification,
        color_slot: Option<usize>,
    ) -> CollectionOutcome {
        let mut outcome = CollectionOutcome::default();
        if classification.is_empty() {
            return outcome;
        }

        let span = info_span!("catalog.collection", collection = %collection, parent = %parent);
        async {
            let deletes = join_all(
                classification
                    .to_delete
                    .iter()
                    .map(|id| self.delete(collection, *id)),
            )
            .await;
            Self::record_deletes(&mut outcome, deletes, color_slot);

            let creates = classification.to_create.iter().map(|create| {
                self.create(collection, Some(parent), create.slot, &create.payload)
                    .map(|result| (OpKind::Create, result))
                    .boxed()
            });
            let updates = classification.to_update.iter().map(|update| {
                self.update(collection, update.slot, update.id, &update.payload)
                    .map(|result| (OpKind::Update, result))
                    .boxed()
            });

            for (kind, result) in join_all(creates.chain(updates)).await {
                Self::record_write(&mut outcome, kind, result, color_slot);
            }
        }
        .instrument(span)
        .await;

        outcome
    }

    fn color_task(
        &'a self,
        kind: OpKind,
        write: BoxFuture<'a, OpResult<Confirmed>>,
        images: Option<&'a ImagePlan>,
        working: &'a WorkingCopy,
    ) -> BoxFuture<'a, ColorTask> {
        async move {
            let result = write.await;
            let images = match (&result, images) {
                (Ok(confirmed), Some(plan)) => ImageWork::Done(
                    reconcile_images(self, plan, confirmed.id, kind == OpKind::Create, working).await,
                ),
                (Err(_), Some(plan)) => ImageWork::Skipped(Skipped {
                    node: TaskNode::ColorImages {
                        color_slot: plan.color_slot,
                    },
                    reason: format!("color {} failed", kind),
                }),
                (_, None) => ImageWork::None,
            };
            ColorTask {
                write: Some((kind, result)),
                images,
            }
        }
        .boxed()
    }

    async fn run_colors(
        &'a self,
        product_id: RemoteId,
        plan: &'a SavePlan,
        working: &'a WorkingCopy,
        graph: &TaskGraph,
    ) -> (CollectionOutcome, Vec<ImageOutcome>, Vec<Skipped>) {
        let mut outcome = CollectionOutcome::default();
        let mut images = Vec::new();
        let mut skipped = Vec::new();

        let span = info_span!("catalog.collection", collection = %Collection::Colors, parent = %product_id);
        async {
            let deletes = join_all(
                plan.colors
                    .to_delete
                    .iter()
                    .map(|id| self.delete(Collection::Colors, *id)),
            )
            .await;
            Self::record_deletes(&mut outcome, deletes, None);

            let mut tasks: Vec<BoxFuture<'a, ColorTask>> = Vec::new();
            for create in &plan.colors.to_create {
                let write = self
                    .create(Collection::Colors, Some(product_id), create.slot, &create.payload)
                    .boxed();
                tasks.push(self.color_task(OpKind::Create, write, plan.image_plan(create.slot), working));
            }
            for update in &plan.colors.to_update {
                let write = self
                    .update(Collection::Colors, update.slot, update.id, &update.payload)
                    .boxed();
                tasks.push(self.color_task(OpKind::Update, write, plan.image_plan(update.slot), working));
            }
            for image_plan in plan
                .images
                .iter()
                .filter(|image_plan| !graph.waits_on_color(image_plan.color_slot))
            {
                match image_plan.color_id {
                    Some(color_id) => tasks.push(
                        async move {
                            ColorTask {
                                write: None,
                                images: ImageWork::Done(
                                    reconcile_images(self, image_plan, color_id, false, working).await,
                                ),
                            }
                        }
                        .boxed(),
                    ),
                    None => skipped.push(Skipped {
                        node: TaskNode::ColorImages {
                            color_slot: image_plan.color_slot,
                        },
                        reason: "color has no identity".to_string(),
                    }),
                }
            }

            for task in join_all(tasks).await {
                if let Some((kind, result)) = task.write {
                    Self::record_write(&mut outcome, kind, result, None);
                }
                match task.images {
                    ImageWork::Done(image_outcome) => images.push(image_outcome),
                    ImageWork::Skipped(skip) => skipped.push(skip),
                    ImageWork::None => {}
                }
            }
        }
        .instrument(span)
        .await;

        images.sort_by_key(|image_outcome| image_outcome.color_slot);
        (outcome, images, skipped)
    }

    /// Executes a plan. Only an inconsistent plan is an error; store
    /// failures end up in the results.
    pub async fn execute(&'a self, plan: &'a SavePlan, working: &'a WorkingCopy) -> Result<ReconcileResults> {
        if plan.product_id.is_none() && !plan.product.is_create() {
            return Err(ReconcileError::InvalidPlan(
                "a product without identity must be created first".to_string(),
            ));
        }
        if let Some(image_plan) = plan
            .images
            .iter()
            .find(|image_plan| image_plan.color_slot >= working.colors.len())
        {
            return Err(ReconcileError::InvalidPlan(format!(
                "image plan refers to missing color slot {}",
                image_plan.color_slot
            )));
        }

        let graph = TaskGraph::from_plan(plan);
        let span = info_span!(
            "catalog.save",
            product = ?plan.product_id,
            operations = plan.operation_count(),
            nodes = graph.len()
        );

        async {
            let mut results = ReconcileResults::new(plan.product_id);

            let product_id = match &plan.product {
                ProductChange::Create(payload) => {
                    match self.create(Collection::Products, None, 0, payload).await {
                        Ok(confirmed) => {
                            event!(Level::INFO, id = %confirmed.id, "product created");
                            results.product.created = Some(confirmed.id);
                            results.product.record = Some(confirmed.record);
                            Some(confirmed.id)
                        }
                        Err(err) => {
                            results.product.failure = Some(err.slot(None));
                            None
                        }
                    }
                }
                ProductChange::Update(payload) => {
                    if let Some(id) = plan.product_id {
                        match self.update(Collection::Products, 0, id, payload).await {
                            Ok(confirmed) => results.product.record = Some(confirmed.record),
                            Err(err) => results.product.failure = Some(err.slot(None)),
                        }
                    }
                    plan.product_id
                }
                ProductChange::Unchanged => plan.product_id,
            };
            results.product_id = product_id;

            let Some(product_id) = product_id else {
                for node in graph.dependents_of(Barrier::Product) {
                    results.skipped.push(Skipped {
                        node,
                        reason: "product create failed".to_string(),
                    });
                }
                return results;
            };

            let ((colors, images, skipped), sizes, features) = futures::join!(
                self.run_colors(product_id, plan, working, &graph),
                self.run_collection(Collection::Sizes, product_id, &plan.sizes, None),
                self.run_collection(Collection::Features, product_id, &plan.features, None),
            );

            results.colors = colors;
            results.images = images;
            results.sizes = sizes;
            results.features = features;
            results.skipped.extend(skipped);

            event!(
                Level::INFO,
                failures = results.failures().len(),
                skipped = results.skipped.len(),
                "save finished"
            );
            results
        }
        .instrument(span)
        .map(Ok)
        .await
    }
}
