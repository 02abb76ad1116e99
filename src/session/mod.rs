//! Session state holder.
//!
//! An [`EditSession`] owns a frozen snapshot of what the store last
//! confirmed and a working copy the user edits freely. Saving validates the
//! working copy, plans the differences, persists them and folds the results
//! back so that a retry only re-issues what did not succeed.

pub mod merge;
pub mod state;

pub use state::{SessionSnapshot, WorkingCopy};

use crate::core::{ReconcileError, RemoteId, Result, Snapshot, StoreResult};
use crate::model::{Category, ColorImage, ColorVariant, ProductFields, Resource, Upload, snapshot_from_records};
use crate::reconcile::{self, ReconcileConfig, ReconcileResults, SavePlan};
use crate::store::{CatalogStore, Collection};
use crate::validation::{self, ValidationContext, ValidationLimits, ValidationReport};
use futures::future::try_join_all;
use tracing::{Instrument, Level, event, info_span};

#[derive(Debug, Clone)]
pub struct EditSession {
    snapshot: SessionSnapshot,
    working: WorkingCopy,
    categories: Vec<Category>,
    limits: ValidationLimits,
}

/// Lists every category, parsed.
pub async fn load_categories(store: &dyn CatalogStore) -> StoreResult<Vec<Category>> {
    store
        .list(Collection::Categories, None)
        .await?
        .iter()
        .map(Category::from_record)
        .collect()
}

impl EditSession {
    /// Loads a product with its colors, each color's images, sizes,
    /// features and the category list.
    pub async fn load(store: &dyn CatalogStore, product_id: RemoteId) -> Result<Self> {
        let span = info_span!("catalog.load", product = %product_id);

        async {
            let record = store.fetch(Collection::Products, product_id).await?;
            let product = ProductFields::from_record(&record)?;

            let (colors, sizes, features, categories) = futures::try_join!(
                store.list(Collection::Colors, Some(product_id)),
                store.list(Collection::Sizes, Some(product_id)),
                store.list(Collection::Features, Some(product_id)),
                load_categories(store),
            )?;

            let colors: Snapshot<ColorVariant> = snapshot_from_records(&colors)?;
            let color_images = try_join_all(colors.ids().map(|color| async move {
                let records = store.list(Collection::ColorImages, Some(color)).await?;
                let images: Snapshot<ColorImage> = snapshot_from_records(&records)?;
                StoreResult::Ok((color, images))
            }))
            .await?
            .into_iter()
            .collect();

            let snapshot = SessionSnapshot {
                product_id: Some(product_id),
                product: Some(product),
                colors,
                color_images,
                sizes: snapshot_from_records(&sizes)?,
                features: snapshot_from_records(&features)?,
            };
            event!(
                Level::INFO,
                colors = snapshot.colors.len(),
                sizes = snapshot.sizes.len(),
                features = snapshot.features.len(),
                "session loaded"
            );
            Ok(Self::from_snapshot(snapshot, categories))
        }
        .instrument(span)
        .await
    }

    /// Session for a product that does not exist in the store yet
    pub fn new_product(product: ProductFields, categories: Vec<Category>) -> Self {
        Self::from_parts(SessionSnapshot::default(), WorkingCopy::new(product), categories)
    }

    /// Session whose working copy equals `snapshot`
    pub fn from_snapshot(snapshot: SessionSnapshot, categories: Vec<Category>) -> Self {
        let working = snapshot
            .to_working()
            .unwrap_or_else(|| WorkingCopy::new(ProductFields::new("", "0", None)));
        Self::from_parts(snapshot, working, categories)
    }

    pub fn from_parts(snapshot: SessionSnapshot, working: WorkingCopy, categories: Vec<Category>) -> Self {
        Self {
            snapshot,
            working,
            categories,
            limits: ValidationLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn product_id(&self) -> Option<RemoteId> {
        self.snapshot.product_id
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    pub fn working(&self) -> &WorkingCopy {
        &self.working
    }

    pub fn working_mut(&mut self) -> &mut WorkingCopy {
        &mut self.working
    }

    /// Replaces the working copy wholesale, e.g. with one read from a file
    pub fn replace_working(&mut self, mut working: WorkingCopy) {
        working.normalize();
        self.working = working;
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Attaches uploads to a color within the per-color image limit
    pub fn attach_images(&mut self, color: usize, uploads: Vec<Upload>) -> Option<usize> {
        let limit = self.limits.images_per_color;
        self.working.attach_images(color, uploads, limit)
    }

    /// Throws away every edit since the last load or save
    pub fn discard_changes(&mut self) {
        if let Some(working) = self.snapshot.to_working() {
            self.working = working;
        }
    }

    pub fn validate(&self) -> ValidationReport {
        let context = ValidationContext {
            snapshot: &self.snapshot,
            categories: &self.categories,
            limits: &self.limits,
        };
        validation::validate(&self.working, &context)
    }

    /// Operations a save would issue right now, without touching the store
    pub fn plan(&self) -> Result<SavePlan> {
        let report = self.validate();
        if !report.is_valid() {
            return Err(ReconcileError::Validation(report));
        }
        Ok(SavePlan::build(&self.snapshot, &self.working))
    }

    /// Whether the working copy differs from the snapshot
    pub fn is_dirty(&self) -> bool {
        !SavePlan::build(&self.snapshot, &self.working).is_empty()
    }

    /// Validates, persists the differences and folds the results back.
    ///
    /// Store failures do not fail the call; they are reported in the
    /// returned results and the session keeps them pending for a retry.
    pub async fn save(&mut self, store: &dyn CatalogStore, config: &ReconcileConfig) -> Result<ReconcileResults> {
        self.working.normalize();
        let plan = self.plan()?;
        if plan.is_empty() {
            event!(Level::DEBUG, "nothing to save");
            return Ok(ReconcileResults::new(self.snapshot.product_id));
        }

        let results = reconcile::persist(store, config, &plan, &self.working).await?;
        self.apply_results(&results);
        Ok(results)
    }

    /// Merges identities and confirmed values into the working copy and
    /// rebuilds the snapshot from what succeeded.
    pub fn apply_results(&mut self, results: &ReconcileResults) {
        merge::apply(&mut self.snapshot, &mut self.working, results);
    }
}
