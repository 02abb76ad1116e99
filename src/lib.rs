// ============================================================================
// Catalog Reconcile Library
// ============================================================================

pub mod core;
pub mod model;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod validation;

// Re-export main types for convenience
pub use core::{Entry, ReconcileError, RemoteId, Result, Snapshot, StoreError, StoreResult, Stored, Value};
pub use model::{
    Category, ColorImage, ColorVariant, FeatureTag, ImageContent, ProductFields, Record, Resource, SizeVariant, Upload,
};
pub use reconcile::{ImageBaseline, ReconcileConfig, ReconcileResults, SavePlan, SaveReport};
pub use session::{EditSession, SessionSnapshot, WorkingCopy};
pub use store::{CatalogStore, Collection, HttpStore, InMemoryStore, StoreConfig};
pub use validation::{ValidationLimits, ValidationReport};

use std::sync::Arc;

// ============================================================================
// High-level Client API
// ============================================================================

/// Catalog client bundling a store with reconcile and validation settings
///
/// This is the recommended entry point for editing products.
///
/// # Examples
///
/// ```no_run
/// use catalog_reconcile::{CatalogClient, RemoteId, StoreConfig};
///
/// # async fn run() -> catalog_reconcile::Result<()> {
/// let client = CatalogClient::connect(StoreConfig::new("https://shop.example.com/api"))?;
///
/// let mut session = client.open(RemoteId(42)).await?;
/// session.working_mut().product.name = "Canvas Tote".to_string();
///
/// let results = client.save(&mut session).await?;
/// println!("{}", results.report().success);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CatalogClient {
    store: Arc<dyn CatalogStore>,
    config: ReconcileConfig,
    limits: ValidationLimits,
}

impl CatalogClient {
    /// Client over any store implementation
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            config: ReconcileConfig::default(),
            limits: ValidationLimits::default(),
        }
    }

    /// Connect to a REST catalog
    ///
    /// # Examples
    ///
    /// ```
    /// # use catalog_reconcile::{CatalogClient, StoreConfig};
    /// let client = CatalogClient::connect(StoreConfig::new("http://localhost:8000/api")).unwrap();
    /// assert_eq!(client.config().max_concurrent_requests, 8);
    /// ```
    pub fn connect(config: StoreConfig) -> Result<Self> {
        let store = HttpStore::new(config)?;
        Ok(Self::new(Arc::new(store)))
    }

    pub fn with_config(mut self, config: ReconcileConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Load an existing product into an edit session
    pub async fn open(&self, product_id: RemoteId) -> Result<EditSession> {
        let session = EditSession::load(self.store.as_ref(), product_id).await?;
        Ok(session.with_limits(self.limits.clone()))
    }

    /// Start a session for a product not yet in the store
    ///
    /// Categories are loaded so the product's category can be validated.
    pub async fn new_product(&self, product: ProductFields) -> Result<EditSession> {
        let categories = session::load_categories(self.store.as_ref()).await?;
        Ok(EditSession::new_product(product, categories).with_limits(self.limits.clone()))
    }

    /// Operations saving `session` would issue
    pub fn plan(&self, session: &EditSession) -> Result<SavePlan> {
        session.plan()
    }

    /// Persist a session's edits
    ///
    /// Store failures are reported in the results; only validation errors
    /// and malformed plans fail the call.
    pub async fn save(&self, session: &mut EditSession) -> Result<ReconcileResults> {
        session.save(self.store.as_ref(), &self.config).await
    }
}
