//! Reconciliation engine: classify working collections against their
//! snapshot, then persist the differences in dependency order.

pub mod classifier;
pub mod config;
pub mod graph;
pub mod images;
pub mod plan;
pub mod results;
pub mod scheduler;

pub use classifier::{Classification, PlannedCreate, PlannedUpdate, classify};
pub use config::{ImageBaseline, ReconcileConfig};
pub use graph::{Barrier, TaskGraph, TaskNode};
pub use plan::{ImagePlan, PlannedOperation, ProductChange, SavePlan};
pub use results::{
    CollectionCounts, CollectionOutcome, Confirmed, ImageOutcome, OperationError, ProductOutcome,
    ReconcileResults, SaveReport, Skipped,
};
pub use scheduler::Scheduler;

use crate::core::Result;
use crate::session::WorkingCopy;
use crate::store::CatalogStore;

/// Executes `plan` for `working` against `store`.
pub async fn persist(
    store: &dyn CatalogStore,
    config: &ReconcileConfig,
    plan: &SavePlan,
    working: &WorkingCopy,
) -> Result<ReconcileResults> {
    let scheduler = Scheduler::new(store, config);
    scheduler.execute(plan, working).await
}
