//! Catalog entities edited in a product session.

pub mod color;
pub mod feature;
pub mod product;
pub mod record;
pub mod size;
pub mod upload;

pub use color::{ColorImage, ColorVariant, ImageContent};
pub use feature::FeatureTag;
pub use product::{Category, ProductFields};
pub use record::Record;
pub use size::SizeVariant;
pub use upload::Upload;

use crate::core::{Snapshot, StoreResult, Stored, Value};
use crate::store::Collection;
use std::fmt::Debug;

/// A child resource the reconciliation engine knows how to diff and persist.
pub trait Resource: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Store collection this resource lives in.
    const COLLECTION: Collection;

    /// Persisted fields in wire form, compared exactly by the classifier.
    ///
    /// Position is not part of this list; it is derived from the working
    /// copy's array index.
    fn fields(&self) -> Vec<(&'static str, Value)>;

    /// Pending file content sent along with a create.
    fn upload(&self) -> Option<&Upload> {
        None
    }

    /// Parses a store representation.
    fn from_record(record: &Record) -> StoreResult<Self>;

    /// Takes over the values the store confirmed after a create or update.
    fn adopt(&mut self, confirmed: Self) {
        *self = confirmed;
    }
}

/// Builds a snapshot from a list response.
///
/// Each record keeps its recorded position; records without one take their
/// list index.
pub fn snapshot_from_records<T: Resource>(records: &[Record]) -> StoreResult<Snapshot<T>> {
    let stored = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            Ok(Stored::new(
                record::record_id(record)?,
                record::position(record).unwrap_or(index),
                T::from_record(record)?,
            ))
        })
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(Snapshot::from_stored(stored))
}
