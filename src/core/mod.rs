pub mod error;
pub mod types;
pub mod value;

pub use error::{ReconcileError, Result, StoreError, StoreResult};
pub use types::{Entry, RemoteId, Snapshot, Stored};
pub use value::Value;
