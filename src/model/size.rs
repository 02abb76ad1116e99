use super::Resource;
use super::record::{self, Record};
use crate::core::{StoreResult, Value};
use crate::store::Collection;
use serde::{Deserialize, Serialize};

/// A size/option variant with an additive price delta.
///
/// The delta is kept as entered (decimal text); the validation gate checks
/// that it is non-negative with at most two decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeVariant {
    pub name: String,
    pub extra_price: String,
}

impl SizeVariant {
    pub fn new(name: impl Into<String>, extra_price: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra_price: extra_price.into(),
        }
    }
}

impl Resource for SizeVariant {
    const COLLECTION: Collection = Collection::Sizes;

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", Value::from(self.name.as_str())),
            ("extra_price", Value::from(self.extra_price.as_str())),
        ]
    }

    fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            name: record::text(record, "name")?,
            extra_price: record::opt_text(record, "extra_price").unwrap_or_else(|| "0".to_string()),
        })
    }
}
