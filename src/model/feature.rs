use super::Resource;
use super::record::{self, Record};
use crate::core::{StoreResult, Value};
use crate::store::Collection;
use serde::{Deserialize, Serialize};

/// Free-text feature label shown on the product page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureTag {
    pub name: String,
}

impl FeatureTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
        }
    }
}

impl Resource for FeatureTag {
    const COLLECTION: Collection = Collection::Features;

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![("name", Value::from(self.name.as_str()))]
    }

    fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self::new(record::text(record, "name")?))
    }
}
