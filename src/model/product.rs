use super::record::{self, Record};
use super::{Resource, Upload};
use crate::core::{RemoteId, StoreResult, Value};
use crate::store::Collection;
use serde::{Deserialize, Serialize};

/// Primary fields of the root product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFields {
    pub name: String,
    /// Decimal text, at most two decimals.
    pub price: String,
    pub category: Option<RemoteId>,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub inventory_qty: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Main image as stored; read-only, never sent back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Replacement main image waiting for upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Upload>,
}

fn default_active() -> bool {
    true
}

impl ProductFields {
    pub fn new(name: impl Into<String>, price: impl Into<String>, category: Option<RemoteId>) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
            category,
            sku: String::new(),
            inventory_qty: 0,
            description: String::new(),
            active: true,
            image_url: None,
            image: None,
        }
    }
}

impl Resource for ProductFields {
    const COLLECTION: Collection = Collection::Products;

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", Value::from(self.name.as_str())),
            ("price", Value::from(self.price.as_str())),
            ("category", Value::from(self.category.map(RemoteId::get))),
            ("sku", Value::from(self.sku.as_str())),
            ("inventory_qty", Value::Integer(self.inventory_qty)),
            ("description", Value::from(self.description.as_str())),
            ("active", Value::Boolean(self.active)),
        ]
    }

    fn upload(&self) -> Option<&Upload> {
        self.image.as_ref()
    }

    fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            name: record::text(record, "name")?,
            price: record::text(record, "price")?,
            category: record::opt_int(record, "category").map(RemoteId),
            sku: record::opt_text(record, "sku").unwrap_or_default(),
            inventory_qty: record::opt_int(record, "inventory_qty").unwrap_or(0),
            description: record::opt_text(record, "description").unwrap_or_default(),
            active: record::opt_bool(record, "active").unwrap_or(true),
            image_url: record::opt_text(record, "image"),
            image: None,
        })
    }
}

/// A category the product may reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: RemoteId,
    pub name: String,
}

impl Category {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: record::record_id(record)?,
            name: record::opt_text(record, "name").unwrap_or_default(),
        })
    }
}
