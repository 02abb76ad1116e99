//! Remote store seam.
//!
//! The reconciliation engine only ever talks to a [`CatalogStore`]. The crate
//! ships an HTTP implementation and an in-memory one.

pub mod change;
pub mod config;
pub mod http;
pub mod memory;
pub mod routes;

pub use change::{Change, ChangeKind};
pub use config::StoreConfig;
pub use http::HttpStore;
pub use memory::{FaultRule, InMemoryStore};

use crate::core::{RemoteId, StoreResult, Value};
use crate::model::{Record, Upload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Multipart field carrying uploaded file content.
pub const UPLOAD_FIELD: &str = "image";

/// Resource collections known to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Products,
    Colors,
    ColorImages,
    Sizes,
    Features,
    Categories,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Colors => "colors",
            Self::ColorImages => "color_images",
            Self::Sizes => "sizes",
            Self::Features => "features",
            Self::Categories => "categories",
        }
    }

    /// Collection whose identity addresses this one's list and create calls.
    pub fn parent(&self) -> Option<Collection> {
        match self {
            Self::Colors | Self::Sizes | Self::Features => Some(Self::Products),
            Self::ColorImages => Some(Self::Colors),
            Self::Products | Self::Categories => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of call issued against the store. Only mutations reach the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    List,
    Create,
    Update,
    Delete,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a create or update call: ordered key/value fields plus an optional file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Payload {
    pub fields: Vec<(&'static str, Value)>,
    pub upload: Option<Upload>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_upload(mut self, upload: Upload) -> Self {
        self.upload = Some(upload);
        self
    }

    /// Sets a field, replacing an earlier value under the same key.
    pub fn set(&mut self, key: &'static str, value: impl Into<Value>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|(k, _)| *k).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.upload.is_none()
    }

    pub fn form_pairs(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_form_string()))
            .collect()
    }

    /// JSON view of the fields, as a store would echo them back.
    pub fn to_record(&self) -> Record {
        self.fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect()
    }
}

/// Capabilities the engine needs from the remote store, per collection.
///
/// Each call is atomic at the store. Implementations must not retry on
/// their own; the engine reports failures instead.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Reads one resource by identity.
    async fn fetch(&self, collection: Collection, id: RemoteId) -> StoreResult<Record>;

    /// Lists a collection, scoped to `parent` where the collection has one.
    async fn list(&self, collection: Collection, parent: Option<RemoteId>) -> StoreResult<Vec<Record>>;

    /// Creates a resource and returns its representation, including `id`.
    async fn create(
        &self,
        collection: Collection,
        parent: Option<RemoteId>,
        payload: &Payload,
    ) -> StoreResult<Record>;

    /// Partially updates a resource with exactly the given fields.
    async fn update(&self, collection: Collection, id: RemoteId, payload: &Payload) -> StoreResult<Record>;

    /// Deletes a resource. Deleting a color removes its images too.
    async fn delete(&self, collection: Collection, id: RemoteId) -> StoreResult<()>;
}

/// Reads `{ "results": [...] }` pages as well as bare arrays.
pub(crate) fn records_from_json(body: JsonValue) -> StoreResult<(Vec<Record>, Option<String>)> {
    let (items, next) = match body {
        JsonValue::Array(items) => (items, None),
        JsonValue::Object(mut page) => {
            let next = page
                .get("next")
                .and_then(JsonValue::as_str)
                .map(str::to_string);
            match page.remove("results") {
                Some(JsonValue::Array(items)) => (items, next),
                _ => {
                    return Err(crate::core::StoreError::decode(
                        "list response is neither an array nor a results page",
                    ));
                }
            }
        }
        _ => {
            return Err(crate::core::StoreError::decode(
                "list response is neither an array nor a results page",
            ));
        }
    };

    let records = items
        .into_iter()
        .map(|item| match item {
            JsonValue::Object(record) => Ok(record),
            _ => Err(crate::core::StoreError::decode("list item is not an object")),
        })
        .collect::<StoreResult<Vec<_>>>()?;
    Ok((records, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_set_replaces() {
        let mut payload = Payload::new().with_field("name", "Red").with_field("position", 0i64);
        payload.set("position", 2i64);
        assert_eq!(payload.field_names(), vec!["name", "position"]);
        assert_eq!(payload.get("position"), Some(&Value::Integer(2)));
        assert_eq!(
            payload.form_pairs(),
            vec![
                ("name".to_string(), "Red".to_string()),
                ("position".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_records_from_page_and_array() {
        let (records, next) =
            records_from_json(json!({"results": [{"id": 1}], "next": "http://x/?page=2"})).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(next.as_deref(), Some("http://x/?page=2"));

        let (records, next) = records_from_json(json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(records.len(), 2);
        assert!(next.is_none());

        assert!(records_from_json(json!({"detail": "nope"})).is_err());
        assert!(records_from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn test_collection_parents() {
        assert_eq!(Collection::ColorImages.parent(), Some(Collection::Colors));
        assert_eq!(Collection::Sizes.parent(), Some(Collection::Products));
        assert_eq!(Collection::Products.parent(), None);
    }
}
