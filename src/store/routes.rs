//! Path table of the catalog HTTP API, relative to the configured base url.

use super::Collection;
use crate::core::{RemoteId, StoreError, StoreResult};

fn require_parent(collection: Collection, parent: Option<RemoteId>) -> StoreResult<RemoteId> {
    parent.ok_or_else(|| {
        StoreError::Unsupported(format!("{} requires a parent identity", collection))
    })
}

/// Path listing a collection. Categories take the page size as a query.
pub fn list_path(collection: Collection, parent: Option<RemoteId>, page_size: usize) -> StoreResult<String> {
    match collection {
        Collection::Colors => Ok(format!("products/{}/colors/", require_parent(collection, parent)?)),
        Collection::ColorImages => Ok(format!(
            "products/colors/{}/images/",
            require_parent(collection, parent)?
        )),
        Collection::Sizes => Ok(format!("products/{}/variants/", require_parent(collection, parent)?)),
        Collection::Features => Ok(format!("products/{}/features/", require_parent(collection, parent)?)),
        Collection::Categories => Ok(format!("products/categories/?page_size={}", page_size)),
        Collection::Products => Ok("products/".to_string()),
    }
}

/// Path accepting a create. Child collections are addressed by parent identity.
pub fn create_path(collection: Collection, parent: Option<RemoteId>) -> StoreResult<String> {
    match collection {
        Collection::Products => Ok("products/".to_string()),
        Collection::Categories => Ok("products/categories/".to_string()),
        other => list_path(other, parent, 0),
    }
}

/// Path of a single resource, used for fetch, update and delete.
pub fn item_path(collection: Collection, id: RemoteId) -> String {
    match collection {
        Collection::Products => format!("products/{}/", id),
        Collection::Colors => format!("products/colors/{}/", id),
        Collection::ColorImages => format!("products/color-images/{}/", id),
        Collection::Sizes => format!("products/variants/{}/", id),
        Collection::Features => format!("products/features/{}/", id),
        Collection::Categories => format!("products/categories/{}/", id),
    }
}
