use super::record::{self, Record};
use super::{Resource, Upload};
use crate::core::{Entry, StoreResult, Value};
use crate::store::Collection;
use serde::{Deserialize, Serialize};

/// A color variant of a product, owning its ordered image list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorVariant {
    pub name: String,
    pub hex: String,
    pub stock: i64,
    #[serde(default)]
    pub images: Vec<Entry<ColorImage>>,
}

impl ColorVariant {
    pub fn new(name: impl Into<String>, hex: impl Into<String>, stock: i64) -> Self {
        Self {
            name: name.into(),
            hex: hex.into(),
            stock,
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: Entry<ColorImage>) -> Self {
        self.images.push(image);
        self
    }

    /// Appends pending uploads until the color holds `limit` images.
    ///
    /// Returns how many uploads were attached; the rest are dropped.
    pub fn attach_uploads(&mut self, uploads: impl IntoIterator<Item = Upload>, limit: usize) -> usize {
        let mut attached = 0;
        for upload in uploads {
            if self.images.len() >= limit {
                break;
            }
            self.images.push(Entry::pending(ColorImage::upload(upload)));
            attached += 1;
        }
        attached
    }
}

impl Resource for ColorVariant {
    const COLLECTION: Collection = Collection::Colors;

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", Value::from(self.name.as_str())),
            ("hex", Value::from(self.hex.as_str())),
            ("stock", Value::Integer(self.stock)),
        ]
    }

    fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            name: record::text(record, "name")?,
            hex: record::text(record, "hex")?,
            stock: record::opt_int(record, "stock").unwrap_or(0),
            images: Vec::new(),
        })
    }

    fn adopt(&mut self, confirmed: Self) {
        let images = std::mem::take(&mut self.images);
        *self = confirmed;
        self.images = images;
    }
}

/// Where an image's bytes live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageContent {
    /// Already persisted content, addressed by url or media path.
    Stored { url: String },
    /// Raw file waiting for upload.
    Upload(Upload),
}

/// One image of a color. Content is immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorImage {
    pub content: ImageContent,
}

impl ColorImage {
    pub fn stored(url: impl Into<String>) -> Self {
        Self {
            content: ImageContent::Stored { url: url.into() },
        }
    }

    pub fn upload(upload: Upload) -> Self {
        Self {
            content: ImageContent::Upload(upload),
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.content {
            ImageContent::Stored { url } => Some(url),
            ImageContent::Upload(_) => None,
        }
    }
}

impl Resource for ColorImage {
    const COLLECTION: Collection = Collection::ColorImages;

    // Only position can change on a persisted image.
    fn fields(&self) -> Vec<(&'static str, Value)> {
        Vec::new()
    }

    fn upload(&self) -> Option<&Upload> {
        match &self.content {
            ImageContent::Upload(upload) => Some(upload),
            ImageContent::Stored { .. } => None,
        }
    }

    fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self::stored(record::text(record, "image")?))
    }
}
