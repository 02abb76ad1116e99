use crate::core::{Entry, RemoteId, Snapshot};
use crate::model::{ColorImage, ColorVariant, FeatureTag, ProductFields, SizeVariant, Upload};
use crate::validation::normalize_price;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last known-persisted state of a product and its child collections.
///
/// Colors are kept without their images; each persisted color's images
/// live in `color_images` under the color identity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub product_id: Option<RemoteId>,
    pub product: Option<ProductFields>,
    pub colors: Snapshot<ColorVariant>,
    #[serde(default)]
    pub color_images: BTreeMap<RemoteId, Snapshot<ColorImage>>,
    pub sizes: Snapshot<SizeVariant>,
    pub features: Snapshot<FeatureTag>,
}

impl SessionSnapshot {
    /// Snapshot of everything persisted in `working`, positions taken from array index
    pub fn from_working(product_id: Option<RemoteId>, working: &WorkingCopy) -> Self {
        let color_images = working
            .colors
            .iter()
            .filter_map(|entry| {
                entry
                    .id()
                    .map(|id| (id, Snapshot::from_entries(&entry.item().images)))
            })
            .collect();

        let colors: Vec<Entry<ColorVariant>> = working
            .colors
            .iter()
            .map(|entry| match entry {
                Entry::Persisted { id, item } => Entry::persisted(*id, without_images(item)),
                Entry::Pending { item } => Entry::pending(without_images(item)),
            })
            .collect();

        Self {
            product_id,
            product: product_id.map(|_| working.product.clone()),
            colors: Snapshot::from_entries(&colors),
            color_images,
            sizes: Snapshot::from_entries(&working.sizes),
            features: Snapshot::from_entries(&working.features),
        }
    }

    /// Images last confirmed for a color; empty for unknown colors
    pub fn images_of(&self, color: RemoteId) -> Snapshot<ColorImage> {
        self.color_images.get(&color).cloned().unwrap_or_default()
    }

    /// Working copy equal to this snapshot, images attached to their colors
    pub fn to_working(&self) -> Option<WorkingCopy> {
        let product = self.product.clone()?;
        let colors = self
            .colors
            .to_entries()
            .into_iter()
            .map(|entry| match entry {
                Entry::Persisted { id, mut item } => {
                    item.images = self.images_of(id).to_entries();
                    Entry::persisted(id, item)
                }
                pending => pending,
            })
            .collect();

        Some(WorkingCopy {
            product,
            colors,
            sizes: self.sizes.to_entries(),
            features: self.features.to_entries(),
        })
    }
}

pub(crate) fn without_images(color: &ColorVariant) -> ColorVariant {
    ColorVariant {
        images: Vec::new(),
        ..color.clone()
    }
}

/// Freely edited version of a product. Positions are array indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingCopy {
    pub product: ProductFields,
    #[serde(default)]
    pub colors: Vec<Entry<ColorVariant>>,
    #[serde(default)]
    pub sizes: Vec<Entry<SizeVariant>>,
    #[serde(default)]
    pub features: Vec<Entry<FeatureTag>>,
}

impl WorkingCopy {
    pub fn new(product: ProductFields) -> Self {
        Self {
            product,
            colors: Vec::new(),
            sizes: Vec::new(),
            features: Vec::new(),
        }
    }

    /// Cleans user-typed text before validation: money fields go through
    /// [`normalize_price`] and feature labels are trimmed.
    pub fn normalize(&mut self) {
        self.product.price = normalize_price(&self.product.price);
        for entry in &mut self.sizes {
            let size = entry.item_mut();
            size.extra_price = normalize_price(&size.extra_price);
        }
        for entry in &mut self.features {
            let feature = entry.item_mut();
            feature.name = feature.name.trim().to_string();
        }
    }

    pub fn add_color(&mut self, color: ColorVariant) -> usize {
        self.colors.push(Entry::pending(color));
        self.colors.len() - 1
    }

    pub fn add_size(&mut self, size: SizeVariant) -> usize {
        self.sizes.push(Entry::pending(size));
        self.sizes.len() - 1
    }

    pub fn add_feature(&mut self, feature: FeatureTag) -> usize {
        self.features.push(Entry::pending(feature));
        self.features.len() - 1
    }

    pub fn remove_color(&mut self, index: usize) -> Option<Entry<ColorVariant>> {
        remove_at(&mut self.colors, index)
    }

    pub fn remove_size(&mut self, index: usize) -> Option<Entry<SizeVariant>> {
        remove_at(&mut self.sizes, index)
    }

    pub fn remove_feature(&mut self, index: usize) -> Option<Entry<FeatureTag>> {
        remove_at(&mut self.features, index)
    }

    pub fn move_color(&mut self, from: usize, to: usize) -> bool {
        move_item(&mut self.colors, from, to)
    }

    pub fn move_size(&mut self, from: usize, to: usize) -> bool {
        move_item(&mut self.sizes, from, to)
    }

    pub fn move_feature(&mut self, from: usize, to: usize) -> bool {
        move_item(&mut self.features, from, to)
    }

    /// Attaches uploads to a color, up to `limit` images in total.
    ///
    /// Returns the number attached, or `None` if there is no such color.
    pub fn attach_images(&mut self, color: usize, uploads: Vec<Upload>, limit: usize) -> Option<usize> {
        let entry = self.colors.get_mut(color)?;
        Some(entry.item_mut().attach_uploads(uploads, limit))
    }

    pub fn remove_image(&mut self, color: usize, image: usize) -> Option<Entry<ColorImage>> {
        let entry = self.colors.get_mut(color)?;
        remove_at(&mut entry.item_mut().images, image)
    }

    pub fn move_image(&mut self, color: usize, from: usize, to: usize) -> bool {
        match self.colors.get_mut(color) {
            Some(entry) => move_item(&mut entry.item_mut().images, from, to),
            None => false,
        }
    }

    /// Finds a persisted color's slot by identity
    pub fn color_slot(&self, id: RemoteId) -> Option<usize> {
        self.colors.iter().position(|entry| entry.id() == Some(id))
    }
}

fn remove_at<T>(items: &mut Vec<T>, index: usize) -> Option<T> {
    (index < items.len()).then(|| items.remove(index))
}

/// Moves one element, shifting the ones in between.
fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    if from != to {
        let item = items.remove(from);
        items.insert(to, item);
    }
    true
}
