use super::patterns;
use super::{ValidationContext, ValidationLimits, ValidationReport, ValidationRule};
use crate::core::{Entry, RemoteId, Snapshot};
use crate::model::{ImageContent, Upload};
use crate::session::WorkingCopy;
use std::collections::HashSet;

fn check_upload(field: &str, upload: &Upload, limits: &ValidationLimits, report: &mut ValidationReport) {
    if !limits.accepts(&upload.content_type) {
        report.add(
            field,
            format!("unsupported image type '{}' (jpeg, png, webp)", upload.content_type),
        );
    } else if upload.data.len() > limits.max_upload_bytes {
        report.add(
            field,
            format!("image exceeds {} bytes", limits.max_upload_bytes),
        );
    } else if upload.data.is_empty() && upload.source.is_none() {
        report.add(field, "image has no content");
    }
}

/// Primary product fields
#[derive(Debug, Clone, Default)]
pub struct ProductRule;

impl ValidationRule for ProductRule {
    fn check(&self, working: &WorkingCopy, context: &ValidationContext<'_>, report: &mut ValidationReport) {
        let product = &working.product;

        if !patterns::is_valid_name(&product.name) {
            report.add("name", "name is required, at most 100 characters, letters, digits, dashes and spaces");
        }
        if !patterns::is_positive_amount(&product.price) {
            report.add("price", "price must be positive with at most two decimals");
        }
        if product.description.chars().count() > context.limits.max_description_chars {
            report.add(
                "description",
                format!("description is limited to {} characters", context.limits.max_description_chars),
            );
        }
        match product.category {
            Some(id) if context.categories.iter().any(|category| category.id == id) => {}
            Some(id) => report.add("category", format!("unknown category {}", id)),
            None => report.add("category", "a category is required"),
        }
        if !product.sku.is_empty() && !patterns::is_valid_sku(&product.sku) {
            report.add("sku", "sku allows letters, digits and dashes, at most 50");
        }
        if product.inventory_qty < 0 {
            report.add("inventory_qty", "inventory must be a non-negative integer");
        }
        if let Some(upload) = &product.image {
            check_upload("image", upload, context.limits, report);
        }
    }
}

/// Color fields and per-color images
#[derive(Debug, Clone, Default)]
pub struct ColorRule;

impl ValidationRule for ColorRule {
    fn check(&self, working: &WorkingCopy, context: &ValidationContext<'_>, report: &mut ValidationReport) {
        for (index, entry) in working.colors.iter().enumerate() {
            let color = entry.item();
            let prefix = format!("colors[{}]", index);

            if !patterns::is_valid_name(&color.name) {
                report.add(format!("{}.name", prefix), "color name is required, at most 100 characters");
            }
            if !patterns::is_hex_color(&color.hex) {
                report.add(format!("{}.hex", prefix), "color must be #RRGGBB");
            }
            if color.stock < 0 {
                report.add(format!("{}.stock", prefix), "stock must be a non-negative integer");
            }
            if color.images.len() > context.limits.images_per_color {
                report.add(
                    format!("{}.images", prefix),
                    format!("at most {} images per color", context.limits.images_per_color),
                );
            }

            for (position, image) in color.images.iter().enumerate() {
                let field = format!("{}.images[{}]", prefix, position);
                match (image, &image.item().content) {
                    (Entry::Pending { .. }, ImageContent::Upload(upload)) => {
                        check_upload(&field, upload, context.limits, report);
                    }
                    (Entry::Pending { .. }, ImageContent::Stored { .. }) => {
                        report.add(field, "a new image must carry an upload");
                    }
                    (Entry::Persisted { .. }, ImageContent::Upload(_)) => {
                        report.add(field, "stored image content cannot be replaced");
                    }
                    (Entry::Persisted { .. }, ImageContent::Stored { .. }) => {}
                }
            }
        }
    }
}

/// Size variant fields
#[derive(Debug, Clone, Default)]
pub struct SizeRule;

impl ValidationRule for SizeRule {
    fn check(&self, working: &WorkingCopy, _context: &ValidationContext<'_>, report: &mut ValidationReport) {
        for (index, entry) in working.sizes.iter().enumerate() {
            let size = entry.item();
            if !patterns::is_valid_name(&size.name) {
                report.add(format!("sizes[{}].name", index), "size name is required, at most 100 characters");
            }
            if !patterns::is_amount(&size.extra_price) {
                report.add(
                    format!("sizes[{}].extra_price", index),
                    "extra price must be non-negative with at most two decimals",
                );
            }
        }
    }
}

/// Feature labels
#[derive(Debug, Clone, Default)]
pub struct FeatureRule;

impl ValidationRule for FeatureRule {
    fn check(&self, working: &WorkingCopy, _context: &ValidationContext<'_>, report: &mut ValidationReport) {
        for (index, entry) in working.features.iter().enumerate() {
            let name = &entry.item().name;
            if name.trim().is_empty() || name.chars().count() > 100 {
                report.add(format!("features[{}].name", index), "feature text must be 1 to 100 characters");
            }
        }
    }
}

/// Persisted identities must be unique and known to the session
#[derive(Debug, Clone, Default)]
pub struct IdentityRule;

fn check_identities<T: Clone>(
    prefix: &str,
    entries: &[Entry<T>],
    snapshot: &Snapshot<T>,
    report: &mut ValidationReport,
) {
    let mut seen: HashSet<RemoteId> = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        let Some(id) = entry.id() else { continue };
        let field = format!("{}[{}]", prefix, index);
        if !seen.insert(id) {
            report.add(field, format!("identity {} appears more than once", id));
        } else if !snapshot.contains(id) {
            report.add(field, format!("identity {} is not part of this product", id));
        }
    }
}

impl ValidationRule for IdentityRule {
    fn check(&self, working: &WorkingCopy, context: &ValidationContext<'_>, report: &mut ValidationReport) {
        let snapshot = context.snapshot;
        check_identities("colors", &working.colors, &snapshot.colors, report);
        check_identities("sizes", &working.sizes, &snapshot.sizes, report);
        check_identities("features", &working.features, &snapshot.features, report);

        for (index, color) in working.colors.iter().enumerate() {
            let prefix = format!("colors[{}].images", index);
            match color.id() {
                Some(id) => check_identities(&prefix, &color.item().images, &snapshot.images_of(id), report),
                None => {
                    for (position, image) in color.item().images.iter().enumerate() {
                        if !image.is_pending() {
                            report.add(
                                format!("{}[{}]", prefix, position),
                                "a new color cannot take over a stored image",
                            );
                        }
                    }
                }
            }
        }
    }
}
