//! Validation gate.
//!
//! Pure checks of a working copy before any network activity. Every rule
//! runs and adds per-field errors to one report; a save only proceeds when
//! the report is empty.

pub mod patterns;
pub mod rules;

pub use patterns::normalize_price;
pub use rules::{ColorRule, FeatureRule, IdentityRule, ProductRule, SizeRule};

use crate::model::Category;
use crate::session::{SessionSnapshot, WorkingCopy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-field validation errors, keyed like `colors[1].hex`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub field_errors: BTreeMap<String, String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error; the first error reported for a field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.field_errors
            .entry(field.into())
            .or_insert_with(|| message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.field_errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.field_errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_errors.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.field_errors.get(field).map(String::as_str)
    }

    pub fn has(&self, field: &str) -> bool {
        self.field_errors.contains_key(field)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field_errors.is_empty() {
            return write!(f, "no errors");
        }
        let parts: Vec<String> = self
            .field_errors
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Limits enforced on a working copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationLimits {
    /// Maximum images per color
    pub images_per_color: usize,

    /// Maximum size of a pending upload in bytes
    pub max_upload_bytes: usize,

    /// Accepted MIME types for uploads
    pub image_types: Vec<String>,

    /// Maximum product description length in characters
    pub max_description_chars: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            images_per_color: 4,
            max_upload_bytes: 5 * 1024 * 1024,
            image_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
            max_description_chars: 500,
        }
    }
}

impl ValidationLimits {
    pub fn images_per_color(mut self, limit: usize) -> Self {
        self.images_per_color = limit;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn accepts(&self, content_type: &str) -> bool {
        self.image_types.iter().any(|accepted| accepted == content_type)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.images_per_color == 0 {
            return Err("images_per_color must be > 0".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be > 0".to_string());
        }
        if self.image_types.is_empty() {
            return Err("at least one image type must be accepted".to_string());
        }
        Ok(())
    }
}

/// Everything a rule may consult besides the working copy
pub struct ValidationContext<'a> {
    pub snapshot: &'a SessionSnapshot,
    pub categories: &'a [Category],
    pub limits: &'a ValidationLimits,
}

/// Trait for validation rules (Chain of Responsibility pattern)
pub trait ValidationRule: Send + Sync {
    fn check(&self, working: &WorkingCopy, context: &ValidationContext<'_>, report: &mut ValidationReport);
}

/// Runs every rule over a working copy
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// Create validator with default rules
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(ProductRule),
                Box::new(ColorRule),
                Box::new(SizeRule),
                Box::new(FeatureRule),
                Box::new(IdentityRule),
            ],
        }
    }

    /// Create validator with custom rules
    pub fn with_rules(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    pub fn validate(&self, working: &WorkingCopy, context: &ValidationContext<'_>) -> ValidationReport {
        let mut report = ValidationReport::new();
        for rule in &self.rules {
            rule.check(working, context, &mut report);
        }
        report
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates with the default rules
pub fn validate(working: &WorkingCopy, context: &ValidationContext<'_>) -> ValidationReport {
    Validator::new().validate(working, context)
}
