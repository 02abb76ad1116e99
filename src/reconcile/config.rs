use serde::{Deserialize, Serialize};

/// Where a persisted color's current image list comes from when its images
/// are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageBaseline {
    /// List the color's images from the store right before diffing them
    #[default]
    Remote,
    /// Trust the images captured in the session snapshot
    Session,
}

/// Reconciliation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Maximum store calls in flight at once
    pub max_concurrent_requests: usize,

    /// Baseline for per-color image diffs
    pub image_baseline: ImageBaseline,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 8,
            image_baseline: ImageBaseline::Remote,
        }
    }
}

impl ReconcileConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the in-flight request cap
    pub fn max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    /// Set the image baseline
    pub fn image_baseline(mut self, baseline: ImageBaseline) -> Self {
        self.image_baseline = baseline;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_requests == 0 {
            return Err("max_concurrent_requests must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReconcileConfig::default();
        assert_eq!(config.max_concurrent_requests, 8);
        assert_eq!(config.image_baseline, ImageBaseline::Remote);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ReconcileConfig::new()
            .max_concurrent_requests(2)
            .image_baseline(ImageBaseline::Session);
        assert_eq!(config.max_concurrent_requests, 2);
        assert_eq!(config.image_baseline, ImageBaseline::Session);
        assert!(ReconcileConfig::new().max_concurrent_requests(0).validate().is_err());
    }
}
