use std::time::Duration;

/// Environment variable holding the API base url.
pub const ENV_BASE_URL: &str = "CATALOG_API_BASE";
/// Environment variable holding the bearer token.
pub const ENV_TOKEN: &str = "CATALOG_API_TOKEN";
/// Environment variable holding the request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "CATALOG_API_TIMEOUT_SECS";

/// Remote store connection configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base url every API path is resolved against
    pub base_url: String,

    /// Bearer token sent with every request
    pub token: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,

    /// Page size requested when listing categories
    pub page_size: usize,

    /// Upper bound on `next` links followed for one list call
    pub max_pages: usize,

    /// User agent reported to the store
    pub user_agent: String,
}

impl StoreConfig {
    /// Create a new store configuration
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            timeout: Duration::from_secs(30),
            page_size: 100,
            max_pages: 50,
            user_agent: format!("catalog-reconcile/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set the bearer token
    pub fn token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set category page size
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the maximum number of list pages followed
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Build configuration from a lookup keyed by the `CATALOG_API_*` names
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_BASE_URL)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| format!("{} is not set", ENV_BASE_URL))?;

        let mut config = Self::new(base_url.trim());

        if let Some(token) = lookup(ENV_TOKEN).filter(|value| !value.trim().is_empty()) {
            config = config.token(token.trim());
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))?;
            config = config.timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Resolve an API path (or an absolute url, returned as is)
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Resolve a stored media path the way the store serves it
    ///
    /// Absolute urls pass through, `/x` is relative to the host,
    /// `media/x` is taken as is and anything else lives under `media/`.
    pub fn media_url(&self, path: &str) -> String {
        if path.is_empty() {
            return String::new();
        }
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            return format!("{}{}", self.base_url, path);
        }
        if path.starts_with("media/") {
            return format!("{}/{}", self.base_url, path);
        }
        format!("{}/media/{}", self.base_url, path)
    }

    /// Printable form that never exposes the token
    pub fn to_display_string(&self) -> String {
        let token = if self.token.is_some() { "***" } else { "none" };
        format!("{} (token: {}, timeout: {:?})", self.base_url, token, self.timeout)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err("base_url must start with http:// or https://".to_string());
        }

        if self.timeout.is_zero() {
            return Err("timeout must be > 0".to_string());
        }

        if self.page_size == 0 {
            return Err("page_size must be > 0".to_string());
        }

        if self.max_pages == 0 {
            return Err("max_pages must be > 0".to_string());
        }

        Ok(())
    }
}
