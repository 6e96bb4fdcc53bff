use std::env;

/// Runtime settings shared by every generated controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Prefix every resource is mounted under, e.g. `/api`.
    pub base_path: String,
    /// Page size used when a list request carries no `range`.
    pub page_size: u64,
    /// Upper bound on the number of rows a single list request returns.
    pub max_page_size: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: "/api".to_string(),
            page_size: 20,
            max_page_size: 1000,
        }
    }
}

impl ApiConfig {
    /// Read overrides from `SCOPECRATE_BASE_PATH`, `SCOPECRATE_PAGE_SIZE` and
    /// `SCOPECRATE_MAX_PAGE_SIZE`. Unset or unparsable values keep the default.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_path = env::var("SCOPECRATE_BASE_PATH").unwrap_or(defaults.base_path);
        let page_size = env_u64("SCOPECRATE_PAGE_SIZE").unwrap_or(defaults.page_size);
        let max_page_size = env_u64("SCOPECRATE_MAX_PAGE_SIZE").unwrap_or(defaults.max_page_size);

        Self {
            base_path,
            page_size,
            max_page_size,
        }
        .normalized()
    }

    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self.normalized()
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self.normalized()
    }

    /// Path of the collection endpoint for `resource`.
    #[must_use]
    pub fn collection_path(&self, resource: &str) -> String {
        format!("{}/{resource}", self.base_path)
    }

    /// Path of the item endpoint for `resource` and `id`.
    #[must_use]
    pub fn item_path(&self, resource: &str, id: impl std::fmt::Display) -> String {
        format!("{}/{resource}/{id}", self.base_path)
    }

    // Base path without trailing slash, page size within [1, max].
    fn normalized(mut self) -> Self {
        let trimmed = self.base_path.trim_end_matches('/');
        self.base_path = if trimmed.is_empty() || trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        self.max_page_size = self.max_page_size.max(1);
        self.page_size = self.page_size.clamp(1, self.max_page_size);
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.trim().parse().ok())
}
