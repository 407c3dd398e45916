//! Location of the published overlap and lookup resources.

use areashift_geography_models::GeographyGeneration;

/// Default base address for published resources.
pub const DEFAULT_BASE_URL: &str = "https://pages.mysociety.org/2025-constituencies/data";

/// Default dataset version. Published versions are immutable; `latest`
/// tracks the newest one.
pub const DEFAULT_VERSION: &str = "latest";

/// Environment variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_ENV: &str = "AREASHIFT_DATA_URL";

/// Environment variable overriding [`DEFAULT_VERSION`].
pub const VERSION_ENV: &str = "AREASHIFT_DATA_VERSION";

/// Where overlap tables and code lookups are published.
///
/// `base_url` may be an `http(s)://` address or a local directory holding a
/// mirror of the same layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Base address without a trailing slash.
    pub base_url: String,
    /// Dataset version segment.
    pub version: String,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_VERSION)
    }
}

impl ResourceConfig {
    /// Creates a config, trimming any trailing slash from `base_url`.
    #[must_use]
    pub fn new(base_url: &str, version: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            version: version.to_string(),
        }
    }

    /// Reads [`BASE_URL_ENV`] and [`VERSION_ENV`], falling back to the
    /// defaults when unset or empty.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let version = std::env::var(VERSION_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());
        Self::new(&base_url, &version)
    }

    /// Address of the overlap table between two generations.
    #[must_use]
    pub fn overlap_url(&self, source: GeographyGeneration, target: GeographyGeneration) -> String {
        format!(
            "{}/{}/{}_{}_overlap.csv",
            self.base_url,
            self.version,
            source.slug(),
            target.slug()
        )
    }

    /// Address of a generation's short-code lookup table.
    #[must_use]
    pub fn lookup_url(&self, generation: GeographyGeneration) -> String {
        format!(
            "{}/{}/{}_codes.csv",
            self.base_url,
            self.version,
            generation.slug()
        )
    }

    /// Whether the base address points at a remote server.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.base_url.starts_with("http://") || self.base_url.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_versioned_urls() {
        let config = ResourceConfig::new("https://example.org/data/", "1.2.0");
        assert_eq!(
            config.overlap_url(GeographyGeneration::Parl10, GeographyGeneration::Parl25),
            "https://example.org/data/1.2.0/parl10_parl25_overlap.csv"
        );
        assert_eq!(
            config.lookup_url(GeographyGeneration::Lad24),
            "https://example.org/data/1.2.0/lad24_codes.csv"
        );
        assert!(config.is_remote());
    }

    #[test]
    fn local_directory_is_not_remote() {
        let config = ResourceConfig::new("/srv/mirror", DEFAULT_VERSION);
        assert!(!config.is_remote());
        assert_eq!(
            config.lookup_url(GeographyGeneration::Parl25),
            "/srv/mirror/latest/parl25_codes.csv"
        );
    }
}
