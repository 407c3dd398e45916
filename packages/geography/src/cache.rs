//! Per-run cache of overlap tables and code lookups.
//!
//! A [`BatchCache`] is created at the start of a batch run, passed by
//! `&mut` to every conversion in the run, and dropped when the run ends.
//! Published resources are immutable per version, so nothing in it ever
//! needs invalidating while it lives.

use std::collections::BTreeMap;
use std::sync::Arc;

use areashift_geography_models::{CodeResolverKind, GeographyGeneration, OverlapFragment};

use crate::GeoError;
use crate::config::ResourceConfig;
use crate::fetch::ResourceFetcher;
use crate::overlap::{get_overlap_table, validate_pair};
use crate::resolver::{CodeLookup, get_code_lookup};

/// Overlap tables and code lookups fetched during one batch run.
pub struct BatchCache<'a> {
    fetcher: &'a dyn ResourceFetcher,
    config: &'a ResourceConfig,
    overlaps: BTreeMap<(GeographyGeneration, GeographyGeneration), Arc<[OverlapFragment]>>,
    lookups: BTreeMap<GeographyGeneration, Arc<CodeLookup>>,
    /// Resources whose fetch already failed in this run, with the reason.
    failed: BTreeMap<String, String>,
}

impl<'a> BatchCache<'a> {
    /// Creates an empty cache for one run.
    #[must_use]
    pub fn new(fetcher: &'a dyn ResourceFetcher, config: &'a ResourceConfig) -> Self {
        Self {
            fetcher,
            config,
            overlaps: BTreeMap::new(),
            lookups: BTreeMap::new(),
            failed: BTreeMap::new(),
        }
    }

    /// Returns the overlap table for `source` → `target`, fetching it on
    /// first use.
    ///
    /// A fetch that failed earlier in the run fails again immediately
    /// without another request.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Configuration`] for an invalid pair (before any
    /// request) or the fetch/parse error of the table.
    pub async fn overlap_table(
        &mut self,
        source: GeographyGeneration,
        target: GeographyGeneration,
    ) -> Result<Arc<[OverlapFragment]>, GeoError> {
        validate_pair(source, target)?;

        if let Some(table) = self.overlaps.get(&(source, target)) {
            return Ok(Arc::clone(table));
        }

        let url = self.config.overlap_url(source, target);
        self.check_failed(&url)?;

        match get_overlap_table(self.fetcher, self.config, source, target).await {
            Ok(fragments) => {
                let table: Arc<[OverlapFragment]> = fragments.into();
                self.overlaps.insert((source, target), Arc::clone(&table));
                Ok(table)
            }
            Err(e) => {
                self.failed.insert(url, e.to_string());
                Err(e)
            }
        }
    }

    /// Returns the code lookup for `generation`, fetching it on first use.
    ///
    /// # Errors
    ///
    /// Returns the fetch/parse error of the lookup table.
    pub async fn code_lookup(
        &mut self,
        generation: GeographyGeneration,
    ) -> Result<Arc<CodeLookup>, GeoError> {
        if let Some(lookup) = self.lookups.get(&generation) {
            return Ok(Arc::clone(lookup));
        }

        let url = self.config.lookup_url(generation);
        self.check_failed(&url)?;

        match get_code_lookup(self.fetcher, self.config, generation).await {
            Ok(lookup) => {
                let lookup = Arc::new(lookup);
                self.lookups.insert(generation, Arc::clone(&lookup));
                Ok(lookup)
            }
            Err(e) => {
                self.failed.insert(url, e.to_string());
                Err(e)
            }
        }
    }

    /// Maps a short code of `generation` to its canonical code.
    ///
    /// Returns `Ok(None)` for unmapped or retired codes.
    ///
    /// # Errors
    ///
    /// Returns the fetch/parse error of the lookup table.
    pub async fn resolve(
        &mut self,
        generation: GeographyGeneration,
        short_code: &str,
    ) -> Result<Option<String>, GeoError> {
        let lookup = self.code_lookup(generation).await?;
        Ok(lookup.resolve(short_code).map(str::to_string))
    }

    /// Maps a code with the given resolver. The identity resolver returns
    /// the code unchanged without fetching anything.
    ///
    /// # Errors
    ///
    /// Returns the fetch/parse error of the lookup table.
    pub async fn resolve_with(
        &mut self,
        resolver: CodeResolverKind,
        generation: GeographyGeneration,
        code: &str,
    ) -> Result<Option<String>, GeoError> {
        match resolver {
            CodeResolverKind::Identity => Ok(Some(code.to_string())),
            CodeResolverKind::Lookup => self.resolve(generation, code).await,
        }
    }

    /// Number of overlap tables held.
    #[must_use]
    pub fn overlap_table_count(&self) -> usize {
        self.overlaps.len()
    }

    /// Number of code lookups held.
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.len()
    }

    fn check_failed(&self, url: &str) -> Result<(), GeoError> {
        self.failed.get(url).map_or(Ok(()), |reason| {
            Err(GeoError::Fetch {
                url: url.to_string(),
                message: format!("already failed earlier in this run: {reason}"),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use areashift_geography_models::ConfigurationError;

    use super::*;
    use crate::fetch::StaticFetcher;

    const OVERLAP: &str = "\
PARL10,PARL25,overlap_pop,overlap_area,percentage_overlap_pop,percentage_overlap_area,original_pop,original_area
A1,ABE,100,5,1.0,1.0,100,5
";

    fn config() -> ResourceConfig {
        ResourceConfig::new("mem://data", "1.0.0")
    }

    #[tokio::test]
    async fn fetches_each_table_once() {
        let config = config();
        let url = config.overlap_url(GeographyGeneration::Parl10, GeographyGeneration::Parl25);
        let fetcher = StaticFetcher::new().with_body(url.clone(), OVERLAP);
        let mut cache = BatchCache::new(&fetcher, &config);

        for _ in 0..3 {
            let table = cache
                .overlap_table(GeographyGeneration::Parl10, GeographyGeneration::Parl25)
                .await
                .unwrap();
            assert_eq!(table.len(), 1);
        }

        assert_eq!(fetcher.request_count(&url), 1);
        assert_eq!(cache.overlap_table_count(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_repeated() {
        let config = config();
        let url = config.overlap_url(GeographyGeneration::Lad23, GeographyGeneration::Lad24);
        let fetcher = StaticFetcher::new();
        let mut cache = BatchCache::new(&fetcher, &config);

        for _ in 0..2 {
            let err = cache
                .overlap_table(GeographyGeneration::Lad23, GeographyGeneration::Lad24)
                .await
                .unwrap_err();
            assert!(err.is_network());
        }

        assert_eq!(fetcher.request_count(&url), 1);
        assert_eq!(cache.overlap_table_count(), 0);
    }

    #[tokio::test]
    async fn invalid_pair_rejected_without_request() {
        let config = config();
        let fetcher = StaticFetcher::new();
        let mut cache = BatchCache::new(&fetcher, &config);

        let err = cache
            .overlap_table(GeographyGeneration::Lad24, GeographyGeneration::Lad24)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GeoError::Configuration(ConfigurationError::SameGeneration { .. })
        ));
    }

    #[tokio::test]
    async fn resolves_through_memoized_lookup() {
        let config = config();
        let url = config.lookup_url(GeographyGeneration::Parl25);
        let fetcher =
            StaticFetcher::new().with_body(url.clone(), "short_code,gss_code\nABE,E14001063\n");
        let mut cache = BatchCache::new(&fetcher, &config);

        assert_eq!(
            cache.resolve(GeographyGeneration::Parl25, "ABE").await.unwrap(),
            Some("E14001063".to_string())
        );
        assert_eq!(
            cache.resolve(GeographyGeneration::Parl25, "ZZZ").await.unwrap(),
            None
        );
        assert_eq!(fetcher.request_count(&url), 1);
        assert_eq!(cache.lookup_count(), 1);
    }

    #[tokio::test]
    async fn identity_resolver_never_fetches() {
        let config = config();
        let fetcher = StaticFetcher::new();
        let mut cache = BatchCache::new(&fetcher, &config);

        let resolved = cache
            .resolve_with(CodeResolverKind::Identity, GeographyGeneration::Lad24, "E06000001")
            .await
            .unwrap();

        assert_eq!(resolved, Some("E06000001".to_string()));
        assert_eq!(cache.lookup_count(), 0);
    }
}
