//! Disk cache for API responses.
//!
//! Every fetched window is stored verbatim, one file per endpoint and key:
//!
//! ```text
//! ~/.cache/springer-client/
//!   metadata/
//!     doi_10.1007-s10287-023-00498-7_1_25.json
//!   meta/
//!     <md5>.json
//!   open_access/
//!     <md5>.xml
//! ```
//!
//! Entries are never evicted. A stale entry is refetched and overwritten
//! according to the caller's [`RefreshPolicy`].

use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::envelope::ResponseEnvelope;
use super::error::Result;
use super::pagination::Window;
use super::transport::Transport;
use crate::config::Directories;
use crate::models::{Endpoint, Query};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// When to go to the network although a cache file exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Always refetch
    AlwaysFetchIfCached,
    /// Use the cache file whatever its age
    #[default]
    NeverFetchIfCached,
    /// Refetch when the cache file is older than this many days
    FetchIfOlderThan(u32),
}

impl RefreshPolicy {
    /// Decide whether to fetch, given the age of the cache file (`None` if absent)
    pub fn should_fetch(&self, age: Option<Duration>) -> bool {
        let Some(age) = age else {
            return true;
        };
        match self {
            RefreshPolicy::AlwaysFetchIfCached => true,
            RefreshPolicy::NeverFetchIfCached => false,
            RefreshPolicy::FetchIfOlderThan(days) => {
                age > Duration::from_secs(u64::from(*days) * SECONDS_PER_DAY)
            }
        }
    }
}

impl From<bool> for RefreshPolicy {
    fn from(refresh: bool) -> Self {
        if refresh {
            RefreshPolicy::AlwaysFetchIfCached
        } else {
            RefreshPolicy::NeverFetchIfCached
        }
    }
}

impl From<u32> for RefreshPolicy {
    fn from(days: u32) -> Self {
        RefreshPolicy::FetchIfOlderThan(days)
    }
}

impl FromStr for RefreshPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "always" => Ok(RefreshPolicy::AlwaysFetchIfCached),
            "false" | "no" | "never" => Ok(RefreshPolicy::NeverFetchIfCached),
            other => other.parse::<u32>().map(RefreshPolicy::from).map_err(|_| {
                format!(
                    "Invalid refresh policy '{}': expected true, false or a number of days",
                    s
                )
            }),
        }
    }
}

/// Filesystem-safe name of one cached window
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for `query` fetched at `window`
    ///
    /// Identifier queries keep the identifier readable, prefixed with its kind
    /// and with `/` rewritten to `-`; keyword queries use the md5 digest of the
    /// rendered query.
    pub fn for_window(query: &Query, window: Window) -> Self {
        match query {
            Query::Identifier { kind, value } => CacheKey(format!(
                "{}_{}_{}_{}",
                kind.field(),
                value.replace('/', "-"),
                window.start,
                window.size
            )),
            Query::Keyword { .. } => {
                let input = format!("{}_{}_{}", query.render(), window.start, window.size);
                CacheKey(format!("{:x}", md5::compute(input.as_bytes())))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Loads windows from disk or fetches them through a [`Transport`]
#[derive(Debug, Clone)]
pub struct CacheStore {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_key: String,
    directories: Directories,
    enabled: bool,
}

impl CacheStore {
    /// Create a cache store writing under `directories`
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        directories: Directories,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            api_key: api_key.into(),
            directories,
            enabled: true,
        }
    }

    /// Enable or bypass the cache
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check if caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Create the cache directories
    pub fn initialize(&self) -> io::Result<()> {
        if !self.enabled {
            tracing::debug!("Cache is disabled");
            return Ok(());
        }
        for endpoint in Endpoint::ALL {
            fs::create_dir_all(self.directories.for_endpoint(endpoint))?;
        }
        tracing::debug!("Cache initialized");
        Ok(())
    }

    /// Cache directory of `endpoint`
    pub fn directory(&self, endpoint: Endpoint) -> &Path {
        self.directories.for_endpoint(endpoint)
    }

    /// File holding the window named `key`
    pub fn path_for(&self, endpoint: Endpoint, key: &CacheKey) -> PathBuf {
        self.directory(endpoint)
            .join(format!("{}.{}", key, endpoint.format().extension()))
    }

    /// Return the window from disk, or fetch and persist it
    pub async fn fetch_or_load(
        &self,
        endpoint: Endpoint,
        query: &Query,
        window: Window,
        policy: RefreshPolicy,
    ) -> Result<ResponseEnvelope> {
        if !self.enabled {
            let body = self.fetch(endpoint, query, window).await?;
            return Ok(ResponseEnvelope::from_network(endpoint.format(), &body));
        }

        let key = CacheKey::for_window(query, window);
        let path = self.path_for(endpoint, &key);

        if !policy.should_fetch(file_age(&path)) {
            match fs::read_to_string(&path) {
                Ok(body) => {
                    tracing::debug!("Cache HIT for {}: {}", endpoint, key);
                    return Ok(ResponseEnvelope::from_cache(endpoint.format(), &body));
                }
                Err(e) => {
                    tracing::warn!("Unreadable cache file {}: {}", path.display(), e);
                }
            }
        } else if path.exists() {
            tracing::debug!("Cache REFRESH for {}: {}", endpoint, key);
        } else {
            tracing::debug!("Cache MISS for {}: {}", endpoint, key);
        }

        let body = self.fetch(endpoint, query, window).await?;
        if let Err(e) = write_cache_file(&path, &body) {
            tracing::warn!("Failed to cache {} response {}: {}", endpoint, key, e);
        } else {
            tracing::debug!("Cached {} response: {}", endpoint, key);
        }
        Ok(ResponseEnvelope::from_network(endpoint.format(), &body))
    }

    async fn fetch(&self, endpoint: Endpoint, query: &Query, window: Window) -> Result<String> {
        let url = endpoint.url(&self.base_url);
        let params = vec![
            ("q".to_string(), query.render()),
            ("s".to_string(), window.start.to_string()),
            ("p".to_string(), window.size.to_string()),
            ("api_key".to_string(), self.api_key.clone()),
        ];
        tracing::debug!(
            "Fetching {} window start={} size={}",
            endpoint,
            window.start,
            window.size
        );
        Ok(self.transport.send(&url, &params).await?.body)
    }

    /// Remove every cached window of `endpoint`
    pub fn clear(&self, endpoint: Endpoint) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let dir = self.directory(endpoint);
        let _ = fs::remove_dir_all(dir);
        fs::create_dir_all(dir)?;
        tracing::info!("{} cache cleared", endpoint);
        Ok(())
    }

    /// Remove every cached window
    pub fn clear_all(&self) -> io::Result<()> {
        for endpoint in Endpoint::ALL {
            self.clear(endpoint)?;
        }
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        if !self.enabled {
            return CacheStats {
                enabled: false,
                endpoints: Vec::new(),
            };
        }

        let endpoints = Endpoint::ALL
            .into_iter()
            .map(|endpoint| {
                let directory = self.directory(endpoint).to_path_buf();
                let entries = directory.read_dir().map(|e| e.count()).unwrap_or(0);
                let size_bytes = dir_size(&directory);
                let last_modified = newest_entry(&directory);
                EndpointCacheStats {
                    endpoint,
                    directory,
                    entries,
                    size_bytes,
                    last_modified,
                }
            })
            .collect();

        CacheStats {
            enabled: true,
            endpoints,
        }
    }
}

/// Statistics about the cache
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Whether caching is enabled
    pub enabled: bool,

    /// One entry per endpoint
    pub endpoints: Vec<EndpointCacheStats>,
}

impl CacheStats {
    /// Number of cached windows across endpoints
    pub fn total_entries(&self) -> usize {
        self.endpoints.iter().map(|s| s.entries).sum()
    }

    /// Size of all cache files in bytes
    pub fn total_size_bytes(&self) -> u64 {
        self.endpoints.iter().map(|s| s.size_bytes).sum()
    }
}

/// Cache statistics of one endpoint
#[derive(Debug, Clone)]
pub struct EndpointCacheStats {
    pub endpoint: Endpoint,
    pub directory: PathBuf,
    pub entries: usize,
    pub size_bytes: u64,
    /// Modification time of the most recently written window
    pub last_modified: Option<DateTime<Utc>>,
}

fn file_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok();
    match modified {
        Some(modified) => Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or_default(),
        ),
        // File exists but has no usable mtime: treat as arbitrarily old
        None => Some(Duration::MAX),
    }
}

fn write_cache_file(path: &Path, body: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)
}

fn newest_entry(path: &Path) -> Option<DateTime<Utc>> {
    path.read_dir()
        .ok()?
        .flatten()
        .filter_map(|entry| entry.metadata().ok()?.modified().ok())
        .max()
        .map(DateTime::<Utc>::from)
}

fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = path.read_dir() else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                dir_size(&path)
            } else {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockTransport;
    use crate::client::Origin;
    use std::fs::File;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(SECONDS_PER_DAY);

    fn store(dir: &TempDir, transport: Arc<MockTransport>) -> CacheStore {
        let store = CacheStore::new(
            transport,
            "http://localhost",
            "test-key",
            Directories::under(dir.path()),
        );
        store.initialize().unwrap();
        store
    }

    fn age_file(path: &Path, age: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_refresh_policy_decisions() {
        for policy in [
            RefreshPolicy::AlwaysFetchIfCached,
            RefreshPolicy::NeverFetchIfCached,
            RefreshPolicy::FetchIfOlderThan(3),
        ] {
            assert!(policy.should_fetch(None));
        }
        assert!(RefreshPolicy::AlwaysFetchIfCached.should_fetch(Some(Duration::ZERO)));
        assert!(!RefreshPolicy::NeverFetchIfCached.should_fetch(Some(DAY * 1000)));
        assert!(!RefreshPolicy::FetchIfOlderThan(3).should_fetch(Some(DAY * 2)));
        assert!(!RefreshPolicy::FetchIfOlderThan(3).should_fetch(Some(DAY * 3)));
        assert!(RefreshPolicy::FetchIfOlderThan(3).should_fetch(Some(DAY * 4)));
    }

    #[test]
    fn test_refresh_policy_conversions() {
        assert_eq!(RefreshPolicy::from(true), RefreshPolicy::AlwaysFetchIfCached);
        assert_eq!(RefreshPolicy::from(false), RefreshPolicy::NeverFetchIfCached);
        assert_eq!(RefreshPolicy::from(7u32), RefreshPolicy::FetchIfOlderThan(7));
        assert_eq!("TRUE".parse(), Ok(RefreshPolicy::AlwaysFetchIfCached));
        assert_eq!("false".parse(), Ok(RefreshPolicy::NeverFetchIfCached));
        assert_eq!("30".parse(), Ok(RefreshPolicy::FetchIfOlderThan(30)));
        assert!("-1".parse::<RefreshPolicy>().is_err());
        assert_eq!(RefreshPolicy::default(), RefreshPolicy::NeverFetchIfCached);
    }

    #[test]
    fn test_cache_keys() {
        let window = Window { start: 1, size: 25 };
        let doi = CacheKey::for_window(&Query::doi("10.1007/s10287-023-00498-7"), window);
        assert_eq!(doi.as_str(), "doi_10.1007-s10287-023-00498-7_1_25");

        let as_doi = CacheKey::for_window(&Query::doi("978-3-030-12345-6"), window);
        let as_isbn = CacheKey::for_window(&Query::isbn("978-3-030-12345-6"), window);
        assert_eq!(as_isbn.as_str(), "isbn_978-3-030-12345-6_1_25");
        assert_ne!(as_doi, as_isbn);

        let keyword = CacheKey::for_window(&Query::keyword("eigenvalues"), window);
        let expected = format!("{:x}", md5::compute("eigenvalues_1_25"));
        assert_eq!(keyword.as_str(), expected);

        let next = CacheKey::for_window(&Query::keyword("eigenvalues"), Window { start: 26, size: 25 });
        assert_ne!(keyword, next);
        assert!(!keyword.as_str().contains('/'));
    }

    #[tokio::test]
    async fn test_cache_reuse_and_file_layout() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::json(5));
        let cache = store(&dir, transport.clone());
        let query = Query::keyword("graphs");
        let window = Window { start: 1, size: 5 };

        let first = cache
            .fetch_or_load(Endpoint::Metadata, &query, window, RefreshPolicy::NeverFetchIfCached)
            .await
            .unwrap();
        assert_eq!(first.origin(), Origin::Network);
        assert_eq!(transport.calls(), 1);

        let path = cache.path_for(Endpoint::Metadata, &CacheKey::for_window(&query, window));
        assert!(path.starts_with(dir.path().join("metadata")));
        assert_eq!(path.extension().unwrap(), "json");

        let second = cache
            .fetch_or_load(Endpoint::Metadata, &query, window, RefreshPolicy::NeverFetchIfCached)
            .await
            .unwrap();
        assert_eq!(second.origin(), Origin::Cache);
        assert_eq!(transport.calls(), 1);
        assert_eq!(first.to_text(), second.to_text());
        assert_eq!(fs::read_to_string(&path).unwrap(), second.to_text());
    }

    #[tokio::test]
    async fn test_refresh_by_age() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::json(3));
        let cache = store(&dir, transport.clone());
        let query = Query::doi("10.1000/1");
        let window = Window { start: 1, size: 3 };

        cache
            .fetch_or_load(Endpoint::Meta, &query, window, RefreshPolicy::NeverFetchIfCached)
            .await
            .unwrap();
        let path = cache.path_for(Endpoint::Meta, &CacheKey::for_window(&query, window));

        age_file(&path, DAY * 5);
        cache
            .fetch_or_load(Endpoint::Meta, &query, window, RefreshPolicy::FetchIfOlderThan(10))
            .await
            .unwrap();
        assert_eq!(transport.calls(), 1);

        let refreshed = cache
            .fetch_or_load(Endpoint::Meta, &query, window, RefreshPolicy::FetchIfOlderThan(4))
            .await
            .unwrap();
        assert_eq!(refreshed.origin(), Origin::Network);
        assert_eq!(transport.calls(), 2);

        cache
            .fetch_or_load(Endpoint::Meta, &query, window, RefreshPolicy::AlwaysFetchIfCached)
            .await
            .unwrap();
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_malformed_cached_json_is_empty_document() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::json(3));
        let cache = store(&dir, transport.clone());
        let query = Query::keyword("broken");
        let window = Window { start: 1, size: 3 };

        let path = cache.path_for(Endpoint::Metadata, &CacheKey::for_window(&query, window));
        fs::write(&path, "{\"records\": [").unwrap();

        let envelope = cache
            .fetch_or_load(Endpoint::Metadata, &query, window, RefreshPolicy::NeverFetchIfCached)
            .await
            .unwrap();
        assert_eq!(envelope.json(), Some(&serde_json::json!({})));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_still_returns_response() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::json(2));
        // A regular file where the metadata directory should be
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, "").unwrap();
        let directories = Directories {
            metadata: blocked.join("metadata"),
            ..Directories::under(dir.path())
        };
        let cache = CacheStore::new(transport.clone(), "http://localhost", "k", directories);

        let envelope = cache
            .fetch_or_load(
                Endpoint::Metadata,
                &Query::keyword("x"),
                Window { start: 1, size: 2 },
                RefreshPolicy::NeverFetchIfCached,
            )
            .await
            .unwrap();
        assert_eq!(envelope.record_count().unwrap(), 2);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_disabled_always_fetches() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::json(2));
        let cache = store(&dir, transport.clone()).enabled(false);
        let query = Query::keyword("x");
        let window = Window { start: 1, size: 2 };

        for _ in 0..2 {
            cache
                .fetch_or_load(Endpoint::Metadata, &query, window, RefreshPolicy::NeverFetchIfCached)
                .await
                .unwrap();
        }
        assert_eq!(transport.calls(), 2);
        assert!(!cache
            .path_for(Endpoint::Metadata, &CacheKey::for_window(&query, window))
            .exists());
        assert!(!cache.stats().enabled);
    }

    #[tokio::test]
    async fn test_request_parameters() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::xml(30));
        let cache = store(&dir, transport.clone());

        cache
            .fetch_or_load(
                Endpoint::OpenAccess,
                &Query::doi("10.1000/7"),
                Window { start: 11, size: 10 },
                RefreshPolicy::NeverFetchIfCached,
            )
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "http://localhost/openaccess/jats");
        assert_eq!(requests[0].query, "doi:10.1000/7");
        assert_eq!((requests[0].start, requests[0].size), (11, 10));
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::json(4));
        let cache = store(&dir, transport);

        for start in [1, 3] {
            cache
                .fetch_or_load(
                    Endpoint::Metadata,
                    &Query::keyword("stats"),
                    Window { start, size: 2 },
                    RefreshPolicy::NeverFetchIfCached,
                )
                .await
                .unwrap();
        }

        let stats = cache.stats();
        assert!(stats.enabled);
        assert_eq!(stats.total_entries(), 2);
        assert!(stats.total_size_bytes() > 0);
        assert!(stats.endpoints[0].last_modified.is_some());
        assert!(stats.endpoints[1].last_modified.is_none());

        cache.clear(Endpoint::Metadata).unwrap();
        assert_eq!(cache.stats().total_entries(), 0);
        assert!(cache.directory(Endpoint::Metadata).exists());

        cache.clear_all().unwrap();
    }
}
