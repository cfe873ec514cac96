//! Retrieval engine for the Springer Nature API.
//!
//! - [`Transport`]: one GET with retry and timeout ([`HttpTransport`])
//! - [`CacheStore`]: decides between the disk cache and the network
//! - [`ResponseEnvelope`]: one JSON or XML response, live or cached
//! - [`PaginationCoordinator`]: splits a request into windows and merges them
//! - [`classify`]: maps HTTP statuses to [`ApiErrorKind`]
//!
//! [`SpringerClient`] wires them together from a [`Config`].

mod cache;
mod classify;
mod envelope;
mod error;
pub mod mock;
mod pagination;
mod transport;
mod xml;

pub use cache::{CacheKey, CacheStats, CacheStore, EndpointCacheStats, RefreshPolicy};
pub use classify::{classify, is_retryable_status, ApiError, ApiErrorKind};
pub use envelope::{Document, Origin, RecordContainer, ResponseEnvelope};
pub use error::{Error, Result};
pub use pagination::{plan_windows, PaginationCoordinator, Retrieval, RetrievalWarning, Window};
pub use transport::{HttpTransport, RawResponse, Transport};

use std::sync::Arc;

use crate::config::Config;
use crate::models::{Endpoint, Plan, Query};

/// Per-call retrieval options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieveOptions {
    /// 1-based index of the first record
    pub start: u64,
    /// Number of records wanted
    pub count: u64,
    /// Plan override; the configured plan when `None`
    pub plan: Option<Plan>,
    /// Cache refresh policy
    pub refresh: RefreshPolicy,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            start: 1,
            count: 10,
            plan: None,
            refresh: RefreshPolicy::NeverFetchIfCached,
        }
    }
}

impl RetrieveOptions {
    pub fn start(mut self, start: u64) -> Self {
        self.start = start;
        self
    }

    pub fn count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    pub fn plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn refresh(mut self, refresh: impl Into<RefreshPolicy>) -> Self {
        self.refresh = refresh.into();
        self
    }
}

/// Client for the metadata, meta and open access endpoints
#[derive(Debug, Clone)]
pub struct SpringerClient {
    config: Config,
    coordinator: PaginationCoordinator,
}

impl SpringerClient {
    /// Create a client talking HTTP to the configured base URL
    pub fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::from_settings(&config.requests)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client on top of any transport
    ///
    /// Fails with [`Error::MissingApiKey`] when no key is configured and
    /// creates the cache directories when the cache is enabled.
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let api_key = config.api_key().ok_or(Error::MissingApiKey)?.to_string();

        let cache = CacheStore::new(
            transport,
            config.base_url.clone(),
            api_key,
            config.directories.clone(),
        )
        .enabled(config.cache.enabled);
        cache.initialize()?;

        tracing::debug!("Client initialized for {} ({:?} plan)", config.base_url, config.plan);
        Ok(Self {
            config,
            coordinator: PaginationCoordinator::new(cache),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cache store in use
    pub fn cache(&self) -> &CacheStore {
        self.coordinator.cache()
    }

    /// Retrieve records of `query` from `endpoint`
    pub async fn retrieve(
        &self,
        endpoint: Endpoint,
        query: &Query,
        options: RetrieveOptions,
    ) -> Result<Retrieval> {
        let plan = options.plan.unwrap_or(self.config.plan);
        tracing::info!(
            "Retrieving {} record(s) from {} for '{}'",
            options.count,
            endpoint,
            query
        );
        self.coordinator
            .retrieve(
                endpoint,
                query,
                options.start,
                options.count,
                plan,
                options.refresh,
            )
            .await
    }

    /// Bibliographic metadata
    pub async fn metadata(&self, query: &Query, options: RetrieveOptions) -> Result<Retrieval> {
        self.retrieve(Endpoint::Metadata, query, options).await
    }

    /// Meta v2 records
    pub async fn meta(&self, query: &Query, options: RetrieveOptions) -> Result<Retrieval> {
        self.retrieve(Endpoint::Meta, query, options).await
    }

    /// Open access full text
    pub async fn open_access(&self, query: &Query, options: RetrieveOptions) -> Result<Retrieval> {
        self.retrieve(Endpoint::OpenAccess, query, options).await
    }
}
