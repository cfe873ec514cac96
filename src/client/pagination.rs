//! Splits a requested result count into windows and merges their responses.

use std::fmt;

use super::cache::{CacheStore, RefreshPolicy};
use super::envelope::ResponseEnvelope;
use super::error::{Error, Result};
use crate::models::{Endpoint, Plan, Query};

/// One bounded sub-request of a paginated retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    /// 1-based index of the first record
    pub start: u64,
    /// Number of records requested
    pub size: u64,
}

/// Windows following the first one, needed to reach `target` records
///
/// The first window `(start, page_size)` has already been fetched. A target
/// at or below `page_size` needs no further windows. Fails when a window
/// would start beyond `u64::MAX`.
pub fn plan_windows(start: u64, page_size: u64, target: u64) -> Result<Vec<Window>> {
    let mut windows = Vec::new();
    if page_size == 0 {
        return Ok(windows);
    }

    let overflow = || {
        Error::Pagination(format!(
            "{} records from index {} exceed the addressable range",
            target, start
        ))
    };
    let mut remaining = target.saturating_sub(page_size);
    let mut next_start = start.checked_add(page_size).ok_or_else(overflow)?;
    while remaining > 0 {
        let size = remaining.min(page_size);
        windows.push(Window {
            start: next_start,
            size,
        });
        remaining -= size;
        if remaining > 0 {
            next_start = next_start.checked_add(size).ok_or_else(overflow)?;
        }
    }
    Ok(windows)
}

/// Non-fatal conditions met during a retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalWarning {
    /// The API reported zero results
    NoResults,
    /// Fewer results exist than were requested
    TooManyResultsRequested { found: u64, requested: u64 },
}

impl fmt::Display for RetrievalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalWarning::NoResults => write!(f, "No results were found for this query."),
            RetrievalWarning::TooManyResultsRequested { found, requested } => write!(
                f,
                "Too many results requested. {} document(s) found but {} requested.",
                found, requested
            ),
        }
    }
}

/// Merged response of a retrieval plus the warnings it raised
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub envelope: ResponseEnvelope,
    pub warnings: Vec<RetrievalWarning>,
}

impl Retrieval {
    fn new(envelope: ResponseEnvelope) -> Self {
        Self {
            envelope,
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, warning: RetrievalWarning) {
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Fetches windows one after another and folds them into one envelope
#[derive(Debug, Clone)]
pub struct PaginationCoordinator {
    cache: CacheStore,
}

impl PaginationCoordinator {
    pub fn new(cache: CacheStore) -> Self {
        Self { cache }
    }

    /// Cache store used for every window
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Retrieve `requested` records of `query` starting at the 1-based `start`
    ///
    /// The result holds `min(requested, total)` records in server order.
    /// Windows are fetched strictly in sequence since the total needed to plan
    /// them is only known once the first window has arrived.
    pub async fn retrieve(
        &self,
        endpoint: Endpoint,
        query: &Query,
        start: u64,
        requested: u64,
        plan: Plan,
        policy: RefreshPolicy,
    ) -> Result<Retrieval> {
        if query.is_empty() {
            return Err(Error::InvalidQuery(
                "Please provide a query or field filters".to_string(),
            ));
        }
        if start == 0 {
            return Err(Error::InvalidQuery("start index is 1-based".to_string()));
        }
        if requested == 0 {
            tracing::debug!("Zero records requested from {}, skipping request", endpoint);
            return Ok(Retrieval::new(ResponseEnvelope::empty(endpoint.format())));
        }
        if start.checked_add(requested).is_none() {
            return Err(Error::InvalidQuery(format!(
                "start index {} leaves no room for {} records",
                start, requested
            )));
        }

        let page_size = requested.min(u64::from(endpoint.page_ceiling(plan)));
        let first_window = Window {
            start,
            size: page_size,
        };
        let first = self.fetch(endpoint, query, first_window, policy).await?;

        let total = first.total_available()?;
        let mut retrieval = Retrieval::new(first);
        if total == 0 {
            retrieval.warn(RetrievalWarning::NoResults);
            return Ok(retrieval);
        }

        let target = if total < requested {
            retrieval.warn(RetrievalWarning::TooManyResultsRequested {
                found: total,
                requested,
            });
            total
        } else {
            requested
        };

        let windows = plan_windows(start, page_size, target)?;
        tracing::debug!(
            "{} of {} records from {}: {} more window(s) of at most {}",
            target,
            total,
            endpoint,
            windows.len(),
            page_size
        );

        for window in windows {
            let next = self.fetch(endpoint, query, window, policy).await?;
            retrieval.envelope = retrieval.envelope.merge(next)?;
        }

        let received = retrieval.envelope.record_count()? as u64;
        if received > target {
            return Err(Error::Pagination(format!(
                "received {} records but only {} were expected",
                received, target
            )));
        }
        if received < target {
            tracing::warn!(
                "API returned {} of {} expected records from {}",
                received,
                target,
                endpoint
            );
        }
        Ok(retrieval)
    }

    async fn fetch(
        &self,
        endpoint: Endpoint,
        query: &Query,
        window: Window,
        policy: RefreshPolicy,
    ) -> Result<ResponseEnvelope> {
        let envelope = self
            .cache
            .fetch_or_load(endpoint, query, window, policy)
            .await?;
        let count = envelope.record_count()? as u64;
        if count > window.size {
            return Err(Error::Pagination(format!(
                "window at {} returned {} records, at most {} requested",
                window.start, count, window.size
            )));
        }
        Ok(envelope)
    }
}
