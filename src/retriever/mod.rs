pub mod error;
pub mod window;

use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    genbank, metrics,
    transport::{EntrezApi, HistoryHandle, NUCLEOTIDE_DB},
    types::{LengthFilter, SequenceRecord, TaxonId},
};

use error::RetrievalError;
use window::{plan_windows, Window, DEFAULT_PAGE_SIZE};

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub page_size: u64,
    /// Pages in flight at once; 1 fetches strictly sequentially
    pub concurrency: usize,
    pub page_retries: u32,
    pub retry_backoff: Duration,
    pub skip_bad_pages: bool,
    pub deadline: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: 1,
            page_retries: 2,
            retry_backoff: Duration::from_secs(1),
            skip_bad_pages: false,
            deadline: None,
        }
    }
}

/// Result set retained on the server by a successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalSession {
    pub handle: HistoryHandle,
    pub total_count: u64,
}

#[derive(Debug)]
enum State {
    Unsearched,
    Searched(RetrievalSession),
}

/// Two-phase retrieval: `search` opens a server-side session, `fetch_and_filter`
/// pages through it.
pub struct Retriever<T: EntrezApi> {
    api: T,
    filter: LengthFilter,
    options: FetchOptions,
    state: State,
    cancellation_token: CancellationToken,
}

impl<T: EntrezApi> Retriever<T> {
    pub fn new(
        api: T,
        filter: LengthFilter,
        options: FetchOptions,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            api,
            filter,
            options,
            state: State::Unsearched,
            cancellation_token,
        }
    }

    pub fn session(&self) -> Option<&RetrievalSession> {
        match &self.state {
            State::Searched(session) => Some(session),
            State::Unsearched => None,
        }
    }

    /// Returns the number of matching records. Zero is a valid, empty session.
    pub async fn search(&mut self, taxon: &TaxonId) -> Result<u64, RetrievalError> {
        let term = taxon.search_term();
        let result = tokio::select! {
            biased;
            _ = self.cancellation_token.cancelled() => return Err(RetrievalError::Cancelled),
            result = self.api.search(NUCLEOTIDE_DB, &term) => result?,
        };
        info!(
            "Search '{term}' matched {} records (query_key {})",
            result.count, result.handle.query_key
        );
        self.state = State::Searched(RetrievalSession {
            handle: result.handle,
            total_count: result.count,
        });
        Ok(result.count)
    }

    /// Fetches up to `max_records` records of the current session and keeps those
    /// within the length filter, in server order.
    pub async fn fetch_and_filter(
        &self,
        max_records: u64,
    ) -> Result<Vec<SequenceRecord>, RetrievalError> {
        let State::Searched(session) = &self.state else {
            return Err(RetrievalError::NoActiveSession);
        };
        let windows = plan_windows(session.total_count, max_records, self.options.page_size);
        if windows.is_empty() {
            return Ok(Vec::new());
        }
        info!(
            "Fetching {} pages of up to {} records",
            windows.len(),
            self.options.page_size
        );

        let retrieval = async {
            match self.options.deadline {
                Some(deadline) => {
                    tokio::time::timeout(deadline, self.fetch_windows(session, windows))
                        .await
                        .unwrap_or_else(|_| Err(RetrievalError::DeadlineExceeded(deadline)))
                }
                None => self.fetch_windows(session, windows).await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancellation_token.cancelled() => Err(RetrievalError::Cancelled),
            result = retrieval => result,
        }
    }

    async fn fetch_windows(
        &self,
        session: &RetrievalSession,
        windows: Vec<Window>,
    ) -> Result<Vec<SequenceRecord>, RetrievalError> {
        // `buffered` yields pages in window order however many are in flight
        let pages: Vec<Vec<SequenceRecord>> = futures::stream::iter(windows)
            .map(|window| self.fetch_page(&session.handle, window))
            .buffered(self.options.concurrency.max(1))
            .try_collect()
            .await?;
        Ok(pages.into_iter().flatten().collect())
    }

    async fn fetch_page(
        &self,
        handle: &HistoryHandle,
        window: Window,
    ) -> Result<Vec<SequenceRecord>, RetrievalError> {
        let body = self.fetch_with_retries(handle, window).await?;
        let mut records = match genbank::parse_page(&body) {
            Ok(records) => records,
            Err(e) if self.options.skip_bad_pages => {
                warn!("Skipping page {window}: {e}");
                metrics::PAGES_SKIPPED.inc();
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(RetrievalError::Parse {
                    offset: window.offset,
                    source: e,
                })
            }
        };
        if records.len() as u64 > window.size {
            warn!(
                "Page {window} returned {} records, dropping the excess",
                records.len()
            );
            records.truncate(window.size as usize);
        }
        metrics::RECORDS_PARSED.inc_by(records.len() as u64);

        let parsed = records.len();
        records.retain(|record| self.filter.contains(record.length));
        debug!("Page {window}: kept {} of {parsed} records", records.len());
        metrics::RECORDS_KEPT.inc_by(records.len() as u64);
        Ok(records)
    }

    async fn fetch_with_retries(
        &self,
        handle: &HistoryHandle,
        window: Window,
    ) -> Result<String, RetrievalError> {
        let mut backoff = self.options.retry_backoff;
        let mut attempt = 0;
        loop {
            match self.api.fetch(NUCLEOTIDE_DB, handle, window).await {
                Ok(body) => {
                    metrics::PAGES_FETCHED.inc();
                    return Ok(body);
                }
                Err(e) if e.is_retryable() && attempt < self.options.page_retries => {
                    attempt += 1;
                    warn!(
                        "Couldn't fetch page {window} ({attempt}/{}), retrying in {backoff:?}: {e:?}",
                        self.options.page_retries
                    );
                    metrics::PAGE_RETRIES.inc();
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests;
