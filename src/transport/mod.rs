pub mod http;
pub mod rate_limiter;

use std::time::Duration;

use futures::Future;

use crate::retriever::{error::RetrievalError, window::Window};

pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const NUCLEOTIDE_DB: &str = "nucleotide";

/// Server-side handle of a retained search result (`WebEnv` + `query_key`).
/// Empty when the search matched nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryHandle {
    pub web_env: String,
    pub query_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub handle: HistoryHandle,
    pub count: u64,
}

/// Identity and connection settings shared by every request of a run.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub tool: String,
    pub email: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            tool: env!("CARGO_PKG_NAME").to_owned(),
            email: email.into(),
            api_key: None,
            request_timeout: Duration::from_secs(60),
        }
    }

    // E-utilities allowance: 3 req/s anonymously, 10 req/s with a key
    pub fn requests_per_second(&self) -> u32 {
        if self.api_key.is_some() {
            10
        } else {
            3
        }
    }
}

/// The two E-utilities calls the retrieval protocol is built on.
pub trait EntrezApi: Send + Sync {
    /// Runs `term` against `db`, retaining the full result set on the server.
    fn search(
        &self,
        db: &str,
        term: &str,
    ) -> impl Future<Output = Result<SearchResult, RetrievalError>> + Send;

    /// Fetches one window of a retained result set as GenBank flat file text.
    fn fetch(
        &self,
        db: &str,
        handle: &HistoryHandle,
        window: Window,
    ) -> impl Future<Output = Result<String, RetrievalError>> + Send;
}
