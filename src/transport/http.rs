use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::instrument;

use crate::retriever::{error::RetrievalError, window::Window};

use super::{rate_limiter::RateLimiter, ClientConfig, EntrezApi, HistoryHandle, SearchResult};

const ESEARCH: &str = "esearch";
const EFETCH: &str = "efetch";

/// E-utilities over HTTPS. All requests made through one instance share a
/// single rate limiter.
pub struct HttpEntrez {
    client: reqwest::Client,
    config: ClientConfig,
    limiter: RateLimiter,
}

impl HttpEntrez {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .context("Couldn't build HTTP client")?;
        let limiter = RateLimiter::new(config.requests_per_second());
        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}.fcgi", self.config.base_url.trim_end_matches('/'))
    }

    fn identity(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![
            ("tool", self.config.tool.as_str()),
            ("email", self.config.email.as_str()),
        ];
        if let Some(api_key) = &self.config.api_key {
            params.push(("api_key", api_key.as_str()));
        }
        params
    }

    async fn get(
        &self,
        endpoint: &'static str,
        params: &[(&str, &str)],
    ) -> Result<String, RetrievalError> {
        self.limiter.acquire().await;
        self.client
            .get(self.endpoint(endpoint))
            .query(params)
            .query(&self.identity())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| RetrievalError::transport(endpoint, e))?
            .text()
            .await
            .map_err(|e| RetrievalError::transport(endpoint, e))
    }
}

impl EntrezApi for HttpEntrez {
    #[instrument(err, skip(self), level = "debug")]
    async fn search(&self, db: &str, term: &str) -> Result<SearchResult, RetrievalError> {
        let body = self
            .get(
                ESEARCH,
                &[
                    ("db", db),
                    ("term", term),
                    ("usehistory", "y"),
                    ("retmax", "0"),
                    ("retmode", "json"),
                ],
            )
            .await?;
        parse_search_response(&body)
    }

    #[instrument(err, skip(self, handle, window), fields(window = %window), level = "debug")]
    async fn fetch(
        &self,
        db: &str,
        handle: &HistoryHandle,
        window: Window,
    ) -> Result<String, RetrievalError> {
        let retstart = window.offset.to_string();
        let retmax = window.size.to_string();
        let body = self
            .get(
                EFETCH,
                &[
                    ("db", db),
                    ("WebEnv", handle.web_env.as_str()),
                    ("query_key", handle.query_key.as_str()),
                    ("retstart", retstart.as_str()),
                    ("retmax", retmax.as_str()),
                    ("rettype", "gb"),
                    ("retmode", "text"),
                ],
            )
            .await?;
        // Expired sessions and server-side failures come back as XML or JSON with status 200
        match body.trim_start().chars().next() {
            Some('<') | Some('{') => Err(RetrievalError::malformed(
                EFETCH,
                body.lines().take(3).collect::<Vec<_>>().join(" "),
            )),
            _ => Ok(body),
        }
    }
}

#[derive(Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Deserialize)]
struct EsearchResult {
    count: Option<String>,
    webenv: Option<String>,
    querykey: Option<String>,
    #[serde(rename = "ERROR")]
    error: Option<String>,
}

fn parse_search_response(body: &str) -> Result<SearchResult, RetrievalError> {
    let response: EsearchResponse = serde_json::from_str(body)
        .map_err(|e| RetrievalError::malformed(ESEARCH, e.to_string()))?;
    let result = response.esearchresult;
    if let Some(error) = result.error {
        return Err(RetrievalError::malformed(ESEARCH, error));
    }
    let missing = |field: &str| RetrievalError::malformed(ESEARCH, format!("no '{field}' field"));
    let count = result
        .count
        .ok_or_else(|| missing("count"))?
        .parse()
        .map_err(|e| RetrievalError::malformed(ESEARCH, format!("invalid count: {e}")))?;
    // No session is retained for an empty result set, and none is ever replayed
    if count == 0 && result.webenv.is_none() {
        return Ok(SearchResult {
            handle: HistoryHandle::default(),
            count,
        });
    }
    let web_env = result.webenv.ok_or_else(|| missing("webenv"))?;
    let query_key = result.querykey.ok_or_else(|| missing("querykey"))?;
    Ok(SearchResult {
        handle: HistoryHandle { web_env, query_key },
        count,
    })
}
