use std::time::Duration;

use anyhow::Result;
use camino::Utf8PathBuf as PathBuf;
use clap::Parser;

use crate::{
    retriever::{window::MAX_PAGE_SIZE, FetchOptions},
    transport::{ClientConfig, DEFAULT_BASE_URL},
    types::{LengthFilter, TaxonId},
};

/// Retrieves GenBank nucleotide records of a taxon, keeps those within a length
/// range and saves them as a CSV table and a length plot.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Args {
    /// Contact address sent with every E-utilities request
    #[clap(long, env)]
    pub email: String,

    /// NCBI API key; raises the allowance from 3 to 10 requests per second
    #[clap(long = "api_key", alias = "api-key", env = "NCBI_API_KEY")]
    pub api_key: String,

    /// NCBI taxonomy id, e.g. 9606 or txid9606
    #[clap(long, env, value_parser = TaxonId::parse)]
    pub taxid: TaxonId,

    /// Shortest sequence to keep (inclusive)
    #[clap(long = "min_len", alias = "min-len", env, default_value_t = 0)]
    pub min_len: u64,

    /// Longest sequence to keep (inclusive)
    #[clap(long = "max_len", alias = "max-len", env, default_value_t = 1_000_000)]
    pub max_len: u64,

    /// Maximum number of records to fetch
    #[clap(long, env, default_value_t = 200)]
    pub limit: u64,

    /// Directory to write the CSV table and the plot to
    #[clap(
        long,
        env,
        value_name = "DIR",
        default_value = ".",
        hide_default_value(true)
    )]
    pub output_dir: PathBuf,

    /// Records requested per efetch call
    #[clap(long, env, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..=MAX_PAGE_SIZE))]
    pub page_size: u64,

    /// Number of pages fetched at the same time
    #[clap(long, env, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..=10))]
    pub fetch_concurrency: u64,

    /// How many times a page is re-requested after a network failure
    #[clap(long, env, default_value_t = 2)]
    pub page_retries: u32,

    /// Drop pages that can't be parsed instead of aborting the run
    #[clap(long, env)]
    pub skip_bad_pages: bool,

    /// Give up if fetching hasn't finished after this many seconds
    #[clap(long = "timeout-sec", env = "TIMEOUT_SEC", value_parser = parse_seconds)]
    pub timeout: Option<Duration>,

    #[clap(long = "request-timeout-sec", env = "REQUEST_TIMEOUT_SEC", value_parser = parse_seconds, default_value = "60")]
    pub request_timeout: Duration,

    #[clap(long = "retry-backoff-sec", env = "RETRY_BACKOFF_SEC", hide(true), value_parser = parse_seconds, default_value = "1")]
    pub retry_backoff: Duration,

    /// Tool name reported to NCBI
    #[clap(long, env, default_value = env!("CARGO_PKG_NAME"))]
    pub tool: String,

    #[clap(long, env, hide(true), default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Write Prometheus text-format counters to this file on exit
    #[clap(long, env, value_name = "FILE")]
    pub metrics_file: Option<PathBuf>,

    #[clap(long, env)]
    pub log_span_durations: bool,

    #[clap(long, env, hide(true))]
    pub sentry_dsn: Option<String>,
}

impl Args {
    pub fn length_filter(&self) -> LengthFilter {
        LengthFilter::new(self.min_len, self.max_len)
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.email.clone());
        config.base_url = self.base_url.clone();
        config.tool = self.tool.clone();
        config.api_key = Some(self.api_key.trim())
            .filter(|key| !key.is_empty())
            .map(str::to_owned);
        config.request_timeout = self.request_timeout;
        config
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            page_size: self.page_size,
            concurrency: self.fetch_concurrency as usize,
            page_retries: self.page_retries,
            retry_backoff: self.retry_backoff,
            skip_bad_pages: self.skip_bad_pages,
            deadline: self.timeout,
        }
    }

    pub fn csv_path(&self) -> PathBuf {
        self.output_dir.join(format!("taxid_{}_filtered.csv", self.taxid))
    }

    pub fn plot_path(&self) -> PathBuf {
        self.output_dir.join(format!("taxid_{}_plot.png", self.taxid))
    }
}

fn parse_seconds(s: &str) -> Result<Duration> {
    Ok(Duration::from_secs(s.parse()?))
}
