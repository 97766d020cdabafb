use anyhow::{Context, Result};
use camino::Utf8Path as Path;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::info::Info;
use prometheus_client::registry::Registry;

lazy_static::lazy_static! {
    pub static ref PAGES_FETCHED: Counter = Default::default();
    pub static ref PAGE_RETRIES: Counter = Default::default();
    pub static ref PAGES_SKIPPED: Counter = Default::default();
    pub static ref RECORDS_PARSED: Counter = Default::default();
    pub static ref RECORDS_KEPT: Counter = Default::default();
}

pub fn register_metrics(registry: &mut Registry, info: Info<Vec<(String, String)>>) {
    registry.register("taxfetch_info", "Run info", info);
    registry.register(
        "pages_fetched",
        "Number of result pages downloaded",
        PAGES_FETCHED.clone(),
    );
    registry.register(
        "page_retries",
        "Number of page downloads retried after a transport failure",
        PAGE_RETRIES.clone(),
    );
    registry.register(
        "pages_skipped",
        "Number of pages dropped because they couldn't be parsed",
        PAGES_SKIPPED.clone(),
    );
    registry.register(
        "records_parsed",
        "Number of sequence records parsed from fetched pages",
        RECORDS_PARSED.clone(),
    );
    registry.register(
        "records_kept",
        "Number of sequence records within the length range",
        RECORDS_KEPT.clone(),
    );
}

/// Dumps the registry in Prometheus text exposition format.
pub fn write_metrics(registry: &Registry, path: &Path) -> Result<()> {
    let mut buffer = String::new();
    encode(&mut buffer, registry)?;
    std::fs::write(path, buffer).with_context(|| format!("Couldn't write metrics to '{path}'"))?;
    Ok(())
}
