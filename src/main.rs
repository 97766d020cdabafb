// taxfetch, a GenBank length survey for NCBI taxa.
// Copyright (C) 2024 taxfetch contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use clap::Parser;
use prometheus_client::metrics::info::Info;
use prometheus_client::registry::Registry;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::cli::Args;
use crate::retriever::Retriever;
use crate::transport::http::HttpEntrez;

mod cli;
mod genbank;
mod metrics;
mod output;
mod retriever;
mod transport;
mod types;

fn setup_tracing(args: &Args) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::builder().parse_lossy(
        std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV).unwrap_or("info".to_string()),
    );
    let fmt = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_span_events(if args.log_span_durations {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .with_filter(env_filter);
    tracing_subscriber::registry()
        .with(fmt)
        .with(sentry::integrations::tracing::layer())
        .try_init()?;
    Ok(())
}

fn setup_sentry(args: &Args) -> Option<sentry::ClientInitGuard> {
    args.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    })
}

fn create_cancellation_token() -> Result<CancellationToken> {
    use tokio::signal::unix::{signal, SignalKind};

    let token = CancellationToken::new();
    let copy = token.clone();
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select!(
            _ = sigint.recv() => {
                copy.cancel();
            },
            _ = sigterm.recv() => {
                copy.cancel();
            },
        );
    });
    Ok(token)
}

async fn run(args: &Args) -> Result<()> {
    let filter = args.length_filter();
    if filter.is_empty() {
        tracing::warn!(
            "Length range [{}, {}] is empty, no record can pass",
            filter.min,
            filter.max
        );
    }

    let entrez = HttpEntrez::new(args.client_config())?;
    let cancellation_token = create_cancellation_token()?;
    let mut retriever = Retriever::new(entrez, filter, args.fetch_options(), cancellation_token);

    println!("Searching TaxID {}...", args.taxid);
    let count = retriever
        .search(&args.taxid)
        .await
        .with_context(|| format!("Search for taxon {} failed", args.taxid))?;
    if count == 0 {
        println!("No records found.");
        return Ok(());
    }

    println!("Fetching & filtering...");
    let records = retriever
        .fetch_and_filter(args.limit)
        .await
        .context("Couldn't fetch records")?;
    let skipped = metrics::PAGES_SKIPPED.get();
    if skipped > 0 {
        tracing::warn!("{skipped} pages couldn't be parsed and were skipped");
    }
    if records.is_empty() {
        println!("No records within length range.");
        return Ok(());
    }

    let records = output::sort_by_length_desc(records);
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Couldn't create output dir '{}'", args.output_dir))?;
    let csv_path = args.csv_path();
    let plot_path = args.plot_path();
    output::write_csv(&records, &csv_path)?;
    output::plot_lengths(&records, &plot_path)?;
    println!("Saved CSV: {csv_path}");
    println!("Saved plot: {plot_path}");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    setup_tracing(&args)?;
    let _sentry_guard = setup_sentry(&args);

    let mut metrics_registry = Registry::default();
    let info = Info::new(vec![
        ("version".to_owned(), env!("CARGO_PKG_VERSION").to_owned()),
        ("taxid".to_owned(), args.taxid.to_string()),
    ]);
    metrics::register_metrics(&mut metrics_registry, info);

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(&args));

    if let Some(path) = &args.metrics_file {
        if let Err(e) = metrics::write_metrics(&metrics_registry, path) {
            tracing::warn!("Couldn't save metrics: {e:?}");
        }
    }
    result
}
