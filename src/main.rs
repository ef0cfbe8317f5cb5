// src/main.rs
mod edgar;
mod extractors;
mod pipeline;
mod storage;
mod utils;

use clap::Parser;
use edgar::models::FormType;
use edgar::retry::RetryPolicy;
use edgar::{EdgarClient, EdgarConfig};
use extractors::forms::{SectionId, SectionMapper};
use extractors::section::{BoundarySpec, NOT_FOUND};
use pipeline::{FilingReport, Pipeline, RunOptions, TickerRun};
use std::time::Duration;
use storage::StorageManager;
use utils::AppError;

/// Extracts narrative sections (Risk Factors, MD&A, ...) from SEC 10-K and 10-Q filings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ticker symbol of the company (repeatable)
    #[arg(short = 't', long = "ticker", required = true)]
    tickers: Vec<String>,

    /// Filing types to keep, comma separated
    #[arg(long, value_delimiter = ',', default_value = "10-K,10-Q")]
    forms: Vec<FormType>,

    /// Number of most recent matching filings per ticker
    #[arg(short, long, default_value_t = 3)]
    count: usize,

    /// Sections to extract: item1, item1a, item7
    #[arg(long, value_delimiter = ',', default_value = "item1a")]
    sections: Vec<SectionId>,

    /// Heading occurrence taken as the section start when no contents markup is detected
    #[arg(long, default_value_t = BoundarySpec::DEFAULT_START_INDEX)]
    start_index: usize,

    /// Contact string sent as User-Agent, e.g. "Jane Doe jane@example.com"
    #[arg(long, env = "SEC_USER_AGENT")]
    user_agent: String,

    /// Output directory for extracted content
    #[arg(short, long, default_value = "./output")]
    output_dir: String,

    /// Write all tickers' records to this file (inside the output directory)
    /// instead of one <TICKER>_sections.json per ticker
    #[arg(long)]
    output_file: Option<String>,

    /// Filings processed concurrently per ticker
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Attempts per request before a filing is marked as failed
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Initial retry backoff in milliseconds, doubled per attempt
    #[arg(long, default_value_t = 500)]
    backoff_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Delay before every request in milliseconds (SEC allows 10 requests/second)
    #[arg(long, default_value_t = 150)]
    request_delay_ms: u64,

    /// Debug mode - save raw, normalized and annotated documents per filing
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn edgar_config(&self) -> Result<EdgarConfig, AppError> {
        let user_agent = self.user_agent.trim();
        if user_agent.is_empty() {
            return Err(AppError::Config(
                "A contact User-Agent is required (--user-agent or SEC_USER_AGENT)".to_string(),
            ));
        }

        let mut config = EdgarConfig::new(user_agent);
        config.request_delay = Duration::from_millis(self.request_delay_ms);
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.retry = RetryPolicy {
            max_attempts: self.max_retries,
            base_delay: Duration::from_millis(self.backoff_ms),
        };
        Ok(config)
    }

    fn run_options(&self) -> Result<RunOptions, AppError> {
        if self.forms.is_empty() || self.sections.is_empty() {
            return Err(AppError::Config("At least one form and one section are required".to_string()));
        }
        let mut sections = self.sections.clone();
        sections.sort();
        sections.dedup();
        Ok(RunOptions {
            forms: self.forms.clone(),
            count: self.count,
            sections,
            concurrency: self.concurrency,
        })
    }
}

fn log_summary(reports: &[FilingReport]) {
    for (i, report) in reports.iter().enumerate() {
        tracing::info!(
            "--- Filing {} --- {} {} filed {}",
            i + 1,
            report.ticker,
            report.form,
            report.filing_date
        );
        if let Some(error) = &report.error {
            tracing::warn!("  fetch error: {}", error);
            continue;
        }
        for (label, text) in &report.sections {
            if text == NOT_FOUND {
                tracing::info!("  {:8}: {}", label, NOT_FOUND);
            } else {
                let preview: String = text.chars().take(120).collect();
                tracing::info!("  {:8}: {} chars, \"{}...\"", label, text.chars().count(), preview);
            }
        }
    }
}

/// Writes one ticker's records to its own sink. Failures are logged so the
/// remaining tickers still run.
fn save_ticker_reports(storage: &StorageManager, run: &TickerRun) -> bool {
    match storage.save_reports(&StorageManager::default_file_name(&run.ticker), &run.reports) {
        Ok(path) => {
            tracing::info!("Saved results to: {}", path.display());
            true
        }
        Err(e) => {
            tracing::error!("Failed to save results for {}: {}", run.ticker, e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging("info");

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    let config = args.edgar_config()?;
    let options = args.run_options()?;

    // 3. Initialize storage, client and section mapper
    let storage = StorageManager::new(&args.output_dir)?;
    let client = EdgarClient::new(config)?;
    let mapper = SectionMapper::new(args.start_index)?;
    let pipeline = Pipeline::new(client, mapper, options, args.debug.then(|| storage.clone()));

    // 4. Registry snapshot is shared by every ticker
    let registry = pipeline.client().fetch_registry().await?;

    // 5. Process each ticker independently
    let mut combined = Vec::new();
    let mut processed = 0;
    let mut unsaved = Vec::new();
    for ticker in &args.tickers {
        let run = match pipeline.process_ticker(&registry, ticker).await {
            Ok(Some(run)) => run,
            Ok(None) => {
                tracing::warn!("Ticker {} is not in the registry, skipping", ticker);
                continue;
            }
            Err(e) => {
                tracing::error!("Failed to fetch filing index for {}: {}", ticker, e);
                continue;
            }
        };
        log_summary(&run.reports);
        let failures = run.reports.iter().filter(|r| r.error.is_some()).count();
        tracing::info!(
            "Processing finished for {} (CIK {}). Filings: {}, fetch failures: {}",
            run.ticker,
            run.cik,
            run.reports.len(),
            failures
        );

        if let Err(e) = storage.save_run_metadata(&run.ticker, &run.company, &run.reports) {
            tracing::error!("Failed to save run metadata: {}", e);
        }
        if args.output_file.is_some() {
            combined.extend(run.reports);
        } else if !save_ticker_reports(&storage, &run) {
            unsaved.push(run.ticker);
            continue;
        }
        processed += 1;
    }

    if let Some(file_name) = &args.output_file {
        let path = storage.save_reports(file_name, &combined)?;
        tracing::info!("Saved combined results to: {}", path.display());
    }

    if !unsaved.is_empty() {
        tracing::error!("Results could not be saved for: {}", unsaved.join(", "));
    }

    if processed == 0 {
        return Err(AppError::Processing(format!(
            "None of the requested tickers could be processed: {}",
            args.tickers.join(", ")
        )));
    }

    Ok(())
}
