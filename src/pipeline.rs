// src/pipeline.rs
use crate::edgar::index::select_filings;
use crate::edgar::models::{Cik, FilingRecord, FormType, TickerRegistry};
use crate::edgar::EdgarClient;
use crate::extractors::forms::{ExtractionResult, FormLayout, SectionId, SectionMapper};
use crate::extractors::normalize::{normalize, NormalizedDocument};
use crate::extractors::section::Anchor;
use crate::storage::StorageManager;
use crate::utils::error::EdgarError;
use crate::utils::html_debug;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What to fetch and extract for each ticker.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub forms: Vec<FormType>,
    pub count: usize,
    pub sections: Vec<SectionId>,
    /// Filings processed at once per ticker.
    pub concurrency: usize,
}

/// Output record for one filing. `error` is set when the document could not
/// be fetched, in which case `sections` is empty.
#[derive(Debug, Clone, Serialize)]
pub struct FilingReport {
    pub ticker: String,
    pub company: String,
    pub form: FormType,
    pub filing_date: NaiveDate,
    pub accession: String,
    pub document_url: String,
    /// Section label to text, or "Not found".
    pub sections: BTreeMap<&'static str, String>,
    /// How the start heading of each found section was chosen.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub anchors: BTreeMap<&'static str, Anchor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FilingReport {
    fn new(ticker: &str, company: &str, record: &FilingRecord, document_url: String) -> Self {
        Self {
            ticker: ticker.to_string(),
            company: company.to_string(),
            form: record.form,
            filing_date: record.filing_date,
            accession: record.accession.clone(),
            document_url,
            sections: BTreeMap::new(),
            anchors: BTreeMap::new(),
            error: None,
        }
    }

    pub fn extracted(
        ticker: &str,
        company: &str,
        record: &FilingRecord,
        document_url: String,
        result: &ExtractionResult,
    ) -> Self {
        let mut report = Self::new(ticker, company, record, document_url);
        for section in &result.sections {
            report
                .sections
                .insert(section.label, section.outcome.text_or_sentinel().to_string());
            if let Some(anchor) = section.outcome.anchor() {
                report.anchors.insert(section.label, anchor);
            }
        }
        report
    }

    pub fn failed(ticker: &str, company: &str, record: &FilingRecord, document_url: String, error: String) -> Self {
        let mut report = Self::new(ticker, company, record, document_url);
        report.error = Some(error);
        report
    }

    pub fn found_count(&self) -> usize {
        self.anchors.len()
    }
}

/// Everything produced for one resolved ticker.
#[derive(Debug, Clone)]
pub struct TickerRun {
    pub ticker: String,
    pub company: String,
    pub cik: Cik,
    pub reports: Vec<FilingReport>,
}

/// Resolver -> index -> locator -> normalizer -> mapper, per ticker.
pub struct Pipeline {
    client: EdgarClient,
    mapper: Arc<SectionMapper>,
    options: RunOptions,
    debug_storage: Option<StorageManager>,
}

impl Pipeline {
    pub fn new(
        client: EdgarClient,
        mapper: SectionMapper,
        options: RunOptions,
        debug_storage: Option<StorageManager>,
    ) -> Self {
        Self {
            client,
            mapper: Arc::new(mapper),
            options,
            debug_storage,
        }
    }

    pub fn client(&self) -> &EdgarClient {
        &self.client
    }

    /// Runs the whole pipeline for one ticker.
    ///
    /// `Ok(None)` means the ticker is not in the registry. An error means the
    /// filing index itself could not be fetched; individual filing failures
    /// are reported inside the returned run instead.
    pub async fn process_ticker(
        &self,
        registry: &TickerRegistry,
        ticker: &str,
    ) -> Result<Option<TickerRun>, EdgarError> {
        let Some(cik) = registry.resolve(ticker) else {
            return Ok(None);
        };
        let ticker = ticker.trim().to_uppercase();
        tracing::info!("Resolved {} to CIK {}", ticker, cik);

        let submission = self.client.fetch_submissions(cik).await?;
        let company = if submission.name.is_empty() {
            registry.entry(&ticker).map(|e| e.title.clone()).unwrap_or_default()
        } else {
            submission.name.clone()
        };

        let records = select_filings(&submission.filings.recent, &self.options.forms, self.options.count);
        tracing::info!("Found {} matching filings for {} ({})", records.len(), ticker, company);

        let reports = self.process_filings(&ticker, &company, cik, records).await;
        Ok(Some(TickerRun {
            ticker,
            company,
            cik,
            reports,
        }))
    }

    /// Processes filings concurrently and returns reports in feed order.
    async fn process_filings(
        &self,
        ticker: &str,
        company: &str,
        cik: Cik,
        records: Vec<FilingRecord>,
    ) -> Vec<FilingReport> {
        let mut indexed: Vec<(usize, FilingReport)> = stream::iter(records.into_iter().enumerate())
            .map(|(i, record)| async move { (i, self.process_filing(ticker, company, cik, &record).await) })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, report)| report).collect()
    }

    async fn process_filing(&self, ticker: &str, company: &str, cik: Cik, record: &FilingRecord) -> FilingReport {
        let url = record.primary_doc_url(&self.client.config().archives_base, cik);
        tracing::info!("Processing {} {} filed {} from {}", ticker, record.form, record.filing_date, url);

        let raw = match self.client.download_filing_doc(&url).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("Failed to download filing document {}: {}", url, e);
                return FilingReport::failed(ticker, company, record, url, e.to_string());
            }
        };
        tracing::info!("Downloaded document ({} bytes)", raw.len());

        // Parsing a large filing is CPU bound, and debug output writes whole
        // documents to disk; keep both off the async workers
        let mapper = Arc::clone(&self.mapper);
        let form = record.form;
        let sections = self.options.sections.clone();
        let debug = self
            .debug_storage
            .clone()
            .map(|storage| (storage, ticker.to_string(), record.clone()));
        let extraction = tokio::task::spawn_blocking(move || {
            let doc = normalize(&raw);
            let result = mapper.extract_sections(&doc, form, &sections);
            if let Some((storage, ticker, record)) = debug {
                write_debug(&storage, mapper.layout(form), &ticker, &record, &raw, &doc);
            }
            (doc.degradations(), result)
        })
        .await;

        let (degradations, result) = match extraction {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!("Extraction task for {} failed: {}", url, e);
                return FilingReport::failed(ticker, company, record, url, format!("extraction task failed: {}", e));
            }
        };
        if degradations > 0 {
            tracing::warn!("{} markup errors recovered in {}", degradations, url);
        }
        tracing::info!(
            "Extracted {}/{} sections from {} {}",
            result.found_count(),
            result.sections.len(),
            record.form,
            record.filing_date
        );

        FilingReport::extracted(ticker, company, record, url, &result)
    }
}

fn write_debug(
    storage: &StorageManager,
    layout: &FormLayout,
    ticker: &str,
    record: &FilingRecord,
    raw: &str,
    doc: &NormalizedDocument,
) {
    let view = html_debug::annotate_boundaries(doc, layout);
    match storage.save_debug_artifacts(ticker, record, raw, doc, &view) {
        Ok(dir) => tracing::info!("Saved debug artifacts to {}", dir.display()),
        Err(e) => tracing::warn!("Failed to save debug artifacts: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::retry::RetryPolicy;
    use crate::edgar::EdgarConfig;
    use crate::extractors::section::BoundarySpec;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const FILING_HTML: &str = "<body><p>Item 1A. Risk Factors</p><table>TOC</table><p>Item 1A. Risk Factors</p>\
                               <p>Market risk is high.</p><p>Item 1B. Staff Comments</p></body>";

    /// Serves `ok.htm` with a filing, `missing.htm` as 404 and anything else as 503.
    async fn serve_archive() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&request);
                    let path = request.split_whitespace().nth(1).unwrap_or("");
                    let (status, body) = if path.ends_with("/ok.htm") {
                        ("200 OK", FILING_HTML)
                    } else if path.ends_with("/missing.htm") {
                        ("404 Not Found", "")
                    } else {
                        ("503 Service Unavailable", "")
                    };
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    fn filing(accession: &str, document: &str) -> FilingRecord {
        FilingRecord {
            form: FormType::Annual,
            accession: accession.to_string(),
            primary_document: document.to_string(),
            filing_date: NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
        }
    }

    fn record() -> FilingRecord {
        FilingRecord {
            form: FormType::Annual,
            accession: "000173016824000139".to_string(),
            primary_document: "avgo-20241103.htm".to_string(),
            filing_date: NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
        }
    }

    #[test]
    fn extracted_report_serializes_sections_and_anchors() {
        let mapper = SectionMapper::new(BoundarySpec::DEFAULT_START_INDEX).unwrap();
        let doc = NormalizedDocument::from_text(
            "Item 1A. Risk Factors TOC Item 1A. Risk Factors Market risk is high. Item 1B. Staff Comments",
        );
        let result = mapper.extract_sections(&doc, FormType::Annual, &[SectionId::RiskFactors, SectionId::Mdna]);
        let report = FilingReport::extracted("AVGO", "Broadcom Inc.", &record(), "https://x/doc.htm".into(), &result);
        assert_eq!(report.found_count(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ticker"], "AVGO");
        assert_eq!(json["form"], "10-K");
        assert_eq!(json["filing_date"], "2024-12-20");
        assert_eq!(json["sections"]["Item 1A"], "Market risk is high.");
        assert_eq!(json["sections"]["Item 7"], "Not found");
        assert_eq!(json["anchors"]["Item 1A"]["mode"], "positional");
        assert_eq!(json["anchors"]["Item 1A"]["ordinal"], 1);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failed_report_carries_error_marker() {
        let report = FilingReport::failed("AVGO", "Broadcom Inc.", &record(), "https://x/doc.htm".into(), "HTTP error: 500".into());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["error"], "HTTP error: 500");
        assert!(json["sections"].as_object().unwrap().is_empty());
        assert!(json.get("anchors").is_none());
        assert_eq!(report.found_count(), 0);
    }

    #[tokio::test]
    async fn failed_filings_do_not_stop_siblings_and_order_is_kept() {
        let mut config = EdgarConfig::new("Jane Doe jane@example.com");
        config.archives_base = serve_archive().await;
        config.request_delay = Duration::ZERO;
        config.retry = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
        };
        let options = RunOptions {
            forms: vec![FormType::Annual],
            count: 3,
            sections: vec![SectionId::RiskFactors],
            concurrency: 3,
        };
        let mapper = SectionMapper::new(BoundarySpec::DEFAULT_START_INDEX).unwrap();
        let debug_dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(debug_dir.path()).unwrap();
        let pipeline = Pipeline::new(EdgarClient::new(config).unwrap(), mapper, options, Some(storage));

        let records = vec![
            filing("000000000124000003", "flaky.htm"),
            filing("000000000124000002", "ok.htm"),
            filing("000000000124000001", "missing.htm"),
        ];
        let reports = pipeline.process_filings("TST", "TestCo", Cik::new(1234), records).await;

        let accessions: Vec<_> = reports.iter().map(|r| r.accession.as_str()).collect();
        assert_eq!(accessions, vec!["000000000124000003", "000000000124000002", "000000000124000001"]);

        let flaky = reports[0].error.as_deref().unwrap();
        assert!(flaky.contains("2 attempts"), "{}", flaky);
        assert!(reports[0].sections.is_empty());

        assert!(reports[1].error.is_none());
        assert_eq!(reports[1].sections["Item 1A"], "Market risk is high.");
        assert!(reports[1].document_url.ends_with("/1234/000000000124000002/ok.htm"));

        let missing = reports[2].error.as_deref().unwrap();
        assert!(missing.contains("missing.htm"), "{}", missing);

        // Debug artifacts only exist for the filing that was downloaded
        let debug_root = debug_dir.path().join("TST").join("debug");
        assert!(debug_root.join("2024-12-20_10-K_000000000124000002").join("boundaries.html").is_file());
        assert_eq!(std::fs::read_dir(&debug_root).unwrap().count(), 1);
    }
}
