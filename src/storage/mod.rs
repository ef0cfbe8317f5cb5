// src/storage/mod.rs
use crate::edgar::models::FilingRecord;
use crate::extractors::normalize::NormalizedDocument;
use crate::pipeline::FilingReport;
use crate::utils::error::StorageError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    /// Default sink name for one ticker's results.
    pub fn default_file_name(ticker: &str) -> String {
        format!("{}_sections.json", ticker.to_uppercase())
    }

    /// Writes the reports as a pretty-printed JSON array, one object per filing.
    pub fn save_reports(&self, file_name: &str, reports: &[FilingReport]) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(file_name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(reports)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, json)?;

        tracing::info!("Saved {} filing records to {}", reports.len(), file_path.display());
        Ok(file_path)
    }

    /// Saves a summary of one ticker's run in JSON format
    pub fn save_run_metadata(&self, ticker: &str, company: &str, reports: &[FilingReport]) -> Result<PathBuf, StorageError> {
        let mut found: BTreeMap<&str, usize> = BTreeMap::new();
        for report in reports {
            for label in report.anchors.keys() {
                *found.entry(*label).or_insert(0) += 1;
            }
        }
        let failures: Vec<_> = reports
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| serde_json::json!({ "accession": r.accession, "error": e })))
            .collect();

        let metadata = serde_json::json!({
            "ticker": ticker.to_uppercase(),
            "company_name": company,
            "filings": reports.len(),
            "sections_found": found,
            "fetch_failures": failures,
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let file_path = self.base_dir.join(format!("{}_run.json", ticker.to_uppercase()));
        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, metadata_str)?;

        tracing::info!("Saved run metadata to {}", file_path.display());
        Ok(file_path)
    }

    /// Writes the raw document, its normalized text and the boundary view for one filing.
    /// Layout: /base_dir/TICKER/debug/<date>_<form>_<accession>/
    pub fn save_debug_artifacts(
        &self,
        ticker: &str,
        record: &FilingRecord,
        raw: &str,
        doc: &NormalizedDocument,
        boundary_view: &str,
    ) -> Result<PathBuf, StorageError> {
        let target_dir = self
            .base_dir
            .join(ticker.to_uppercase())
            .join("debug")
            .join(format!("{}_{}_{}", record.filing_date, record.form, record.accession));
        fs::create_dir_all(&target_dir)?;

        fs::write(target_dir.join("raw_filing.html"), raw)?;
        fs::write(target_dir.join("normalized.txt"), doc.text())?;
        fs::write(target_dir.join("boundaries.html"), boundary_view)?;

        Ok(target_dir)
    }
}
