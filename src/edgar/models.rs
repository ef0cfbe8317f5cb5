// src/edgar/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Central Index Key of a filer.
/// Displays as the 10-digit zero-padded form used by the submissions API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cik(u64);

impl Cik {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Numeric value without padding, as used in archive paths.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cik {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010}", self.0)
    }
}

/// One entry of the registry snapshot
/// Example: https://www.sec.gov/files/company_tickers.json
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryEntry {
    pub cik_str: u64,
    pub ticker: String,
    #[serde(default)]
    pub title: String,
}

/// Ticker to CIK lookup built from the registry snapshot.
#[derive(Debug, Clone, Default)]
pub struct TickerRegistry {
    by_ticker: HashMap<String, RegistryEntry>,
}

impl TickerRegistry {
    /// Builds the registry from the raw snapshot body. Keys of the outer object
    /// are internal row numbers and carry no meaning.
    pub fn from_snapshot(body: &str) -> Result<Self, serde_json::Error> {
        let rows: HashMap<String, RegistryEntry> = serde_json::from_str(body)?;
        Ok(Self::from_entries(rows.into_values()))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = RegistryEntry>) -> Self {
        let by_ticker = entries
            .into_iter()
            .map(|entry| (entry.ticker.trim().to_uppercase(), entry))
            .collect();
        Self { by_ticker }
    }

    /// Exact, case-insensitive ticker lookup. `None` means the ticker is not registered.
    pub fn resolve(&self, ticker: &str) -> Option<Cik> {
        self.entry(ticker).map(|entry| Cik::new(entry.cik_str))
    }

    pub fn entry(&self, ticker: &str) -> Option<&RegistryEntry> {
        self.by_ticker.get(&ticker.trim().to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.by_ticker.len()
    }
}

/// Structure representing the EDGAR company submission index
/// Example: https://data.sec.gov/submissions/CIK0000320193.json
#[derive(Debug, Deserialize)]
pub struct CompanySubmission {
    #[serde(default)]
    pub name: String,
    pub filings: Filings,
}

#[derive(Debug, Deserialize)]
pub struct Filings {
    pub recent: FilingsList,
}

/// Filing history as parallel arrays aligned by index.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingsList {
    #[serde(default)]
    pub accession_number: Vec<String>,
    #[serde(default)]
    pub filing_date: Vec<String>,
    #[serde(default)]
    pub form: Vec<String>,
    #[serde(default)]
    pub primary_document: Vec<String>,
}

/// Periodic report types this tool understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormType {
    #[serde(rename = "10-K")]
    Annual,
    #[serde(rename = "10-Q")]
    Quarterly,
}

impl FormType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::Annual => "10-K",
            FormType::Quarterly => "10-Q",
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "10-K" | "10K" | "ANNUAL" => Ok(FormType::Annual),
            "10-Q" | "10Q" | "QUARTERLY" => Ok(FormType::Quarterly),
            other => Err(format!("unsupported form type: {}", other)),
        }
    }
}

/// A specific filing we want to process. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilingRecord {
    pub form: FormType,
    /// Accession number with the dashes removed.
    pub accession: String,
    pub primary_document: String,
    pub filing_date: NaiveDate,
}

impl FilingRecord {
    /// Constructs the URL to access the primary document of this filing
    pub fn primary_doc_url(&self, archives_base: &str, cik: Cik) -> String {
        format!(
            "{}/{}/{}/{}",
            archives_base.trim_end_matches('/'),
            cik.value(),
            self.accession,
            self.primary_document
        )
    }
}
