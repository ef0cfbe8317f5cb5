// src/edgar/index.rs
use crate::edgar::models::{FilingRecord, FilingsList, FormType};
use chrono::NaiveDate;

/// Picks the first `count` filings whose form is in `forms`.
///
/// The history arrives as parallel arrays; entries are paired strictly by
/// position and the feed order (newest first) is preserved.
pub fn select_filings(recent: &FilingsList, forms: &[FormType], count: usize) -> Vec<FilingRecord> {
    let lengths = [
        recent.form.len(),
        recent.accession_number.len(),
        recent.primary_document.len(),
        recent.filing_date.len(),
    ];
    if lengths.iter().any(|len| *len != lengths[0]) {
        tracing::warn!(
            "Filing history arrays have mismatched lengths {:?}; using the shortest",
            lengths
        );
    }

    let rows = recent
        .form
        .iter()
        .zip(&recent.accession_number)
        .zip(&recent.primary_document)
        .zip(&recent.filing_date);

    let mut selected = Vec::new();
    for (((form, accession), primary_doc), filing_date) in rows {
        if selected.len() == count {
            break;
        }

        // Amendments and other forms are simply not of interest
        let Ok(form) = form.parse::<FormType>() else {
            continue;
        };
        if !forms.contains(&form) {
            continue;
        }

        let filing_date = match NaiveDate::parse_from_str(filing_date, "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                tracing::debug!("Skipping {} with unparseable date '{}': {}", accession, filing_date, e);
                continue;
            }
        };

        selected.push(FilingRecord {
            form,
            accession: accession.replace('-', ""),
            primary_document: primary_doc.clone(),
            filing_date,
        });
    }

    selected
}
