// src/extractors/forms.rs
use crate::edgar::models::FormType;
use crate::extractors::normalize::NormalizedDocument;
use crate::extractors::section::{locate, BoundarySpec, SectionOutcome};
use crate::utils::error::ExtractError;
use std::fmt;
use std::str::FromStr;

/// Narrative sections this tool knows how to delimit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionId {
    Business,
    RiskFactors,
    Mdna,
}

impl SectionId {
    pub const ALL: [SectionId; 3] = [SectionId::Business, SectionId::RiskFactors, SectionId::Mdna];

    /// Label used as the key in results, e.g. "Item 1A".
    pub fn label(&self) -> &'static str {
        match self {
            SectionId::Business => "Item 1",
            SectionId::RiskFactors => "Item 1A",
            SectionId::Mdna => "Item 7",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SectionId::Business => "Business",
            SectionId::RiskFactors => "Risk Factors",
            SectionId::Mdna => "Management's Discussion and Analysis of Financial Condition and Results of Operations",
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SectionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "item1" | "business" => Ok(SectionId::Business),
            "item1a" | "riskfactors" => Ok(SectionId::RiskFactors),
            "item7" | "mda" | "mdna" => Ok(SectionId::Mdna),
            _ => Err(format!("unknown section '{}' (expected item1, item1a or item7)", s)),
        }
    }
}

// Heading patterns per form. Quarterly reports have no Item 1B, so Risk
// Factors runs until Item 2 there.
const ANNUAL_SECTIONS: &[(SectionId, &str, &str)] = &[
    (SectionId::Business, r"Item\s+1\.*\s+Business", r"Item\s+1A\.*\s+Risk\s+Factors"),
    (SectionId::RiskFactors, r"Item\s+1A\.*\s+Risk\s+Factors", r"Item\s+1B\.*"),
    (
        SectionId::Mdna,
        r"Item\s+7\.*\s+Management[’'`]?s\s+Discussion.*?Operations",
        r"Item\s+7A\.*",
    ),
];

const QUARTERLY_SECTIONS: &[(SectionId, &str, &str)] = &[
    (SectionId::RiskFactors, r"Item\s+1A\.*\s+Risk\s+Factors", r"Item\s+2\.*"),
];

/// One section of a form layout with its compiled boundary.
#[derive(Debug, Clone)]
pub struct SectionBoundary {
    pub id: SectionId,
    pub spec: BoundarySpec,
}

/// Ordered section boundaries for one filing type.
#[derive(Debug, Clone)]
pub struct FormLayout {
    pub form: FormType,
    pub sections: Vec<SectionBoundary>,
}

impl FormLayout {
    fn compile(form: FormType, start_index: usize) -> Result<Self, ExtractError> {
        let table = match form {
            FormType::Annual => ANNUAL_SECTIONS,
            FormType::Quarterly => QUARTERLY_SECTIONS,
        };
        let sections = table
            .iter()
            .map(|(id, start, end)| {
                Ok(SectionBoundary {
                    id: *id,
                    spec: BoundarySpec::new(start, end)?.with_start_index(start_index),
                })
            })
            .collect::<Result<Vec<_>, ExtractError>>()?;
        Ok(Self { form, sections })
    }

    pub fn boundary(&self, id: SectionId) -> Option<&SectionBoundary> {
        self.sections.iter().find(|section| section.id == id)
    }
}

/// A located (or missing) section, keyed by its human-readable label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSection {
    pub id: SectionId,
    pub label: &'static str,
    pub title: &'static str,
    pub outcome: SectionOutcome,
}

/// Sections extracted from one document, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub form: FormType,
    pub sections: Vec<ExtractedSection>,
}

impl ExtractionResult {
    pub fn get(&self, id: SectionId) -> Option<&SectionOutcome> {
        self.sections
            .iter()
            .find(|section| section.id == id)
            .map(|section| &section.outcome)
    }

    pub fn found_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|section| section.outcome.text().is_some())
            .count()
    }
}

/// Holds the compiled layout of every filing type and runs extractions against them.
#[derive(Debug, Clone)]
pub struct SectionMapper {
    annual: FormLayout,
    quarterly: FormLayout,
}

impl SectionMapper {
    /// Compiles all layouts. `start_index` is the positional fallback ordinal.
    pub fn new(start_index: usize) -> Result<Self, ExtractError> {
        Ok(Self {
            annual: FormLayout::compile(FormType::Annual, start_index)?,
            quarterly: FormLayout::compile(FormType::Quarterly, start_index)?,
        })
    }

    pub fn layout(&self, form: FormType) -> &FormLayout {
        match form {
            FormType::Annual => &self.annual,
            FormType::Quarterly => &self.quarterly,
        }
    }

    /// Extracts each wanted section. Sections the form does not define are reported as not found.
    pub fn extract_sections(
        &self,
        doc: &NormalizedDocument,
        form: FormType,
        wanted: &[SectionId],
    ) -> ExtractionResult {
        let layout = self.layout(form);
        let sections = wanted
            .iter()
            .map(|id| {
                let outcome = match layout.boundary(*id) {
                    Some(boundary) => SectionOutcome::from(locate(doc, &boundary.spec)),
                    None => {
                        tracing::debug!("{} does not define {}", form, id);
                        SectionOutcome::NotFound
                    }
                };
                match &outcome {
                    SectionOutcome::Found { text, anchor } => {
                        tracing::debug!("{} {}: {} bytes via {:?}", form, id, text.len(), anchor)
                    }
                    SectionOutcome::NotFound => tracing::debug!("{} {}: not found", form, id),
                }
                ExtractedSection {
                    id: *id,
                    label: id.label(),
                    title: id.title(),
                    outcome,
                }
            })
            .collect();

        ExtractionResult { form, sections }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::normalize::normalize;
    use crate::extractors::section::{extract, Anchor, NOT_FOUND};

    fn mapper() -> SectionMapper {
        SectionMapper::new(BoundarySpec::DEFAULT_START_INDEX).unwrap()
    }

    const ANNUAL_TEXT: &str = "Table of Contents Item 1. Business 4 Item 1A. Risk Factors 10 Item 1B. Unresolved 20 \
        Item 7. Management's Discussion and Analysis of Financial Condition and Results of Operations 40 Item 7A. Market 55 \
        Item 1. Business We make semiconductors. Item 1A. Risk Factors Customers are concentrated. \
        Item 1B. Unresolved Staff Comments None. \
        Item 7. Management’s Discussion and Analysis of Financial Condition and Results of Operations Revenue grew. \
        Item 7A. Quantitative and Qualitative Disclosures";

    #[test]
    fn annual_layout_extracts_all_sections() {
        let doc = NormalizedDocument::from_text(ANNUAL_TEXT);
        let result = mapper().extract_sections(&doc, FormType::Annual, &SectionId::ALL);

        assert_eq!(result.get(SectionId::Business).and_then(|o| o.text()), Some("We make semiconductors."));
        assert_eq!(result.get(SectionId::RiskFactors).and_then(|o| o.text()), Some("Customers are concentrated."));
        assert_eq!(result.get(SectionId::Mdna).and_then(|o| o.text()), Some("Revenue grew."));
        assert_eq!(result.found_count(), 3);

        let labels: Vec<_> = result.sections.iter().map(|s| s.label).collect();
        assert_eq!(labels, vec!["Item 1", "Item 1A", "Item 7"]);
    }

    #[test]
    fn quarterly_risk_factors_end_at_item_2() {
        let text = "Part II Item 1A. Risk Factors 30 Item 2. Unregistered Sales 31 \
                    Part II Item 1. Legal Proceedings None. Item 1A. Risk Factors Rates may rise. \
                    Item 2. Unregistered Sales of Equity Securities";
        assert!(!text.contains("1B"));
        let doc = NormalizedDocument::from_text(text);
        let result = mapper().extract_sections(&doc, FormType::Quarterly, &[SectionId::RiskFactors]);
        assert_eq!(result.get(SectionId::RiskFactors).and_then(|o| o.text()), Some("Rates may rise."));

        // The annual boundary has no Item 1B to stop at
        let annual = mapper().extract_sections(&doc, FormType::Annual, &[SectionId::RiskFactors]);
        assert_eq!(annual.get(SectionId::RiskFactors), Some(&SectionOutcome::NotFound));
    }

    #[test]
    fn sections_missing_from_form_are_not_found() {
        let doc = NormalizedDocument::from_text(ANNUAL_TEXT);
        let result = mapper().extract_sections(&doc, FormType::Quarterly, &[SectionId::Business, SectionId::Mdna]);
        assert_eq!(result.found_count(), 0);
        assert!(result.sections.iter().all(|s| s.outcome.text_or_sentinel() == NOT_FOUND));
    }

    #[test]
    fn end_to_end_markup_to_risk_factors() {
        let raw = "<body><p>Item 1A. Risk Factors</p><table>TOC</table><p>Item 1A. Risk Factors</p>\
                   <p>Market risk is high.</p><p>Item 1B. Staff Comments</p></body>";
        let doc = normalize(raw);
        let mapper = mapper();
        let result = mapper.extract_sections(&doc, FormType::Annual, &[SectionId::RiskFactors]);
        match result.get(SectionId::RiskFactors) {
            Some(SectionOutcome::Found { text, anchor }) => {
                assert_eq!(text, "Market risk is high.");
                assert_eq!(*anchor, Anchor::Positional { ordinal: 1 });
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let spec = &mapper.layout(FormType::Annual).boundary(SectionId::RiskFactors).unwrap().spec;
        assert_eq!(extract(doc.text(), spec), Some("Market risk is high."));
    }

    #[test]
    fn custom_start_index_flows_into_layouts() {
        let mapper = SectionMapper::new(0).unwrap();
        let doc = NormalizedDocument::from_text("Item 1A. Risk Factors Only heading. Item 1B. Next");
        let result = mapper.extract_sections(&doc, FormType::Annual, &[SectionId::RiskFactors]);
        assert_eq!(result.get(SectionId::RiskFactors).and_then(|o| o.text()), Some("Only heading."));
    }

    #[test]
    fn section_ids_parse_from_cli_spellings() {
        assert_eq!("item1a".parse::<SectionId>(), Ok(SectionId::RiskFactors));
        assert_eq!("Item 7".parse::<SectionId>(), Ok(SectionId::Mdna));
        assert_eq!("business".parse::<SectionId>(), Ok(SectionId::Business));
        assert!("item9".parse::<SectionId>().is_err());
    }
}
