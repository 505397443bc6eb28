//! CLIMATE-FEVER dataset (JSON lines).
//!
//! Dataset claims have no review page, so each review is identified by a
//! `urn:climate-fever:review:<claim_id>` URN and attributed to the dataset
//! itself.

use serde::Deserialize;
use serde_json::Value;

use super::{
    BatchBuilder, ParsedBatch, RecordFault, SourceAdapter, SourceError, SourceKind, SourceResult,
    first_string,
};
use crate::model::{Claim, ClaimReview, Organization, Rating};

const REVIEW_URN_PREFIX: &str = "urn:climate-fever:review:";
const DATASET_NAME: &str = "CLIMATE-FEVER Dataset";
const DATASET_WEBSITE: &str = "https://www.sustainablefinance.uzh.ch/en/research/climate-fever.html";

#[derive(Debug, Deserialize)]
struct Item {
    claim_id: Value,
    claim: String,
    #[serde(default)]
    claim_label: Option<String>,
    evidences: Vec<Evidence>,
}

#[derive(Debug, Deserialize)]
struct Evidence {
    article: String,
    evidence: String,
    #[serde(default)]
    evidence_label: Option<String>,
}

fn label_display(label: &str) -> Option<&'static str> {
    match label {
        "SUPPORTS" => Some("Supports"),
        "REFUTES" => Some("Refutes"),
        "NOT_ENOUGH_INFO" => Some("Not Enough Info"),
        _ => None,
    }
}

fn review_text(evidences: &[Evidence]) -> String {
    evidences
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.evidence.trim().is_empty())
        .map(|(i, e)| {
            let mut prefix = format!("Evidence {}", i + 1);
            if let Some(label) = e.evidence_label.as_deref().filter(|l| !l.is_empty()) {
                prefix.push_str(&format!(" [{label}]"));
            }
            if !e.article.trim().is_empty() {
                prefix.push_str(&format!(" ({})", e.article.trim()));
            }
            format!("{prefix}: {}", e.evidence.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ClimateFeverAdapter;

impl ClimateFeverAdapter {
    fn map(line: &str) -> Result<ClaimReview, RecordFault> {
        let item: Item = serde_json::from_str(line)?;
        let claim_id = first_string(&item.claim_id)
            .ok_or_else(|| RecordFault::Shape("missing claim_id".into()))?;
        if item.evidences.is_empty() {
            return Err(RecordFault::Shape("no evidences".into()));
        }

        let mut claim = Claim::new(&item.claim)?;
        for e in &item.evidences {
            let article = e.article.trim();
            if !article.is_empty() {
                claim.add_appearance(&format!(
                    "https://en.wikipedia.org/wiki/{}",
                    article.replace(' ', "_")
                ));
            }
        }

        let organization = Organization::new(DATASET_NAME)?.with_website(DATASET_WEBSITE);
        let mut review = ClaimReview::new(claim, &format!("{REVIEW_URN_PREFIX}{claim_id}"))?
            .with_author(organization)
            .with_language("en");

        if let Some(label) = item.claim_label.as_deref().filter(|l| !l.is_empty()) {
            let display = label_display(label).unwrap_or(label);
            review = review.with_rating(Rating::new(Some(display), Some(label))?);
        }
        let text = review_text(&item.evidences);
        if !text.is_empty() {
            review.review_body = Some(text);
        }
        Ok(review)
    }
}

impl SourceAdapter for ClimateFeverAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::ClimateFever
    }

    fn parse(&self, source_name: &str, raw: &[u8]) -> SourceResult<ParsedBatch> {
        let text = std::str::from_utf8(raw).map_err(|e| SourceError::MalformedDocument {
            source_name: source_name.to_string(),
            kind: self.kind().to_string(),
            message: e.to_string(),
        })?;
        let mut batch = BatchBuilder::new(source_name);
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            batch.push(index, Self::map(line));
        }
        Ok(batch.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = concat!(
        r#"{"claim_id": 0, "claim": "Global warming is driving polar bears toward extinction", "claim_label": "SUPPORTS", "evidences": [{"article": "Polar bear", "evidence": "Bears are listed as vulnerable.", "evidence_label": "SUPPORTS"}]}"#,
        "\n\n",
        r#"{"claim_id": 1, "claim": "No evidences", "evidences": []}"#,
        "\n",
        "{not json\n",
    );

    #[test]
    fn parses_lines_with_line_indices() {
        let batch = ClimateFeverAdapter.parse("climate-fever", DOC.as_bytes()).unwrap();
        assert_eq!(batch.reviews.len(), 1);
        let indices: Vec<_> = batch.rejected.iter().filter_map(|e| e.record_index()).collect();
        assert_eq!(indices, vec![2, 3]);

        let r = &batch.reviews[0];
        assert_eq!(r.review_url(), "urn:climate-fever:review:0");
        assert_eq!(r.claim.appearances, vec!["https://en.wikipedia.org/wiki/Polar_bear".to_string()]);
        assert_eq!(
            r.review_body.as_deref(),
            Some("Evidence 1 [SUPPORTS] (Polar bear): Bears are listed as vulnerable.")
        );
        let rating = r.rating.as_ref().unwrap();
        assert_eq!(rating.original_label(), Some("SUPPORTS"));
        assert_eq!(rating.normalized_label(), None);
        assert_eq!(r.author.as_ref().unwrap().name(), DATASET_NAME);
    }

    #[test]
    fn invalid_utf8_is_a_document_error() {
        assert!(matches!(
            ClimateFeverAdapter.parse("cf", &[0xff, 0xfe]),
            Err(SourceError::MalformedDocument { .. })
        ));
    }
}
