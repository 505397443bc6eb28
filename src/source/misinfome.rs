//! MisInfoMe JSON export.

use serde::Deserialize;
use serde_json::Value;

use super::{
    BatchBuilder, ParsedBatch, RecordFault, SourceAdapter, SourceKind, SourceResult, first_string,
    json_array,
};
use crate::model::{Claim, ClaimReview, Organization, Rating};

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    claim_text: Value,
    #[serde(default)]
    appearances: Vec<String>,
    #[serde(default)]
    fact_checker: FactChecker,
    #[serde(default)]
    reviews: Vec<Review>,
    #[serde(default)]
    review_url: Option<String>,
    #[serde(default)]
    date_published: Value,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FactChecker {
    name: Option<String>,
    website: Option<String>,
    language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Review {
    label: Option<String>,
    original_label: Option<String>,
    date_published: Value,
}

pub struct MisinfomeAdapter;

impl MisinfomeAdapter {
    fn map(item: Value) -> Result<ClaimReview, RecordFault> {
        let item: Item = serde_json::from_value(item)?;
        let text = first_string(&item.claim_text)
            .ok_or_else(|| RecordFault::Shape("missing claim_text".into()))?;
        let first_review = item
            .reviews
            .first()
            .ok_or_else(|| RecordFault::Shape("missing reviews".into()))?;
        if first_review.original_label.as_deref().is_none_or(|l| l.trim().is_empty()) {
            return Err(RecordFault::Shape("review is missing original_label".into()));
        }

        let mut claim = Claim::new(&text)?;
        for url in &item.appearances {
            claim.add_appearance(url);
        }

        let rating = Rating::new(
            first_review.label.as_deref(),
            first_review.original_label.as_deref(),
        )?;
        let mut review = ClaimReview::new(claim, item.review_url.as_deref().unwrap_or_default())?
            .with_rating(rating);

        if let Some(name) = item.fact_checker.name.as_deref().filter(|n| !n.trim().is_empty()) {
            let mut org = Organization::new(name)?;
            if let Some(site) = item.fact_checker.website.as_deref() {
                org = org.with_website(site);
            }
            review = review.with_author(org);
        }

        let date = first_string(&item.date_published).or_else(|| first_string(&first_review.date_published));
        if let Some(date) = date {
            review = review.with_date(&date)?;
        }
        if let Some(lang) = item.language.or(item.fact_checker.language) {
            review = review.with_language(&lang);
        }
        Ok(review)
    }
}

impl SourceAdapter for MisinfomeAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Misinfome
    }

    fn parse(&self, source_name: &str, raw: &[u8]) -> SourceResult<ParsedBatch> {
        let items = json_array(source_name, self.kind(), raw)?;
        let mut batch = BatchBuilder::new(source_name);
        for (index, item) in items.into_iter().enumerate() {
            batch.push(index, Self::map(item));
        }
        Ok(batch.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;

    const DOC: &str = r#"[
      {
        "claim_text": ["The Arctic will be ice-free by 2013"],
        "appearances": ["https://example.com/post/1"],
        "fact_checker": {"name": "Climate Feedback", "website": "climatefeedback.org", "language": "en"},
        "reviews": [{"label": "not_credible", "original_label": "Incorrect", "date_published": "2019-06-01"}],
        "review_url": "https://climatefeedback.org/claimreview/arctic/"
      },
      {
        "claim_text": [],
        "reviews": [{"original_label": "False"}],
        "review_url": "https://example.org/x"
      },
      {
        "claim_text": ["No label"],
        "reviews": [{"label": "credible"}],
        "review_url": "https://example.org/y"
      }
    ]"#;

    #[test]
    fn maps_records_and_reports_rejects() {
        let batch = MisinfomeAdapter.parse("misinfome", DOC.as_bytes()).unwrap();
        assert_eq!(batch.reviews.len(), 1);
        assert_eq!(batch.rejected.len(), 2);
        assert_eq!(batch.rejected[0].record_index(), Some(1));
        assert_eq!(batch.rejected[1].record_index(), Some(2));

        let r = &batch.reviews[0];
        assert_eq!(r.claim.text(), "The Arctic will be ice-free by 2013");
        assert_eq!(r.claim.appearances, vec!["https://example.com/post/1".to_string()]);
        assert_eq!(r.date_published(), Some("2019-06-01"));
        assert_eq!(r.language.as_deref(), Some("en"));
        let rating = r.rating.as_ref().unwrap();
        assert_eq!(rating.normalized_label(), Some("not_credible"));
        assert_eq!(rating.original_label(), Some("Incorrect"));
        let org = r.author.as_ref().unwrap();
        assert_eq!(org.name(), "Climate Feedback");
        assert_eq!(org.website.as_deref(), Some("https://climatefeedback.org/"));
    }

    #[test]
    fn non_array_document_is_an_error() {
        let err = MisinfomeAdapter.parse("misinfome", b"{}").unwrap_err();
        assert!(matches!(err, SourceError::MalformedDocument { .. }));
    }
}
