//! EuroClimateCheck article export (JSON array).
//!
//! Each item is a fact-check article: `title` or `description` carries the
//! claim, `category` the verdict, `source` the publishing organization.

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use serde_json::Value;

use super::{
    BatchBuilder, ParsedBatch, RecordFault, SourceAdapter, SourceKind, SourceResult, json_array,
    site_root,
};
use crate::model::{Claim, ClaimReview, Organization, Rating};
use crate::normalize::parse_date;

/// Human-written date layouts seen in the export besides ISO 8601.
const EXTRA_DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d.%m.%Y", "%B %d, %Y", "%d %B %Y", "%b %d, %Y"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Item {
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    source: Option<String>,
    category: Option<String>,
    date: Option<String>,
    language: Option<String>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// `YYYY-MM-DD`, or `None` for dates in no known layout.
fn article_date(raw: &str) -> Option<String> {
    let rfc2822 = || {
        DateTime::parse_from_rfc2822(raw.trim())
            .ok()
            .map(|ts| ts.date_naive().format("%Y-%m-%d").to_string())
    };
    parse_date(raw).or_else(rfc2822).or_else(|| {
        EXTRA_DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw.trim(), fmt).ok())
            .map(|d| d.format("%Y-%m-%d").to_string())
    })
}

pub struct EuroClimateCheckAdapter;

impl EuroClimateCheckAdapter {
    fn map(value: Value) -> Result<ClaimReview, RecordFault> {
        if value.as_object().is_none_or(|o| o.is_empty()) {
            return Err(RecordFault::Shape("empty item".into()));
        }
        let item: Item = serde_json::from_value(value)?;
        let url = non_empty(&item.url).ok_or_else(|| RecordFault::Shape("missing url".into()))?;
        if non_empty(&item.content).is_none() && non_empty(&item.description).is_none() {
            return Err(RecordFault::Shape("missing content and description".into()));
        }
        let text = non_empty(&item.title)
            .or(non_empty(&item.description))
            .ok_or_else(|| RecordFault::Shape("missing title and description".into()))?;

        let mut claim = Claim::new(text)?;
        claim.add_appearance(url);

        let mut review = ClaimReview::new(claim, url)?;
        if let Some(name) = non_empty(&item.source) {
            let mut org = Organization::new(name)?;
            if let Some(root) = site_root(url) {
                org = org.with_website(&root);
            }
            review = review.with_author(org);
        }
        if let Some(category) = non_empty(&item.category) {
            review = review.with_rating(Rating::new(Some(category), Some(category))?);
        }
        if let Some(raw) = non_empty(&item.date) {
            match article_date(raw) {
                Some(date) => review = review.with_date(&date)?,
                None => tracing::warn!(date = raw, url, "unparseable article date, leaving it out"),
            }
        }
        if let Some(lang) = non_empty(&item.language) {
            review = review.with_language(lang);
        }
        Ok(review)
    }
}

impl SourceAdapter for EuroClimateCheckAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::EuroClimateCheck
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

    const DOC: &str = r#"[
      {
        "title": "Wind turbines kill more birds than anything else",
        "description": "Claim circulating on social media.",
        "content": "Cats and buildings kill far more birds...",
        "url": "https://factual.example.eu/articles/wind-birds?ref=feed",
        "source": "Factual",
        "category": "False",
        "date": "Fri, 03 Mar 2023 10:00:00 GMT",
        "language": "EN"
      },
      {
        "description": "Heat pumps do not work in cold climates",
        "url": "https://factual.example.eu/articles/heat-pumps",
        "category": "Misleading",
        "date": "03/04/2023"
      },
      {
        "title": "Glaciers are growing",
        "content": "Most glaciers are retreating.",
        "url": "https://factual.example.eu/articles/glaciers",
        "date": "last spring"
      },
      {"title": "No url", "content": "x"},
      {"title": "No body", "url": "https://factual.example.eu/a"},
      {}
    ]"#;

    #[test]
    fn maps_articles() {
        let batch = EuroClimateCheckAdapter.parse("ecc", DOC.as_bytes()).unwrap();
        assert_eq!(batch.records(), 6);
        assert_eq!(batch.reviews.len(), 3);
        let rejected: Vec<_> = batch.rejected.iter().filter_map(|e| e.record_index()).collect();
        assert_eq!(rejected, [3, 4, 5]);

        let r = &batch.reviews[0];
        assert_eq!(r.claim.text(), "Wind turbines kill more birds than anything else");
        assert_eq!(r.language.as_deref(), Some("en"));
        assert_eq!(r.rating.as_ref().unwrap().normalized_label(), Some("not_credible"));
        let org = r.author.as_ref().unwrap();
        assert_eq!(org.name(), "Factual");
        assert_eq!(org.website.as_deref(), Some("https://factual.example.eu/"));
        assert_eq!(r.date_published(), Some("2023-03-03"));

        let r = &batch.reviews[1];
        assert_eq!(r.claim.text(), "Heat pumps do not work in cold climates");
        assert_eq!(r.date_published(), Some("2023-04-03"));
        assert!(r.author.is_none());
        assert_eq!(r.rating.as_ref().unwrap().original_label(), Some("Misleading"));

        // An unreadable date drops the date, not the article.
        assert_eq!(batch.reviews[2].date_published(), None);
        assert!(batch.reviews[2].rating.is_none());
    }

    #[test]
    fn article_dates_accept_common_layouts() {
        assert_eq!(article_date("2023-03-03T10:00:00Z").as_deref(), Some("2023-03-03"));
        assert_eq!(article_date("March 3, 2023").as_deref(), Some("2023-03-03"));
        assert_eq!(article_date("3 March 2023").as_deref(), Some("2023-03-03"));
        assert_eq!(article_date("soon"), None);
    }
}
