//! Deutsche Welle / DBKF fact-check export (GraphQL JSON dump).

use serde::Deserialize;
use serde_json::Value;

use super::{
    BatchBuilder, ParsedBatch, RecordFault, SourceAdapter, SourceKind, SourceResult, first_string,
    json_array, site_root,
};
use crate::model::{Claim, ClaimReview, Organization};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    external_url: Option<String>,
    #[serde(default)]
    headline: Option<String>,
    #[serde(default)]
    review_body: Option<String>,
    #[serde(default)]
    item_reviewed: ItemReviewed,
    #[serde(default)]
    publisher: Publisher,
    #[serde(default)]
    date_created: Option<String>,
    #[serde(default)]
    language: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ItemReviewed {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Publisher {
    name: Option<String>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub struct DbkfAdapter;

impl DbkfAdapter {
    fn map(item: Value) -> Result<ClaimReview, RecordFault> {
        let item: Item = serde_json::from_value(item)?;
        if first_string(&item.id).is_none() {
            return Err(RecordFault::Shape("missing id".into()));
        }
        let url = non_empty(&item.external_url)
            .ok_or_else(|| RecordFault::Shape("missing externalUrl".into()))?;
        let headline = non_empty(&item.headline);
        let body = non_empty(&item.review_body);
        if headline.is_none() && body.is_none() {
            return Err(RecordFault::Shape("missing headline and reviewBody".into()));
        }
        let text = non_empty(&item.item_reviewed.text)
            .ok_or_else(|| RecordFault::Shape("itemReviewed missing text".into()))?;

        let mut claim = Claim::new(text)?;
        claim.add_appearance(url);

        let mut review = ClaimReview::new(claim, url)?;
        review.description = headline.map(String::from);
        if let Some(body) = body {
            review = review.with_review_body(body);
        }
        if let Some(name) = non_empty(&item.publisher.name) {
            let mut org = Organization::new(name)?;
            if let Some(root) = site_root(url) {
                org = org.with_website(&root);
            }
            review = review.with_author(org);
        }
        if let Some(date) = non_empty(&item.date_created) {
            review = review.with_date(date)?;
        }
        if let Some(lang) = first_string(&item.language) {
            review = review.with_language(&lang);
        }
        Ok(review)
    }
}

impl SourceAdapter for DbkfAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Dbkf
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
