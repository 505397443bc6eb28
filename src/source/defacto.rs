//! DE FACTO XWiki page export.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::{
    BatchBuilder, ParsedBatch, RecordFault, SourceAdapter, SourceKind, SourceResult, first_string,
    json_array,
};
use crate::model::{Claim, ClaimReview, Organization};

/// XWiki markup rewrites, applied in order.
static XWIKI_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\[\[([^>\]]+)>>[^\]]*\]\]", "$1"),
        (r"\{\{[^}]*\}\}", ""),
        (r"\(%[^)]*%\)", ""),
        (r"//([^/]+)//", "$1"),
        (r"\*\*([^*]+)\*\*", "$1"),
    ]
    .into_iter()
    .map(|(p, r)| (Regex::new(p).expect("static regex must compile"), r))
    .collect()
});

/// Plain text from XWiki markup: links keep their label, images and
/// inline styles are dropped, emphasis markers removed.
pub fn clean_xwiki(content: &str) -> String {
    let mut text = content.to_string();
    for (re, replacement) in XWIKI_RULES.iter() {
        text = re.replace_all(&text, *replacement).into_owned();
    }
    crate::normalize::collapse_whitespace(&text)
}

/// Media name from a page id like
/// `xwiki:Medias.20-Minutes.Fact-checks.Something.WebHome`.
fn organization_from_page_id(id: &str) -> Option<&str> {
    let mut parts = id.split('.');
    if parts.next()? != "xwiki:Medias" {
        return None;
    }
    let org = parts.next()?;
    parts.next()?;
    Some(org)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    raw_title: Option<String>,
    #[serde(default)]
    absolute_url: Option<String>,
    #[serde(default)]
    created: Value,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, rename = "org_title")]
    org_title: Option<String>,
    #[serde(default, rename = "org_rawTitle")]
    org_raw_title: Option<String>,
}

pub struct DefactoAdapter;

impl DefactoAdapter {
    fn map(page: Value) -> Result<ClaimReview, RecordFault> {
        let page: Page = serde_json::from_value(page)?;
        let text = page
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(page.raw_title.as_deref())
            .unwrap_or_default();
        let url = page.absolute_url.as_deref().unwrap_or_default();

        let mut claim = Claim::new(text)?;
        claim.add_appearance(url);
        let mut review = ClaimReview::new(claim, url)?;

        if let Some(content) = page.content.as_deref() {
            let cleaned = clean_xwiki(content);
            if !cleaned.is_empty() {
                review.review_body = Some(cleaned);
            }
        }
        if let Some(org_id) = page.id.as_deref().and_then(organization_from_page_id) {
            let name = page
                .org_title
                .as_deref()
                .or(page.org_raw_title.as_deref())
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(org_id);
            review = review.with_author(Organization::new(name)?);
        }
        if let Some(date) = first_string(&page.created) {
            review = review.with_date(&date)?;
        }
        if let Some(lang) = page.language.as_deref() {
            review = review.with_language(lang);
        }
        Ok(review)
    }
}

impl SourceAdapter for DefactoAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Defacto
    }

    fn parse(&self, source_name: &str, raw: &[u8]) -> SourceResult<ParsedBatch> {
        let pages = json_array(source_name, self.kind(), raw)?;
        let mut batch = BatchBuilder::new(source_name);
        for (index, page) in pages.into_iter().enumerate() {
            batch.push(index, Self::map(page));
        }
        Ok(batch.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xwiki_markup_is_stripped() {
        let raw = "See [[the report>>https://x.org]] {{image reference=\"a.png\"/}} \
                   (% style=\"color:red\" %)**bold** and //italic//  text";
        assert_eq!(clean_xwiki(raw), "See the report bold and italic text");
    }

    #[test]
    fn organization_comes_from_page_id() {
        assert_eq!(
            organization_from_page_id("xwiki:Medias.20-Minutes.Fact-checks.X.WebHome"),
            Some("20-Minutes")
        );
        assert_eq!(organization_from_page_id("xwiki:Other.A.B"), None);
        assert_eq!(organization_from_page_id("xwiki:Medias.AFP"), None);
    }

    #[test]
    fn maps_pages() {
        let doc = r#"[{
            "id": "xwiki:Medias.AFP-Factuel.Fact-checks.Glaciers.WebHome",
            "title": "Les glaciers ne fondent pas",
            "absoluteUrl": "https://defacto-observatoire.fr/Medias/AFP-Factuel/Fact-checks/Glaciers/",
            "created": 1650000000000,
            "language": "fr",
            "content": "**Faux**: les glaciers reculent.",
            "org_title": "AFP Factuel"
        }, {
            "id": "xwiki:Medias.X.Y.WebHome",
            "title": "",
            "absoluteUrl": "https://defacto-observatoire.fr/p"
        }]"#;
        let batch = DefactoAdapter.parse("defacto", doc.as_bytes()).unwrap();
        assert_eq!(batch.reviews.len(), 0);
        assert_eq!(batch.rejected.len(), 2);

        let doc = doc.replace("1650000000000", "\"2022-04-15T05:20:00+00:00\"");
        let batch = DefactoAdapter.parse("defacto", doc.as_bytes()).unwrap();
        assert_eq!(batch.reviews.len(), 1);
        let r = &batch.reviews[0];
        assert_eq!(r.claim.text(), "Les glaciers ne fondent pas");
        assert_eq!(r.author.as_ref().unwrap().name(), "AFP Factuel");
        assert_eq!(r.date_published(), Some("2022-04-15"));
        assert_eq!(r.review_body.as_deref(), Some("Faux: les glaciers reculent."));
        assert_eq!(r.language.as_deref(), Some("fr"));
    }
}
