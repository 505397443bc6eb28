//! DeSmog climate disinformation database (schema.org `Claim` nodes in
//! Turtle).
//!
//! DeSmog publishes no verdicts: each claim node carries its own text in
//! `schema:abstract`, the DeSmog page in `schema:url`, and archived
//! sources under `schema:archivedAt`. Reviews are unrated.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::turtle::{Graph, RDFS_LABEL};
use super::{
    BatchBuilder, ParsedBatch, RecordFault, SourceAdapter, SourceError, SourceKind, SourceResult,
};
use crate::model::{Claim, ClaimReview, Organization};
use crate::normalize::decode_entities;

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*['"]([^'"]+)['"]"#).expect("static regex must compile")
});

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[\w\-._~:/?#\[\]@!$&'()*+,;=%]+").expect("static regex must compile")
});

/// URLs cited in an HTML fragment: `href` targets first, then bare URLs,
/// without repeats.
fn cited_urls(html: &str) -> Vec<String> {
    let decoded = decode_entities(html);
    let mut urls: Vec<String> = Vec::new();
    let hrefs = HREF.captures_iter(&decoded).map(|c| c[1].to_string());
    let bare = BARE_URL.find_iter(&decoded).map(|m| m.as_str().to_string());
    for url in hrefs.chain(bare) {
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Protocol-relative URLs become `https:`; anything not HTTP(S) is dropped.
fn web_url(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    let url = match trimmed.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => trimmed.to_string(),
    };
    let lower = url.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://")).then_some(url)
}

fn host_of(iri: &str) -> Option<String> {
    Url::parse(iri)
        .ok()?
        .host_str()
        .map(|h| h.trim_end_matches('/').to_string())
}

pub struct DesmogAdapter;

impl DesmogAdapter {
    fn map(graph: &Graph, claim_iri: &str) -> Result<ClaimReview, RecordFault> {
        let shape = RecordFault::Shape;
        let text = graph
            .first(claim_iri, &["abstract"])
            .map_err(shape)?
            .ok_or_else(|| RecordFault::Shape("claim missing schema:abstract".into()))?
            .value;
        let url = graph
            .first(claim_iri, &["url"])
            .map_err(shape)?
            .ok_or_else(|| RecordFault::Shape("claim missing schema:url".into()))?
            .value;

        let mut claim = Claim::new(&text)?;
        for candidate in Self::appearances(graph, claim_iri)? {
            if let Some(u) = web_url(&candidate) {
                claim.add_appearance(&u);
            }
        }
        claim.add_appearance(&url);

        let mut review = ClaimReview::new(claim, &url)?;
        if let Some(org) = Self::publisher(graph, claim_iri)? {
            review = review.with_author(org);
        }
        if let Some(date) = graph.first_literal(claim_iri, &["datePublished"]).map_err(shape)? {
            review = review.with_date(&date)?;
        }
        if let Some(lang) = graph.first_literal(claim_iri, &["inLanguage"]).map_err(shape)? {
            review = review.with_language(&lang);
        }
        if let Some(body) = graph.first_literal(claim_iri, &["description"]).map_err(shape)? {
            review = review.with_review_body(&body);
        }
        Ok(review)
    }

    /// Citation links and archive URLs of every `schema:archivedAt` node.
    /// An archive node without its own `schema:url` stands for itself.
    fn appearances(graph: &Graph, claim_iri: &str) -> Result<Vec<String>, RecordFault> {
        let mut out = Vec::new();
        for citation in graph
            .values(claim_iri, &["archivedAt", "citation"])
            .map_err(RecordFault::Shape)?
        {
            out.extend(cited_urls(&citation.value));
        }
        out.extend(
            graph
                .values(claim_iri, &["archivedAt", "url"])
                .map_err(RecordFault::Shape)?
                .into_iter()
                .map(|t| t.value),
        );
        for node in graph
            .values(claim_iri, &["archivedAt"])
            .map_err(RecordFault::Shape)?
            .into_iter()
            .filter(|t| t.is_iri)
        {
            let has_url = graph
                .first(&node.value, &["url"])
                .map_err(RecordFault::Shape)?
                .is_some();
            if !has_url {
                out.push(node.value);
            }
        }
        Ok(out)
    }

    fn publisher(graph: &Graph, claim_iri: &str) -> Result<Option<Organization>, RecordFault> {
        let Some(node) = graph.first(claim_iri, &["publisher"]).map_err(RecordFault::Shape)? else {
            return Ok(None);
        };
        let mut name = (!node.is_iri).then(|| node.value.clone());
        for label in ["name", RDFS_LABEL] {
            if name.is_some() {
                break;
            }
            name = graph
                .first_literal(claim_iri, &["publisher", label])
                .map_err(RecordFault::Shape)?;
        }
        if !node.is_iri {
            return Ok(name.map(|n| Organization::new(&n)).transpose()?);
        }
        let Some(name) = name.or_else(|| host_of(&node.value)) else {
            return Ok(None);
        };
        Ok(Some(Organization::new(&name)?.with_website(&node.value)))
    }
}

impl SourceAdapter for DesmogAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Desmog
    }

    fn parse(&self, source_name: &str, raw: &[u8]) -> SourceResult<ParsedBatch> {
        let malformed = |message: String| SourceError::MalformedDocument {
            source_name: source_name.to_string(),
            kind: self.kind().to_string(),
            message,
        };
        let graph = Graph::load(raw).map_err(malformed)?;
        let claims = graph.subjects_of_type("Claim").map_err(malformed)?;

        let mut batch = BatchBuilder::new(source_name);
        for (index, iri) in claims.iter().enumerate() {
            batch.push(index, Self::map(&graph, iri));
        }
        Ok(batch.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
        @prefix schema: <https://schema.org/> .
        @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .

        <https://www.desmog.com/claim/co2-is-plant-food> a schema:Claim ;
            schema:abstract "CO2 is plant food, so more of it is good" ;
            schema:url "https://www.desmog.com/climate-disinformation-database/co2" ;
            schema:datePublished "2021-11-05" ;
            schema:inLanguage "en" ;
            schema:description "Claim made repeatedly by think tanks." ;
            schema:publisher <https://www.desmog.com/> ;
            schema:archivedAt [
                schema:citation "&lt;a href=&quot;https://example.org/speech&quot;&gt;speech&lt;/a&gt; see //ignored and https://example.org/report" ;
                schema:url "//web.archive.org/web/2020/https://example.org/speech"
            ] , <https://archive.ph/abc> .

        <https://www.desmog.com/> rdfs:label "DeSmog" .

        <https://www.desmog.com/claim/no-url> a schema:Claim ;
            schema:abstract "Claim with no page" .
    "#;

    #[test]
    fn reads_claims_with_archived_sources() {
        let batch = DesmogAdapter.parse("desmog", DOC.as_bytes()).unwrap();
        assert_eq!(batch.reviews.len(), 1);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].record_index(), Some(1));

        let r = &batch.reviews[0];
        assert_eq!(r.claim.text(), "CO2 is plant food, so more of it is good");
        assert_eq!(
            r.review_url(),
            "https://www.desmog.com/climate-disinformation-database/co2"
        );
        assert!(r.rating.is_none());
        assert_eq!(r.date_published(), Some("2021-11-05"));
        assert_eq!(r.language.as_deref(), Some("en"));
        assert_eq!(r.review_body.as_deref(), Some("Claim made repeatedly by think tanks."));

        let apps = &r.claim.appearances;
        for expected in [
            "https://example.org/speech",
            "https://example.org/report",
            "https://archive.ph/abc",
            "https://www.desmog.com/climate-disinformation-database/co2",
        ] {
            assert!(apps.iter().any(|a| a == expected), "{expected} not in {apps:?}");
        }
        assert!(apps.iter().any(|a| a.starts_with("https://web.archive.org/web/2020/")));

        let org = r.author.as_ref().unwrap();
        assert_eq!(org.name(), "DeSmog");
        assert_eq!(org.website.as_deref(), Some("https://www.desmog.com/"));
    }

    #[test]
    fn unlabelled_publisher_is_named_after_its_host() {
        let doc = r#"
            @prefix schema: <http://schema.org/> .
            <https://d.example/c/1> a schema:Claim ;
                schema:abstract "Renewables cause blackouts" ;
                schema:url <https://d.example/page/1> ;
                schema:publisher <https://publisher.example/about> .
        "#;
        let batch = DesmogAdapter.parse("desmog", doc.as_bytes()).unwrap();
        let r = &batch.reviews[0];
        assert_eq!(r.review_url(), "https://d.example/page/1");
        assert_eq!(r.author.as_ref().unwrap().name(), "publisher.example");
    }

    #[test]
    fn cited_urls_prefer_hrefs_without_repeats() {
        let urls = cited_urls(r#"<a HREF='https://a.org/x'>a</a> https://a.org/x https://b.org/y"#);
        assert_eq!(urls, ["https://a.org/x", "https://b.org/y"]);
        assert_eq!(web_url("//a.org/p").as_deref(), Some("https://a.org/p"));
        assert_eq!(web_url("mailto:x@a.org"), None);
    }

    #[test]
    fn broken_turtle_is_a_document_error() {
        let err = DesmogAdapter.parse("desmog", b"not turtle at all").unwrap_err();
        assert!(matches!(err, SourceError::MalformedDocument { .. }));
    }
}
