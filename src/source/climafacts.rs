//! ClimaFacts releases (schema.org ClaimReview graphs in Turtle).
//!
//! The document is loaded into an in-memory oxigraph store and each
//! `schema:ClaimReview` IRI is read with SPARQL property paths.

use super::turtle::{Graph, RDF_TYPE, RDFS_LABEL, Text, path_step};
use super::{
    BatchBuilder, ParsedBatch, RecordFault, SourceAdapter, SourceError, SourceKind, SourceResult,
};
use crate::model::{Claim, ClaimReview, Organization, Person, Rating, normalize_rating_label};
use crate::normalize::sanitize_url;

/// Predicates that may carry the claim text, in preference order.
const CLAIM_TEXT: &[&str] = &["text", "abstract", "description", "headline", "name"];

const PREFERRED_LANGUAGES: &[&str] = &["en", "en-us", "en-gb"];

/// First literal in a preferred English variant, else the first literal.
fn pick_best(candidates: &[Text]) -> Option<&str> {
    let literals = || candidates.iter().filter(|t| !t.is_iri);
    PREFERRED_LANGUAGES
        .iter()
        .find_map(|lang| literals().find(|t| t.language.as_deref() == Some(*lang)))
        .or_else(|| literals().next())
        .map(|t| t.value.as_str())
}

pub struct ClimafactsAdapter;

impl ClimafactsAdapter {
    fn map(graph: &Graph, review_iri: &str) -> Result<ClaimReview, RecordFault> {
        let url = graph
            .first(review_iri, &["url"])
            .map_err(RecordFault::Shape)?
            .ok_or_else(|| RecordFault::Shape("claim review missing schema:url".into()))?
            .value;

        let mut candidates = graph
            .values(review_iri, &["claimReviewed"])
            .map_err(RecordFault::Shape)?;
        for p in CLAIM_TEXT {
            candidates.extend(
                graph
                    .values(review_iri, &["claimReviewed", p])
                    .map_err(RecordFault::Shape)?,
            );
        }
        for p in CLAIM_TEXT {
            candidates.extend(graph.values(review_iri, &[p]).map_err(RecordFault::Shape)?);
        }
        let text = pick_best(&candidates)
            .ok_or_else(|| RecordFault::Shape("claim review missing claim text".into()))?;

        let mut claim = Claim::new(text)?;
        for path in [
            &["claimReviewed", "appearance", "url"][..],
            &["claimReviewed", "firstAppearance", "url"][..],
            &["claimReviewed", "url"][..],
            &["claimReviewed", "sameAs"][..],
        ] {
            for t in graph.values(review_iri, path).map_err(RecordFault::Shape)? {
                if t.value != url {
                    claim.add_appearance(&t.value);
                }
            }
        }

        let mut review = ClaimReview::new(claim, &url)?;
        if let Some(org) = Self::organization(graph, review_iri)? {
            review = review.with_author(org);
        }
        for person in Self::persons(graph, review_iri)? {
            review = review.with_person(person);
        }
        if let Some(rating) = Self::rating(graph, review_iri)? {
            review = review.with_rating(rating);
        }

        let first_literal = |path: &[&str]| {
            graph
                .first_literal(review_iri, path)
                .map_err(RecordFault::Shape)
        };
        let date = match first_literal(&["datePublished"])? {
            Some(d) => Some(d),
            None => first_literal(&["dateCreated"])?,
        };
        if let Some(date) = date {
            review = review.with_date(&date)?;
        }
        if let Some(lang) = first_literal(&["inLanguage"])? {
            review = review.with_language(&lang);
        }
        let body = match first_literal(&["reviewBody"])? {
            Some(b) => Some(b),
            None => first_literal(&["description"])?,
        };
        if let Some(body) = body {
            review = review.with_review_body(&body);
        }
        Ok(review)
    }

    /// `schema:author` nodes typed `schema:Person`, in name order.
    fn persons(graph: &Graph, review_iri: &str) -> Result<Vec<Person>, RecordFault> {
        let opt = |var: &str, local: &str| format!("OPTIONAL {{ ?p {} ?{var} }}", path_step(local));
        let sparql = format!(
            "SELECT ?p ?name ?url ?role WHERE {{ \
               <{review_iri}> {author} ?p . \
               ?p a ?type . VALUES ?type {{ <https://schema.org/Person> <http://schema.org/Person> }} \
               {} {} {} \
             }} ORDER BY ?name ?p",
            opt("name", "name"),
            opt("url", "url"),
            opt("role", "jobTitle"),
            author = path_step("author"),
        );
        let rows = graph
            .rows(&sparql, &["p", "name", "url", "role"])
            .map_err(RecordFault::Shape)?;

        let mut persons: Vec<Person> = Vec::new();
        for row in rows {
            let [node, name, url, role] = <[Option<Text>; 4]>::try_from(row)
                .map_err(|_| RecordFault::Shape("unexpected person row".into()))?;
            let Some(name) = name.filter(|t| !t.is_iri) else {
                continue;
            };
            let mut person = Person::new(&name.value)?;
            if let Some(url) = url {
                person = person.with_website(&url.value);
            }
            if let Some(role) = role.filter(|t| !t.is_iri) {
                person = person.with_role(&role.value);
            }
            if let Some(iri) = node.filter(|t| t.is_iri) {
                person = person.with_same_as(&iri.value);
            }
            if !persons.contains(&person) {
                persons.push(person);
            }
        }
        Ok(persons)
    }

    /// Reviews credited to `schema:Person` authors take their organization
    /// from the publisher only.
    fn is_person(graph: &Graph, review_iri: &str, root: &str) -> Result<bool, RecordFault> {
        Ok(graph
            .values(review_iri, &[root, RDF_TYPE])
            .map_err(RecordFault::Shape)?
            .iter()
            .any(|t| t.value.ends_with("schema.org/Person")))
    }

    fn organization(graph: &Graph, review_iri: &str) -> Result<Option<Organization>, RecordFault> {
        for root in ["publisher", "author"] {
            let Some(node) = graph.first(review_iri, &[root]).map_err(RecordFault::Shape)? else {
                continue;
            };
            if Self::is_person(graph, review_iri, root)? {
                continue;
            }
            let mut name = (!node.is_iri).then(|| node.value.clone());
            for label in ["name", "legalName", "alternateName", RDFS_LABEL] {
                if name.is_some() {
                    break;
                }
                name = graph
                    .first_literal(review_iri, &[root, label])
                    .map_err(RecordFault::Shape)?;
            }
            let website = graph
                .first(review_iri, &[root, "url"])
                .map_err(RecordFault::Shape)?
                .map(|t| t.value)
                .or_else(|| node.is_iri.then(|| node.value.clone()))
                .and_then(|w| sanitize_url(&w));

            let Some(name) = name.or_else(|| website.clone()) else {
                continue;
            };
            let mut org = Organization::new(&name)?;
            org.website = website;
            return Ok(Some(org));
        }
        Ok(None)
    }

    fn rating(graph: &Graph, review_iri: &str) -> Result<Option<Rating>, RecordFault> {
        let direct = graph
            .values(review_iri, &["reviewRating"])
            .map_err(RecordFault::Shape)?
            .into_iter()
            .filter(|t| !t.is_iri)
            .map(|t| t.value);
        let named = graph
            .values(review_iri, &["reviewRating", "name"])
            .map_err(RecordFault::Shape)?
            .into_iter()
            .filter(|t| !t.is_iri)
            .map(|t| t.value);
        let Some(label) = direct
            .chain(named)
            .find(|l| normalize_rating_label(l).is_some())
        else {
            return Ok(None);
        };

        let mut rating = Rating::new(None, Some(&label))?;
        let number = |local: &str| -> Result<Option<String>, RecordFault> {
            graph
                .first_literal(review_iri, &["reviewRating", local])
                .map_err(RecordFault::Shape)
        };
        rating.value = number("ratingValue")?.and_then(|v| v.parse().ok());
        rating.best = number("bestRating")?.and_then(|v| v.parse().ok());
        rating.worst = number("worstRating")?.and_then(|v| v.parse().ok());
        rating.explanation = number("ratingExplanation")?;
        Ok(Some(rating))
    }
}

impl SourceAdapter for ClimafactsAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Climafacts
    }

    fn parse(&self, source_name: &str, raw: &[u8]) -> SourceResult<ParsedBatch> {
        let malformed = |message: String| SourceError::MalformedDocument {
            source_name: source_name.to_string(),
            kind: self.kind().to_string(),
            message,
        };
        let graph = Graph::load(raw).map_err(malformed)?;
        let reviews = graph.subjects_of_type("ClaimReview").map_err(malformed)?;

        let mut batch = BatchBuilder::new(source_name);
        for (index, iri) in reviews.iter().enumerate() {
            batch.push(index, Self::map(&graph, iri));
        }
        Ok(batch.finish())
    }
}
