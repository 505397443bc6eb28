//! RDF generation: enriched claim reviews to one named graph per source.
//!
//! Entity URIs come from [`crate::model`] and are resolved against the
//! configured base. Factor values use fixed slug paths. The output is a
//! set of triples: the same reviews in any order produce the same set, and
//! serialization sorts it so files are byte-stable across runs.

pub mod serialize;
pub mod vocab;

use std::collections::HashSet;

use oxigraph::model::{Literal, NamedNode, Term, Triple};

use crate::error::SerializationError;
use crate::model::{
    Claim, ClaimReview, LinkedEntity, Organization, Person, PropertyValue, Rating,
    VALID_NORMALIZED_RATINGS, ValueKind, claim_review_uri, claim_uri, organization_uri,
    person_uri, rating_uri, resolve,
};
use crate::normalize::{NORMALIZATION_VERSION, sanitize_url};

pub use serialize::OutputFormat;
pub use vocab::Namespaces;

/// Placeholder replaced by the source name in graph IRI templates.
pub const SOURCE_PLACEHOLDER: &str = "{SOURCE}";

/// Build an IRI, reporting the offending string on failure.
pub fn iri(value: &str) -> Result<NamedNode, SerializationError> {
    NamedNode::new(value).map_err(|e| SerializationError::InvalidIri {
        iri: value.to_string(),
        message: e.to_string(),
    })
}

/// One source's triples for one run.
#[derive(Debug, Clone)]
pub struct SourceGraph {
    pub source: String,
    /// Named graph the triples are deployed into.
    pub graph: NamedNode,
    pub triples: HashSet<Triple>,
}

impl SourceGraph {
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Triples in N-Triples lexical order.
    pub fn sorted_triples(&self) -> Vec<&Triple> {
        let mut keyed: Vec<(String, &Triple)> =
            self.triples.iter().map(|t| (t.to_string(), t)).collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.into_iter().map(|(_, t)| t).collect()
    }
}

/// Turns enriched reviews into [`SourceGraph`]s.
#[derive(Debug, Clone)]
pub struct RdfGenerator {
    namespaces: Namespaces,
    graph_template: String,
}

impl RdfGenerator {
    pub fn new(namespaces: Namespaces, graph_template: &str) -> Self {
        Self {
            namespaces,
            graph_template: graph_template.to_string(),
        }
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Named graph IRI for `source`.
    pub fn graph_iri(&self, source: &str) -> String {
        self.graph_template.replace(SOURCE_PLACEHOLDER, source)
    }

    /// Generate the graph for one source.
    pub fn generate(
        &self,
        source: &str,
        reviews: &[ClaimReview],
    ) -> Result<SourceGraph, SerializationError> {
        let graph = iri(&self.graph_iri(source))?;
        let mut builder = Builder::new(&self.namespaces)?;
        let version = builder.ontology("normalizationVersion")?;
        let lit = Literal::new_typed_literal(
            NORMALIZATION_VERSION.to_string(),
            builder.xsd_integer.clone(),
        );
        builder.add(graph.clone(), version, lit);
        for review in reviews {
            builder.claim_review(review)?;
        }
        tracing::debug!(source, triples = builder.triples.len(), "generated source graph");
        Ok(SourceGraph {
            source: source.to_string(),
            graph,
            triples: builder.triples,
        })
    }
}

struct Builder<'a> {
    ns: &'a Namespaces,
    triples: HashSet<Triple>,
    rdf_type: NamedNode,
    xsd_date: NamedNode,
    xsd_float: NamedNode,
    xsd_integer: NamedNode,
    xsd_boolean: NamedNode,
}

impl<'a> Builder<'a> {
    fn new(ns: &'a Namespaces) -> Result<Self, SerializationError> {
        Ok(Self {
            ns,
            triples: HashSet::new(),
            rdf_type: iri(&format!("{}type", vocab::RDF))?,
            xsd_date: iri(&format!("{}date", vocab::XSD))?,
            xsd_float: iri(&format!("{}float", vocab::XSD))?,
            xsd_integer: iri(&format!("{}integer", vocab::XSD))?,
            xsd_boolean: iri(&format!("{}boolean", vocab::XSD))?,
        })
    }

    fn add(&mut self, subject: NamedNode, predicate: NamedNode, object: impl Into<Term>) {
        self.triples.insert(Triple::new(subject, predicate, object));
    }

    fn schema(&self, local: &str) -> Result<NamedNode, SerializationError> {
        iri(&format!("{}{local}", vocab::SCHEMA))
    }

    fn cimple(&self, local: &str) -> Result<NamedNode, SerializationError> {
        iri(&format!("{}{local}", vocab::CIMPLE))
    }

    fn ontology(&self, local: &str) -> Result<NamedNode, SerializationError> {
        iri(&format!("{}{local}", self.ns.ontology()))
    }

    fn local(&self, path: &str) -> Result<NamedNode, SerializationError> {
        iri(&resolve(self.ns.base(), path))
    }

    fn text(&mut self, subject: &NamedNode, local: &str, value: &str) -> Result<(), SerializationError> {
        if !value.trim().is_empty() {
            let p = self.schema(local)?;
            self.add(subject.clone(), p, Literal::new_simple_literal(value));
        }
        Ok(())
    }

    /// IRIs that come from source data or enrichment are skipped when
    /// invalid rather than failing the graph.
    fn external(&mut self, subject: &NamedNode, predicate: NamedNode, value: &str) {
        match NamedNode::new(value) {
            Ok(object) => self.add(subject.clone(), predicate, object),
            Err(e) => tracing::warn!(iri = value, error = %e, "skipping invalid IRI"),
        }
    }

    fn organization(&mut self, org: &Organization) -> Result<NamedNode, SerializationError> {
        let node = self.local(organization_uri(org).as_str())?;
        let ty = self.schema("Organization")?;
        self.add(node.clone(), self.rdf_type.clone(), ty);
        self.text(&node, "name", org.name())?;
        if let Some(site) = org.website.as_deref().and_then(sanitize_url) {
            let p = self.schema("url")?;
            self.external(&node, p, &site);
        }
        Ok(node)
    }

    fn person(&mut self, person: &Person) -> Result<NamedNode, SerializationError> {
        let node = self.local(person_uri(person).as_str())?;
        let ty = self.schema("Person")?;
        self.add(node.clone(), self.rdf_type.clone(), ty);
        self.text(&node, "name", person.name())?;
        if let Some(site) = person.website() {
            let p = self.schema("url")?;
            self.external(&node, p, site);
        }
        if let Some(role) = person.role() {
            self.text(&node, "jobTitle", role)?;
        }
        if let Some(same_as) = person.same_as.as_deref() {
            let p = self.schema("sameAs")?;
            self.external(&node, p, same_as);
        }
        Ok(node)
    }

    /// `schema:mentions` link plus any fetched knowledge-base properties,
    /// stated on the entity IRI itself.
    fn mention(&mut self, subject: &NamedNode, entity: &LinkedEntity) -> Result<(), SerializationError> {
        let p = self.schema("mentions")?;
        self.external(subject, p, &entity.uri);
        let Ok(target) = NamedNode::new(&entity.uri) else {
            return Ok(());
        };
        for (property, values) in &entity.properties {
            let Ok(predicate) = NamedNode::new(property) else {
                tracing::warn!(entity = %entity.uri, property, "skipping invalid property IRI");
                continue;
            };
            for value in values {
                if let Some(object) = property_term(value) {
                    self.add(target.clone(), predicate.clone(), object);
                }
            }
        }
        Ok(())
    }

    fn rating(
        &mut self,
        rating: &Rating,
        author: Option<&NamedNode>,
    ) -> Result<NamedNode, SerializationError> {
        let node = self.local(rating_uri(rating).as_str())?;
        let ty = self.schema("Rating")?;
        self.add(node.clone(), self.rdf_type.clone(), ty);
        self.text(&node, "name", rating.display_name())?;

        let value = self.schema("ratingValue")?;
        // xsd:float has no lexical form for Rust's `inf`/`NaN`.
        if let Some(v) = rating.value.filter(|v| v.is_finite()) {
            let lit = Literal::new_typed_literal(v.to_string(), self.xsd_float.clone());
            self.add(node.clone(), value, lit);
        } else if let Some(label) = rating.normalized_label() {
            self.add(node.clone(), value, Literal::new_simple_literal(label));
        }
        for (local, bound) in [("bestRating", rating.best), ("worstRating", rating.worst)] {
            if let Some(b) = bound {
                let p = self.schema(local)?;
                let lit = Literal::new_typed_literal(b.to_string(), self.xsd_integer.clone());
                self.add(node.clone(), p, lit);
            }
        }
        if let Some(explanation) = rating.explanation.as_deref() {
            self.text(&node, "ratingExplanation", explanation)?;
        }
        if let Some(org) = author {
            let p = self.schema("author")?;
            self.add(node.clone(), p, org.clone());
        }
        Ok(node)
    }

    fn claim(&mut self, claim: &Claim) -> Result<NamedNode, SerializationError> {
        let node = self.local(claim_uri(claim).as_str())?;
        let ty = self.schema("Claim")?;
        self.add(node.clone(), self.rdf_type.clone(), ty);
        self.text(&node, "text", claim.text())?;
        if let Some(headline) = claim.headline.as_deref() {
            self.text(&node, "headline", headline)?;
        }
        for url in &claim.appearances {
            let p = self.schema("appearance")?;
            self.external(&node, p, url);
        }
        for keyword in &claim.keywords {
            self.text(&node, "keywords", keyword)?;
        }
        for factor in &claim.factors {
            let p = self.cimple(factor.kind.predicate())?;
            let value = self.local(&factor.relative_path())?;
            self.add(node.clone(), p, value);
        }
        if let Some(related) = claim.climate_related {
            let p = self.ontology("isClimateRelated")?;
            let lit = Literal::new_typed_literal(related.to_string(), self.xsd_boolean.clone());
            self.add(node.clone(), p, lit);
        }
        for entity in &claim.entities {
            self.mention(&node, entity)?;
        }
        Ok(node)
    }

    fn claim_review(&mut self, review: &ClaimReview) -> Result<(), SerializationError> {
        let org = review.author.as_ref().map(|o| self.organization(o)).transpose()?;
        let persons = review
            .persons
            .iter()
            .map(|p| self.person(p))
            .collect::<Result<Vec<_>, _>>()?;
        let claim = self.claim(&review.claim)?;
        let rating = review
            .rating
            .as_ref()
            .map(|r| self.rating(r, org.as_ref()))
            .transpose()?;

        let node = self.local(claim_review_uri(review).as_str())?;
        let ty = self.schema("ClaimReview")?;
        self.add(node.clone(), self.rdf_type.clone(), ty);
        let p = self.schema("itemReviewed")?;
        self.add(node.clone(), p, claim);

        for author in org.into_iter().chain(persons) {
            let p = self.schema("author")?;
            self.add(node.clone(), p, author);
        }
        if let Some(url) = sanitize_url(review.review_url()) {
            let p = self.schema("url")?;
            self.external(&node, p, &url);
        }
        if let Some(date) = review.date_published() {
            let p = self.schema("datePublished")?;
            let lit = Literal::new_typed_literal(date, self.xsd_date.clone());
            self.add(node.clone(), p, lit);
        }
        if let Some(lang) = review.language.as_deref() {
            self.text(&node, "inLanguage", lang)?;
        }
        if let (Some(rating_node), Some(rating)) = (rating, review.rating.as_ref()) {
            let p = self.schema("reviewRating")?;
            self.add(node.clone(), p, rating_node);
            if let Some(label) = rating
                .normalized_label()
                .filter(|l| VALID_NORMALIZED_RATINGS.contains(l))
            {
                let p = self.cimple("normalizedReviewRating")?;
                let target = self.local(&format!("rating/{label}"))?;
                self.add(node.clone(), p, target);
            }
        }
        for body in [review.review_body.as_deref(), review.url_text.as_deref()]
            .into_iter()
            .flatten()
        {
            self.text(&node, "text", body)?;
        }
        if let Some(description) = review.description.as_deref() {
            self.text(&node, "description", description)?;
        }
        for keyword in &review.keywords {
            self.text(&node, "keywords", keyword)?;
        }
        if let Some(license) = review.license.as_deref() {
            let p = self.schema("license")?;
            match sanitize_url(license) {
                Some(url) => self.external(&node, p, &url),
                None => self.add(node.clone(), p, Literal::new_simple_literal(license)),
            }
        }
        Ok(())
    }
}

/// Object term for a fetched property value; `None` when the value is not
/// a usable IRI or carries a malformed datatype or language tag.
fn property_term(value: &PropertyValue) -> Option<Term> {
    let term: Term = match value.kind {
        ValueKind::Uri => NamedNode::new(&value.value).ok()?.into(),
        ValueKind::Literal | ValueKind::TypedLiteral => {
            if let Some(datatype) = value.datatype.as_deref() {
                let datatype = NamedNode::new(datatype).ok()?;
                Literal::new_typed_literal(&value.value, datatype).into()
            } else if let Some(lang) = value.lang.as_deref() {
                Literal::new_language_tagged_literal(&value.value, lang)
                    .ok()?
                    .into()
            } else {
                Literal::new_simple_literal(&value.value).into()
            }
        }
    };
    Some(term)
}
