//! Knowledge-base properties for linked entities, fetched from a DBpedia
//! SPARQL endpoint.
//!
//! Runs after entity linking. One SELECT per review covers every entity
//! the claim mentions; the query text is the step input, so changing the
//! configured properties moves reviews onto fresh cache lines.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use oxigraph::model::NamedNode;
use serde::Deserialize;
use serde_json::{Value, json};

use super::error::{EnrichmentError, classify_ureq};
use super::{EnrichmentStep, user_agent};
use crate::model::{ClaimReview, PropertyValue, ValueKind};

const RESULTS_FORMAT: &str = "application/sparql-results+json";

/// Property values per entity IRI, then per property IRI.
pub type EntityProperties = BTreeMap<String, BTreeMap<String, Vec<PropertyValue>>>;

#[derive(Debug, Deserialize)]
struct SparqlResults {
    results: ResultSet,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(default)]
    bindings: Vec<BTreeMap<String, Binding>>,
}

#[derive(Debug, Deserialize)]
struct Binding {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(default)]
    datatype: Option<String>,
    #[serde(rename = "xml:lang", default)]
    lang: Option<String>,
}

impl Binding {
    /// Blank nodes and unknown term kinds have no stable value.
    fn property_value(self) -> Option<PropertyValue> {
        let kind = match self.kind.as_str() {
            "uri" => ValueKind::Uri,
            "literal" => ValueKind::Literal,
            "typed-literal" => ValueKind::TypedLiteral,
            _ => return None,
        };
        Some(PropertyValue {
            value: self.value,
            kind,
            datatype: self.datatype,
            lang: self.lang,
        })
    }
}

/// Parse a SPARQL JSON result set with `entity`, `property` and `value`
/// columns.
pub fn parse_bindings(body: &str) -> Result<EntityProperties, String> {
    let parsed: SparqlResults = serde_json::from_str(body).map_err(|e| e.to_string())?;
    let mut out = EntityProperties::new();
    for mut row in parsed.results.bindings {
        let (Some(entity), Some(property), Some(value)) =
            (row.remove("entity"), row.remove("property"), row.remove("value"))
        else {
            continue;
        };
        let Some(value) = value.property_value() else {
            continue;
        };
        let values = out
            .entry(entity.value)
            .or_default()
            .entry(property.value)
            .or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }
    Ok(out)
}

/// Fetches configured DBpedia properties for every linked entity.
pub struct DbpediaPropertyStep {
    agent: ureq::Agent,
    endpoint: String,
    properties: Vec<String>,
}

impl DbpediaPropertyStep {
    pub const NAME: &'static str = "enricher.dbpedia_property";

    /// `properties` are full property IRIs.
    pub fn new(endpoint: impl Into<String>, properties: Vec<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(&user_agent())
            .build();
        Self {
            agent,
            endpoint: endpoint.into(),
            properties,
        }
    }

    fn malformed(message: impl Into<String>) -> EnrichmentError {
        EnrichmentError::MalformedResponse {
            step: Self::NAME.into(),
            message: message.into(),
        }
    }

    /// SELECT over the given entity IRIs and the configured properties.
    pub fn query<'a>(&self, entities: impl IntoIterator<Item = &'a str>) -> String {
        format!(
            "SELECT ?entity ?property ?value WHERE {{ VALUES ?entity {{ {} }} \
             VALUES ?property {{ {} }} ?entity ?property ?value . }}",
            iri_list(entities),
            iri_list(self.properties.iter().map(String::as_str)),
        )
    }
}

fn iri_list<'a>(iris: impl IntoIterator<Item = &'a str>) -> String {
    iris.into_iter()
        .map(|iri| format!("<{iri}>"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl EnrichmentStep for DbpediaPropertyStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input(&self, review: &ClaimReview) -> Option<String> {
        if self.properties.is_empty() {
            return None;
        }
        let entities: BTreeSet<&str> = review
            .claim
            .entities
            .iter()
            .map(|e| e.uri.as_str())
            .filter(|uri| NamedNode::new(*uri).is_ok())
            .collect();
        (!entities.is_empty()).then(|| self.query(entities))
    }

    fn invoke(&self, input: &str) -> Result<Value, EnrichmentError> {
        let resp = self
            .agent
            .get(&self.endpoint)
            .query("query", input)
            .query("format", RESULTS_FORMAT)
            .set("Accept", RESULTS_FORMAT)
            .call()
            .map_err(|e| classify_ureq(Self::NAME, e))?;
        let body = resp.into_string().map_err(|e| EnrichmentError::Transport {
            step: Self::NAME.into(),
            message: e.to_string(),
        })?;
        let entities = parse_bindings(&body).map_err(Self::malformed)?;
        Ok(json!({ "entities": entities }))
    }

    fn apply(&self, review: &mut ClaimReview, data: &Value) -> Result<(), EnrichmentError> {
        let fetched: EntityProperties = serde_json::from_value(data["entities"].clone())
            .map_err(|e| Self::malformed(e.to_string()))?;
        for entity in &mut review.claim.entities {
            let Some(properties) = fetched.get(&entity.uri) else {
                continue;
            };
            for (property, values) in properties {
                let existing = entity.properties.entry(property.clone()).or_default();
                for value in values {
                    if !existing.contains(value) {
                        existing.push(value.clone());
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Claim, LinkedEntity};

    const ABSTRACT: &str = "http://dbpedia.org/ontology/abstract";
    const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    const ICE: &str = "http://dbpedia.org/resource/Greenland_ice_sheet";

    const BODY: &str = r#"{
        "head": {"vars": ["entity", "property", "value"]},
        "results": {"bindings": [
            {"entity": {"type": "uri", "value": "http://dbpedia.org/resource/Greenland_ice_sheet"},
             "property": {"type": "uri", "value": "http://dbpedia.org/ontology/abstract"},
             "value": {"type": "literal", "xml:lang": "en", "value": "The Greenland ice sheet is..."}},
            {"entity": {"type": "uri", "value": "http://dbpedia.org/resource/Greenland_ice_sheet"},
             "property": {"type": "uri", "value": "http://dbpedia.org/ontology/abstract"},
             "value": {"type": "literal", "xml:lang": "en", "value": "The Greenland ice sheet is..."}},
            {"entity": {"type": "uri", "value": "http://dbpedia.org/resource/Greenland_ice_sheet"},
             "property": {"type": "uri", "value": "http://www.w3.org/1999/02/22-rdf-syntax-ns#type"},
             "value": {"type": "uri", "value": "http://dbpedia.org/ontology/Glacier"}},
            {"entity": {"type": "uri", "value": "http://dbpedia.org/resource/Greenland_ice_sheet"},
             "property": {"type": "uri", "value": "http://www.w3.org/1999/02/22-rdf-syntax-ns#type"},
             "value": {"type": "bnode", "value": "b0"}},
            {"entity": {"type": "uri", "value": "http://dbpedia.org/resource/Greenland_ice_sheet"},
             "value": {"type": "literal", "value": "no property column"}}
        ]}
    }"#;

    fn step() -> DbpediaPropertyStep {
        DbpediaPropertyStep::new(
            "http://localhost/sparql",
            vec![ABSTRACT.into(), TYPE.into()],
            Duration::from_secs(1),
        )
    }

    fn linked(uri: &str) -> LinkedEntity {
        LinkedEntity {
            uri: uri.into(),
            surface_form: "Greenland ice sheet".into(),
            types: vec![],
            similarity_score: 0.99,
            support: 10,
            offset: 0,
            properties: BTreeMap::new(),
        }
    }

    fn review(entities: &[&str]) -> ClaimReview {
        let mut r = ClaimReview::new(
            Claim::new("Greenland ice sheet is growing").unwrap(),
            "https://example.org/fc/1",
        )
        .unwrap();
        r.claim.entities = entities.iter().map(|u| linked(u)).collect();
        r
    }

    #[test]
    fn parses_bindings_without_duplicates_or_blank_nodes() {
        let parsed = parse_bindings(BODY).unwrap();
        let props = &parsed[ICE];
        assert_eq!(props[ABSTRACT].len(), 1);
        assert_eq!(props[ABSTRACT][0].lang.as_deref(), Some("en"));
        assert_eq!(props[TYPE].len(), 1);
        assert_eq!(props[TYPE][0].kind, ValueKind::Uri);
        assert!(parse_bindings("<html/>").is_err());
    }

    #[test]
    fn input_is_a_sorted_query_over_linked_entities() {
        let s = step();
        assert_eq!(s.input(&review(&[])), None);
        assert_eq!(s.input(&review(&["not an iri"])), None);

        let a = s.input(&review(&[ICE, "http://dbpedia.org/resource/Arctic", ICE])).unwrap();
        let b = s.input(&review(&["http://dbpedia.org/resource/Arctic", ICE])).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("VALUES ?entity { <http://dbpedia.org/resource/Arctic> <http://dbpedia.org/resource/Greenland_ice_sheet> }"));
        assert!(a.contains(&format!("<{ABSTRACT}> <{TYPE}>")));

        let unconfigured =
            DbpediaPropertyStep::new("http://localhost/sparql", vec![], Duration::from_secs(1));
        assert_eq!(unconfigured.input(&review(&[ICE])), None);
    }

    #[test]
    fn apply_merges_into_matching_entities() {
        let s = step();
        let data = json!({ "entities": parse_bindings(BODY).unwrap() });
        let mut r = review(&[ICE, "http://dbpedia.org/resource/Arctic"]);
        s.apply(&mut r, &data).unwrap();
        s.apply(&mut r, &data).unwrap();
        assert_eq!(r.claim.entities[0].properties[ABSTRACT].len(), 1);
        assert_eq!(r.claim.entities[0].properties.len(), 2);
        assert!(r.claim.entities[1].properties.is_empty());

        assert!(s.apply(&mut r, &json!({ "entities": [1, 2] })).is_err());
    }
}
