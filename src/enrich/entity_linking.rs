//! Entity linking against a DBpedia Spotlight compatible `annotate`
//! endpoint.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::error::{EnrichmentError, classify_ureq};
use super::{EnrichmentStep, user_agent};
use crate::model::{ClaimReview, LinkedEntity};

/// Claims shorter than this are not sent for annotation.
pub const MIN_TEXT_CHARS: usize = 10;

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(rename = "Resources", default)]
    resources: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(rename = "@URI")]
    uri: String,
    #[serde(rename = "@surfaceForm", default)]
    surface_form: Value,
    #[serde(rename = "@types", default)]
    types: String,
    #[serde(rename = "@similarityScore", default)]
    similarity: Value,
    #[serde(rename = "@support", default)]
    support: Value,
    #[serde(rename = "@offset", default)]
    offset: Value,
}

/// Spotlight encodes every attribute as a string; some deployments emit
/// numbers instead.
fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn as_number<T: std::str::FromStr + Default>(v: &Value) -> T {
    as_text(v).trim().parse().unwrap_or_default()
}

/// Parse an annotate response body into linked entities, keeping those at
/// or above `min_confidence`.
pub fn parse_annotations(body: &str, min_confidence: f64) -> Result<Vec<LinkedEntity>, String> {
    let parsed: AnnotateResponse = serde_json::from_str(body).map_err(|e| e.to_string())?;
    Ok(parsed
        .resources
        .into_iter()
        .map(|r| LinkedEntity {
            uri: r.uri,
            surface_form: as_text(&r.surface_form),
            types: r
                .types
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            similarity_score: as_number(&r.similarity),
            support: as_number(&r.support),
            offset: as_number(&r.offset),
            properties: Default::default(),
        })
        .filter(|e| !e.uri.is_empty() && e.similarity_score >= min_confidence)
        .collect())
}

/// Links DBpedia resources mentioned in the claim text.
pub struct EntityLinkingStep {
    agent: ureq::Agent,
    endpoint: String,
    confidence: f64,
    support: u32,
}

impl EntityLinkingStep {
    pub const NAME: &'static str = "enricher.entity_linking";

    pub fn new(endpoint: impl Into<String>, confidence: f64, support: u32, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(&user_agent())
            .build();
        Self {
            agent,
            endpoint: endpoint.into(),
            confidence,
            support,
        }
    }
}

impl EnrichmentStep for EntityLinkingStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input(&self, review: &ClaimReview) -> Option<String> {
        let text = review.claim.text();
        (text.chars().count() >= MIN_TEXT_CHARS).then(|| text.to_string())
    }

    fn invoke(&self, input: &str) -> Result<Value, EnrichmentError> {
        let confidence = self.confidence.to_string();
        let support = self.support.to_string();
        let resp = self
            .agent
            .post(&self.endpoint)
            .set("Accept", "application/json")
            .send_form(&[
                ("text", input),
                ("confidence", &confidence),
                ("support", &support),
            ])
            .map_err(|e| classify_ureq(Self::NAME, e))?;

        let body = resp.into_string().map_err(|e| EnrichmentError::Transport {
            step: Self::NAME.into(),
            message: e.to_string(),
        })?;
        let entities = parse_annotations(&body, self.confidence).map_err(|message| {
            EnrichmentError::MalformedResponse {
                step: Self::NAME.into(),
                message,
            }
        })?;
        serde_json::to_value(entities).map_err(|e| EnrichmentError::MalformedResponse {
            step: Self::NAME.into(),
            message: e.to_string(),
        })
    }

    fn apply(&self, review: &mut ClaimReview, data: &Value) -> Result<(), EnrichmentError> {
        let entities: Vec<LinkedEntity> =
            serde_json::from_value(data.clone()).map_err(|e| EnrichmentError::MalformedResponse {
                step: Self::NAME.into(),
                message: e.to_string(),
            })?;
        review.claim.entities = entities;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Claim;

    const BODY: &str = r#"{
        "@text": "Greenland ice sheet is growing",
        "@confidence": "0.5",
        "Resources": [
            {"@URI": "http://dbpedia.org/resource/Greenland_ice_sheet",
             "@support": "812", "@types": "Schema:Place, DBpedia:Place",
             "@surfaceForm": "Greenland ice sheet", "@offset": "0",
             "@similarityScore": "0.9991"},
            {"@URI": "http://dbpedia.org/resource/Growing",
             "@support": "3", "@types": "",
             "@surfaceForm": "growing", "@offset": "22",
             "@similarityScore": "0.31"}
        ]
    }"#;

    #[test]
    fn parses_spotlight_resources() {
        let entities = parse_annotations(BODY, 0.5).unwrap();
        assert_eq!(entities.len(), 1);
        let e = &entities[0];
        assert_eq!(e.uri, "http://dbpedia.org/resource/Greenland_ice_sheet");
        assert_eq!(e.surface_form, "Greenland ice sheet");
        assert_eq!(e.types, vec!["Schema:Place", "DBpedia:Place"]);
        assert_eq!(e.support, 812);
        assert!(e.similarity_score > 0.99);
    }

    #[test]
    fn missing_resources_means_no_entities() {
        assert!(parse_annotations(r#"{"@text": "x"}"#, 0.5).unwrap().is_empty());
    }

    #[test]
    fn numeric_surface_forms_are_stringified() {
        let body = r#"{"Resources": [{"@URI": "http://dbpedia.org/resource/2013",
            "@surfaceForm": 2013, "@similarityScore": 1.0}]}"#;
        let e = parse_annotations(body, 0.5).unwrap();
        assert_eq!(e[0].surface_form, "2013");
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(parse_annotations("<html>", 0.5).is_err());
    }

    #[test]
    fn short_claims_are_not_eligible() {
        let step = EntityLinkingStep::new("http://localhost/annotate", 0.5, 20, Duration::from_secs(1));
        let short = ClaimReview::new(Claim::new("Too short").unwrap(), "example.org/a").unwrap();
        let long = ClaimReview::new(Claim::new("Long enough claim").unwrap(), "example.org/a").unwrap();
        assert_eq!(step.input(&short), None);
        assert_eq!(step.input(&long).as_deref(), Some("Long enough claim"));
    }
}
