use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::factor::FactorValue;
use crate::error::ValidationError;
use crate::normalize::{collapse_whitespace, identity_text, normalize_text, sanitize_url};

/// A checkable statement.
///
/// The stored text is the display form produced by
/// [`normalize_text`](crate::normalize::normalize_text); the identity form
/// used for hashing is its lower-cased variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    text: String,
    pub headline: Option<String>,
    /// Sanitized URLs of pages where the claim appeared.
    pub appearances: Vec<String>,
    pub keywords: Vec<String>,
    /// Entities linked from the claim text by the entity-linking step.
    pub entities: Vec<LinkedEntity>,
    /// Factor values attached by the classification step.
    pub factors: BTreeSet<FactorValue>,
    pub climate_related: Option<bool>,
}

impl Claim {
    /// Build a claim from raw text. Fails when nothing remains after
    /// normalization.
    pub fn new(raw_text: &str) -> Result<Self, ValidationError> {
        let text = normalize_text(raw_text);
        if text.is_empty() {
            return Err(ValidationError::MissingIdentity {
                entity: "Claim",
                field: "text",
            });
        }
        Ok(Self {
            text,
            headline: None,
            appearances: Vec::new(),
            keywords: Vec::new(),
            entities: Vec::new(),
            factors: BTreeSet::new(),
            climate_related: None,
        })
    }

    /// Display form of the claim text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Case-folded form the identifier is derived from.
    pub fn identity(&self) -> String {
        identity_text(&self.text)
    }

    pub fn with_headline(mut self, headline: &str) -> Self {
        let h = normalize_text(headline);
        self.headline = (!h.is_empty()).then_some(h);
        self
    }

    /// Add an appearance URL, ignoring anything that does not sanitize.
    pub fn add_appearance(&mut self, url: &str) {
        if let Some(u) = sanitize_url(url) {
            if !self.appearances.contains(&u) {
                self.appearances.push(u);
            }
        }
    }

    pub fn add_keyword(&mut self, keyword: &str) {
        let k = collapse_whitespace(keyword);
        if !k.is_empty() && !self.keywords.contains(&k) {
            self.keywords.push(k);
        }
    }
}

/// A knowledge-base resource recognised in a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedEntity {
    pub uri: String,
    pub surface_form: String,
    #[serde(default)]
    pub types: Vec<String>,
    pub similarity_score: f64,
    #[serde(default)]
    pub support: u64,
    #[serde(default)]
    pub offset: u64,
    /// Knowledge-base properties keyed by property IRI, filled in by the
    /// DBpedia property step.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Vec<PropertyValue>>,
}

/// Term kind of a [`PropertyValue`], as named in SPARQL JSON results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    Uri,
    Literal,
    TypedLiteral,
}

/// One value of a knowledge-base property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub value: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_text() {
        let err = Claim::new("   \u{a0} https://t.co/x ").unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingIdentity {
                entity: "Claim",
                field: "text"
            }
        );
    }

    #[test]
    fn keeps_display_case_and_folds_identity() {
        let c = Claim::new("  Sea Levels are   RISING ").unwrap();
        assert_eq!(c.text(), "Sea Levels are RISING");
        assert_eq!(c.identity(), "sea levels are rising");
    }

    #[test]
    fn appearances_are_sanitized_and_deduplicated() {
        let mut c = Claim::new("x").unwrap();
        c.add_appearance("example.org/post");
        c.add_appearance("https://example.org/post");
        c.add_appearance("ftp://nope");
        assert_eq!(c.appearances, vec!["https://example.org/post".to_string()]);
    }
}
