//! Namespace IRIs and the prefix binding table.

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const DC: &str = "http://purl.org/dc/elements/1.1/";
pub const SCHEMA: &str = "http://schema.org/";
pub const SKOS: &str = "http://www.w3.org/2004/02/skos/core#";
pub const CIMPLE: &str = "http://data.cimple.eu/ontology#";

/// Prefix bindings for one run: the fixed vocabularies plus the project
/// ontology at `{base}/ontology#` and the base itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    bindings: Vec<(String, String)>,
    ontology: String,
    base: String,
}

impl Namespaces {
    pub fn new(base_uri: &str, ontology_prefix: &str) -> Self {
        let base = base_uri.trim_end_matches('/').to_string();
        let ontology = format!("{base}/ontology#");
        let mut bindings: Vec<(String, String)> = [
            ("rdf", RDF),
            ("rdfs", RDFS),
            ("owl", OWL),
            ("xsd", XSD),
            ("dc", DC),
            ("schema", SCHEMA),
            ("skos", SKOS),
            ("cimple", CIMPLE),
        ]
        .into_iter()
        .map(|(p, iri)| (p.to_string(), iri.to_string()))
        .collect();
        bindings.push((ontology_prefix.to_string(), ontology.clone()));
        bindings.push(("base".to_string(), format!("{base}/")));
        Self {
            bindings,
            ontology,
            base,
        }
    }

    /// `(prefix, namespace IRI)` pairs in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(p, i)| (p.as_str(), i.as_str()))
    }

    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        self.iter().find(|(p, _)| *p == prefix).map(|(_, i)| i)
    }

    /// Project ontology namespace, `{base}/ontology#`.
    pub fn ontology(&self) -> &str {
        &self.ontology
    }

    /// Base URI without a trailing slash.
    pub fn base(&self) -> &str {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ontology_prefix_is_configurable() {
        let ns = Namespaces::new("http://data.climatesense-project.eu/", "cs");
        assert_eq!(ns.base(), "http://data.climatesense-project.eu");
        assert_eq!(
            ns.lookup("cs"),
            Some("http://data.climatesense-project.eu/ontology#")
        );
        assert_eq!(ns.lookup("base"), Some("http://data.climatesense-project.eu/"));
        assert_eq!(ns.lookup("schema"), Some(SCHEMA));
        assert_eq!(ns.lookup("climatesense"), None);
    }
}
