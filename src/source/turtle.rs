//! Read-only SPARQL view over a Turtle document, shared by the RDF-based
//! adapters. Both the `http://` and `https://` schema.org namespaces are
//! accepted everywhere a schema.org local name is given.

use oxigraph::io::RdfFormat;
use oxigraph::model::Term;
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

pub(crate) const RDF_TYPE: &str = "<http://www.w3.org/1999/02/22-rdf-syntax-ns#type>";
pub(crate) const RDFS_LABEL: &str = "<http://www.w3.org/2000/01/rdf-schema#label>";

/// A text value read from the graph.
#[derive(Debug, Clone)]
pub(crate) struct Text {
    pub value: String,
    pub language: Option<String>,
    pub is_iri: bool,
}

fn term_text(term: &Term) -> Option<Text> {
    let text = match term {
        Term::NamedNode(n) => Text {
            value: n.as_str().to_string(),
            language: None,
            is_iri: true,
        },
        Term::Literal(l) => Text {
            value: l.value().trim().to_string(),
            language: l.language().map(str::to_lowercase),
            is_iri: false,
        },
        _ => return None,
    };
    (!text.value.is_empty()).then_some(text)
}

/// SPARQL path step matching a schema.org local name in either namespace.
/// Full `<iri>` steps pass through.
pub(crate) fn path_step(local: &str) -> String {
    if local.starts_with('<') {
        return local.to_string();
    }
    format!("(<https://schema.org/{local}>|<http://schema.org/{local}>)")
}

pub(crate) struct Graph {
    store: Store,
}

impl Graph {
    pub fn load(raw: &[u8]) -> Result<Self, String> {
        let store = Store::new().map_err(|e| e.to_string())?;
        store
            .load_from_reader(RdfFormat::Turtle, raw)
            .map_err(|e| e.to_string())?;
        Ok(Self { store })
    }

    /// Rows of a SELECT query, one optional value per requested variable.
    pub fn rows(&self, sparql: &str, vars: &[&str]) -> Result<Vec<Vec<Option<Text>>>, String> {
        match self.store.query(sparql).map_err(|e| e.to_string())? {
            QueryResults::Solutions(solutions) => {
                let mut out = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| e.to_string())?;
                    out.push(
                        vars.iter()
                            .map(|v| solution.get(*v).and_then(term_text))
                            .collect(),
                    );
                }
                Ok(out)
            }
            _ => Err("expected SELECT results".into()),
        }
    }

    /// Sorted IRIs of every subject typed with the schema.org class `class`.
    pub fn subjects_of_type(&self, class: &str) -> Result<Vec<String>, String> {
        let sparql = format!(
            "SELECT DISTINCT ?s WHERE {{ \
               VALUES ?type {{ <https://schema.org/{class}> <http://schema.org/{class}> }} \
               ?s a ?type . FILTER(isIRI(?s)) \
             }} ORDER BY ?s"
        );
        Ok(self
            .rows(&sparql, &["s"])?
            .into_iter()
            .filter_map(|mut row| row.pop().flatten())
            .map(|t| t.value)
            .collect())
    }

    /// Values reachable from `subject` along `path`.
    pub fn values(&self, subject: &str, path: &[&str]) -> Result<Vec<Text>, String> {
        let steps: Vec<String> = path.iter().map(|p| path_step(p)).collect();
        let sparql = format!("SELECT ?o WHERE {{ <{subject}> {} ?o }}", steps.join("/"));
        Ok(self
            .rows(&sparql, &["o"])?
            .into_iter()
            .filter_map(|mut row| row.pop().flatten())
            .collect())
    }

    pub fn first(&self, subject: &str, path: &[&str]) -> Result<Option<Text>, String> {
        Ok(self.values(subject, path)?.into_iter().next())
    }

    pub fn first_literal(&self, subject: &str, path: &[&str]) -> Result<Option<String>, String> {
        Ok(self
            .values(subject, path)?
            .into_iter()
            .find(|t| !t.is_iri)
            .map(|t| t.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
        @prefix schema: <https://schema.org/> .
        <https://x.org/b> a <http://schema.org/Claim> ; schema:name "B"@en .
        <https://x.org/a> a schema:Claim ; schema:name "A" ; schema:url <https://x.org/page> .
        _:n a schema:Claim .
    "#;

    #[test]
    fn path_steps_cover_both_namespaces() {
        assert_eq!(
            path_step("url"),
            "(<https://schema.org/url>|<http://schema.org/url>)"
        );
        assert_eq!(path_step(RDFS_LABEL), RDFS_LABEL);
    }

    #[test]
    fn typed_subjects_are_sorted_iris() {
        let g = Graph::load(DOC.as_bytes()).unwrap();
        assert_eq!(
            g.subjects_of_type("Claim").unwrap(),
            ["https://x.org/a", "https://x.org/b"]
        );
    }

    #[test]
    fn values_keep_language_and_kind() {
        let g = Graph::load(DOC.as_bytes()).unwrap();
        let b = g.first("https://x.org/b", &["name"]).unwrap().unwrap();
        assert_eq!(b.language.as_deref(), Some("en"));
        let url = g.first("https://x.org/a", &["url"]).unwrap().unwrap();
        assert!(url.is_iri);
        assert_eq!(g.first_literal("https://x.org/a", &["url"]).unwrap(), None);
    }
}
