//! Graph store loaders.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::DeployError;

use super::DeployResult;

/// Replaces the contents of a named graph in a triple store.
pub trait GraphLoader: Send + Sync {
    /// Replace `graph_iri` with the given N-Triples document.
    fn load(&self, graph_iri: &str, ntriples: &[u8]) -> DeployResult<()>;
}

/// SPARQL 1.1 Graph Store HTTP Protocol client (`PUT ?graph=<iri>`).
pub struct GraphStoreLoader {
    endpoint: String,
    agent: ureq::Agent,
    credentials: Option<(String, String)>,
}

impl GraphStoreLoader {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(&crate::enrich::user_agent())
            .build();
        Self {
            endpoint: endpoint.to_string(),
            agent,
            credentials: None,
        }
    }

    /// HTTP basic authentication for the store.
    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.credentials = Some((user.to_string(), password.to_string()));
        self
    }
}

impl GraphLoader for GraphStoreLoader {
    fn load(&self, graph_iri: &str, ntriples: &[u8]) -> DeployResult<()> {
        let load_err = |message: String| DeployError::Load {
            graph: graph_iri.to_string(),
            message,
        };
        let mut request = self
            .agent
            .put(&self.endpoint)
            .query("graph", graph_iri)
            .set("Content-Type", "application/n-triples");
        if let Some((user, password)) = &self.credentials {
            let token = basic_token(user, password);
            request = request.set("Authorization", &format!("Basic {token}"));
        }
        match request.send_bytes(ntriples) {
            Ok(response) => {
                tracing::debug!(graph = graph_iri, status = response.status(), "graph store accepted load");
                Ok(())
            }
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(load_err(format!("HTTP {code}: {}", body.trim())))
            }
            Err(ureq::Error::Transport(t)) => Err(load_err(t.to_string())),
        }
    }
}

impl std::fmt::Debug for GraphStoreLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStoreLoader")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

/// Standard base64 of `user:password`.
fn basic_token(user: &str, password: &str) -> String {
    STANDARD.encode(format!("{user}:{password}"))
}
