//! Factor classification through a `POST /predict` model server.
//!
//! The model internals are out of scope; the server is treated as
//! `classify(text) -> {factor: label}`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};

use super::error::{EnrichmentError, classify_ureq};
use super::{EnrichmentStep, user_agent};
use crate::model::{ClaimReview, FactorKind, FactorValue};

/// One classification result as returned by the model server.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FactorResult {
    pub emotion: Option<String>,
    pub sentiment: Option<String>,
    pub political_leaning: Option<String>,
    pub conspiracies: Conspiracies,
    pub tropes: Vec<String>,
    pub persuasion_techniques: Vec<String>,
    pub climate_related: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Conspiracies {
    pub mentioned: Vec<String>,
    pub promoted: Vec<String>,
}

impl FactorResult {
    /// Factor values in this result. `"None"` labels are dropped.
    pub fn values(&self) -> Vec<FactorValue> {
        let singles = [
            (FactorKind::Emotion, &self.emotion),
            (FactorKind::Sentiment, &self.sentiment),
            (FactorKind::PoliticalLeaning, &self.political_leaning),
        ];
        let lists = [
            (FactorKind::ConspiracyMentioned, &self.conspiracies.mentioned),
            (FactorKind::ConspiracyPromoted, &self.conspiracies.promoted),
            (FactorKind::Trope, &self.tropes),
            (FactorKind::PersuasionTechnique, &self.persuasion_techniques),
        ];

        let mut out: Vec<FactorValue> = singles
            .into_iter()
            .filter_map(|(kind, label)| label.as_deref().and_then(|l| FactorValue::new(kind, l)))
            .collect();
        for (kind, labels) in lists {
            out.extend(labels.iter().filter_map(|l| FactorValue::new(kind, l)));
        }
        out
    }
}

/// Classifies claim text into emotion, sentiment, political leaning,
/// conspiracy, trope and persuasion-technique factors.
pub struct FactorStep {
    agent: ureq::Agent,
    endpoint: String,
    max_length: usize,
}

impl FactorStep {
    pub const NAME: &'static str = "enricher.factors";

    /// `api_url` is the server root; requests go to `{api_url}/predict`.
    pub fn new(api_url: &str, max_length: usize, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(&user_agent())
            .build();
        Self {
            agent,
            endpoint: format!("{}/predict", api_url.trim_end_matches('/')),
            max_length,
        }
    }

    fn malformed(message: impl Into<String>) -> EnrichmentError {
        EnrichmentError::MalformedResponse {
            step: Self::NAME.into(),
            message: message.into(),
        }
    }
}

/// Extract the single result object from a `/predict` response.
pub fn first_result(response: &Value) -> Result<Value, EnrichmentError> {
    if let Some(err) = response.get("error").and_then(Value::as_str) {
        return Err(EnrichmentError::Model {
            step: FactorStep::NAME.into(),
            message: err.to_string(),
        });
    }
    let result = response
        .get("results")
        .and_then(Value::as_array)
        .and_then(|r| r.first())
        .ok_or_else(|| FactorStep::malformed("response has no `results`"))?;
    if !result.is_object() {
        return Err(FactorStep::malformed("result is not an object"));
    }
    Ok(result.clone())
}

impl EnrichmentStep for FactorStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input(&self, review: &ClaimReview) -> Option<String> {
        Some(review.claim.text().to_string())
    }

    fn invoke(&self, input: &str) -> Result<Value, EnrichmentError> {
        let body = json!({
            "texts": [input],
            "batch_size": 1,
            "max_length": self.max_length,
        });
        let resp = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map_err(|e| classify_ureq(Self::NAME, e))?;
        let text = resp.into_string().map_err(|e| EnrichmentError::Transport {
            step: Self::NAME.into(),
            message: e.to_string(),
        })?;
        let json: Value = serde_json::from_str(&text).map_err(|e| Self::malformed(e.to_string()))?;
        first_result(&json)
    }

    fn apply(&self, review: &mut ClaimReview, data: &Value) -> Result<(), EnrichmentError> {
        let result: FactorResult =
            serde_json::from_value(data.clone()).map_err(|e| Self::malformed(e.to_string()))?;
        review.claim.factors = result.values().into_iter().collect();
        review.claim.climate_related = result.climate_related;
        Ok(())
    }
}
