//! Enrichment factor vocabulary.
//!
//! Factor values come from a small closed vocabulary defined by the
//! ontology, so their URIs are slug paths (`{base}/emotion/anger`) rather
//! than content hashes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::slugify;

/// Which classification a factor value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    Emotion,
    Sentiment,
    PoliticalLeaning,
    ConspiracyMentioned,
    ConspiracyPromoted,
    Trope,
    PersuasionTechnique,
}

impl FactorKind {
    /// Path segment under the base URI where values of this kind live.
    /// Mentioned and promoted conspiracies share one value space.
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Emotion => "emotion",
            Self::Sentiment => "sentiment",
            Self::PoliticalLeaning => "political-leaning",
            Self::ConspiracyMentioned | Self::ConspiracyPromoted => "conspiracy",
            Self::Trope => "trope",
            Self::PersuasionTechnique => "persuasion-technique",
        }
    }

    /// Local name of the linking predicate in the CIMPLE ontology.
    pub fn predicate(self) -> &'static str {
        match self {
            Self::Emotion => "hasEmotion",
            Self::Sentiment => "hasSentiment",
            Self::PoliticalLeaning => "hasPoliticalLeaning",
            Self::ConspiracyMentioned => "mentionsConspiracy",
            Self::ConspiracyPromoted => "promotesConspiracy",
            Self::Trope => "hasTrope",
            Self::PersuasionTechnique => "hasPersuasionTechnique",
        }
    }
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.predicate())
    }
}

/// One labeled classification result attached to a claim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactorValue {
    pub kind: FactorKind,
    pub slug: String,
}

impl FactorValue {
    /// Build a factor value from a raw classifier label.
    ///
    /// Returns `None` for empty labels and for the literal `"none"` some
    /// classifiers emit when no class applies.
    pub fn new(kind: FactorKind, label: &str) -> Option<Self> {
        let slug = slugify(label);
        if slug.is_empty() || slug == "none" {
            return None;
        }
        Some(Self { kind, slug })
    }

    /// Path relative to the base URI, e.g. `political-leaning/left`.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.kind.path_segment(), self.slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_paths() {
        let v = FactorValue::new(FactorKind::PoliticalLeaning, "Left").unwrap();
        assert_eq!(v.relative_path(), "political-leaning/left");

        let t = FactorValue::new(FactorKind::Trope, " Climate Hoax ").unwrap();
        assert_eq!(t.relative_path(), "trope/climate_hoax");
    }

    #[test]
    fn none_labels_are_dropped() {
        assert!(FactorValue::new(FactorKind::Emotion, "None").is_none());
        assert!(FactorValue::new(FactorKind::Emotion, "   ").is_none());
    }

    #[test]
    fn conspiracies_share_a_value_space() {
        let m = FactorValue::new(FactorKind::ConspiracyMentioned, "chemtrails").unwrap();
        let p = FactorValue::new(FactorKind::ConspiracyPromoted, "chemtrails").unwrap();
        assert_eq!(m.relative_path(), p.relative_path());
        assert_ne!(m.kind.predicate(), p.kind.predicate());
    }
}
