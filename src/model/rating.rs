//! Rating label normalization onto the ontology's closed vocabulary.

/// Normalized rating labels the ontology defines individuals for.
pub const VALID_NORMALIZED_RATINGS: &[&str] = &[
    "misinformed_or_potentially_misleading",
    "not_misleading",
    "uncertain",
    "not_credible",
    "not_verifiable",
    "credible",
    "mostly_credible",
];

/// Map a raw rating label onto the closed vocabulary.
///
/// `true`/`false` map to `credible`/`not_credible`; anything else is
/// lower-cased with `-`, `/` and whitespace turned into `_` and accepted
/// only if it lands in [`VALID_NORMALIZED_RATINGS`].
pub fn normalize_rating_label(label: &str) -> Option<String> {
    let cleaned = label.trim();
    if cleaned.is_empty() {
        return None;
    }
    let lowered = cleaned.to_lowercase();
    match lowered.as_str() {
        "false" => return Some("not_credible".into()),
        "true" => return Some("credible".into()),
        _ => {}
    }

    let replaced = lowered.replace(['-', '/'], "_");
    let normalized = replaced.split_whitespace().collect::<Vec<_>>().join("_");
    is_valid_normalized_rating(&normalized).then_some(normalized)
}

/// Whether `label` is one of the ontology's normalized rating labels.
pub fn is_valid_normalized_rating(label: &str) -> bool {
    VALID_NORMALIZED_RATINGS.contains(&label)
}
