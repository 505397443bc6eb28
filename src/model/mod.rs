//! Canonical in-memory entities and their identifier rules.
//!
//! Every entity's URI is a pure function of its own normalized fields: the
//! same logical record yields the same URI in any run and from any source,
//! which is what lets graphs from independent sources merge in the triple
//! store without a central registry.

pub mod claim;
pub mod factor;
pub mod rating;
pub mod review;

use std::fmt;

pub use claim::{Claim, LinkedEntity, PropertyValue, ValueKind};
pub use factor::{FactorKind, FactorValue};
pub use rating::{VALID_NORMALIZED_RATINGS, normalize_rating_label};
pub use review::{ClaimReview, Organization, Person, Rating};

use crate::hash::uri_hash;

/// Entity-type tags; the first hashed part of every identifier.
pub const CLAIM_TAG: &str = "claim";
pub const CLAIM_REVIEW_TAG: &str = "claim-review";
pub const ORGANIZATION_TAG: &str = "organization";
pub const PERSON_TAG: &str = "person";
pub const RATING_TAG: &str = "rating";

/// A URI path relative to the configured base, e.g. `claim/<hash>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativeUri(String);

impl RelativeUri {
    fn hashed(tag: &str, hash: String) -> Self {
        Self(format!("{tag}/{hash}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve against `base`. Paths that are already absolute HTTP(S)
    /// IRIs pass through unchanged.
    pub fn resolve(&self, base: &str) -> String {
        resolve(base, &self.0)
    }
}

impl fmt::Display for RelativeUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Join a relative path onto a base URI with exactly one slash.
pub fn resolve(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Borrowed view over any identifiable entity.
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Claim(&'a Claim),
    ClaimReview(&'a ClaimReview),
    Organization(&'a Organization),
    Person(&'a Person),
    Rating(&'a Rating),
}

impl Entity<'_> {
    pub fn relative_uri(&self) -> RelativeUri {
        match self {
            Entity::Claim(c) => claim_uri(c),
            Entity::ClaimReview(r) => claim_review_uri(r),
            Entity::Organization(o) => organization_uri(o),
            Entity::Person(p) => person_uri(p),
            Entity::Rating(r) => rating_uri(r),
        }
    }

    pub fn uri(&self, base: &str) -> String {
        self.relative_uri().resolve(base)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Claim(_) => "Claim",
            Entity::ClaimReview(_) => "ClaimReview",
            Entity::Organization(_) => "Organization",
            Entity::Person(_) => "Person",
            Entity::Rating(_) => "Rating",
        }
    }
}

/// `claim/<sha224(claim, identity text)>`
pub fn claim_uri(claim: &Claim) -> RelativeUri {
    let identity = claim.identity();
    RelativeUri::hashed(
        CLAIM_TAG,
        uri_hash([Some(CLAIM_TAG), Some(identity.as_str())]),
    )
}

/// `claim-review/<sha224(claim-review, claim, rating label?, url, date?)>`
///
/// Language, author and review body are not hashed.
pub fn claim_review_uri(review: &ClaimReview) -> RelativeUri {
    let identity = review.claim.identity();
    let label = review.rating.as_ref().and_then(Rating::identity_label);
    RelativeUri::hashed(
        CLAIM_REVIEW_TAG,
        uri_hash([
            Some(CLAIM_REVIEW_TAG),
            Some(identity.as_str()),
            label.as_deref(),
            Some(review.url_identity()),
            review.date_published(),
        ]),
    )
}

/// `organization/<sha224(organization, name)>`
pub fn organization_uri(org: &Organization) -> RelativeUri {
    RelativeUri::hashed(
        ORGANIZATION_TAG,
        uri_hash([Some(ORGANIZATION_TAG), Some(org.name())]),
    )
}

/// `person/<sha224(person, name, website?, role?)>`
pub fn person_uri(person: &Person) -> RelativeUri {
    RelativeUri::hashed(
        PERSON_TAG,
        uri_hash([
            Some(PERSON_TAG),
            Some(person.name()),
            person.website(),
            person.role(),
        ]),
    )
}

/// `rating/<sha224(rating, original label or normalized label)>`
pub fn rating_uri(rating: &Rating) -> RelativeUri {
    let key = rating.original_label().or(rating.normalized_label());
    RelativeUri::hashed(RATING_TAG, uri_hash([Some(RATING_TAG), key]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://data.climatesense-project.eu";

    fn review(text: &str, url: &str, date: Option<&str>, label: &str) -> ClaimReview {
        let mut r = ClaimReview::new(Claim::new(text).unwrap(), url)
            .unwrap()
            .with_rating(Rating::new(None, Some(label)).unwrap());
        if let Some(d) = date {
            r = r.with_date(d).unwrap();
        }
        r
    }

    #[test]
    fn uris_resolve_against_base() {
        let c = Claim::new("CO2 is plant food").unwrap();
        let uri = Entity::Claim(&c).uri(BASE);
        assert!(uri.starts_with("http://data.climatesense-project.eu/claim/"));
        assert_eq!(uri.len(), BASE.len() + "/claim/".len() + 56);
        assert_eq!(Entity::Claim(&c).uri(&format!("{BASE}/")), uri);
    }

    #[test]
    fn resolve_passes_absolute_iris_through() {
        assert_eq!(resolve(BASE, "https://x.org/a"), "https://x.org/a");
        assert_eq!(resolve("http://b/", "/rating/credible"), "http://b/rating/credible");
    }

    #[test]
    fn claim_uri_ignores_case_and_spacing() {
        let a = Claim::new("Sea levels are RISING").unwrap();
        let b = Claim::new("  sea levels   are rising ").unwrap();
        assert_eq!(claim_uri(&a), claim_uri(&b));
    }

    #[test]
    fn distinct_claims_get_distinct_uris() {
        let a = Claim::new("Sea levels are rising").unwrap();
        let b = Claim::new("Sea levels are falling").unwrap();
        assert_ne!(claim_uri(&a), claim_uri(&b));
    }

    #[test]
    fn same_review_from_two_sources_dedups() {
        let a = review(
            "The Arctic will be ice-free by 2013",
            "https://climatefeedback.org/claimreview/arctic/",
            Some("2020-01-02"),
            "False",
        );
        let mut b = review(
            "the arctic will be  ice-free by 2013",
            "http://ClimateFeedback.org/claimreview/arctic?utm_campaign=x",
            Some("2020-01-02T09:00:00Z"),
            "false",
        );
        b = b.with_language("en").with_review_body("Different body text");
        assert_eq!(claim_review_uri(&a), claim_review_uri(&b));
    }

    #[test]
    fn missing_date_changes_review_uri() {
        let dated = review("x claim", "example.org/r", Some("2020-01-02"), "False");
        let undated = review("x claim", "example.org/r", None, "False");
        assert_ne!(claim_review_uri(&dated), claim_review_uri(&undated));
    }

    #[test]
    fn rating_label_changes_review_uri() {
        let a = review("x claim", "example.org/r", None, "False");
        let b = review("x claim", "example.org/r", None, "True");
        assert_ne!(claim_review_uri(&a), claim_review_uri(&b));
    }

    #[test]
    fn labels_outside_the_vocabulary_stay_distinct() {
        let pants = review("x claim", "example.org/r", None, "Pants on fire");
        let mostly = review("x claim", "example.org/r", None, "Mostly accurate");
        let unrated = ClaimReview::new(Claim::new("x claim").unwrap(), "example.org/r").unwrap();
        assert_ne!(claim_review_uri(&pants), claim_review_uri(&mostly));
        assert_ne!(claim_review_uri(&pants), claim_review_uri(&unrated));
        assert_ne!(claim_review_uri(&mostly), claim_review_uri(&unrated));

        let shouting = review("x claim", "example.org/r", None, "  PANTS on   Fire ");
        assert_eq!(claim_review_uri(&pants), claim_review_uri(&shouting));
    }

    #[test]
    fn rating_uri_prefers_original_label() {
        let a = Rating::new(Some("not_credible"), Some("Incorrect")).unwrap();
        let b = Rating::new(None, Some("Incorrect")).unwrap();
        let c = Rating::new(Some("not_credible"), None).unwrap();
        assert_eq!(rating_uri(&a), rating_uri(&b));
        assert_ne!(rating_uri(&a), rating_uri(&c));
    }

    #[test]
    fn organization_uri_collapses_whitespace_only() {
        let a = Organization::new("Climate Feedback").unwrap();
        let b = Organization::new(" Climate\tFeedback ").unwrap();
        let c = Organization::new("climate feedback").unwrap();
        assert_eq!(organization_uri(&a), organization_uri(&b));
        assert_ne!(organization_uri(&a), organization_uri(&c));
    }

    #[test]
    fn person_uri_separates_roles_and_sites() {
        let plain = Person::new("Jane Doe").unwrap();
        let reviewer = Person::new("Jane Doe").unwrap().with_role("Reviewer");
        let sited = Person::new("Jane Doe").unwrap().with_website("https://jd.example");
        assert_ne!(person_uri(&plain), person_uri(&reviewer));
        assert_ne!(person_uri(&plain), person_uri(&sited));
        assert_ne!(person_uri(&reviewer), person_uri(&sited));
        assert_eq!(
            person_uri(&plain),
            person_uri(&Person::new(" Jane  Doe").unwrap().with_same_as("https://x.org/p/1"))
        );
        assert!(Entity::Person(&plain).uri(BASE).starts_with(&format!("{BASE}/person/")));
    }

    #[test]
    fn uris_are_pinned() {
        let c = Claim::new("Test").unwrap();
        assert_eq!(
            claim_uri(&c).as_str(),
            format!("claim/{}", uri_hash([Some("claim"), Some("test")]))
        );
    }
}
