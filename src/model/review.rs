use super::claim::Claim;
use super::rating::normalize_rating_label;
use crate::error::ValidationError;
use crate::normalize::{
    collapse_whitespace, identity_text, normalize_text, normalize_url, parse_date, sanitize_url,
};

/// A fact-checker's verdict on a claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimReview {
    pub claim: Claim,
    review_url: String,
    url_identity: String,
    date_published: Option<String>,
    pub rating: Option<Rating>,
    pub author: Option<Organization>,
    /// Individual authors, linked with `schema:author` next to the
    /// organization.
    pub persons: Vec<Person>,
    pub language: Option<String>,
    pub review_body: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub license: Option<String>,
    /// Main text of the review page, filled in by the URL text step.
    pub url_text: Option<String>,
}

impl ClaimReview {
    /// Build a review of `claim` published at `review_url`.
    ///
    /// The URL must carry a host, or be a `urn:` identifier for sources
    /// whose reviews have no web page.
    pub fn new(claim: Claim, review_url: &str) -> Result<Self, ValidationError> {
        let trimmed = review_url.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingIdentity {
                entity: "ClaimReview",
                field: "review_url",
            });
        }
        let invalid = || ValidationError::InvalidUrl {
            value: trimmed.to_string(),
        };
        let url_identity = normalize_url(trimmed).ok_or_else(invalid)?;
        let review_url = if url_identity.starts_with("urn:") {
            url_identity.clone()
        } else {
            sanitize_url(trimmed).ok_or_else(invalid)?
        };
        Ok(Self {
            claim,
            review_url,
            url_identity,
            date_published: None,
            rating: None,
            author: None,
            persons: Vec::new(),
            language: None,
            review_body: None,
            description: None,
            keywords: Vec::new(),
            license: None,
            url_text: None,
        })
    }

    /// Set the publication date. An unparseable date is an error rather
    /// than silently absent, since the date is part of the identifier.
    pub fn with_date(mut self, raw: &str) -> Result<Self, ValidationError> {
        if raw.trim().is_empty() {
            return Ok(self);
        }
        let date = parse_date(raw).ok_or_else(|| ValidationError::InvalidDate {
            entity: "ClaimReview",
            value: raw.to_string(),
        })?;
        self.date_published = Some(date);
        Ok(self)
    }

    pub fn with_rating(mut self, rating: Rating) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_author(mut self, author: Organization) -> Self {
        self.author = Some(author);
        self
    }

    /// Add an individual author, ignoring duplicates.
    pub fn with_person(mut self, person: Person) -> Self {
        if !self.persons.contains(&person) {
            self.persons.push(person);
        }
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        let l = language.trim().to_lowercase();
        self.language = (!l.is_empty()).then_some(l);
        self
    }

    pub fn with_review_body(mut self, body: &str) -> Self {
        let b = normalize_text(body);
        self.review_body = (!b.is_empty()).then_some(b);
        self
    }

    /// Review URL in the form emitted into the graph.
    pub fn review_url(&self) -> &str {
        &self.review_url
    }

    /// `host/path/` form the identifier is derived from.
    pub fn url_identity(&self) -> &str {
        &self.url_identity
    }

    pub fn date_published(&self) -> Option<&str> {
        self.date_published.as_deref()
    }
}

/// A fact-checking organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    name: String,
    pub website: Option<String>,
}

impl Organization {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let name = collapse_whitespace(name);
        if name.is_empty() {
            return Err(ValidationError::MissingIdentity {
                entity: "Organization",
                field: "name",
            });
        }
        Ok(Self {
            name,
            website: None,
        })
    }

    pub fn with_website(mut self, url: &str) -> Self {
        self.website = sanitize_url(url);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A person credited on a review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    name: String,
    website: Option<String>,
    role: Option<String>,
    /// IRI the source itself uses for this person.
    pub same_as: Option<String>,
}

impl Person {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let name = collapse_whitespace(name);
        if name.is_empty() {
            return Err(ValidationError::MissingIdentity {
                entity: "Person",
                field: "name",
            });
        }
        Ok(Self {
            name,
            website: None,
            role: None,
            same_as: None,
        })
    }

    pub fn with_website(mut self, url: &str) -> Self {
        self.website = sanitize_url(url);
        self
    }

    /// Job title or role on the review, e.g. "Reviewer".
    pub fn with_role(mut self, role: &str) -> Self {
        let r = collapse_whitespace(role);
        self.role = (!r.is_empty()).then_some(r);
        self
    }

    pub fn with_same_as(mut self, iri: &str) -> Self {
        self.same_as = sanitize_url(iri);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }
}

/// A verdict attached to a review.
#[derive(Debug, Clone, PartialEq)]
pub struct Rating {
    label: Option<String>,
    original_label: Option<String>,
    pub value: Option<f32>,
    pub best: Option<i64>,
    pub worst: Option<i64>,
    pub explanation: Option<String>,
}

impl Rating {
    /// Build a rating from a source's labels.
    ///
    /// `label` is the source's already-normalized verdict if it has one,
    /// `original_label` the fact-checker's own wording. The normalized
    /// label is taken from whichever maps onto the closed vocabulary. A
    /// `label` outside the vocabulary is kept as the original wording when
    /// none was given.
    pub fn new(label: Option<&str>, original_label: Option<&str>) -> Result<Self, ValidationError> {
        let clean = |s: Option<&str>| s.map(collapse_whitespace).filter(|s| !s.is_empty());
        let label_raw = clean(label);
        let mut original = clean(original_label);

        let normalized = label_raw
            .as_deref()
            .and_then(normalize_rating_label)
            .or_else(|| original.as_deref().and_then(normalize_rating_label));
        if original.is_none() && normalized.is_none() {
            original = label_raw;
        }
        if original.is_none() && normalized.is_none() {
            return Err(ValidationError::MissingIdentity {
                entity: "Rating",
                field: "label",
            });
        }
        Ok(Self {
            label: normalized,
            original_label: original,
            value: None,
            best: None,
            worst: None,
            explanation: None,
        })
    }

    /// Label from the closed rating vocabulary, if the source's wording
    /// maps onto it.
    pub fn normalized_label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn original_label(&self) -> Option<&str> {
        self.original_label.as_deref()
    }

    /// Rating part of a review identifier: the normalized label, else
    /// the case-folded original wording.
    pub fn identity_label(&self) -> Option<String> {
        self.label
            .clone()
            .or_else(|| self.original_label.as_deref().map(identity_text))
            .filter(|l| !l.is_empty())
    }

    /// Human-readable name: the original wording when known.
    pub fn display_name(&self) -> &str {
        self.original_label
            .as_deref()
            .or(self.label.as_deref())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim() -> Claim {
        Claim::new("The Arctic will be ice-free by 2013").unwrap()
    }

    #[test]
    fn review_url_must_have_a_host() {
        assert!(matches!(
            ClaimReview::new(claim(), "  "),
            Err(ValidationError::MissingIdentity { .. })
        ));
        assert!(matches!(
            ClaimReview::new(claim(), "ftp://x.org/a"),
            Err(ValidationError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn review_keeps_emitted_and_identity_urls() {
        let r = ClaimReview::new(claim(), "https://Example.org/fc/1?ref=tw").unwrap();
        assert_eq!(r.review_url(), "https://example.org/fc/1?ref=tw");
        assert_eq!(r.url_identity(), "example.org/fc/1/");

        let u = ClaimReview::new(claim(), "urn:climate-fever:claim:12").unwrap();
        assert_eq!(u.review_url(), "urn:climate-fever:claim:12");
    }

    #[test]
    fn dates_are_validated() {
        let r = ClaimReview::new(claim(), "example.org/a")
            .unwrap()
            .with_date("2021-03-04T08:00:00Z")
            .unwrap();
        assert_eq!(r.date_published(), Some("2021-03-04"));

        let err = ClaimReview::new(claim(), "example.org/a")
            .unwrap()
            .with_date("last tuesday")
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDate { .. }));
    }

    #[test]
    fn organization_requires_a_name() {
        assert!(Organization::new(" \n ").is_err());
        assert_eq!(Organization::new(" Climate  Feedback ").unwrap().name(), "Climate Feedback");
    }

    #[test]
    fn person_fields_are_cleaned() {
        assert!(Person::new("  ").is_err());
        let p = Person::new(" Jane   Doe ")
            .unwrap()
            .with_role("  ")
            .with_website("example.org/jane");
        assert_eq!(p.name(), "Jane Doe");
        assert_eq!(p.role(), None);
        assert_eq!(p.website(), Some("https://example.org/jane"));

        let r = ClaimReview::new(claim(), "example.org/a")
            .unwrap()
            .with_person(p.clone())
            .with_person(p);
        assert_eq!(r.persons.len(), 1);
    }

    #[test]
    fn rating_labels() {
        let r = Rating::new(None, Some("False")).unwrap();
        assert_eq!(r.normalized_label(), Some("not_credible"));
        assert_eq!(r.original_label(), Some("False"));

        let r = Rating::new(Some("credible"), None).unwrap();
        assert_eq!(r.normalized_label(), Some("credible"));
        assert_eq!(r.original_label(), None);
        assert_eq!(r.display_name(), "credible");

        let r = Rating::new(Some("Pants on fire"), None).unwrap();
        assert_eq!(r.normalized_label(), None);
        assert_eq!(r.original_label(), Some("Pants on fire"));

        assert!(Rating::new(None, Some("  ")).is_err());
    }
}
