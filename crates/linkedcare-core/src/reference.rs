//! Reference and locator helpers.
//!
//! Linked Care references carry a locator prefix that varies between servers
//! and between the relative and absolute forms:
//! - Relative: `PrescriptionMedicationRequest/r1`
//! - Versioned: `PrescriptionMedicationRequest/r1/_history/2`
//! - Absolute: `https://lc.example.org/fhir/PrescriptionMedicationRequest/r1`
//!
//! Chain resolution therefore matches references by containment of the bare
//! target id rather than by equality.
//!
//! # Example
//!
//! ```
//! use linkedcare_core::reference::{bare_id, references};
//!
//! assert_eq!(bare_id("https://lc.example.org/fhir/Patient/abc123/_history/4"), "abc123");
//! assert!(references("ProposalMedicationRequest/P1", "P1"));
//! assert!(!references("ProposalMedicationRequest/P1", ""));
//! ```

use std::fmt;

/// A locator split into collection, id and optional version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocator {
    /// Collection name (e.g. "Patient", "ProposalMedicationRequest")
    pub collection: String,
    /// Record id
    pub id: String,
    /// Optional version id from a `_history` suffix
    pub version: Option<String>,
}

impl ResourceLocator {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            version: None,
        }
    }

    /// Returns the locator as `Collection/id`.
    pub fn to_relative(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_relative())
    }
}

/// Parses `Collection/id[/_history/version]`, optionally behind a URL prefix.
///
/// The last `Collection/id` pair in the path wins, so any base address in
/// front of it is ignored. Returns `None` when no such pair exists.
pub fn parse_locator(locator: &str) -> Option<ResourceLocator> {
    let path = locator.trim().split(['?', '#']).next().unwrap_or("");
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let (pair_end, version) = match segments.iter().rposition(|s| *s == "_history") {
        Some(pos) => (pos, segments.get(pos + 1).map(|v| v.to_string())),
        None => (segments.len(), None),
    };
    if pair_end < 2 {
        return None;
    }

    let collection = segments[pair_end - 2];
    let id = segments[pair_end - 1];
    if !collection
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_uppercase())
    {
        return None;
    }

    Some(ResourceLocator {
        collection: collection.to_string(),
        id: id.to_string(),
        version,
    })
}

/// Bare id of a reference or locator; the input itself when it has no path.
pub fn bare_id(reference: &str) -> &str {
    let path = reference.trim().split(['?', '#']).next().unwrap_or("");
    let mut segments = path.rsplit('/').filter(|s| !s.is_empty());
    let last = segments.next().unwrap_or("");
    match segments.next() {
        Some("_history") => {
            // Collection/id/_history/version: skip the version marker
            segments.next().unwrap_or(last)
        }
        _ => last,
    }
}

/// Whether `reference` points at the record with id `target_id`.
///
/// Matching is substring containment of the bare id so that any locator
/// prefix is tolerated. An empty id never matches.
pub fn references(reference: &str, target_id: &str) -> bool {
    !target_id.is_empty() && reference.contains(target_id)
}
