use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Resource, to_json};
use crate::error::Result;

/// A compound collection of records.
///
/// Search results arrive as `searchset` bundles whose entries carry a
/// `fullUrl` locator; order groups are submitted as `transaction` bundles.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub bundle_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<BundleEntryRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<BundleEntryResponse>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BundleEntryRequest {
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BundleEntryResponse {
    #[serde(default)]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,
}

impl BundleEntry {
    /// Locator string used for classification, empty when absent.
    pub fn locator(&self) -> &str {
        self.full_url.as_deref().unwrap_or("")
    }
}

impl Bundle {
    /// An empty transaction bundle.
    pub fn transaction() -> Self {
        Self {
            bundle_type: "transaction".to_string(),
            ..Self::default()
        }
    }

    /// Appends a create entry posting `resource` to `collection`.
    ///
    /// Returns the temporary `urn:uuid:` locator so later entries can
    /// reference this one before the server assigns an id.
    pub fn push_create<R: Resource>(&mut self, resource: &R, collection: &str) -> Result<String> {
        let full_url = format!("urn:uuid:{}", uuid::Uuid::new_v4());
        self.entry.push(BundleEntry {
            full_url: Some(full_url.clone()),
            resource: Some(to_json(resource)?),
            request: Some(BundleEntryRequest {
                method: "POST".to_string(),
                url: collection.to_string(),
            }),
            ..BundleEntry::default()
        });
        Ok(full_url)
    }

    /// Entries the server answered with a non-2xx status.
    pub fn failed_entries(&self) -> impl Iterator<Item = &BundleEntry> {
        self.entry.iter().filter(|e| {
            e.response
                .as_ref()
                .is_some_and(|r| !r.status.trim_start().starts_with('2'))
        })
    }
}

impl Resource for Bundle {
    const RESOURCE_TYPE: &'static str = "Bundle";

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MedicationRequest, PROPOSAL_COLLECTION, from_json};

    #[test]
    fn test_push_create_assigns_urn_locators() {
        let mut bundle = Bundle::transaction();
        let first = bundle
            .push_create(&MedicationRequest::proposal("p1"), PROPOSAL_COLLECTION)
            .unwrap();
        let second = bundle
            .push_create(&MedicationRequest::proposal("p1"), PROPOSAL_COLLECTION)
            .unwrap();

        assert!(first.starts_with("urn:uuid:"));
        assert_ne!(first, second);
        assert_eq!(bundle.entry.len(), 2);
        let request = bundle.entry[0].request.as_ref().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, PROPOSAL_COLLECTION);
        assert_eq!(
            bundle.entry[0].resource.as_ref().unwrap()["resourceType"],
            "MedicationRequest"
        );
    }

    #[test]
    fn test_failed_entries() {
        let body = r#"{
            "resourceType": "Bundle",
            "type": "transaction-response",
            "entry": [
                {"response": {"status": "201 Created", "location": "ProposalMedicationRequest/a"}},
                {"response": {"status": "400 Bad Request"}}
            ]
        }"#;
        let bundle: Bundle = from_json(body).unwrap();
        assert_eq!(bundle.failed_entries().count(), 1);
    }
}
