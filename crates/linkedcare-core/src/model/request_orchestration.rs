use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Identifier, Reference, Resource};

/// Order group: the container under which order lines are submitted together.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOrchestration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authored_on: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestOrchestration {
    /// An active order group for the given patient.
    pub fn for_patient(patient_id: &str) -> Self {
        Self {
            status: Some("active".to_string()),
            intent: Some("order".to_string()),
            subject: Some(Reference::to(format!("Patient/{patient_id}"))),
            ..Self::default()
        }
    }
}

impl Resource for RequestOrchestration {
    const RESOURCE_TYPE: &'static str = "RequestOrchestration";

    fn id(&self) -> &str {
        &self.id
    }
}
