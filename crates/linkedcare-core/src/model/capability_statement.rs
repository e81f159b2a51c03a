use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Resource;

/// Server-declared protocol version and supported interactions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatement {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<Software>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rest: Vec<CapabilityRest>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Software {
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CapabilityRest {
    #[serde(default)]
    pub mode: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<CapabilityResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operation: Vec<CapabilityOperation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CapabilityResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interaction: Vec<CapabilityInteraction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operation: Vec<CapabilityOperation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CapabilityInteraction {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CapabilityOperation {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

impl CapabilityStatement {
    /// Resource types declared by any `server` rest block.
    pub fn resource_types(&self) -> Vec<&str> {
        self.server_rest()
            .flat_map(|r| r.resource.iter())
            .map(|r| r.resource_type.as_str())
            .collect()
    }

    /// Whether `interaction` (e.g. `create`, `delete`) is declared for `resource_type`.
    pub fn supports_interaction(&self, resource_type: &str, interaction: &str) -> bool {
        self.server_rest()
            .flat_map(|r| r.resource.iter())
            .filter(|r| r.resource_type == resource_type)
            .any(|r| r.interaction.iter().any(|i| i.code == interaction))
    }

    /// Names of all system- and type-level operations.
    pub fn operations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for rest in self.server_rest() {
            names.extend(rest.operation.iter().map(|o| o.name.as_str()));
            for resource in &rest.resource {
                names.extend(resource.operation.iter().map(|o| o.name.as_str()));
            }
        }
        names.sort_unstable();
        names.dedup();
        names
    }

    fn server_rest(&self) -> impl Iterator<Item = &CapabilityRest> {
        self.rest.iter().filter(|r| r.mode == "server")
    }
}

impl Resource for CapabilityStatement {
    const RESOURCE_TYPE: &'static str = "CapabilityStatement";

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::from_json;

    const BODY: &str = r#"{
        "resourceType": "CapabilityStatement",
        "status": "active",
        "fhirVersion": "5.0.0",
        "software": {"name": "LinkedCare", "version": "1.4"},
        "rest": [{
            "mode": "server",
            "operation": [{"name": "everything"}],
            "resource": [
                {"type": "Patient", "interaction": [{"code": "create"}, {"code": "read"}]},
                {"type": "RequestOrchestration",
                 "interaction": [{"code": "create"}, {"code": "delete"}],
                 "operation": [{"name": "cancel"}, {"name": "everything"}]}
            ]
        }]
    }"#;

    #[test]
    fn test_capability_queries() {
        let cs: CapabilityStatement = from_json(BODY).unwrap();
        assert_eq!(cs.fhir_version.as_deref(), Some("5.0.0"));
        assert_eq!(cs.resource_types(), vec!["Patient", "RequestOrchestration"]);
        assert!(cs.supports_interaction("RequestOrchestration", "delete"));
        assert!(!cs.supports_interaction("Patient", "delete"));
        assert_eq!(cs.operations(), vec!["cancel", "everything"]);
    }
}
