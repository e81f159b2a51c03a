use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{HumanName, Identifier, Resource};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Patient {
    pub fn display_name(&self) -> String {
        self.name
            .first()
            .map(HumanName::display)
            .unwrap_or_default()
    }
}

impl Resource for Patient {
    const RESOURCE_TYPE: &'static str = "Patient";

    fn id(&self) -> &str {
        &self.id
    }
}
