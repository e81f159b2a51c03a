use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{CodeableConcept, Resource};

/// Structured error report returned by the server instead of the expected resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationOutcome {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub issue: Vec<OperationOutcomeIssue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationOutcomeIssue {
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One issue flattened for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueLine {
    pub severity: String,
    pub code: String,
    pub text: String,
}

impl OperationOutcomeIssue {
    /// `details.text`, then `diagnostics`, then the first detail code.
    pub fn text(&self) -> String {
        self.details
            .as_ref()
            .and_then(|d| d.text.clone())
            .or_else(|| self.diagnostics.clone())
            .or_else(|| {
                self.details
                    .as_ref()
                    .and_then(|d| d.first_code().map(str::to_string))
            })
            .unwrap_or_default()
    }
}

impl OperationOutcome {
    pub fn issues(&self) -> impl Iterator<Item = IssueLine> + '_ {
        self.issue.iter().map(|issue| IssueLine {
            severity: issue.severity.clone(),
            code: issue.code.clone(),
            text: issue.text(),
        })
    }

    pub fn has_errors(&self) -> bool {
        self.issue
            .iter()
            .any(|i| matches!(i.severity.as_str(), "error" | "fatal"))
    }
}

impl Resource for OperationOutcome {
    const RESOURCE_TYPE: &'static str = "OperationOutcome";

    fn id(&self) -> &str {
        &self.id
    }
}
