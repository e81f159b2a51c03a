use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{CodeableConcept, Identifier, Reference, Resource};

/// Collection for order lines asking a practitioner to prescribe.
pub const PROPOSAL_COLLECTION: &str = "ProposalMedicationRequest";
/// Collection for order lines authorized by a practitioner.
pub const PRESCRIPTION_COLLECTION: &str = "PrescriptionMedicationRequest";

/// An order line. Proposals and prescriptions share this shape and differ
/// only in the collection they are posted to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRequest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub based_on: Vec<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_prescription: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_identifier: Option<Identifier>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MedicationRequest {
    pub fn proposal(patient_id: &str) -> Self {
        Self {
            status: Some("active".to_string()),
            intent: Some("proposal".to_string()),
            subject: Some(Reference::to(format!("Patient/{patient_id}"))),
            ..Self::default()
        }
    }

    pub fn prescription(patient_id: &str) -> Self {
        Self {
            intent: Some("order".to_string()),
            ..Self::proposal(patient_id)
        }
    }

    pub fn with_based_on(mut self, reference: impl Into<String>) -> Self {
        self.based_on.push(Reference::to(reference));
        self
    }

    pub fn with_prior_prescription(mut self, reference: impl Into<String>) -> Self {
        self.prior_prescription = Some(Reference::to(reference));
        self
    }
}

impl Resource for MedicationRequest {
    const RESOURCE_TYPE: &'static str = "MedicationRequest";
    const COLLECTION: Option<&'static str> = None;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A pharmacy's record of having handed out medication against a prescription.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationDispense {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub dispense_type: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorizing_prescription: Vec<Reference>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MedicationDispense {
    pub fn for_prescription(patient_id: &str, prescription: impl Into<String>) -> Self {
        Self {
            subject: Some(Reference::to(format!("Patient/{patient_id}"))),
            authorizing_prescription: vec![Reference::to(prescription)],
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_type(mut self, concept: CodeableConcept) -> Self {
        self.dispense_type = Some(concept);
        self
    }
}

impl Resource for MedicationDispense {
    const RESOURCE_TYPE: &'static str = "MedicationDispense";

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{from_value, to_json};
    use serde_json::json;

    #[test]
    fn test_prescription_wire_shape() {
        let request = MedicationRequest::prescription("p1")
            .with_based_on("ProposalMedicationRequest/x1")
            .with_prior_prescription("PrescriptionMedicationRequest/r0");
        let value = to_json(&request).unwrap();
        assert_eq!(value["intent"], "order");
        assert_eq!(value["basedOn"][0]["reference"], "ProposalMedicationRequest/x1");
        assert_eq!(
            value["priorPrescription"]["reference"],
            "PrescriptionMedicationRequest/r0"
        );
    }

    #[test]
    fn test_dispense_type_field_name() {
        let raw = json!({
            "resourceType": "MedicationDispense",
            "id": "d1",
            "status": "completed",
            "type": {"coding": [{"code": "FFC"}]},
            "authorizingPrescription": [{"reference": "PrescriptionMedicationRequest/r1"}]
        });
        let dispense: MedicationDispense = from_value(raw).unwrap();
        assert_eq!(
            dispense.dispense_type.as_ref().and_then(|t| t.first_code()),
            Some("FFC")
        );
        assert_eq!(dispense.authorizing_prescription.len(), 1);
    }
}
