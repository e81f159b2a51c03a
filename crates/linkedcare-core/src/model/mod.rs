//! Typed Linked Care resources.
//!
//! Only the fields inspected by the client and the chain resolver are typed.
//! Everything else lands in a flattened `extra` map so that records survive a
//! parse/serialize cycle unchanged.
//!
//! The wire `resourceType` is not stored on the structs; [`to_json`] adds it
//! and [`from_json`] checks it against [`Resource::RESOURCE_TYPE`].

mod bundle;
mod capability_statement;
mod datatypes;
mod medication;
mod operation_outcome;
mod patient;
mod request_orchestration;

pub use bundle::{Bundle, BundleEntry, BundleEntryRequest, BundleEntryResponse};
pub use capability_statement::{
    CapabilityInteraction, CapabilityOperation, CapabilityResource, CapabilityRest,
    CapabilityStatement, Software,
};
pub use datatypes::{CodeableConcept, Coding, HumanName, Identifier, Reference};
pub use medication::{
    MedicationDispense, MedicationRequest, PRESCRIPTION_COLLECTION, PROPOSAL_COLLECTION,
};
pub use operation_outcome::{IssueLine, OperationOutcome, OperationOutcomeIssue};
pub use patient::Patient;
pub use request_orchestration::RequestOrchestration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CoreError, Result};

/// A resource kind that can be exchanged with a Linked Care server.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Wire `resourceType` value.
    const RESOURCE_TYPE: &'static str;

    /// Default server collection for this kind.
    ///
    /// `None` means the kind is posted to several collections and callers must
    /// name one explicitly.
    const COLLECTION: Option<&'static str> = Some(Self::RESOURCE_TYPE);

    /// Server-assigned id, empty until the record has been created.
    fn id(&self) -> &str;
}

/// Serializes a resource and stamps its `resourceType`.
pub fn to_json<R: Resource>(resource: &R) -> Result<Value> {
    let mut value = serde_json::to_value(resource)?;
    let map = value
        .as_object_mut()
        .ok_or_else(|| CoreError::invalid_resource("resource did not serialize to an object"))?;
    map.insert(
        "resourceType".to_string(),
        Value::String(R::RESOURCE_TYPE.to_string()),
    );
    Ok(value)
}

/// Parses a resource from a JSON value, rejecting any other `resourceType`.
pub fn from_value<R: Resource>(mut value: Value) -> Result<R> {
    let map = value
        .as_object_mut()
        .ok_or_else(|| CoreError::invalid_resource("expected a JSON object"))?;
    let actual = match map.remove("resourceType") {
        Some(Value::String(rt)) => rt,
        _ => return Err(CoreError::MissingResourceType),
    };
    if actual != R::RESOURCE_TYPE {
        return Err(CoreError::unexpected_resource_type(R::RESOURCE_TYPE, actual));
    }
    Ok(serde_json::from_value(value)?)
}

/// Parses a resource from a response body.
pub fn from_json<R: Resource>(body: &str) -> Result<R> {
    from_value(serde_json::from_str(body)?)
}

/// Returns the `resourceType` of a raw payload, if any.
pub fn resource_type_of(value: &Value) -> Option<&str> {
    value.get("resourceType").and_then(Value::as_str)
}
