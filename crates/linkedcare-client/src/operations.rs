//! Named Linked Care operations, each shaped to one resource kind.

use linkedcare_core::chain::{ClassifiedChains, classify};
use linkedcare_core::model::{
    Bundle, MedicationDispense, MedicationRequest, PRESCRIPTION_COLLECTION, PROPOSAL_COLLECTION,
    Patient, RequestOrchestration, Resource,
};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::form_urlencoded;

use crate::error::{ClientError, Result};
use crate::exchange::ResourceExchange;
use crate::report::{DeleteOutcome, Outcome, log_failed_entries, log_issues, log_rejection};
use crate::transport::Session;

/// A named operation, listed for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub name: &'static str,
    pub summary: &'static str,
    /// Collection the operation writes to or reads from; `None` for the server root.
    pub collection: Option<&'static str>,
}

pub static CATALOG: &[OperationDescriptor] = &[
    OperationDescriptor {
        name: "create-patient",
        summary: "Register a patient",
        collection: Some(Patient::RESOURCE_TYPE),
    },
    OperationDescriptor {
        name: "create-order-group",
        summary: "Open an order group for a patient",
        collection: Some(RequestOrchestration::RESOURCE_TYPE),
    },
    OperationDescriptor {
        name: "submit-order-bundle",
        summary: "Submit an order group with its lines in one transaction",
        collection: None,
    },
    OperationDescriptor {
        name: "create-proposal-line",
        summary: "Propose a medication for prescription",
        collection: Some(PROPOSAL_COLLECTION),
    },
    OperationDescriptor {
        name: "create-prescription-line",
        summary: "Prescribe a medication, fulfilling a proposal or replacing a prescription",
        collection: Some(PRESCRIPTION_COLLECTION),
    },
    OperationDescriptor {
        name: "create-dispense",
        summary: "Record a pharmacy dispense against a prescription",
        collection: Some(MedicationDispense::RESOURCE_TYPE),
    },
    OperationDescriptor {
        name: "revoke-order-group",
        summary: "Delete an order group",
        collection: Some(RequestOrchestration::RESOURCE_TYPE),
    },
    OperationDescriptor {
        name: "read-patient",
        summary: "Read a patient by id",
        collection: Some(Patient::RESOURCE_TYPE),
    },
    OperationDescriptor {
        name: "query-chains-by-id",
        summary: "Fetch the order chain around one order line",
        collection: Some(MedicationRequest::RESOURCE_TYPE),
    },
    OperationDescriptor {
        name: "query-chains-in-window",
        summary: "Fetch order chains updated within a time window",
        collection: Some(MedicationRequest::RESOURCE_TYPE),
    },
];

pub fn find_operation(name: &str) -> Option<&'static OperationDescriptor> {
    CATALOG.iter().find(|op| op.name == name)
}

const CHAIN_INCLUDES: [(&str, &str); 3] = [
    ("_revinclude:iterate", "MedicationRequest:based-on"),
    ("_revinclude:iterate", "MedicationRequest:prior-prescription"),
    ("_revinclude", "MedicationDispense:prescription"),
];

/// A query returning order lines together with everything chained to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainQuery {
    ById(String),
    /// Records updated in `[from, to)`.
    Window {
        from: OffsetDateTime,
        to: OffsetDateTime,
    },
}

impl ChainQuery {
    pub fn to_query_string(&self) -> Result<String> {
        let mut params = form_urlencoded::Serializer::new(String::new());
        match self {
            Self::ById(id) => {
                if id.trim().is_empty() {
                    return Err(ClientError::InvalidQuery("order line id is empty".into()));
                }
                params.append_pair("_id", id.trim());
            }
            Self::Window { from, to } => {
                if from >= to {
                    return Err(ClientError::InvalidQuery(
                        "window start must be before its end".into(),
                    ));
                }
                params.append_pair("_lastUpdated", &format!("ge{}", rfc3339(from)?));
                params.append_pair("_lastUpdated", &format!("lt{}", rfc3339(to)?));
            }
        }
        for (key, value) in CHAIN_INCLUDES {
            params.append_pair(key, value);
        }
        Ok(format!(
            "{}?{}",
            MedicationRequest::RESOURCE_TYPE,
            params.finish()
        ))
    }
}

fn rfc3339(at: &OffsetDateTime) -> Result<String> {
    at.format(&Rfc3339)
        .map_err(|e| ClientError::InvalidQuery(format!("cannot format {at}: {e}")))
}

/// A fetched chain bundle and its classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainReport {
    pub bundle: Bundle,
    pub chains: ClassifiedChains,
}

impl ChainReport {
    pub fn from_bundle(bundle: Bundle) -> Self {
        let chains = classify(&bundle);
        Self { bundle, chains }
    }
}

/// Builds a transaction bundle holding an order group and its lines.
pub fn order_bundle(
    group: &RequestOrchestration,
    lines: &[MedicationRequest],
    line_collection: &str,
) -> Result<Bundle> {
    let mut bundle = Bundle::transaction();
    bundle.push_create(group, RequestOrchestration::RESOURCE_TYPE)?;
    for line in lines {
        bundle.push_create(line, line_collection)?;
    }
    Ok(bundle)
}

/// The Linked Care operations over one session.
///
/// Every rejection is logged issue by issue before it is returned.
pub struct LinkedCareClient<'a, S: Session + ?Sized> {
    exchange: ResourceExchange<'a, S>,
}

impl<'a, S: Session + ?Sized> LinkedCareClient<'a, S> {
    pub fn new(session: &'a S) -> Self {
        Self {
            exchange: ResourceExchange::new(session),
        }
    }

    pub fn with_exchange(exchange: ResourceExchange<'a, S>) -> Self {
        Self { exchange }
    }

    pub fn exchange(&self) -> &ResourceExchange<'a, S> {
        &self.exchange
    }

    pub async fn create_patient(&self, patient: &Patient) -> Result<Outcome<Patient>> {
        let outcome = self.exchange.create(patient, None).await?;
        log_rejection("create-patient", &outcome);
        Ok(outcome)
    }

    pub async fn create_order_group(
        &self,
        group: &RequestOrchestration,
    ) -> Result<Outcome<RequestOrchestration>> {
        let outcome = self.exchange.create(group, None).await?;
        log_rejection("create-order-group", &outcome);
        Ok(outcome)
    }

    pub async fn submit_order_bundle(&self, bundle: &Bundle) -> Result<Outcome<Bundle>> {
        let outcome = self.exchange.create_bundle(bundle, None).await?;
        match &outcome {
            Outcome::PartiallyRejected(result) => log_failed_entries("submit-order-bundle", result),
            other => log_rejection("submit-order-bundle", other),
        }
        Ok(outcome)
    }

    pub async fn create_proposal_line(
        &self,
        line: &MedicationRequest,
    ) -> Result<Outcome<MedicationRequest>> {
        let outcome = self.exchange.create(line, Some(PROPOSAL_COLLECTION)).await?;
        log_rejection("create-proposal-line", &outcome);
        Ok(outcome)
    }

    pub async fn create_prescription_line(
        &self,
        line: &MedicationRequest,
    ) -> Result<Outcome<MedicationRequest>> {
        let outcome = self
            .exchange
            .create(line, Some(PRESCRIPTION_COLLECTION))
            .await?;
        log_rejection("create-prescription-line", &outcome);
        Ok(outcome)
    }

    pub async fn create_dispense(
        &self,
        dispense: &MedicationDispense,
    ) -> Result<Outcome<MedicationDispense>> {
        let outcome = self.exchange.create(dispense, None).await?;
        log_rejection("create-dispense", &outcome);
        Ok(outcome)
    }

    pub async fn revoke_order_group(&self, id: &str) -> Result<DeleteOutcome> {
        let outcome = self
            .exchange
            .delete::<RequestOrchestration>(id, None)
            .await?;
        if !outcome.deleted {
            match &outcome.report {
                Some(report) => log_issues("revoke-order-group", report),
                None => tracing::warn!(id, "Order group was not revoked and no reason was given"),
            }
        }
        Ok(outcome)
    }

    pub async fn read_patient(&self, id: &str) -> Result<Outcome<Patient>> {
        let outcome = self.exchange.read::<Patient>(None, id).await?;
        log_rejection("read-patient", &outcome);
        Ok(outcome)
    }

    pub async fn query_chains(&self, query: &ChainQuery) -> Result<Outcome<ChainReport>> {
        let outcome = self
            .exchange
            .get_bundle(&query.to_query_string()?)
            .await?;
        log_rejection("query-chains", &outcome);
        Ok(outcome.map(ChainReport::from_bundle))
    }

    pub async fn query_chains_by_id(&self, id: &str) -> Result<Outcome<ChainReport>> {
        self.query_chains(&ChainQuery::ById(id.to_string())).await
    }

    pub async fn query_chains_in_window(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Outcome<ChainReport>> {
        self.query_chains(&ChainQuery::Window { from, to }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use time::macros::datetime;

    #[test]
    fn test_catalog_is_ordered_and_unique() {
        let names: Vec<&str> = CATALOG.iter().map(|op| op.name).collect();
        assert_eq!(names.first(), Some(&"create-patient"));
        assert_eq!(names.len(), names.iter().collect::<HashSet<_>>().len());
        assert_eq!(
            find_operation("create-proposal-line").and_then(|op| op.collection),
            Some(PROPOSAL_COLLECTION)
        );
        assert!(find_operation("reflect-everything").is_none());
    }

    #[test]
    fn test_query_by_id() {
        let query = ChainQuery::ById("R1".into()).to_query_string().unwrap();
        assert_eq!(
            query,
            "MedicationRequest?_id=R1\
             &_revinclude%3Aiterate=MedicationRequest%3Abased-on\
             &_revinclude%3Aiterate=MedicationRequest%3Aprior-prescription\
             &_revinclude=MedicationDispense%3Aprescription"
        );
        assert!(ChainQuery::ById("  ".into()).to_query_string().is_err());
    }

    #[test]
    fn test_query_in_window() {
        let query = ChainQuery::Window {
            from: datetime!(2026-10-01 00:00 UTC),
            to: datetime!(2026-10-02 00:00 UTC),
        }
        .to_query_string()
        .unwrap();
        assert!(query.starts_with(
            "MedicationRequest?_lastUpdated=ge2026-10-01T00%3A00%3A00Z\
             &_lastUpdated=lt2026-10-02T00%3A00%3A00Z"
        ));
        assert!(query.ends_with("_revinclude=MedicationDispense%3Aprescription"));
    }

    #[test]
    fn test_window_must_be_ordered() {
        let at = datetime!(2026-10-01 00:00 UTC);
        let err = ChainQuery::Window { from: at, to: at }
            .to_query_string()
            .unwrap_err();
        assert!(err.is_usage_error());
    }

    #[test]
    fn test_order_bundle() {
        let group = RequestOrchestration::for_patient("abc123");
        let lines = vec![
            MedicationRequest::proposal("abc123"),
            MedicationRequest::proposal("abc123"),
        ];
        let bundle = order_bundle(&group, &lines, PROPOSAL_COLLECTION).unwrap();
        assert_eq!(bundle.bundle_type, "transaction");
        assert_eq!(bundle.entry.len(), 3);
        assert_eq!(
            bundle.entry[0].request.as_ref().map(|r| r.url.as_str()),
            Some("RequestOrchestration")
        );
        assert_eq!(
            bundle.entry[2].request.as_ref().map(|r| r.url.as_str()),
            Some(PROPOSAL_COLLECTION)
        );
    }
}
