use std::time::Duration;

use linkedcare_client::{
    ClientError, Connection, Connector, LinkedCareClient, Outcome, ResourceExchange,
};
use linkedcare_core::model::{
    Bundle, MedicationRequest, PROPOSAL_COLLECTION, Patient, RequestOrchestration,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mounts discovery plus a token endpoint handing out `tokens` in order,
/// repeating the last one.
async fn connect(server: &MockServer, tokens: &[&str]) -> Connection {
    Mock::given(method("GET"))
        .and(path("/.well-known/smart-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_endpoint": format!("{}/auth/token", server.uri())
        })))
        .mount(server)
        .await;

    let (last, first) = tokens.split_last().expect("at least one token");
    for token in first {
        Mock::given(method("GET"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(*token))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(*last))
        .mount(server)
        .await;

    let connection = Connector::new(Duration::from_secs(5))
        .connect(&server.uri(), None)
        .await
        .expect("connect");
    assert!(connection.succeeded());
    connection
}

fn rejection() -> serde_json::Value {
    json!({
        "resourceType": "OperationOutcome",
        "issue": [
            {"severity": "error", "code": "required", "details": {"text": "subject is required"}},
            {"severity": "error", "code": "business-rule", "diagnostics": "order group closed"}
        ]
    })
}

#[tokio::test]
async fn created_patient_is_fetched_from_location() {
    let server = MockServer::start().await;
    let connection = connect(&server, &["token-1"]).await;

    Mock::given(method("POST"))
        .and(path("/Patient"))
        .and(header("Content-Type", "application/fhir+json"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(201).insert_header("Location", "/Patient/abc123"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Patient/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Patient",
            "id": "abc123",
            "name": [{"family": "Huber", "given": ["Anna"]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = LinkedCareClient::new(&connection);
    let outcome = client.create_patient(&Patient::default()).await.unwrap();

    let patient = outcome.into_accepted().expect("accepted");
    assert_eq!(patient.id, "abc123");
    assert_eq!(patient.display_name(), "Anna Huber");
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_retried() {
    let server = MockServer::start().await;
    let connection = connect(&server, &["token-1", "token-2"]).await;

    Mock::given(method("GET"))
        .and(path("/MedicationRequest"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/MedicationRequest"))
        .and(query_param("_id", "R1"))
        .and(query_param("_revinclude", "MedicationDispense:prescription"))
        .and(header("Authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [
                {
                    "fullUrl": format!("{}/PrescriptionMedicationRequest/R1", server.uri()),
                    "resource": {
                        "resourceType": "MedicationRequest",
                        "id": "R1",
                        "basedOn": [{"reference": "ProposalMedicationRequest/P1"}]
                    }
                },
                {
                    "fullUrl": format!("{}/MedicationDispense/D1", server.uri()),
                    "resource": {
                        "resourceType": "MedicationDispense",
                        "id": "D1",
                        "status": "in-progress",
                        "type": {"coding": [{"code": "FFC"}]},
                        "authorizingPrescription": [{"reference": "PrescriptionMedicationRequest/R1"}]
                    }
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = LinkedCareClient::new(&connection);
    let report = client
        .query_chains_by_id("R1")
        .await
        .unwrap()
        .into_accepted()
        .expect("accepted");

    assert_eq!(connection.bearer_token().as_str(), "token-2");
    assert_eq!(report.chains.prescriptions.len(), 1);
    assert_eq!(report.chains.dispenses.len(), 1);
    let open: Vec<&str> = report
        .chains
        .open_prescriptions()
        .iter()
        .map(|link| link.id.as_str())
        .collect();
    assert_eq!(open, vec!["R1"]);
}

#[tokio::test]
async fn five_unauthorized_answers_abort_the_operation() {
    let server = MockServer::start().await;
    let connection = connect(&server, &["token-1"]).await;

    Mock::given(method("DELETE"))
        .and(path("/RequestOrchestration/g1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(5)
        .mount(&server)
        .await;

    let client = LinkedCareClient::new(&connection);
    let err = client.revoke_order_group("g1").await.unwrap_err();
    assert!(matches!(err, ClientError::AttemptsExhausted { attempts: 5, .. }));
}

#[tokio::test]
async fn rejection_carries_every_issue() {
    let server = MockServer::start().await;
    let connection = connect(&server, &["token-1"]).await;

    Mock::given(method("POST"))
        .and(path("/ProposalMedicationRequest"))
        .respond_with(ResponseTemplate::new(422).set_body_json(rejection()))
        .mount(&server)
        .await;

    let client = LinkedCareClient::new(&connection);
    let outcome = client
        .create_proposal_line(&MedicationRequest::proposal("abc123"))
        .await
        .unwrap();

    let report = outcome.report().expect("rejected with report");
    let texts: Vec<String> = report.issues().map(|i| i.text).collect();
    assert_eq!(texts, vec!["subject is required", "order group closed"]);
}

#[tokio::test]
async fn unintelligible_answer_is_not_a_rejection() {
    let server = MockServer::start().await;
    let connection = connect(&server, &["token-1"]).await;

    Mock::given(method("POST"))
        .and(path("/RequestOrchestration"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = LinkedCareClient::new(&connection);
    let outcome = client
        .create_order_group(&RequestOrchestration::for_patient("abc123"))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Unparseable { status: 500 });
}

#[tokio::test]
async fn bundle_bad_request_is_surfaced_as_partial_rejection() {
    let server = MockServer::start().await;
    let connection = connect(&server, &["token-1"]).await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "transaction-response",
            "entry": [
                {"response": {"status": "201 Created", "location": "RequestOrchestration/g1"}},
                {"response": {"status": "400 Bad Request", "outcome": rejection()}}
            ]
        })))
        .mount(&server)
        .await;

    let mut bundle = Bundle::transaction();
    bundle
        .push_create(&RequestOrchestration::for_patient("abc123"), "RequestOrchestration")
        .unwrap();
    bundle
        .push_create(&MedicationRequest::proposal("abc123"), PROPOSAL_COLLECTION)
        .unwrap();

    let client = LinkedCareClient::new(&connection);
    match client.submit_order_bundle(&bundle).await.unwrap() {
        Outcome::PartiallyRejected(result) => assert_eq!(result.failed_entries().count(), 1),
        other => panic!("expected partial rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn revoke_reports_deletion_with_outcome() {
    let server = MockServer::start().await;
    let connection = connect(&server, &["token-1"]).await;

    Mock::given(method("DELETE"))
        .and(path("/RequestOrchestration/g1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "OperationOutcome",
            "issue": [{"severity": "information", "code": "informational", "diagnostics": "deleted"}]
        })))
        .mount(&server)
        .await;

    let client = LinkedCareClient::new(&connection);
    let outcome = client.revoke_order_group("g1").await.unwrap();
    assert!(outcome.deleted);
    assert_eq!(outcome.report.unwrap().issue[0].code, "informational");
}

#[tokio::test]
async fn order_line_without_collection_never_reaches_the_server() {
    let server = MockServer::start().await;
    let connection = connect(&server, &["token-1"]).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let exchange = ResourceExchange::new(&connection);
    let err = exchange
        .create(&MedicationRequest::proposal("abc123"), None)
        .await
        .unwrap_err();
    assert!(err.is_usage_error());
}

#[tokio::test]
async fn read_patient_rejected_when_missing() {
    let server = MockServer::start().await;
    let connection = connect(&server, &["token-1"]).await;

    Mock::given(method("GET"))
        .and(path("/Patient/nobody"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "resourceType": "OperationOutcome",
            "issue": [{"severity": "error", "code": "not-found"}]
        })))
        .mount(&server)
        .await;

    let client = LinkedCareClient::new(&connection);
    let outcome = client.read_patient("nobody").await.unwrap();
    assert_eq!(outcome.report().unwrap().issue[0].code, "not-found");
}
