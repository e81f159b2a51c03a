use std::io::Read;

use anyhow::{Context, Result};
use linkedcare_client::{Connection, LinkedCareClient, Outcome};
use linkedcare_core::model::{
    Bundle, CodeableConcept, Coding, MedicationDispense, MedicationRequest, RequestOrchestration,
    from_json,
};

use crate::cli::{DispenseArgs, PrescribeArgs, ProposeArgs};
use crate::output::{print_error, print_failed_entries, print_issues, print_outcome, print_success};

type Client<'a> = LinkedCareClient<'a, Connection>;

pub const DISPENSE_TYPE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v3-ActCode";

pub async fn group(client: &Client<'_>, patient: &str) -> Result<()> {
    let outcome = client
        .create_order_group(&RequestOrchestration::for_patient(patient))
        .await?;
    if !print_outcome("create-order-group", &outcome) {
        anyhow::bail!("Order group was not created");
    }
    Ok(())
}

pub async fn submit(client: &Client<'_>, file: Option<&str>) -> Result<()> {
    let body = match file {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read bundle from stdin")?;
            buf
        }
    };
    let bundle: Bundle = from_json(&body).context("Input is not a Bundle")?;

    match client.submit_order_bundle(&bundle).await? {
        Outcome::Accepted(result) => {
            print_success(&format!(
                "submit-order-bundle: {} entries accepted",
                result.entry.len()
            ));
            Ok(())
        }
        Outcome::PartiallyRejected(result) => {
            print_error(&format!(
                "submit-order-bundle: {} of {} entries failed",
                result.failed_entries().count(),
                result.entry.len()
            ));
            print_failed_entries(&result);
            anyhow::bail!("Order bundle was partially rejected")
        }
        Outcome::Rejected(report) => {
            print_error("submit-order-bundle: rejected by server");
            print_issues(&report);
            anyhow::bail!("Order bundle was rejected")
        }
        Outcome::Unparseable { status } => {
            anyhow::bail!("Server answered HTTP {status} with an unintelligible body")
        }
    }
}

pub fn proposal_line(args: &ProposeArgs) -> MedicationRequest {
    let line = MedicationRequest::proposal(&args.patient);
    match &args.based_on {
        Some(previous) => line.with_based_on(previous),
        None => line,
    }
}

pub fn prescription_line(args: &PrescribeArgs) -> MedicationRequest {
    let mut line = MedicationRequest::prescription(&args.patient);
    if let Some(proposal) = &args.based_on {
        line = line.with_based_on(proposal);
    }
    if let Some(prior) = &args.prior {
        line = line.with_prior_prescription(prior);
    }
    line
}

pub fn dispense(args: &DispenseArgs) -> MedicationDispense {
    MedicationDispense::for_prescription(&args.patient, &args.prescription)
        .with_status(&args.status)
        .with_type(CodeableConcept::from_coding(Coding::new(
            DISPENSE_TYPE_SYSTEM,
            &args.type_code,
        )))
}

pub async fn propose(client: &Client<'_>, args: &ProposeArgs) -> Result<()> {
    let outcome = client.create_proposal_line(&proposal_line(args)).await?;
    if !print_outcome("create-proposal-line", &outcome) {
        anyhow::bail!("Proposal was not created");
    }
    Ok(())
}

pub async fn prescribe(client: &Client<'_>, args: &PrescribeArgs) -> Result<()> {
    let outcome = client
        .create_prescription_line(&prescription_line(args))
        .await?;
    if !print_outcome("create-prescription-line", &outcome) {
        anyhow::bail!("Prescription was not created");
    }
    Ok(())
}

pub async fn record_dispense(client: &Client<'_>, args: &DispenseArgs) -> Result<()> {
    let outcome = client.create_dispense(&dispense(args)).await?;
    if !print_outcome("create-dispense", &outcome) {
        anyhow::bail!("Dispense was not recorded");
    }
    Ok(())
}

pub async fn revoke(client: &Client<'_>, id: &str) -> Result<()> {
    let outcome = client.revoke_order_group(id).await?;
    if outcome.deleted {
        print_success(&format!("revoke-order-group: RequestOrchestration/{id} deleted"));
        return Ok(());
    }
    print_error(&format!("revoke-order-group: RequestOrchestration/{id} was not deleted"));
    if let Some(report) = &outcome.report {
        print_issues(report);
    }
    anyhow::bail!("Order group was not revoked")
}
