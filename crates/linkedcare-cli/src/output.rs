use colored::Colorize;
use linkedcare_client::{ChainReport, Outcome, OperationDescriptor};
use linkedcare_core::chain::{ChainLink, ClassifiedChains, LinkKind};
use linkedcare_core::model::{Bundle, OperationOutcome, Resource, to_json};
use serde_json::{Value, json};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_value(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

pub fn print_resource<R: Resource>(resource: &R) {
    match to_json(resource) {
        Ok(value) => print_value(&value),
        Err(e) => print_error(&format!("Cannot display {}: {e}", R::RESOURCE_TYPE)),
    }
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Lists each issue of a rejection on stderr.
pub fn print_issues(report: &OperationOutcome) {
    if report.issue.is_empty() {
        print_error("Rejected without further detail");
    }
    for issue in report.issues() {
        eprintln!(
            "  {} [{}] {}",
            issue.severity.yellow(),
            issue.code.cyan(),
            issue.text
        );
    }
}

/// Prints an outcome and returns whether it was accepted.
pub fn print_outcome<R: Resource>(operation: &str, outcome: &Outcome<R>) -> bool {
    match outcome {
        Outcome::Accepted(resource) => {
            let id = resource.id();
            print_success(&format!("{operation}: {}/{}", R::RESOURCE_TYPE, id));
            print_resource(resource);
            true
        }
        Outcome::PartiallyRejected(resource) => {
            print_error(&format!("{operation}: partially rejected"));
            print_resource(resource);
            false
        }
        Outcome::Rejected(report) => {
            print_error(&format!("{operation}: rejected by server"));
            print_issues(report);
            false
        }
        Outcome::Unparseable { status } => {
            print_error(&format!(
                "{operation}: server answered HTTP {status} with an unintelligible body"
            ));
            false
        }
    }
}

pub fn print_failed_entries(bundle: &Bundle) {
    for entry in bundle.failed_entries() {
        let status = entry
            .response
            .as_ref()
            .map(|r| r.status.as_str())
            .unwrap_or("-");
        eprintln!("  {} {}", status.red(), entry.locator());
    }
}

pub fn print_catalog(catalog: &[OperationDescriptor]) {
    let mut builder = Builder::default();
    builder.push_record(["Operation", "Collection", "Summary"]);
    for op in catalog {
        builder.push_record([op.name, op.collection.unwrap_or("/"), op.summary]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

pub fn print_chain_report(report: &ChainReport, format: OutputFormat, open_only: bool) {
    match format {
        OutputFormat::Json if open_only => print_value(&open_links_json(&report.chains)),
        OutputFormat::Json => match to_json(&report.bundle) {
            Ok(value) => print_value(&value),
            Err(e) => print_error(&format!("Cannot display bundle: {e}")),
        },
        OutputFormat::Table => {
            let chains = &report.chains;
            if open_only {
                print_open_links(chains);
            } else {
                print_chain_lines(chains);
            }
            println!(
                "{} {} proposals, {} prescriptions, {} dispenses, {} other entries",
                "Total:".cyan(),
                chains.proposals.len(),
                chains.prescriptions.len(),
                chains.dispenses.len(),
                chains.ignored
            );
        }
    }
}

fn print_chain_lines(chains: &ClassifiedChains) {
    let lines = chains.render();
    if lines.is_empty() {
        println!("No order chains found.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Kind", "ID", "Links"]);
    for line in &lines {
        builder.push_record([
            line.link.kind.to_string(),
            line.link.id.clone(),
            line.relation.to_string(),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

fn open_links(chains: &ClassifiedChains) -> Vec<&ChainLink> {
    chains
        .open_proposals()
        .into_iter()
        .chain(chains.open_prescriptions())
        .collect()
}

fn awaiting(kind: LinkKind) -> &'static str {
    match kind {
        LinkKind::Proposal => "prescription",
        LinkKind::Prescription => "dispense",
        LinkKind::Dispense => "-",
    }
}

/// Open proposals and prescriptions as a JSON array.
pub fn open_links_json(chains: &ClassifiedChains) -> Value {
    let links: Vec<Value> = open_links(chains)
        .into_iter()
        .map(|link| {
            json!({
                "kind": link.kind.to_string(),
                "id": link.id,
                "status": link.status,
                "awaiting": awaiting(link.kind),
            })
        })
        .collect();
    Value::Array(links)
}

fn print_open_links(chains: &ClassifiedChains) {
    let open = open_links(chains);
    if open.is_empty() {
        println!("No open order lines.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Kind", "ID", "Status", "Awaiting"]);
    for link in open {
        builder.push_record([
            link.kind.to_string(),
            link.id.clone(),
            link.status.clone().unwrap_or_else(|| "-".into()),
            awaiting(link.kind).to_string(),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkedcare_core::chain::classify;
    use linkedcare_core::model::from_value;

    fn chains() -> ClassifiedChains {
        let bundle: Bundle = from_value(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [
                {
                    "fullUrl": "https://lc.test/fhir/ProposalMedicationRequest/P1",
                    "resource": {"resourceType": "MedicationRequest", "id": "P1", "status": "active"}
                },
                {
                    "fullUrl": "https://lc.test/fhir/ProposalMedicationRequest/P2",
                    "resource": {"resourceType": "MedicationRequest", "id": "P2", "status": "active"}
                },
                {
                    "fullUrl": "https://lc.test/fhir/PrescriptionMedicationRequest/R1",
                    "resource": {
                        "resourceType": "MedicationRequest",
                        "id": "R1",
                        "status": "active",
                        "basedOn": [{"reference": "ProposalMedicationRequest/P1"}]
                    }
                }
            ]
        }))
        .unwrap();
        classify(&bundle)
    }

    #[test]
    fn test_open_links_json_lists_only_open_links() {
        let value = open_links_json(&chains());
        let links = value.as_array().unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0]["id"], "P2");
        assert_eq!(links[0]["awaiting"], "prescription");
        assert_eq!(links[1]["id"], "R1");
        assert_eq!(links[1]["status"], "active");
        assert_eq!(links[1]["awaiting"], "dispense");
    }

    #[test]
    fn test_open_links_json_empty_when_nothing_open() {
        assert_eq!(open_links_json(&ClassifiedChains::default()), json!([]));
    }
}
