//! Order-chain resolution.
//!
//! A medication order moves through proposal, prescription and dispense
//! records. The server returns them as one flat bundle; this module recovers
//! the chain state from back-references alone:
//!
//! - [`classify`] sorts entries by the type tag embedded in their `fullUrl`.
//! - [`ClassifiedChains::open_proposals`] and
//!   [`ClassifiedChains::open_prescriptions`] compute the actionable frontier.
//! - [`ClassifiedChains::render`] describes how each record links backwards.
//!
//! All functions are pure: the same bundle always yields the same result.

use std::fmt;

use serde_json::Value;

use crate::model::{self, Bundle, MedicationDispense, MedicationRequest};
use crate::reference::{bare_id, references};

pub const PROPOSAL_TAG: &str = "Proposal";
pub const PRESCRIPTION_TAG: &str = "Prescription";
pub const DISPENSE_TAG: &str = "Dispense";

/// Suffix of dispense type codes that end a prescription (e.g. `FFC`, `RFC`).
pub const TERMINAL_DISPENSE_MARKER: &str = "C";
/// The only dispense status that can close a prescription.
pub const COMPLETED_STATUS: &str = "completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Proposal,
    Prescription,
    Dispense,
}

impl LinkKind {
    /// Kind named by the tag in `locator`; `None` unless exactly one tag matches.
    pub fn from_locator(locator: &str) -> Option<Self> {
        let mut matched = [
            (PROPOSAL_TAG, Self::Proposal),
            (PRESCRIPTION_TAG, Self::Prescription),
            (DISPENSE_TAG, Self::Dispense),
        ]
        .into_iter()
        .filter(|(tag, _)| locator.contains(tag))
        .map(|(_, kind)| kind);

        match (matched.next(), matched.next()) {
            (Some(kind), None) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proposal => write!(f, "proposal"),
            Self::Prescription => write!(f, "prescription"),
            Self::Dispense => write!(f, "dispense"),
        }
    }
}

/// The fields of one record that chain resolution looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub id: String,
    pub kind: LinkKind,
    /// `basedOn` references, in record order.
    pub based_on: Vec<String>,
    /// `priorPrescription` reference.
    pub prior_ref: Option<String>,
    /// `authorizingPrescription` references, in record order.
    pub authorizing: Vec<String>,
    pub status: Option<String>,
    pub dispense_type_code: Option<String>,
}

impl ChainLink {
    /// Immediate predecessor of a proposal or prescription.
    pub fn based_on_ref(&self) -> Option<&str> {
        self.based_on.first().map(String::as_str)
    }

    /// Prescription a dispense was made against.
    pub fn authorizing_ref(&self) -> Option<&str> {
        self.authorizing.first().map(String::as_str)
    }

    /// Whether this dispense closes the prescription with id `prescription_id`.
    ///
    /// Requires all of: authorizing reference match, terminal type code and
    /// status exactly `completed`.
    pub fn closes_prescription(&self, prescription_id: &str) -> bool {
        self.kind == LinkKind::Dispense
            && self
                .authorizing_ref()
                .is_some_and(|r| references(r, prescription_id))
            && self
                .dispense_type_code
                .as_deref()
                .is_some_and(|code| code.ends_with(TERMINAL_DISPENSE_MARKER))
            && self.status.as_deref() == Some(COMPLETED_STATUS)
    }

    /// Projects a bundle entry payload; `None` if it is not the expected resource.
    fn project(kind: LinkKind, locator: &str, resource: Value) -> Option<Self> {
        match kind {
            LinkKind::Proposal | LinkKind::Prescription => {
                let request: MedicationRequest = model::from_value(resource).ok()?;
                Some(Self {
                    id: id_or_locator(request.id, locator),
                    kind,
                    based_on: collect_refs(request.based_on.iter().map(|r| r.as_str())),
                    prior_ref: request
                        .prior_prescription
                        .and_then(|r| r.reference)
                        .filter(|r| !r.is_empty()),
                    authorizing: Vec::new(),
                    status: request.status,
                    dispense_type_code: None,
                })
            }
            LinkKind::Dispense => {
                let dispense: MedicationDispense = model::from_value(resource).ok()?;
                Some(Self {
                    id: id_or_locator(dispense.id, locator),
                    kind,
                    based_on: Vec::new(),
                    prior_ref: None,
                    authorizing: collect_refs(
                        dispense.authorizing_prescription.iter().map(|r| r.as_str()),
                    ),
                    status: dispense.status,
                    dispense_type_code: dispense
                        .dispense_type
                        .as_ref()
                        .and_then(|t| t.first_code())
                        .map(str::to_string),
                })
            }
        }
    }
}

fn id_or_locator(id: String, locator: &str) -> String {
    if id.is_empty() {
        bare_id(locator).to_string()
    } else {
        id
    }
}

fn collect_refs<'a>(refs: impl Iterator<Item = &'a str>) -> Vec<String> {
    refs.filter(|r| !r.is_empty()).map(str::to_string).collect()
}

/// A bundle partitioned into chain links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedChains {
    pub proposals: Vec<ChainLink>,
    pub prescriptions: Vec<ChainLink>,
    pub dispenses: Vec<ChainLink>,
    /// Entries without exactly one tag or without a usable payload.
    pub ignored: usize,
}

/// Partitions bundle entries into proposals, prescriptions and dispenses.
pub fn classify(bundle: &Bundle) -> ClassifiedChains {
    let mut chains = ClassifiedChains::default();

    for entry in &bundle.entry {
        let locator = entry.locator();
        let Some(kind) = LinkKind::from_locator(locator) else {
            chains.ignored += 1;
            continue;
        };
        let link = entry
            .resource
            .clone()
            .and_then(|resource| ChainLink::project(kind, locator, resource));
        let Some(link) = link else {
            tracing::debug!(locator, %kind, "Dropping chain entry without a usable payload");
            chains.ignored += 1;
            continue;
        };
        match kind {
            LinkKind::Proposal => chains.proposals.push(link),
            LinkKind::Prescription => chains.prescriptions.push(link),
            LinkKind::Dispense => chains.dispenses.push(link),
        }
    }

    chains
}

impl ClassifiedChains {
    pub fn classified(&self) -> usize {
        self.proposals.len() + self.prescriptions.len() + self.dispenses.len()
    }

    /// Proposals not yet followed up by another proposal nor fulfilled by a prescription.
    pub fn open_proposals(&self) -> Vec<&ChainLink> {
        self.proposals
            .iter()
            .filter(|proposal| {
                let followed_up = self.proposals.iter().any(|other| {
                    other.id != proposal.id
                        && other
                            .based_on_ref()
                            .is_some_and(|r| references(r, &proposal.id))
                });
                let fulfilled = self.prescriptions.iter().any(|prescription| {
                    prescription
                        .based_on_ref()
                        .is_some_and(|r| references(r, &proposal.id))
                });
                !followed_up && !fulfilled
            })
            .collect()
    }

    /// Prescriptions neither superseded by a later prescription nor closed by a terminal dispense.
    pub fn open_prescriptions(&self) -> Vec<&ChainLink> {
        self.prescriptions
            .iter()
            .filter(|prescription| {
                let superseded = self.prescriptions.iter().any(|other| {
                    other.id != prescription.id
                        && other
                            .prior_ref
                            .as_deref()
                            .is_some_and(|r| references(r, &prescription.id))
                });
                let dispensed = self
                    .dispenses
                    .iter()
                    .any(|dispense| dispense.closes_prescription(&prescription.id));
                !superseded && !dispensed
            })
            .collect()
    }

    /// One line per record: dispenses, then prescriptions, then proposals.
    pub fn render(&self) -> Vec<ChainLine<'_>> {
        let dispenses = self.dispenses.iter().map(|link| ChainLine {
            link,
            relation: ChainRelation::AuthorizedBy(link.authorizing_ref().map(str::to_string)),
        });

        let prescriptions = self.prescriptions.iter().map(|link| {
            let relation = match (link.based_on.as_slice(), &link.prior_ref) {
                ([proposal], _) => ChainRelation::FulfilsProposal(proposal.clone()),
                (_, Some(prior)) => ChainRelation::Supersedes(prior.clone()),
                _ => ChainRelation::InitialPrescription,
            };
            ChainLine { link, relation }
        });

        let proposals = self.proposals.iter().map(|link| ChainLine {
            link,
            relation: match link.based_on_ref() {
                Some(previous) => ChainRelation::FollowsUp(previous.to_string()),
                None => ChainRelation::StartingLink,
            },
        });

        dispenses.chain(prescriptions).chain(proposals).collect()
    }
}

/// How a record links to its predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainRelation {
    AuthorizedBy(Option<String>),
    FulfilsProposal(String),
    Supersedes(String),
    InitialPrescription,
    FollowsUp(String),
    StartingLink,
}

impl fmt::Display for ChainRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthorizedBy(Some(reference)) => write!(f, "authorized by {reference}"),
            Self::AuthorizedBy(None) => write!(f, "authorized by <none>"),
            Self::FulfilsProposal(reference) => write!(f, "fulfils proposal {reference}"),
            Self::Supersedes(reference) => write!(f, "supersedes {reference}"),
            Self::InitialPrescription => write!(f, "initial prescription"),
            Self::FollowsUp(reference) => write!(f, "follows up {reference}"),
            Self::StartingLink => write!(f, "starting link"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLine<'a> {
    pub link: &'a ChainLink,
    pub relation: ChainRelation,
}

impl fmt::Display for ChainLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.link.kind, self.link.id, self.relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BundleEntry;
    use serde_json::json;

    const BASE: &str = "https://lc.test/fhir";

    fn entry(collection: &str, resource: Value) -> BundleEntry {
        let id = resource["id"].as_str().unwrap_or_default().to_string();
        BundleEntry {
            full_url: Some(format!("{BASE}/{collection}/{id}")),
            resource: Some(resource),
            ..BundleEntry::default()
        }
    }

    fn proposal(id: &str, based_on: Option<&str>) -> BundleEntry {
        let mut resource = json!({"resourceType": "MedicationRequest", "id": id, "intent": "proposal"});
        if let Some(previous) = based_on {
            resource["basedOn"] = json!([{"reference": previous}]);
        }
        entry("ProposalMedicationRequest", resource)
    }

    fn prescription(id: &str, based_on: &[&str], prior: Option<&str>) -> BundleEntry {
        let mut resource = json!({"resourceType": "MedicationRequest", "id": id, "intent": "order"});
        if !based_on.is_empty() {
            let refs: Vec<Value> = based_on.iter().map(|r| json!({"reference": r})).collect();
            resource["basedOn"] = Value::Array(refs);
        }
        if let Some(prior) = prior {
            resource["priorPrescription"] = json!({"reference": prior});
        }
        entry("PrescriptionMedicationRequest", resource)
    }

    fn dispense(id: &str, authorizing: &str, type_code: &str, status: &str) -> BundleEntry {
        entry(
            "MedicationDispense",
            json!({
                "resourceType": "MedicationDispense",
                "id": id,
                "status": status,
                "type": {"coding": [{"system": "http://terminology.hl7.org/CodeSystem/v3-ActCode", "code": type_code}]},
                "authorizingPrescription": [{"reference": authorizing}]
            }),
        )
    }

    fn bundle(entries: Vec<BundleEntry>) -> Bundle {
        Bundle {
            bundle_type: "searchset".to_string(),
            entry: entries,
            ..Bundle::default()
        }
    }

    fn ids(links: Vec<&ChainLink>) -> Vec<&str> {
        links.into_iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn test_kind_from_locator() {
        assert_eq!(
            LinkKind::from_locator("https://x/ProposalMedicationRequest/1"),
            Some(LinkKind::Proposal)
        );
        assert_eq!(
            LinkKind::from_locator("PrescriptionMedicationRequest/1"),
            Some(LinkKind::Prescription)
        );
        assert_eq!(
            LinkKind::from_locator("MedicationDispense/1"),
            Some(LinkKind::Dispense)
        );
        assert_eq!(LinkKind::from_locator("Patient/1"), None);
        assert_eq!(
            LinkKind::from_locator("ProposalPrescription/1"),
            None,
            "ambiguous locators are dropped"
        );
    }

    #[test]
    fn test_classify_is_total_and_idempotent() {
        let b = bundle(vec![
            proposal("P1", None),
            prescription("R1", &["ProposalMedicationRequest/P1"], None),
            dispense("D1", "PrescriptionMedicationRequest/R1", "FFC", "completed"),
            entry("Patient", json!({"resourceType": "Patient", "id": "pat"})),
            entry("ProposalPrescription", json!({"resourceType": "MedicationRequest", "id": "amb"})),
            BundleEntry::default(),
        ]);

        let first = classify(&b);
        assert_eq!(first.proposals.len(), 1);
        assert_eq!(first.prescriptions.len(), 1);
        assert_eq!(first.dispenses.len(), 1);
        assert_eq!(first.ignored, 3);
        assert_eq!(first.classified() + first.ignored, b.entry.len());
        assert_eq!(first, classify(&b));
    }

    #[test]
    fn test_wrong_payload_is_ignored() {
        let b = bundle(vec![entry(
            "ProposalMedicationRequest",
            json!({"resourceType": "OperationOutcome", "id": "x"}),
        )]);
        let chains = classify(&b);
        assert!(chains.proposals.is_empty());
        assert_eq!(chains.ignored, 1);
    }

    #[test]
    fn test_scenario_single_proposal_is_open() {
        let chains = classify(&bundle(vec![proposal("P1", None)]));
        assert_eq!(ids(chains.open_proposals()), vec!["P1"]);
    }

    #[test]
    fn test_scenario_follow_up_closes_proposal() {
        let chains = classify(&bundle(vec![
            proposal("P1", None),
            proposal("P2", Some("ProposalMedicationRequest/P1")),
        ]));
        assert_eq!(ids(chains.open_proposals()), vec!["P2"]);
    }

    #[test]
    fn test_prescription_closes_proposal() {
        let mut entries = vec![proposal("P1", None)];
        assert_eq!(ids(classify(&bundle(entries.clone())).open_proposals()), vec!["P1"]);

        entries.push(prescription("R1", &["ProposalMedicationRequest/P1"], None));
        let chains = classify(&bundle(entries));
        assert!(chains.open_proposals().is_empty());
        assert_eq!(ids(chains.open_prescriptions()), vec!["R1"]);
    }

    #[test]
    fn test_self_reference_does_not_close() {
        let chains = classify(&bundle(vec![proposal(
            "P1",
            Some("ProposalMedicationRequest/P1"),
        )]));
        assert_eq!(ids(chains.open_proposals()), vec!["P1"]);
    }

    #[test]
    fn test_scenario_completed_terminal_dispense_closes_prescription() {
        let chains = classify(&bundle(vec![
            prescription("R1", &["ProposalMedicationRequest/Px"], None),
            dispense("D1", "PrescriptionMedicationRequest/R1", "FFC", "completed"),
        ]));
        assert!(chains.open_prescriptions().is_empty());
    }

    #[test]
    fn test_scenario_in_progress_dispense_keeps_prescription_open() {
        let chains = classify(&bundle(vec![
            prescription("R1", &["ProposalMedicationRequest/Px"], None),
            dispense("D1", "PrescriptionMedicationRequest/R1", "FFC", "in-progress"),
        ]));
        assert_eq!(ids(chains.open_prescriptions()), vec!["R1"]);
    }

    #[test]
    fn test_dispense_for_other_prescription_keeps_open() {
        let chains = classify(&bundle(vec![
            prescription("R1", &[], None),
            dispense("D1", "PrescriptionMedicationRequest/R9", "FFC", "completed"),
        ]));
        assert_eq!(ids(chains.open_prescriptions()), vec!["R1"]);
    }

    #[test]
    fn test_non_terminal_type_code_keeps_open() {
        let chains = classify(&bundle(vec![
            prescription("R1", &[], None),
            dispense("D1", "PrescriptionMedicationRequest/R1", "FFP", "completed"),
        ]));
        assert_eq!(ids(chains.open_prescriptions()), vec!["R1"]);
    }

    #[test]
    fn test_status_must_be_exactly_completed() {
        let chains = classify(&bundle(vec![
            prescription("R1", &[], None),
            dispense("D1", "PrescriptionMedicationRequest/R1", "RFC", "Completed"),
        ]));
        assert_eq!(ids(chains.open_prescriptions()), vec!["R1"]);
    }

    #[test]
    fn test_prior_prescription_supersedes() {
        let chains = classify(&bundle(vec![
            prescription("R1", &["ProposalMedicationRequest/P1"], None),
            prescription("R2", &[], Some("PrescriptionMedicationRequest/R1")),
        ]));
        assert_eq!(ids(chains.open_prescriptions()), vec!["R2"]);
    }

    #[test]
    fn test_reference_prefix_tolerance() {
        let chains = classify(&bundle(vec![
            proposal("P1", None),
            proposal(
                "P2",
                Some("https://other-host.example/base/ProposalMedicationRequest/P1/_history/2"),
            ),
        ]));
        assert_eq!(ids(chains.open_proposals()), vec!["P2"]);
    }

    #[test]
    fn test_empty_references_mean_no_predecessor() {
        let b = bundle(vec![entry(
            "ProposalMedicationRequest",
            json!({"resourceType": "MedicationRequest", "id": "P1", "basedOn": [{"display": "no ref"}]}),
        )]);
        let chains = classify(&b);
        assert!(chains.proposals[0].based_on.is_empty());
        assert_eq!(ids(chains.open_proposals()), vec!["P1"]);
        assert_eq!(chains.render()[0].relation, ChainRelation::StartingLink);
    }

    #[test]
    fn test_render_relations() {
        let chains = classify(&bundle(vec![
            proposal("P1", None),
            proposal("P2", Some("ProposalMedicationRequest/P1")),
            prescription("R1", &["ProposalMedicationRequest/P2"], None),
            prescription("R2", &[], Some("PrescriptionMedicationRequest/R1")),
            prescription("R3", &[], None),
            prescription(
                "R4",
                &["ProposalMedicationRequest/P1", "ProposalMedicationRequest/P2"],
                None,
            ),
            dispense("D1", "PrescriptionMedicationRequest/R2", "FFC", "completed"),
        ]));

        let lines: Vec<String> = chains.render().iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "dispense D1: authorized by PrescriptionMedicationRequest/R2",
                "prescription R1: fulfils proposal ProposalMedicationRequest/P2",
                "prescription R2: supersedes PrescriptionMedicationRequest/R1",
                "prescription R3: initial prescription",
                "prescription R4: initial prescription",
                "proposal P1: starting link",
                "proposal P2: follows up ProposalMedicationRequest/P1",
            ]
        );
    }

    #[test]
    fn test_missing_id_falls_back_to_locator() {
        let b = bundle(vec![BundleEntry {
            full_url: Some(format!("{BASE}/ProposalMedicationRequest/P7")),
            resource: Some(json!({"resourceType": "MedicationRequest"})),
            ..BundleEntry::default()
        }]);
        assert_eq!(classify(&b).proposals[0].id, "P7");
    }
}
