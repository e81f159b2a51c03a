use anyhow::Result;
use linkedcare_client::{Connection, LinkedCareClient};
use linkedcare_core::model::{HumanName, Patient};

use crate::cli::CreatePatientArgs;
use crate::output::print_outcome;

pub fn build_patient(args: &CreatePatientArgs) -> Patient {
    Patient {
        name: vec![HumanName {
            family: Some(args.family.clone()),
            given: args.given.clone(),
            ..HumanName::default()
        }],
        gender: args.gender.clone(),
        birth_date: args.birth_date.clone(),
        ..Patient::default()
    }
}

pub async fn create(client: &LinkedCareClient<'_, Connection>, args: &CreatePatientArgs) -> Result<()> {
    let outcome = client.create_patient(&build_patient(args)).await?;
    if !print_outcome("create-patient", &outcome) {
        anyhow::bail!("Patient was not created");
    }
    Ok(())
}

pub async fn get(client: &LinkedCareClient<'_, Connection>, id: &str) -> Result<()> {
    let outcome = client.read_patient(id).await?;
    if !print_outcome("read-patient", &outcome) {
        anyhow::bail!("Patient {id} could not be read");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_patient() {
        let args = CreatePatientArgs {
            family: "Huber".into(),
            given: vec!["Anna".into(), "Maria".into()],
            gender: Some("female".into()),
            birth_date: None,
        };
        let patient = build_patient(&args);
        assert!(patient.id.is_empty());
        assert_eq!(patient.display_name(), "Anna Maria Huber");
        assert_eq!(patient.gender.as_deref(), Some("female"));
    }
}
