use anyhow::Result;
use colored::Colorize;
use linkedcare_client::{CATALOG, Connection, Negotiation};

use crate::cli::OutputFormat;
use crate::output::{print_catalog, print_error, print_resource, print_success};

pub async fn connect(connection: &Connection, format: OutputFormat) -> Result<()> {
    print_success(&format!("Connected to {}", connection.server_base_url().cyan()));

    match connection.negotiate_capabilities().await? {
        Negotiation::Succeeded(cs) => {
            if matches!(format, OutputFormat::Table) {
                let (name, version) = cs
                    .software
                    .as_ref()
                    .map(|s| (s.name.as_str(), s.version.as_deref().unwrap_or("unknown")))
                    .unwrap_or(("unknown", "unknown"));
                println!("{}: {} {}", "Server".cyan(), name, version);
                println!(
                    "{}: {}",
                    "FHIR Version".cyan(),
                    cs.fhir_version.as_deref().unwrap_or("unknown")
                );
                println!(
                    "{}: {}",
                    "Status".cyan(),
                    cs.status.as_deref().unwrap_or("unknown")
                );
                let types = cs.resource_types();
                println!("{}: {} resource types", "Resources".cyan(), types.len());
                if !types.is_empty() {
                    println!("  {}", types.join(", "));
                }
                let operations = cs.operations();
                if !operations.is_empty() {
                    println!("{}: {}", "Operations".cyan(), operations.join(", "));
                }
            } else {
                print_resource(&cs);
            }
            Ok(())
        }
        Negotiation::NotConnected => anyhow::bail!("Not connected"),
        Negotiation::Unauthorized => {
            print_error("Server refused the capability request");
            anyhow::bail!("Capability negotiation unauthorized")
        }
        Negotiation::CouldNotParse => {
            anyhow::bail!("Server capability statement could not be parsed")
        }
    }
}

pub fn operations() {
    print_catalog(CATALOG);
}
