use anyhow::{Context, Result};
use linkedcare_client::{ChainReport, Connection, LinkedCareClient, Outcome};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::cli::OutputFormat;
use crate::output::{print_chain_report, print_error, print_issues};

type Client<'a> = LinkedCareClient<'a, Connection>;

pub async fn show(client: &Client<'_>, id: &str, format: OutputFormat, open_only: bool) -> Result<()> {
    let outcome = client.query_chains_by_id(id).await?;
    present(outcome, format, open_only)
}

pub async fn window(
    client: &Client<'_>,
    from: &str,
    to: Option<&str>,
    format: OutputFormat,
    open_only: bool,
) -> Result<()> {
    let from = parse_timestamp(from)?;
    let to = match to {
        Some(to) => parse_timestamp(to)?,
        None => OffsetDateTime::now_utc(),
    };
    let outcome = client.query_chains_in_window(from, to).await?;
    present(outcome, format, open_only)
}

pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .with_context(|| format!("Invalid timestamp {raw:?}, expected RFC 3339 (e.g. 2026-10-01T00:00:00Z)"))
}

fn present(outcome: Outcome<ChainReport>, format: OutputFormat, open_only: bool) -> Result<()> {
    match outcome {
        Outcome::Accepted(report) => {
            print_chain_report(&report, format, open_only);
            Ok(())
        }
        Outcome::Rejected(report) => {
            print_error("query-chains: rejected by server");
            print_issues(&report);
            anyhow::bail!("Chain query was rejected")
        }
        Outcome::PartiallyRejected(_) | Outcome::Unparseable { .. } => {
            anyhow::bail!("Chain query answer could not be understood")
        }
    }
}
