use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "linkedcare")]
#[command(about = "Linked Care CLI: exchange medication orders with a Linked Care server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Server base URL (overrides config and LINKEDCARE_URL env var)
    #[arg(short, long, global = true, env = "LINKEDCARE_URL")]
    pub server: Option<String>,

    /// Path to a config file (defaults to the user config, then ./linkedcare.toml)
    #[arg(short, long, global = true, env = "LINKEDCARE_CONFIG")]
    pub config: Option<String>,

    /// PEM file with client certificate and key (overrides the configured source)
    #[arg(long, global = true)]
    pub certificate: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Connect and negotiate capabilities
    Connect,
    /// List the available operations
    Operations,
    /// Patient records
    Patient(PatientArgs),
    /// Order groups, order lines and dispenses
    Order(OrderArgs),
    /// Inspect order chains
    Chain(ChainArgs),
    /// Manage CLI configuration
    Config(ConfigArgs),
}

#[derive(Debug, clap::Args)]
pub struct PatientArgs {
    #[command(subcommand)]
    pub command: PatientCommands,
}

#[derive(Debug, Subcommand)]
pub enum PatientCommands {
    /// Register a patient
    Create(CreatePatientArgs),
    /// Read a patient by id
    Get(IdArgs),
}

#[derive(Debug, clap::Args)]
pub struct CreatePatientArgs {
    /// Family name
    #[arg(long)]
    pub family: String,
    /// Given names
    #[arg(long)]
    pub given: Vec<String>,
    /// Administrative gender (male, female, other, unknown)
    #[arg(long)]
    pub gender: Option<String>,
    /// Birth date (YYYY-MM-DD)
    #[arg(long)]
    pub birth_date: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Debug, clap::Args)]
pub struct OrderArgs {
    #[command(subcommand)]
    pub command: OrderCommands,
}

#[derive(Debug, Subcommand)]
pub enum OrderCommands {
    /// Open an order group for a patient
    Group(PatientRef),
    /// Submit a transaction bundle from a JSON file (reads stdin if omitted)
    Submit(SubmitArgs),
    /// Propose a medication
    Propose(ProposeArgs),
    /// Prescribe a medication
    Prescribe(PrescribeArgs),
    /// Record a dispense against a prescription
    Dispense(DispenseArgs),
    /// Revoke an order group
    Revoke(IdArgs),
}

#[derive(Debug, clap::Args)]
pub struct PatientRef {
    /// Patient id
    pub patient: String,
}

#[derive(Debug, clap::Args)]
pub struct SubmitArgs {
    /// Path to a transaction bundle
    #[arg(long)]
    pub file: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct ProposeArgs {
    /// Patient id
    pub patient: String,
    /// Earlier proposal this one follows up (e.g. ProposalMedicationRequest/P1)
    #[arg(long)]
    pub based_on: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct PrescribeArgs {
    /// Patient id
    pub patient: String,
    /// Proposal this prescription fulfils
    #[arg(long)]
    pub based_on: Option<String>,
    /// Prescription this one replaces
    #[arg(long)]
    pub prior: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct DispenseArgs {
    /// Patient id
    pub patient: String,
    /// Authorizing prescription (e.g. PrescriptionMedicationRequest/R1)
    pub prescription: String,
    /// Dispense type code; codes ending in C complete the prescription
    #[arg(long, default_value = "FFC")]
    pub type_code: String,
    /// Dispense status
    #[arg(long, default_value = "completed")]
    pub status: String,
}

#[derive(Debug, clap::Args)]
pub struct ChainArgs {
    #[command(subcommand)]
    pub command: ChainCommands,
    /// Only list open proposals and prescriptions
    #[arg(long, global = true)]
    pub open: bool,
}

#[derive(Debug, Subcommand)]
pub enum ChainCommands {
    /// Chains around one order line
    Show(IdArgs),
    /// Chains updated within a time window (RFC 3339 timestamps)
    Window(WindowArgs),
}

#[derive(Debug, clap::Args)]
pub struct WindowArgs {
    /// Window start, inclusive
    #[arg(long)]
    pub from: String,
    /// Window end, exclusive (defaults to now)
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective config
    Show,
    /// Set a value in the user config file
    Set(ConfigSetArgs),
}

#[derive(Debug, clap::Args)]
pub struct ConfigSetArgs {
    /// Key to set (e.g. server.url, certificate.directory, logging.level)
    pub key: String,
    /// Value
    pub value: String,
}
