mod cli;
mod commands;
mod config;
mod observability;
mod output;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use linkedcare_client::{
    ClientCertificate, ClientConfig, ClientError, Connection, Connector, LinkedCareClient,
};

use cli::{ChainCommands, Cli, Commands, ConfigCommands, OrderCommands, PatientCommands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(client_error) = e.chain().find_map(|c| c.downcast_ref::<ClientError>()) {
            tracing::debug!(
                category = client_error.category(),
                fatal = client_error.is_fatal(),
                "Command failed"
            );
        }
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();
    let cfg = config::load(cli.config.as_deref())?;
    observability::init_tracing_with_level(&cfg.logging.level);
    tracing::debug!(command = ?cli.command, "Dispatching command");

    match &cli.command {
        Commands::Config(args) => match &args.command {
            ConfigCommands::Show => {
                let server = cfg.server.url.as_deref().unwrap_or("(not set)");
                println!("{}: {}", "Server".cyan(), server);
                println!(
                    "{}: {}s",
                    "Request timeout".cyan(),
                    cfg.server.request_timeout_secs
                );
                let certificate = match (&cfg.certificate.file, &cfg.certificate.directory) {
                    (Some(file), _) => format!("file {}", file.display()),
                    (None, Some(dir)) => format!("directory {}", dir.display()),
                    (None, None) => "(none)".to_string(),
                };
                println!("{}: {}", "Certificate".cyan(), certificate);
                println!("{}: {}", "Log level".cyan(), cfg.logging.level);
            }
            ConfigCommands::Set(set_args) => {
                let path = match &cli.config {
                    Some(path) => Path::new(path).to_path_buf(),
                    None => config::user_config_path()?,
                };
                let mut file_cfg = config::read_file(&path)?;
                config::set_value(&mut file_cfg, &set_args.key, &set_args.value)?;
                config::write_file(&path, &file_cfg)?;
                output::print_success(&format!("Set {} = {}", set_args.key, set_args.value));
            }
        },
        Commands::Operations => commands::server::operations(),
        Commands::Connect => {
            let connection = connect(&cli, &cfg).await?;
            commands::server::connect(&connection, format).await?;
        }
        Commands::Patient(args) => {
            let connection = connect(&cli, &cfg).await?;
            let client = LinkedCareClient::new(&connection);
            match &args.command {
                PatientCommands::Create(create) => {
                    commands::patient::create(&client, create).await?
                }
                PatientCommands::Get(get) => commands::patient::get(&client, &get.id).await?,
            }
        }
        Commands::Order(args) => {
            let connection = connect(&cli, &cfg).await?;
            let client = LinkedCareClient::new(&connection);
            match &args.command {
                OrderCommands::Group(group) => {
                    commands::order::group(&client, &group.patient).await?
                }
                OrderCommands::Submit(submit) => {
                    commands::order::submit(&client, submit.file.as_deref()).await?
                }
                OrderCommands::Propose(propose) => {
                    commands::order::propose(&client, propose).await?
                }
                OrderCommands::Prescribe(prescribe) => {
                    commands::order::prescribe(&client, prescribe).await?
                }
                OrderCommands::Dispense(dispense) => {
                    commands::order::record_dispense(&client, dispense).await?
                }
                OrderCommands::Revoke(revoke) => {
                    commands::order::revoke(&client, &revoke.id).await?
                }
            }
        }
        Commands::Chain(args) => {
            let connection = connect(&cli, &cfg).await?;
            let client = LinkedCareClient::new(&connection);
            match &args.command {
                ChainCommands::Show(show) => {
                    commands::chain::show(&client, &show.id, format, args.open).await?
                }
                ChainCommands::Window(window) => {
                    commands::chain::window(
                        &client,
                        &window.from,
                        window.to.as_deref(),
                        format,
                        args.open,
                    )
                    .await?
                }
            }
        }
    }

    Ok(())
}

async fn connect(cli: &Cli, cfg: &ClientConfig) -> Result<Connection> {
    let server = config::resolve_server(&cli.server, cfg)?;
    let certificate = cli
        .certificate
        .as_deref()
        .map(|path| ClientCertificate::from_file(Path::new(path)))
        .transpose()
        .context("Failed to load client certificate")?;

    let connection = Connector::from_config(cfg)
        .connect(&server, certificate)
        .await
        .with_context(|| format!("Failed to connect to {server}"))?;
    tracing::info!(server = %server, succeeded = connection.succeeded(), "Connection attempt finished");
    if !connection.succeeded() {
        anyhow::bail!(
            "Could not authenticate with {server}. Check the server URL and the client certificate"
        );
    }
    Ok(connection)
}
