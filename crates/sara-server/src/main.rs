//! `sara` command line: serve the API, import properties, check mail and configuration

#![forbid(unsafe_code)]

use anyhow::{bail, Context as _};
use clap::{Arg, ArgMatches, Command};
use sara_core::{Principal, Sara, SaraConfig};
use sara_domain::{Role, UserId};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("SARA_LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn cli() -> Command {
    Command::new("sara")
        .version(sara_core::VERSION)
        .about("S.A.R.A. rental management backend")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("TOML configuration file; SARA_* variables override it"),
        )
        .subcommand_required(true)
        .subcommand(Command::new("serve").about("Run the HTTP API"))
        .subcommand(
            Command::new("import-csv")
                .about("Import properties from a CSV file for a landlord")
                .arg(
                    Arg::new("owner")
                        .long("owner")
                        .required(true)
                        .help("User id of the landlord who will own the properties"),
                )
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("CSV file, comma or semicolon separated"),
                ),
        )
        .subcommand(
            Command::new("send-test-email")
                .about("Send a delivery check message")
                .arg(Arg::new("to").required(true).help("Recipient address")),
        )
        .subcommand(Command::new("check-config").about("Validate and print the effective configuration"))
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<SaraConfig> {
    let path = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
    let config = SaraConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn serve(config: SaraConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr()?;
    let sara = Sara::from_config(config).await?;
    sara_server::serve(&sara, addr, wait_for_shutdown_signal()).await?;
    Ok(())
}

async fn import_csv(config: SaraConfig, owner: &str, file: &Path) -> anyhow::Result<()> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;
    let sara = Sara::from_config(config).await?;
    let admin = Principal::new("cli", Role::Admin);
    let profile = sara.accounts().profile(&admin, &UserId::new(owner)).await?;
    if profile.role != Role::Arrendador {
        bail!("user {owner} is {}, only landlords own properties", profile.role);
    }
    let principal = Principal::new(owner, profile.role);
    let report = sara.bulk_upload().import_csv(&principal, &data).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.errors.is_empty() {
        bail!("{} rows were rejected", report.errors.len());
    }
    Ok(())
}

async fn send_test_email(config: SaraConfig, to: &str) -> anyhow::Result<()> {
    let sara = Sara::from_config(config).await?;
    let id = sara.notifier().test_message(to).await?;
    println!("sent: {id}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let matches = cli().get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("serve", _)) => serve(config).await,
        Some(("import-csv", args)) => {
            let owner = args
                .get_one::<String>("owner")
                .context("--owner is required")?;
            let file = args
                .get_one::<PathBuf>("file")
                .context("a CSV file is required")?;
            import_csv(config, owner, file).await
        }
        Some(("send-test-email", args)) => {
            let to = args
                .get_one::<String>("to")
                .context("a recipient is required")?;
            send_test_email(config, to).await
        }
        Some(("check-config", _)) => {
            println!("{}", masked_config(&config)?);
            Ok(())
        }
        _ => bail!("unknown command"),
    }
}

/// Effective configuration with the mail API key masked
fn masked_config(config: &SaraConfig) -> anyhow::Result<String> {
    let mut shown = config.clone();
    if shown.mail.api_key.is_some() {
        shown.mail.api_key = Some("<redacted>".into());
    }
    Ok(serde_json::to_string_pretty(&shown)?)
}
