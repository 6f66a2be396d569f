//! toolsync: command-line client for the tool checkout / robot travel service.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use toolsync_core::{Intent, Station};
use toolsync_runtime::{
    ClientConfig, CredentialStore, FileCredentialStore, Identity, MemoryCredentialStore,
    SyncClient,
};

mod cli;
mod cmd_mutate;
mod cmd_view;
mod cmd_watch;
mod display;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("TOOLSYNC_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config = resolve_config(&args)?;
    let credentials_path = args
        .credentials
        .clone()
        .or_else(|| config.credentials_path.clone())
        .unwrap_or_else(cli::default_credentials_path);

    if let cli::Command::LoginAs(opts) = &args.command {
        let store = FileCredentialStore::new(&credentials_path);
        let identity = Identity {
            user_id: opts.user_id.clone(),
            name: opts.name.clone(),
        };
        identity.save(&store)?;
        println!("signed in as {} ({})", opts.user_id, credentials_path.display());
        return Ok(());
    }

    let credentials: Arc<dyn CredentialStore> = match &args.user_id {
        Some(user_id) => Arc::new(MemoryCredentialStore::with_user(user_id)),
        None => Arc::new(FileCredentialStore::new(&credentials_path)),
    };
    let client = SyncClient::from_config(&config, credentials)
        .context("failed to build HTTP client")?;
    tracing::debug!(api_url = %config.api_url, "client ready");

    match args.command {
        cli::Command::Watch => cmd_watch::cmd_watch(&client, args.json).await?,
        cli::Command::Status => {
            cmd_view::cmd_view(&client, cmd_view::View::Status, args.json).await?;
        }
        cli::Command::Tools => {
            cmd_view::cmd_view(&client, cmd_view::View::Tools, args.json).await?;
        }
        cli::Command::Jobs => {
            cmd_view::cmd_view(&client, cmd_view::View::Jobs, args.json).await?;
        }
        cli::Command::History(opts) => {
            let view = cmd_view::View::History {
                search: opts.search,
            };
            cmd_view::cmd_view(&client, view, args.json).await?;
        }
        cli::Command::CheckoutTool(opts) => {
            let intent = Intent::CheckoutTool { tool_id: opts.id };
            cmd_mutate::cmd_mutate(&client, intent, opts.yes).await?;
        }
        cli::Command::CheckinTool(opts) => {
            let intent = Intent::CheckinTool { tool_id: opts.id };
            cmd_mutate::cmd_mutate(&client, intent, opts.yes).await?;
        }
        cli::Command::CheckoutJob(opts) => {
            let intent = Intent::CheckoutJob { job_id: opts.id };
            cmd_mutate::cmd_mutate(&client, intent, opts.yes).await?;
        }
        cli::Command::Travel(opts) => {
            let intent = Intent::Travel {
                destination: Station::new(opts.station),
            };
            cmd_mutate::cmd_mutate(&client, intent, opts.yes).await?;
        }
        cli::Command::Estop => cmd_mutate::cmd_estop(&client).await?,
        cli::Command::LoginAs(_) => {}
    }

    Ok(())
}

/// Defaults < TOML file < command-line / environment overrides.
fn resolve_config(args: &cli::Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = &args.api_url {
        config.api_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}
