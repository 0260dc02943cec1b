//! calsync CLI entry point.

use std::process::ExitCode;

use calsync_core::{TracingConfig, init_tracing};
use clap::Parser;

use calsync_cli::cli::{Cli, Command, ConfigAction};
use calsync_cli::commands;
use calsync_cli::config::ClientConfig;
use calsync_cli::error::{ClientError, ClientResult};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            if e.is_retryable() {
                eprintln!("hint: this looks temporary, try again in a moment");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let config = if let Some(ref path) = cli.config {
        ClientConfig::load_from(path).map_err(ClientError::Config)?
    } else {
        ClientConfig::load().map_err(ClientError::Config)?
    };

    match cli.command {
        Command::Auth {
            client_id,
            client_secret,
            credentials_file,
        } => {
            commands::auth::sign_in(
                client_id,
                client_secret,
                credentials_file,
                &config,
                &config_path,
            )
            .await
        }
        Command::Signout => commands::auth::sign_out(&config).await,
        Command::Status => commands::auth::status(&config).await,
        Command::Events { view, date, json } => {
            commands::events::list(view, date, json, &config).await
        }
        Command::Create { start, end, title } => {
            commands::events::create(start, end, title, &config).await
        }
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config, &config_path),
        },
    }
}
