//! `rosterd` - HTTP service and maintenance commands for roster.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use roster::cli::{Cli, Command, ConfigCommand, ServeCommand};
use roster::{init_logging, router, AppState, Config, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(load_config(cli.config)?, &serve_cmd).await,
        Command::Seed => handle_seed(&load_config(cli.config)?).await,
        Command::Config(ConfigCommand::Show { json }) => {
            handle_show(&load_config(cli.config)?, json)
        }
        Command::Config(ConfigCommand::Path) => {
            let path = cli.config.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
            Ok(())
        }
        Command::Config(ConfigCommand::Validate { file }) => {
            handle_validate(file.or(cli.config));
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    Config::load_from(path).context("could not load configuration")
}

async fn handle_serve(mut config: Config, cmd: &ServeCommand) -> anyhow::Result<()> {
    cmd.apply(&mut config)?;

    let store = Storage::connect_lazy(config.database_path());
    if !store.is_connected() {
        warn!(
            "Starting without a database at {}; requests retry the connection",
            store.path().display()
        );
    }
    let state = AppState::new(Arc::new(store))
        .with_error_details(config.expose_error_details())
        .with_cors(config.server.cors_enabled);

    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    info!("Student Management API listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn handle_seed(config: &Config) -> anyhow::Result<()> {
    let store = Storage::open(config.database_path())?;
    let added = roster::seed::seed(&store).await?;
    println!("Added {added} sample students to {}", store.path().display());
    Ok(())
}

fn handle_show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        println!("Current Configuration");
        println!("=====================");
        println!();
        println!("[Server]");
        println!("  Host:           {}", config.server.host);
        println!("  Port:           {}", config.server.port);
        println!("  Mode:           {:?}", config.server.mode);
        println!("  CORS enabled:   {}", config.server.cors_enabled);
        println!();
        println!("[Storage]");
        println!("  Database path:  {}", config.database_path().display());
    }
    Ok(())
}

fn handle_validate(file: Option<PathBuf>) {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => println!("Configuration error: {e}"),
    }
}
