//! Tollgate CLI entry point

mod cli;

use crate::cli::{Cli, Commands, TokenCommands};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tollgate::auth::{unix_now, Credential, BEARER_PREFIX};
use tollgate::gate::{Namespace, PolicyMode, PolicyTable};
use tollgate::handler::EchoHandler;
use tollgate::server::{run_server, WsState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let secret = cli
        .secret
        .context("TOLLGATE_SECRET or --secret required")?;

    match cli.command {
        Commands::Serve {
            bind,
            ttl,
            strict,
            permissive,
            default_policy,
        } => serve(secret, bind, ttl, strict, permissive, default_policy).await,
        Commands::Token { command } => token(secret, command),
    }
}

async fn serve(
    secret: String,
    bind: String,
    ttl: u64,
    strict: Vec<String>,
    permissive: Vec<String>,
    default_policy: PolicyMode,
) -> Result<()> {
    // Unlisted namespaces are strict; the default namespace stays permissive
    // unless asked otherwise, so failure verdicts remain observable there.
    let mut policies = PolicyTable::new(PolicyMode::Strict);
    policies.set(Namespace::root(), default_policy);
    for name in strict {
        let namespace =
            Namespace::parse(&name).with_context(|| format!("Invalid namespace: {}", name))?;
        policies.set(namespace, PolicyMode::Strict);
    }
    for name in permissive {
        let namespace =
            Namespace::parse(&name).with_context(|| format!("Invalid namespace: {}", name))?;
        policies.set(namespace, PolicyMode::Permissive);
    }

    let bind_addr = bind.parse().context("Invalid bind address")?;
    let state = WsState::new(secret.into_bytes(), ttl, policies, Arc::new(EchoHandler));

    info!(addr = %bind, "Starting tollgate server...");

    tokio::select! {
        result = run_server(bind_addr, state) => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server");
        }
    }

    Ok(())
}

fn token(secret: String, command: TokenCommands) -> Result<()> {
    match command {
        TokenCommands::Issue { ttl } => {
            let credential = Credential::issue(secret.as_bytes(), ttl, unix_now());

            println!("{}", credential.encode());
            println!();
            println!("Issued at:  {}", credential.issued_at());
            println!("Expires at: {}", credential.expires_at());
        }
        TokenCommands::Inspect { token } => {
            let raw = token.strip_prefix(BEARER_PREFIX).unwrap_or(&token);
            let credential = Credential::decode(raw).context("Credential did not decode")?;

            println!("Issued at:  {}", credential.issued_at());
            println!("Expires at: {}", credential.expires_at());
            println!(
                "Status:     {}",
                credential.verify(secret.as_bytes(), unix_now())
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
