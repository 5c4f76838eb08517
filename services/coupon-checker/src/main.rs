//! IIJmio coupon checker
//!
//! Command-line client for the IIJmio coupon API:
//! 1. Loads configuration and the stored access token
//! 2. Runs the requested command (`auth`, `show`, `switch`)
//! 3. Re-authorizes through the browser when the API rejects the token
//!
//! Ctrl-C or SIGTERM stops a pending browser authorization and releases the
//! redirect listener port.

mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use coupon_api::{CouponService, ReqwestTransport};
use iijmio_auth::{FileCredentialStore, InterruptHandle, ListenerConfig, OAuthFlow, SHUTDOWN_TIMEOUT};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs to stderr so stdout stays clean for command output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config);
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    if config.api.developer_id.is_none() {
        warn!("no developer id configured, set api.developer_id or IIJMIO_DEVELOPER_ID");
    }

    let store = Arc::new(
        FileCredentialStore::load(
            config.oauth.credentials_path.clone(),
            config.api.developer_id.clone(),
        )
        .await
        .context("failed to load stored credentials")?,
    );

    let flow = OAuthFlow::new(store.clone())
        .with_authorize_endpoint(config.oauth.authorize_url.clone())
        .with_redirect_uri(config.oauth.redirect_uri.clone())
        .with_listener(ListenerConfig {
            listen_addr: config.oauth.listen_addr.clone(),
            timeout: config.oauth.timeout(),
        });
    let interrupt = flow.interrupt_handle();

    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let service = CouponService::new(
        Arc::new(ReqwestTransport::new(client, config.api.timeout())),
        store,
        Arc::new(flow),
        config.api.coupon_url.clone(),
    );

    let command = run_command(&service, cli.command);
    tokio::pin!(command);

    tokio::select! {
        result = &mut command => result,
        () = shutdown_signal() => {
            interrupt_and_wait(interrupt, command).await
        }
    }
}

/// Stop a pending authorization and give the command a bounded time to unwind.
async fn interrupt_and_wait(
    interrupt: InterruptHandle,
    command: impl std::future::Future<Output = Result<()>>,
) -> Result<()> {
    interrupt.interrupt();
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, command).await {
        Ok(result) => result,
        Err(_) => anyhow::bail!(
            "command did not stop within {}s of the shutdown signal",
            SHUTDOWN_TIMEOUT.as_secs()
        ),
    }
}

async fn run_command(service: &CouponService, command: Command) -> Result<()> {
    match command {
        Command::Auth => {
            service.authenticate().await.context("authorization failed")?;
            println!("authorized");
        }
        Command::Show => {
            let infos = service
                .fetch_coupon_info()
                .await
                .context("failed to fetch coupon info")?;
            for account in &infos {
                info!(
                    hdd_service_code = account.hdd_service_code.as_deref().unwrap_or_default(),
                    total_volume_mb = account.total_volume(),
                    "account coupon total"
                );
            }
            println!("{}", serde_json::to_string_pretty(&infos)?);
        }
        Command::Switch {
            hdo_service_code,
            state,
        } => {
            let response = service
                .set_coupon_enabled(&hdo_service_code, state.enabled())
                .await
                .with_context(|| format!("failed to switch coupon use for {hdo_service_code}"))?;
            println!("{response}");
        }
    }
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
///
/// A handler that fails to install never fires; the other one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, stopping"),
        _ = terminate => info!("received SIGTERM, stopping"),
    }
}
