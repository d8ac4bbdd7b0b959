//! postwire - an SMTP/ESMTP server that accepts mail and logs it.
//!
//! Usage: `postwire [SETTINGS_FILE]`
//!
//! Settings default to `<config dir>/postwire/settings.json`. The
//! `POSTWIRE_LISTEN` environment variable overrides the listen address.

#![forbid(unsafe_code)]

mod settings;

use std::path::PathBuf;

use anyhow::Context;
use postwire_server::{ConnectionInfo, LoggingHandler, Server};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postwire=info,postwire_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut settings = settings::load(std::env::args_os().nth(1).map(PathBuf::from)).await?;
    if let Ok(listen) = std::env::var("POSTWIRE_LISTEN") {
        settings.listen = listen;
    }

    let listener = TcpListener::bind(&settings.listen)
        .await
        .with_context(|| format!("binding {}", settings.listen))?;
    tracing::info!(
        listen = %settings.listen,
        hostname = %settings.server.hostname,
        "postwire starting"
    );

    let server = Server::new(settings.server, |_: &ConnectionInfo| LoggingHandler);

    tokio::select! {
        result = server.run(listener) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for shutdown signal")?;
            tracing::info!("shutting down");
        }
    }

    Ok(())
}
