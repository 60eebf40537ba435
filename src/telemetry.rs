//! Tracing setup for the endpoint binary, driven by the `[logging]` config section, and the
//! process shutdown signal.

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Installs the global subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.filter)
            .with_context(|| format!("invalid logging.filter `{}`", logging.filter))?,
    };
    let json = logging.format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer().with_target(true)))
        .try_init()
        .context("a global tracing subscriber is already installed")?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed is logged and ignored.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "ctrl_c", "shutdown signal received"),
        _ = terminate => info!(signal = "sigterm", "shutdown signal received"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filters_are_reported() {
        let logging = LoggingConfig {
            filter: "open_charge_protocol=loud".into(),
            format: LogFormat::Text,
        };
        if std::env::var_os("RUST_LOG").is_none() {
            let err = init_tracing(&logging).unwrap_err();
            assert!(err.to_string().contains("logging.filter"), "{err}");
        }
    }
}
