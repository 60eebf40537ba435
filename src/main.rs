use anyhow::Result;
use open_charge_protocol::{api, config, telemetry};
use config::Config;
use std::sync::Arc;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load()?;
    init_tracing(&cfg.logging)?;

    let endpoint = Arc::new(cfg.endpoint_builder().build());

    let app = api::router(api::AppState::new(Arc::clone(&endpoint), &cfg), &cfg);
    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("binding to 0.0.0.0 without TLS; put a terminating proxy in front in production");
    }

    info!(
        %addr,
        role = %endpoint.role(),
        soap_path = %cfg.server.soap_path,
        ws_path = %cfg.server.ws_path,
        "starting OCPP endpoint"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    for charge_box_id in endpoint.sessions().charge_box_ids() {
        if let Some(session) = endpoint.sessions().get(&charge_box_id) {
            endpoint.close_session(&session);
        }
    }
    warn!("shutdown complete");
    Ok(())
}
