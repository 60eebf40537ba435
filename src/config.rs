use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::ocpp::dispatch::{DispatchTimeouts, SelectionPolicy};
use crate::ocpp::endpoint::{EndpointBuilder, OcppEndpoint, Role};
use crate::ocpp::ids::Identity;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub endpoint: EndpointConfig,
    pub dispatch: DispatchConfig,
    pub websocket: WebSocketConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub soap_path: String,
    pub ws_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8180,
            soap_path: "/ocpp/soap".into(),
            ws_path: "/ocpp".into(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Our own identity, reported to hooks and used as `wsa:From` on replies.
    pub identity: Option<String>,
    pub role: Role,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            identity: None,
            role: Role::CentralSystem,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    pub default_timeout_seconds: u64,
    /// Deadline overrides keyed by action name, e.g. `RemoteStartTransaction = 20`.
    /// Keys are matched case-insensitively.
    pub action_timeouts: HashMap<String, u64>,
    pub policy: SelectionPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_timeout_seconds: 60,
            action_timeouts: HashMap::new(),
            policy: SelectionPolicy::FirstCompleted,
        }
    }
}

impl DispatchConfig {
    pub fn timeouts(&self) -> DispatchTimeouts {
        self.action_timeouts.iter().fold(
            DispatchTimeouts::new(Duration::from_secs(self.default_timeout_seconds)),
            |timeouts, (action, seconds)| timeouts.with_action(action.clone(), Duration::from_secs(*seconds)),
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebSocketConfig {
    pub subprotocol: String,
    pub call_timeout_seconds: u64,
    pub outbound_queue: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            subprotocol: "ocpp1.6".into(),
            call_timeout_seconds: 30,
            outbound_queue: 64,
        }
    }
}

impl WebSocketConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,open_charge_protocol=info,tower_http=info,hyper=warn".into(),
            format: LogFormat::Json,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("OCPP__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        if let Some(identity) = &config.endpoint.identity {
            if Identity::try_parse(identity).is_none() {
                anyhow::bail!("endpoint.identity must not be blank");
            }
        }
        Ok(config)
    }

    /// Endpoint builder carrying the configured role, identity and deadlines.
    pub fn endpoint_builder(&self) -> EndpointBuilder {
        OcppEndpoint::builder(self.endpoint.role)
            .identity(self.endpoint.identity.as_deref().and_then(Identity::try_parse))
            .timeouts(self.dispatch.timeouts())
            .policy(self.dispatch.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_the_protocol_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.dispatch.default_timeout_seconds, 60);
        assert_eq!(cfg.websocket.subprotocol, "ocpp1.6");
        assert_eq!(cfg.dispatch.timeouts().for_action("Reset"), Duration::from_secs(60));
    }

    #[test]
    fn environment_overrides_file_and_defaults() {
        Jail::expect_with(|jail| {
            std::fs::create_dir("config").map_err(|e| e.to_string())?;
            jail.create_file(
                "config/default.toml",
                r#"
                [endpoint]
                identity = "CS-main"
                role = "charge_point"

                [dispatch.action_timeouts]
                RemoteStartTransaction = 20
                "#,
            )?;
            jail.set_env("OCPP__DISPATCH__DEFAULT_TIMEOUT_SECONDS", "30");
            jail.set_env("OCPP__DISPATCH__POLICY", "first_successful");
            jail.set_env("OCPP__LOGGING__FORMAT", "text");

            let cfg = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(cfg.endpoint.role, Role::ChargePoint);
            assert_eq!(cfg.dispatch.policy, SelectionPolicy::FirstSuccessful);
            assert_eq!(cfg.logging.format, LogFormat::Text);
            let timeouts = cfg.dispatch.timeouts();
            assert_eq!(timeouts.for_action("RemoteStartTransaction"), Duration::from_secs(20));
            assert_eq!(timeouts.for_action("Reset"), Duration::from_secs(30));

            let endpoint = cfg.endpoint_builder().build();
            assert_eq!(endpoint.identity().map(Identity::as_str), Some("CS-main"));
            assert!(endpoint.supports("ReserveNow"));
            Ok(())
        });
    }

    #[test]
    fn action_timeouts_from_the_environment_apply() {
        Jail::expect_with(|jail| {
            jail.set_env("OCPP__DISPATCH__ACTION_TIMEOUTS__RemoteStartTransaction", "7");

            let cfg = Config::load().map_err(|e| e.to_string())?;
            let timeouts = cfg.dispatch.timeouts();
            assert_eq!(timeouts.for_action("RemoteStartTransaction"), Duration::from_secs(7));
            assert_eq!(timeouts.for_action("Reset"), Duration::from_secs(60));
            Ok(())
        });
    }

    #[test]
    fn blank_identity_is_rejected() {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(("endpoint.identity", "  "));
        assert!(Config::from_figment(figment).is_err());
    }
}
