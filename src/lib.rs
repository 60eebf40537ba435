pub mod api;
pub mod config;
pub mod ocpp;
pub mod telemetry;
