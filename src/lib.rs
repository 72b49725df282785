//! telemetryd - device connection supervisor and telemetry publisher
//!
//! A small daemon that keeps an IoT device session alive against an
//! MQTT broker and publishes sensor telemetry on a fixed cadence.
//!
//! # Overview
//!
//! This crate provides:
//! - A layered connection supervisor that tracks the network link and
//!   the broker session separately and never lets the session outlive
//!   the link
//! - Three transport profiles: plain credentials, credentials over
//!   TLS, and mutual TLS with a client certificate
//! - A fixed-interval telemetry scheduler gated on the connected state
//! - A retry policy (bounded or continuous) owned by the runtime loop
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use telemetryd::config::DeviceConfig;
//! use telemetryd::link::mqtt::{LinkSettings, RumqttcLink};
//! use telemetryd::runtime::{DeviceRuntime, RuntimeSettings};
//! use telemetryd::status::LogReporter;
//! use telemetryd::telemetry::SimulatedSensor;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DeviceConfig::load_from_file(std::path::Path::new("device.toml"))?;
//! let profile = config.broker.resolve(std::path::Path::new("."))?;
//!
//! let link = RumqttcLink::new(
//!     profile.host.clone(),
//!     profile.port,
//!     LinkSettings::default(),
//! );
//! let sensor = SimulatedSensor::new(Some(profile.device_id().to_string()));
//!
//! let mut runtime = DeviceRuntime::new(
//!     link,
//!     profile,
//!     RuntimeSettings::from_config(&config),
//!     Box::new(sensor),
//!     Box::new(LogReporter),
//! );
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! runtime.run(shutdown_rx).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod link;
pub mod observability;
pub mod runtime;
pub mod status;
pub mod supervisor;
pub mod telemetry;
pub mod testing;

pub use config::{AuthMode, DeviceConfig, TransportProfile};
pub use error::{BrokerCode, LastError, TelemetryError, TelemetryResult};
pub use runtime::{DeviceRuntime, RuntimeSettings, RuntimeStats};
pub use supervisor::{CompositeState, ConnectionState, ConnectionSupervisor, RetryPolicy};
pub use telemetry::TelemetryScheduler;
