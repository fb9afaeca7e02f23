//! Tracker Service - composition root for the tracker core.
//!
//! Wires storage, the permission resolver and the transition executor
//! together from a [`TrackerConfig`], and installs logging.
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod service;
pub mod telemetry;

pub use config::{
    ConfigError, ConfigResult, ExecutorConfig, LoggingConfig, NotificationConfig, TrackerConfig,
    CONFIG_ENV,
};
pub use error::{ServiceError, ServiceResult};
pub use service::TrackerService;
pub use telemetry::init_tracing;
