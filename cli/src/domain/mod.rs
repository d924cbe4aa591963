//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod audit;
pub mod config;
pub mod error;
pub mod health;
pub mod network;
pub mod plugin;
pub mod proxmox;
pub mod template;
pub mod time;
pub mod validate;

pub use config::TimeShiftConfig;
pub use error::{ConfigError, PluginError, ProxmoxError, TemplateError, TimeShiftError, ValidationError};
