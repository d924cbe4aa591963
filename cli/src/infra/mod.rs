//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, file
//! access, HTTP clients, host metrics and embedded templates.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod assets;
pub mod audit;
pub mod backup;
pub mod command_runner;
pub mod config;
pub mod fs;
pub mod logging;
pub mod network;
pub mod proxmox;
pub mod system;
