//! Command implementations

pub mod config;
pub mod health;
pub mod network;
pub mod plugins;
pub mod template;
pub mod time;
pub mod version;
pub mod vm;
pub mod wizard;
