//! Bootstrap module for the relaymail worker
//!
//! This module handles:
//! - Configuration loading
//! - Backend construction from configuration

pub mod backend;
pub mod config;

pub use backend::build_backend;
pub use config::load_config;
