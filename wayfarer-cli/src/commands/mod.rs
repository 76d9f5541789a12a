//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration inspection (show, path)
//! - [`replay`] - Replay recorded fixes against a route
//! - [`simulate`] - Simulated trip through the async driver

pub mod common;
pub mod config;
pub mod replay;
pub mod simulate;
