//! CLI command implementations.

pub mod bundles;
pub mod common;
pub mod config;
pub mod remote;
