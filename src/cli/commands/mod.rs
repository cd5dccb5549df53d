//! CLI command implementations.

pub mod default_config;
pub mod paper;
pub mod state;
pub mod summary;
pub mod validate;
