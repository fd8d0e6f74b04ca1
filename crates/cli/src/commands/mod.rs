//! CLI command implementations.

pub mod services;
pub mod simulate;
