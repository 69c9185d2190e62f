//! Command line and resolved runtime configuration.

pub mod cli;
pub mod conf;
