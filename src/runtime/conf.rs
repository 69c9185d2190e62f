use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runtime::cli::Cli;

/// Fully resolved runtime configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conf {
    pub port: u16,
    pub interface: String,
    pub snaplen: i32,
    pub report_period: Duration,
    pub display_count: usize,
    pub verbose: bool,
    pub format: String,
}

#[derive(Debug, Error)]
pub enum ConfError {
    #[error("port must be nonzero")]
    ZeroPort,

    #[error("snap length must be positive, got {0}")]
    InvalidSnaplen(i32),

    #[error("report period must be at least 1 second")]
    ZeroPeriod,
}

impl Conf {
    /// Validate the parsed command line into a runtime configuration.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfError> {
        if cli.port == 0 {
            return Err(ConfError::ZeroPort);
        }
        if cli.snaplen <= 0 {
            return Err(ConfError::InvalidSnaplen(cli.snaplen));
        }
        if cli.period == 0 {
            return Err(ConfError::ZeroPeriod);
        }

        Ok(Self {
            port: cli.port,
            interface: cli.interface,
            snaplen: cli.snaplen,
            report_period: Duration::from_secs(cli.period),
            display_count: cli.display_count,
            verbose: cli.verbose,
            format: cli.format,
        })
    }
}
