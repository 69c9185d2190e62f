use thiserror::Error;

use crate::{capture::CaptureError, packet::types::PacketError, runtime::conf::ConfError};

/// Top-level application error.
#[derive(Debug, Error)]
pub enum SniffError {
    #[error("configuration error: {0}")]
    Conf(#[from] ConfError),

    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("packet classification error: {0}")]
    Packet(#[from] PacketError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("signal handling error: {0}")]
    Signal(#[from] std::io::Error),
}

/// Type alias for Result with SniffError.
pub type Result<T> = std::result::Result<T, SniffError>;
