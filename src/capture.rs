use bytes::Bytes;
use pcap::{Active, Capture};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::runtime::conf::Conf;

/// Read timeout so the loop can notice a closed channel even on a quiet
/// interface.
const READ_TIMEOUT_MS: i32 = 100;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open device: {0}")]
    Open(#[source] pcap::Error),

    #[error("failed to install filter {filter:?}: {source}")]
    Filter {
        filter: String,
        source: pcap::Error,
    },

    #[error("capture failed: {0}")]
    Read(#[source] pcap::Error),
}

/// Live capture handle with the port filter installed.
pub struct CaptureSource {
    cap: Capture<Active>,
}

impl CaptureSource {
    /// Open the interface and install the bidirectional `tcp port <P>`
    /// filter. Both directions are needed to pair responses with their
    /// requests.
    pub fn open(conf: &Conf) -> Result<Self, CaptureError> {
        let cap = Capture::from_device(conf.interface.as_str())
            .map_err(CaptureError::Open)?
            .promisc(false)
            .snaplen(conf.snaplen)
            .timeout(READ_TIMEOUT_MS)
            .open()
            .map_err(CaptureError::Open)?;

        let mut source = Self { cap };
        let filter = format!("tcp port {}", conf.port);
        if let Err(err) = source.cap.filter(&filter, true) {
            return Err(CaptureError::Filter {
                filter,
                source: err,
            });
        }
        info!("installed capture filter {filter:?}");
        Ok(source)
    }

    /// Blocking capture loop; runs on a dedicated blocking task. Sends
    /// each captured frame downstream and exits once the receiver is
    /// gone.
    pub fn run(mut self, frames_tx: mpsc::Sender<Bytes>) -> Result<(), CaptureError> {
        loop {
            match self.cap.next_packet() {
                Ok(packet) => {
                    if frames_tx
                        .blocking_send(Bytes::copy_from_slice(packet.data))
                        .is_err()
                    {
                        debug!("frame channel closed, capture loop exiting");
                        return Ok(());
                    }
                }
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(err) => return Err(CaptureError::Read(err)),
            }
        }
    }
}
