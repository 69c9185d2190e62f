use std::net::Ipv4Addr;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    flow::registry::FlowRegistry,
    packet::types::{Direction, PacketError, RemoteEndpoint, TcpSegment},
};

const ETH_HEADER_LEN: usize = 14;

/// Walk the Ethernet/IPv4/TCP headers of one captured frame and classify
/// its payload by direction.
///
/// Assumes untagged Ethernet carrying IPv4, which is what the `tcp port`
/// filter hands us on a plain interface; no VLAN, fragment, or IPv6
/// awareness. Returns `Ok(None)` for packets with no TCP payload.
pub fn parse_frame(
    data: &[u8],
    port: u16,
) -> Result<Option<(RemoteEndpoint, TcpSegment)>, PacketError> {
    let need = |need: usize| PacketError::Truncated {
        need,
        got: data.len(),
    };

    let ip = ETH_HEADER_LEN;
    if data.len() < ip + 20 {
        return Err(need(ip + 20));
    }
    let src_ip = Ipv4Addr::new(data[ip + 12], data[ip + 13], data[ip + 14], data[ip + 15]);
    let dst_ip = Ipv4Addr::new(data[ip + 16], data[ip + 17], data[ip + 18], data[ip + 19]);
    let ihl = ((data[ip] & 0x0F) as usize) * 4;

    let tcp = ip + ihl;
    if data.len() < tcp + 13 {
        return Err(need(tcp + 13));
    }
    let src_port = u16::from_be_bytes([data[tcp], data[tcp + 1]]);
    let dst_port = u16::from_be_bytes([data[tcp + 2], data[tcp + 3]]);
    let data_offset = ((data[tcp + 12] >> 4) as usize) * 4;

    let payload = tcp + data_offset;
    if data.len() < payload {
        return Err(need(payload));
    }
    if data.len() == payload {
        return Ok(None);
    }

    // Whichever end holds the sniffed port, the flow is keyed by the
    // other end.
    let (direction, endpoint) = if src_port == port {
        (Direction::Response, RemoteEndpoint::new(dst_ip, dst_port))
    } else if dst_port == port {
        (Direction::Request, RemoteEndpoint::new(src_ip, src_port))
    } else {
        return Err(PacketError::Unclassifiable {
            src_port,
            dst_port,
            port,
        });
    };

    Ok(Some((
        endpoint,
        TcpSegment {
            direction,
            payload: Bytes::copy_from_slice(&data[payload..]),
        },
    )))
}

/// Consumes captured frames, parses and classifies each, and routes the
/// payload to the owning flow.
pub struct Dispatcher {
    port: u16,
    registry: FlowRegistry,
    frames_rx: mpsc::Receiver<Bytes>,
}

impl Dispatcher {
    pub fn new(port: u16, registry: FlowRegistry, frames_rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            port,
            registry,
            frames_rx,
        }
    }

    /// Runs until the capture channel closes. An unclassifiable packet is
    /// fatal and propagates; truncated packets are dropped.
    pub async fn run(mut self) -> Result<(), PacketError> {
        while let Some(frame) = self.frames_rx.recv().await {
            match parse_frame(&frame, self.port) {
                Ok(Some((endpoint, segment))) => self.registry.route(endpoint, segment).await,
                Ok(None) => {}
                Err(err @ PacketError::Truncated { .. }) => debug!("dropping packet: {err}"),
                Err(err) => return Err(err),
            }
        }
        debug!("frame channel closed, dispatcher exiting");
        Ok(())
    }
}
