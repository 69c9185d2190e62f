use std::{fmt, net::Ipv4Addr};

use bytes::Bytes;
use thiserror::Error;

/// Which half of the conversation a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

/// The `ip:port` of the non-database side of a connection. Flow identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemoteEndpoint {
    ip: Ipv4Addr,
    port: u16,
}

impl RemoteEndpoint {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// One TCP payload on its way to a flow listener.
#[derive(Debug, Clone)]
pub struct TcpSegment {
    pub direction: Direction,
    pub payload: Bytes,
}

#[derive(Debug, Error)]
pub enum PacketError {
    /// The capture clipped the packet below the headers it claims to
    /// carry. Recoverable; the packet is dropped.
    #[error("packet truncated: need {need} bytes, captured {got}")]
    Truncated { need: usize, got: usize },

    /// Neither TCP port matches the sniffed port. The installed filter
    /// should make this impossible; seeing it means the filter is wrong.
    #[error(
        "unclassifiable packet: src port {src_port}, dst port {dst_port}, sniffing port {port}"
    )]
    Unclassifiable {
        src_port: u16,
        dst_port: u16,
        port: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_displays_as_ip_port() {
        let ep = RemoteEndpoint::new(Ipv4Addr::new(10, 0, 0, 1), 5000);
        assert_eq!(ep.to_string(), "10.0.0.1:5000");
        assert_eq!(ep.ip().to_string(), "10.0.0.1");
    }
}
