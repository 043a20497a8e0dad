//! Endpoint resolution and local-port discovery.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use crate::error::{Result, SocketError};

/// A remote or local address as configured: a literal IP string plus a port.
///
/// Resolution is a pure parse — no DNS lookups. IPv4 is the expected form;
/// IPv6 literals are accepted as well.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// The IP address string.
    pub host: String,
    /// The port number.
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint from an IP string and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse the configured host into a socket address.
    ///
    /// Returns [`SocketError::AddressParse`] if the host is not a literal IP
    /// address. Idempotent; performs no I/O.
    pub fn resolve(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .trim()
            .parse()
            .map_err(|_| SocketError::AddressParse(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Get the address string (host:port).
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Scan `[start, start + range)` for a UDP port that is currently free,
/// returning the first hit or `None` when the whole range is occupied.
///
/// Availability is checked by probing a throwaway bind on the unspecified
/// address. The probe socket is dropped before this function returns, so the
/// result is inherently racy: another process may grab the port before the
/// caller binds it. Treat a later bind failure as authoritative and scan
/// again.
pub fn find_open_port(start: u16, range: u16) -> Option<u16> {
    let end = start.checked_add(range).unwrap_or(u16::MAX);
    (start..end).find(|&port| udp_port_is_free(port))
}

fn udp_port_is_free(port: u16) -> bool {
    UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).is_ok()
}
