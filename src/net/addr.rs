//! Address helpers.
//!
//! Addresses are accepted in the `host:port` form or as a bare `:port`,
//! which binds every interface and is displayed as `localhost:port`.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};

/// Resolve a configured bind address to a socket address.
pub fn resolve_bind_addr(address: &str) -> io::Result<SocketAddr> {
    let address = address.trim();
    if address.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty address"));
    }

    if let Some(port) = address.strip_prefix(':') {
        let port: u16 = port
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }

    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }

    address.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no socket address for {address}"),
        )
    })
}

/// Join a host and a port into an address string.
///
/// An empty host yields the `:port` form.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// The authority to show in URLs for a configured address.
pub fn display_authority(address: &str) -> String {
    if address.starts_with(':') {
        format!("localhost{address}")
    } else {
        address.to_string()
    }
}
