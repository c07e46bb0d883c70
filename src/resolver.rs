use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::{NetError, NetResult};

/// Synchronous hostname resolution. Mirrors the original's use of
/// `getaddrinfo` with `ai_family = AF_INET`: addresses come back in OS
/// order, filtered down to IPv4 only (IPv6 is out of scope).
///
/// `std::net::ToSocketAddrs` performs the same blocking `getaddrinfo`
/// call the modern implementation replaced the legacy single-answer
/// `gethostbyname` with -- there's no older API to avoid here.
pub fn resolve(host: &str, port: u16) -> NetResult<Vec<SocketAddr>> {
    let addrs = (host, port).to_socket_addrs().map_err(NetError::Io)?;

    let v4: Vec<SocketAddr> = addrs.filter(SocketAddr::is_ipv4).collect();
    if v4.is_empty() {
        return Err(NetError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no IPv4 addresses found for {}:{}", host, port),
        )));
    }
    Ok(v4)
}
