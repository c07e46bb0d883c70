use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::rc::Rc;

use mio::net::{TcpListener, TcpStream, UdpSocket};
use mio::Token;

use crate::error::{NetError, NetResult};

/// Transport kind. UDP carries the same state shape as TCP, but the
/// port actor rejects UDP verbs at the dispatch boundary rather than
/// wiring it all the way through a datagram-shaped public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

/// Achieved-state flags. `WANT_LISTEN` is set before any OS call is
/// made; `BIND` and `LISTEN` are only set after the matching syscall
/// actually succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modes(u8);

impl Modes {
    pub const ATTEMPT: Modes = Modes(0b0001);
    pub const BIND: Modes = Modes(0b0010);
    pub const LISTEN: Modes = Modes(0b0100);
    pub const WANT_LISTEN: Modes = Modes(0b1000);

    pub fn empty() -> Modes {
        Modes(0)
    }

    pub fn contains(self, other: Modes) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Modes) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Modes) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for Modes {
    type Output = Modes;

    fn bitor(self, rhs: Modes) -> Modes {
        Modes(self.0 | rhs.0)
    }
}

/// The live OS resource behind a socket, when attached. A listener keeps
/// its reactor registration for as long as it is listening; a connected
/// TCP or UDP socket is registered with the reactor only for the
/// duration of whichever verb is currently pumping it.
pub(crate) enum StreamHandle {
    Tcp(Rc<TcpStream>),
    Listener(Rc<TcpListener>, Token),
    Udp(Rc<UdpSocket>),
}

/// Per-port transport state. `stream.is_some()` is the open/closed
/// oracle; for a non-listening socket it also means "connected".
pub struct SocketState {
    pub transport: Transport,
    pub(crate) stream: Option<StreamHandle>,
    pub modes: Modes,
    pub local_ip: u32,
    pub local_port: u16,
    pub remote_ip: u32,
    pub remote_port: u16,
}

impl SocketState {
    pub fn new(transport: Transport) -> SocketState {
        SocketState {
            transport,
            stream: None,
            modes: Modes::empty(),
            local_ip: 0,
            local_port: 0,
            remote_ip: 0,
            remote_port: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub(crate) fn attach_tcp(&mut self, stream: Rc<TcpStream>) {
        self.stream = Some(StreamHandle::Tcp(stream));
    }

    pub(crate) fn attach_listener(&mut self, listener: Rc<TcpListener>, token: Token) {
        self.stream = Some(StreamHandle::Listener(listener, token));
    }

    pub(crate) fn attach_udp(&mut self, socket: Rc<UdpSocket>) {
        self.stream = Some(StreamHandle::Udp(socket));
    }

    pub(crate) fn tcp(&self) -> Option<&Rc<TcpStream>> {
        match &self.stream {
            Some(StreamHandle::Tcp(s)) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn udp(&self) -> Option<&Rc<UdpSocket>> {
        match &self.stream {
            Some(StreamHandle::Udp(s)) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn listener(&self) -> Option<&Rc<TcpListener>> {
        match &self.stream {
            Some(StreamHandle::Listener(l, _)) => Some(l),
            _ => None,
        }
    }

    pub(crate) fn listener_token(&self) -> Option<Token> {
        match &self.stream {
            Some(StreamHandle::Listener(_, token)) => Some(*token),
            _ => None,
        }
    }

    /// Detach the stream and clear achieved-state flags. Local/remote
    /// address fields are deliberately left alone, so `QUERY` after
    /// close still reflects the last session.
    pub(crate) fn detach(&mut self) -> Option<StreamHandle> {
        self.modes = Modes::empty();
        self.stream.take()
    }

    pub(crate) fn populate_local_addr(&mut self) -> NetResult<()> {
        let addr = match &self.stream {
            Some(StreamHandle::Tcp(s)) => s.local_addr()?,
            Some(StreamHandle::Listener(l, _)) => l.local_addr()?,
            Some(StreamHandle::Udp(s)) => s.local_addr()?,
            None => return Ok(()),
        };
        let (ip, port) = split_addr(addr)?;
        self.local_ip = ip;
        self.local_port = port;
        Ok(())
    }

    pub(crate) fn populate_remote_addr(&mut self) -> NetResult<()> {
        if let Some(StreamHandle::Tcp(s)) = &self.stream {
            let (ip, port) = split_addr(s.peer_addr()?)?;
            self.remote_ip = ip;
            self.remote_port = port;
        }
        Ok(())
    }
}

/// Splits a socket address into the network-byte-order IPv4 integer and
/// port the data model uses; rejects IPv6, which this crate doesn't
/// support.
pub(crate) fn split_addr(addr: SocketAddr) -> NetResult<(u32, u16)> {
    match addr {
        SocketAddr::V4(v4) => Ok((u32::from(*v4.ip()), v4.port())),
        SocketAddr::V6(_) => Err(NetError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "IPv6 is not supported by this network core",
        ))),
    }
}

pub fn addr_v4(ip: u32, port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(ip), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_insert_and_contains() {
        let mut modes = Modes::empty();
        assert!(!modes.contains(Modes::WANT_LISTEN));
        modes.insert(Modes::WANT_LISTEN);
        assert!(modes.contains(Modes::WANT_LISTEN));
        assert!(!modes.contains(Modes::BIND));
        modes.insert(Modes::BIND);
        assert!(modes.contains(Modes::WANT_LISTEN | Modes::BIND));
        modes.remove(Modes::WANT_LISTEN);
        assert!(!modes.contains(Modes::WANT_LISTEN));
        assert!(modes.contains(Modes::BIND));
    }

    #[test]
    fn addr_v4_roundtrip() {
        let ip = u32::from(Ipv4Addr::new(127, 0, 0, 1));
        let addr = addr_v4(ip, 4242);
        let (back_ip, back_port) = split_addr(addr).unwrap();
        assert_eq!(back_ip, ip);
        assert_eq!(back_port, 4242);
    }
}
