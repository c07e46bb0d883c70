use std::cell::RefCell;
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::{Duration, Instant};

use mio::net::TcpStream;
use mio::Ready;

use crate::error::{NetError, NetResult};
use crate::reactor::Reactor;
use crate::resolver;
use crate::socket::SocketState;

/// Per-attempt connect timeout.
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    /// `None` means wait indefinitely -- the direct-IP open path.
    pub timeout: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> ConnectOptions {
        ConnectOptions {
            timeout: Some(Duration::from_millis(2500)),
        }
    }
}

/// Resolve `host` then connect, retrying across every returned IPv4
/// address with `opts.timeout` as the per-attempt ceiling.
pub fn connect_hostname(
    reactor: &mut Reactor,
    sock: &mut SocketState,
    host: &str,
    remote_port: u16,
    opts: ConnectOptions,
) -> NetResult<()> {
    let addrs = resolver::resolve(host, remote_port)?;
    connect_first_reachable(reactor, sock, &addrs, opts)
}

/// Try each address in order, stopping at the first successful connect.
/// Split out from `connect_hostname` so fallback behavior can be tested
/// against a synthetic address list without depending on real DNS.
pub fn connect_first_reachable(
    reactor: &mut Reactor,
    sock: &mut SocketState,
    addrs: &[SocketAddr],
    opts: ConnectOptions,
) -> NetResult<()> {
    for &addr in addrs {
        // Recorded even on a failed attempt, so QUERY reflects the last
        // address tried.
        if let SocketAddr::V4(v4) = addr {
            sock.remote_ip = u32::from(*v4.ip());
            sock.remote_port = v4.port();
        }
        if connect_one(reactor, sock, addr, opts.timeout).is_ok() {
            return Ok(());
        }
    }
    Err(NetError::ConnectionFailedAllAddresses)
}

/// Connect directly to an already-known address, waiting indefinitely.
/// Used for the tuple-host `OPEN` path.
pub fn connect_direct(reactor: &mut Reactor, sock: &mut SocketState, addr: SocketAddr) -> NetResult<()> {
    if let SocketAddr::V4(v4) = addr {
        sock.remote_ip = u32::from(*v4.ip());
        sock.remote_port = v4.port();
    }
    connect_one(reactor, sock, addr, None)
}

fn connect_one(
    reactor: &mut Reactor,
    sock: &mut SocketState,
    addr: SocketAddr,
    timeout: Option<Duration>,
) -> NetResult<()> {
    debug!("connecting to {} (timeout {:?})", addr, timeout);
    let stream = Rc::new(TcpStream::connect(&addr)?);

    let result: Rc<RefCell<Option<io::Result<()>>>> = Rc::new(RefCell::new(None));
    let result_cb = result.clone();
    let stream_cb = stream.clone();

    let token = reactor.register(&*stream, Ready::writable(), move |_readiness| {
        if result_cb.borrow().is_some() {
            return;
        }
        let outcome = match stream_cb.take_error() {
            Ok(None) => Ok(()),
            Ok(Some(e)) => Err(e),
            Err(e) => Err(e),
        };
        *result_cb.borrow_mut() = Some(outcome);
    })?;

    let deadline = timeout.map(|d| Instant::now() + d);

    let final_result: Option<io::Result<()>> = loop {
        reactor.run_once(deadline)?;

        if let Some(r) = result.borrow_mut().take() {
            break Some(r);
        }
        if let Some(at) = deadline {
            if Instant::now() >= at {
                break None;
            }
        }
    };

    reactor.deregister(&*stream, token)?;

    match final_result {
        Some(Ok(())) => {
            trace!("connected to {}", addr);
            sock.attach_tcp(stream);
            sock.populate_local_addr()?;
            sock.populate_remote_addr()?;
            Ok(())
        }
        Some(Err(e)) => {
            trace!("connect to {} failed: {:?}", addr, e);
            Err(NetError::Io(e))
        }
        None => {
            trace!("connect to {} timed out", addr);
            Err(NetError::ConnectionTimeout)
        }
    }
}
