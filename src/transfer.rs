use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;

use mio::net::TcpStream;
use mio::Ready;

use crate::error::{NetError, NetResult};
use crate::socket::SocketState;
use crate::reactor::Reactor;

const UNLIMITED_CHUNK: usize = 32 * 1024;

/// How much a read should accumulate before it counts as finished.
#[derive(Debug, Clone, Copy)]
pub enum Length {
    Exact(usize),
    Unlimited,
}

pub struct ReadOutcome {
    pub bytes_read: usize,
    pub eof: bool,
}

struct ReadState {
    length: Length,
    actual: usize,
    saw_tcp_eof: bool,
    result: Option<NetResult<()>>,
}

/// Stream-read the socket, appending whatever arrives to `data`. For
/// `Length::Exact(n)`, keeps pumping until `n` bytes have arrived or the
/// peer closes early (a short read is accepted on graceful EOF, same as
/// a `read:part` on a regular file that hits end of stream).
/// `Length::Unlimited` finishes as soon as any data arrives, rather than
/// waiting for the connection to close.
///
/// On TCP end-of-stream, clears `sock`'s stream -- the caller should
/// treat the port as closed from here on, in addition to acting on the
/// bytes already returned.
pub fn read(reactor: &mut Reactor, sock: &mut SocketState, data: &mut Vec<u8>, length: Length) -> NetResult<ReadOutcome> {
    let stream = sock.tcp().cloned().ok_or(NetError::NotConnected)?;

    let state = Rc::new(RefCell::new(ReadState {
        length,
        actual: 0,
        saw_tcp_eof: false,
        result: None,
    }));
    // `data` belongs to the caller's stack frame; the registered callback
    // needs an owned handle it can hold past this call's own borrows, so
    // it accumulates into a scratch buffer that gets spliced into `data`
    // once the read is finished.
    let scratch: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));

    let state_cb = state.clone();
    let scratch_cb = scratch.clone();
    let stream_cb = stream.clone();

    let token = reactor.register(&*stream, Ready::readable(), move |_readiness| {
        read_iteration(&stream_cb, &scratch_cb, &state_cb);
    })?;

    loop {
        reactor.run_once(None)?;
        if state.borrow().result.is_some() {
            break;
        }
    }

    reactor.deregister(&*stream, token)?;

    let (actual, saw_tcp_eof, result) = {
        let mut s = state.borrow_mut();
        (
            s.actual,
            s.saw_tcp_eof,
            s.result.take().expect("read loop only exits once a result is set"),
        )
    };

    // A genuine error leaves whatever arrived before it as possibly
    // corrupted, so the port's persistent buffer is cleared rather than
    // extended with a partial, unverifiable result.
    if result.is_err() {
        data.clear();
    } else {
        data.extend_from_slice(&scratch.borrow());
    }

    result?;

    if saw_tcp_eof {
        sock.detach();
    }

    Ok(ReadOutcome { bytes_read: actual, eof: saw_tcp_eof })
}

fn read_iteration(stream: &Rc<TcpStream>, scratch: &Rc<RefCell<Vec<u8>>>, state: &Rc<RefCell<ReadState>>) {
    loop {
        let want = {
            let s = state.borrow();
            match s.length {
                Length::Exact(requested) => requested.saturating_sub(s.actual),
                Length::Unlimited => UNLIMITED_CHUNK,
            }
        };

        if want == 0 {
            state.borrow_mut().result = Some(Ok(()));
            return;
        }

        let mut buf = vec![0u8; want];
        let r = (&**stream).read(&mut buf);
        trace!("read[{:p}] wanted {} got {:?}", stream, want, r);
        match r {
            Ok(0) => {
                // A clean close. Whatever arrived before it is accepted
                // as a short read rather than an error.
                let mut s = state.borrow_mut();
                s.saw_tcp_eof = true;
                s.result = Some(Ok(()));
                return;
            }
            Ok(n) => {
                scratch.borrow_mut().extend_from_slice(&buf[..n]);
                let mut s = state.borrow_mut();
                s.actual += n;
                match s.length {
                    Length::Exact(requested) if s.actual >= requested => {
                        s.result = Some(Ok(()));
                        return;
                    }
                    Length::Unlimited => {
                        s.result = Some(Ok(()));
                        return;
                    }
                    _ => {} // short of an exact request, keep draining
                }
            }
            Err(e) => {
                if e.kind() == io::ErrorKind::WouldBlock {
                    return;
                }
                state.borrow_mut().result = Some(Err(NetError::Io(e)));
                return;
            }
        }
    }
}

struct WriteState {
    owned: Vec<u8>,
    written: usize,
    result: Option<NetResult<()>>,
}

/// Write `data` (optionally truncated to `part` bytes) to the socket.
/// The bytes are copied into a private buffer before the first pump, so
/// the caller is free to mutate or drop its own buffer the moment this
/// function is called -- it never sees the caller's slice again.
pub fn write(reactor: &mut Reactor, sock: &mut SocketState, data: &[u8], part: Option<usize>) -> NetResult<usize> {
    let stream = sock.tcp().cloned().ok_or(NetError::NotConnected)?;

    let owned = match part {
        Some(n) => data[..n.min(data.len())].to_vec(),
        None => data.to_vec(),
    };
    let total = owned.len();

    let state = Rc::new(RefCell::new(WriteState { owned, written: 0, result: None }));
    let state_cb = state.clone();
    let stream_cb = stream.clone();

    let token = reactor.register(&*stream, Ready::writable(), move |_readiness| {
        write_iteration(&stream_cb, &state_cb);
    })?;

    loop {
        reactor.run_once(None)?;
        if state.borrow().result.is_some() {
            break;
        }
    }

    reactor.deregister(&*stream, token)?;

    state
        .borrow_mut()
        .result
        .take()
        .expect("write loop only exits once a result is set")?;

    Ok(total)
}

fn write_iteration(stream: &Rc<TcpStream>, state: &Rc<RefCell<WriteState>>) {
    loop {
        let done = {
            let s = state.borrow();
            if s.result.is_some() {
                return;
            }
            s.written >= s.owned.len()
        };
        if done {
            state.borrow_mut().result = Some(Ok(()));
            return;
        }

        let write_result = {
            let s = state.borrow();
            (&**stream).write(&s.owned[s.written..])
        };
        trace!("write[{:p}] {:?}", stream, write_result);

        match write_result {
            Ok(n) => {
                state.borrow_mut().written += n;
            }
            Err(e) => {
                if e.kind() == io::ErrorKind::WouldBlock {
                    return;
                }
                state.borrow_mut().result = Some(Err(NetError::Io(e)));
                return;
            }
        }
    }
}

/// UDP datagram receive: captures the peer address into `sock`. Not
/// reachable from the port actor's verb dispatch, but kept here so the
/// data model spec.md describes for UDP is complete and directly
/// testable.
pub fn udp_recv(sock: &mut SocketState, buf: &mut [u8]) -> NetResult<usize> {
    let socket = sock.udp().cloned().ok_or(NetError::NotConnected)?;
    let (n, peer) = socket.recv_from(buf)?;
    if let std::net::SocketAddr::V4(v4) = peer {
        sock.remote_ip = u32::from(*v4.ip());
        sock.remote_port = v4.port();
    }
    Ok(n)
}

pub fn udp_send(sock: &SocketState, buf: &[u8]) -> NetResult<usize> {
    let socket = sock.udp().cloned().ok_or(NetError::NotConnected)?;
    let addr = crate::socket::addr_v4(sock.remote_ip, sock.remote_port);
    Ok(socket.send_to(buf, &addr)?)
}
