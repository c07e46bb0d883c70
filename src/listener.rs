use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::rc::Rc;

use mio::net::TcpListener;
use mio::Ready;

use crate::error::NetResult;
use crate::event::{Event, EventSink, PortId};
use crate::port::{Port, PortSpec};
use crate::reactor::Reactor;
use crate::socket::{Modes, SocketState, Transport};

/// Bind `INADDR_ANY:local_port` and start listening. The accept
/// callback stays registered for as long as the port is listening --
/// the one persistent reactor registration in this crate, since inbound
/// connections have to be drained regardless of which verb happens to
/// be pumping the reactor at the time.
pub fn start_listening(
    reactor: &mut Reactor,
    sock: &mut SocketState,
    spec: PortSpec,
    port_id: PortId,
    connections: Rc<RefCell<VecDeque<Port>>>,
    events: Rc<dyn EventSink>,
) -> NetResult<()> {
    // Set before any OS call is made -- a request flag, not an achieved
    // state. Cleared again once BIND/LISTEN are actually achieved below.
    sock.modes.insert(Modes::WANT_LISTEN);

    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, sock.local_port));
    let listener = Rc::new(TcpListener::bind(&addr)?);
    sock.modes.insert(Modes::BIND);

    let listener_cb = listener.clone();
    let token = reactor.register(&*listener, Ready::readable(), move |_readiness| {
        drain_accepts(&listener_cb, &spec, port_id, &connections, &events);
    })?;

    sock.attach_listener(listener, token);
    sock.modes.insert(Modes::LISTEN);
    sock.modes.remove(Modes::WANT_LISTEN);
    sock.populate_local_addr()?;
    Ok(())
}

fn drain_accepts(
    listener: &Rc<TcpListener>,
    spec: &PortSpec,
    listening_port: PortId,
    connections: &Rc<RefCell<VecDeque<Port>>>,
    events: &Rc<dyn EventSink>,
) {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                trace!("accepted {} on listener port {}", addr, listening_port);
                match build_child(spec.clone(), stream, addr, events.clone()) {
                    Ok(child) => {
                        connections.borrow_mut().push_back(child);
                        events.post(Event::Accept { port: listening_port });
                    }
                    Err(e) => {
                        events.post(Event::Error { port: listening_port, error: e });
                    }
                }
            }
            Err(e) => {
                if e.kind() == io::ErrorKind::WouldBlock {
                    return;
                }
                events.post(Event::Error {
                    port: listening_port,
                    error: crate::error::NetError::Io(e),
                });
                return;
            }
        }
    }
}

fn build_child(
    spec: PortSpec,
    stream: mio::net::TcpStream,
    peer: SocketAddr,
    events: Rc<dyn EventSink>,
) -> NetResult<Port> {
    let mut sock = SocketState::new(Transport::Tcp);
    sock.attach_tcp(Rc::new(stream));
    let (ip, port) = crate::socket::split_addr(peer)?;
    sock.remote_ip = ip;
    sock.remote_port = port;
    sock.populate_local_addr()?;

    Ok(Port::from_parts(spec, sock, events))
}
