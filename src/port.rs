use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::rc::Rc;

use crate::connector::{self, ConnectOptions};
use crate::error::{NetError, NetResult};
use crate::event::{next_port_id, Event, EventSink, PortId};
use crate::listener;
use crate::reactor::Reactor;
use crate::socket::{Modes, SocketState, Transport};
use crate::transfer::{self, Length};

/// Script-supplied endpoint description: a host (name, address, or
/// absent for a listener), a remote/service port, and an optional local
/// port to bind before connecting.
#[derive(Debug, Clone)]
pub struct PortSpec {
    pub host: Option<HostSpec>,
    pub port_id: Option<u16>,
    pub local_id: Option<u16>,
}

#[derive(Debug, Clone)]
pub enum HostSpec {
    Name(String),
    Addr(Ipv4Addr),
}

impl PortSpec {
    pub fn connect(host: impl Into<String>, port: u16) -> PortSpec {
        PortSpec { host: Some(HostSpec::Name(host.into())), port_id: Some(port), local_id: None }
    }

    pub fn connect_addr(addr: Ipv4Addr, port: u16) -> PortSpec {
        PortSpec { host: Some(HostSpec::Addr(addr)), port_id: Some(port), local_id: None }
    }

    pub fn listen(port: u16) -> PortSpec {
        PortSpec { host: None, port_id: Some(port), local_id: None }
    }
}

const DEFAULT_CONNECT_PORT: u16 = 80;
const DEFAULT_LISTEN_PORT: u16 = 8000;

/// A bundled socket, its spec, its accrued read data, and (for
/// listeners) the children `take` drains.
pub struct Port {
    pub id: PortId,
    pub spec: PortSpec,
    state: SocketState,
    data: Vec<u8>,
    connections: Rc<RefCell<VecDeque<Port>>>,
    events: Rc<dyn EventSink>,
    /// Distinguishes "never opened" (→ `NotOpen`) from "opened, now
    /// disconnected" (→ `NotConnected`). `SocketState` alone can't make
    /// this distinction: both states look like `stream = None`.
    ever_opened: bool,
}

impl Port {
    /// Unopened port for `transport`, ready for `open`.
    pub fn new(transport: Transport, spec: PortSpec, events: Rc<dyn EventSink>) -> Port {
        Port {
            id: next_port_id(),
            spec,
            state: SocketState::new(transport),
            data: Vec::new(),
            connections: Rc::new(RefCell::new(VecDeque::new())),
            events,
            ever_opened: false,
        }
    }

    /// Built already attached to a live stream (accepted child ports),
    /// so it counts as opened from the start.
    pub(crate) fn from_parts(spec: PortSpec, state: SocketState, events: Rc<dyn EventSink>) -> Port {
        Port {
            id: next_port_id(),
            spec,
            state,
            data: Vec::new(),
            connections: Rc::new(RefCell::new(VecDeque::new())),
            events,
            ever_opened: true,
        }
    }

    pub fn transport(&self) -> Transport {
        self.state.transport
    }

    pub fn socket(&self) -> &SocketState {
        &self.state
    }

    /// True once connected (TCP) or bound as a listener.
    pub fn is_open(&self) -> bool {
        self.state.modes.contains(Modes::BIND) || self.state.is_open()
    }

    /// Bytes currently accrued in the port's read buffer.
    pub fn length_of(&self) -> NetResult<usize> {
        self.require_ever_opened()?;
        Ok(self.data.len())
    }

    fn require_ever_opened(&self) -> NetResult<()> {
        if self.ever_opened {
            Ok(())
        } else {
            Err(NetError::NotOpen)
        }
    }

    /// Drains and returns the port's accrued read data.
    pub fn take_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Dispatches on the spec: a text host resolves and connects with
    /// retry across every address found, a tuple host connects directly
    /// with no timeout, and an absent host starts listening.
    pub fn open(&mut self, reactor: &mut Reactor, opts: ConnectOptions) -> NetResult<()> {
        if self.transport() == Transport::Udp {
            return Err(NetError::UdpUnsupported);
        }
        if self.is_open() {
            return Ok(());
        }

        match self.spec.host.clone() {
            None => {
                self.state.local_port = self.spec.port_id.unwrap_or(DEFAULT_LISTEN_PORT);
                listener::start_listening(
                    reactor,
                    &mut self.state,
                    self.spec.clone(),
                    self.id,
                    self.connections.clone(),
                    self.events.clone(),
                )?;
            }
            Some(HostSpec::Name(host)) => {
                if host.trim().is_empty() {
                    return Err(NetError::InvalidSpec);
                }
                self.state.local_port = self.spec.local_id.unwrap_or(0);
                let remote_port = self.spec.port_id.unwrap_or(DEFAULT_CONNECT_PORT);
                if remote_port == 0 {
                    return Err(NetError::InvalidSpec);
                }
                connector::connect_hostname(reactor, &mut self.state, &host, remote_port, opts)?;
                self.events.post(Event::Connect { port: self.id });
            }
            Some(HostSpec::Addr(ip)) => {
                self.state.local_port = self.spec.local_id.unwrap_or(0);
                let remote_port = self.spec.port_id.unwrap_or(DEFAULT_CONNECT_PORT);
                if remote_port == 0 {
                    return Err(NetError::InvalidSpec);
                }
                let addr = crate::socket::addr_v4(u32::from(ip), remote_port);
                connector::connect_direct(reactor, &mut self.state, addr)?;
                self.events.post(Event::Connect { port: self.id });
            }
        }
        self.ever_opened = true;
        Ok(())
    }

    /// `read[:part n]`.
    pub fn read(&mut self, reactor: &mut Reactor, part: Option<usize>) -> NetResult<usize> {
        if self.transport() != Transport::Tcp {
            return Err(NetError::UdpUnsupported);
        }
        self.require_ever_opened()?;
        if !self.state.is_open() {
            return Err(NetError::NotConnected);
        }

        let length = match part {
            Some(n) => Length::Exact(n),
            None => Length::Unlimited,
        };

        let outcome = transfer::read(reactor, &mut self.state, &mut self.data, length)?;
        self.events.post(Event::Read { port: self.id });
        if outcome.eof {
            self.events.post(Event::Close { port: self.id });
        }
        Ok(outcome.bytes_read)
    }

    /// `write[:part n] data`.
    pub fn write(&mut self, reactor: &mut Reactor, data: &[u8], part: Option<usize>) -> NetResult<usize> {
        if self.transport() != Transport::Tcp {
            return Err(NetError::UdpUnsupported);
        }
        self.require_ever_opened()?;
        if !self.state.is_open() {
            return Err(NetError::NotConnected);
        }

        let n = transfer::write(reactor, &mut self.state, data, part)?;
        self.events.post(Event::Wrote { port: self.id });
        Ok(n)
    }

    /// A snapshot of local/remote IPv4 address and port.
    pub fn query(&self) -> NetResult<SchemeInfo> {
        self.require_ever_opened()?;
        Ok(SchemeInfo {
            local_ip: self.state.local_ip,
            local_port: self.state.local_port,
            remote_ip: self.state.remote_ip,
            remote_port: self.state.remote_port,
        })
    }

    /// No-op on an unopened port; otherwise deregisters (if listening)
    /// and detaches the stream.
    pub fn close(&mut self, reactor: &mut Reactor) -> NetResult<()> {
        if !self.ever_opened {
            return Ok(());
        }
        if let (Some(listener), Some(token)) = (self.state.listener().cloned(), self.state.listener_token()) {
            reactor.deregister(&*listener, token)?;
        }
        self.state.detach();
        Ok(())
    }

    /// Drains accepted child ports from a listening port's connections
    /// list.
    pub fn take(&mut self, opts: TakeOptions) -> NetResult<Vec<Port>> {
        self.require_ever_opened()?;
        let mut conns = self.connections.borrow_mut();
        Ok(match opts {
            TakeOptions::All => conns.drain(..).collect(),
            TakeOptions::One => conns.pop_front().into_iter().collect(),
            TakeOptions::Last => conns.pop_back().into_iter().collect(),
            TakeOptions::Part(n) => (0..n).filter_map(|_| conns.pop_front()).collect(),
        })
    }

    pub fn pending_connections(&self) -> usize {
        self.connections.borrow().len()
    }
}

/// Rejects refinement words this actor has no meaning for. `:part` is
/// modeled directly as the typed `Option<usize>` parameters above, and
/// `take` has its own `TakeOptions`; anything else a caller might try to
/// forward -- `:seek`, `:append`, `:allow`, `:lines` -- has no socket
/// counterpart and is rejected here rather than silently ignored, the
/// same boundary the verb dispatch itself enforces for any other
/// refinement it doesn't recognize.
pub fn check_refinement(name: &str) -> NetResult<()> {
    match name {
        "part" | "deep" | "last" => Ok(()),
        _ => Err(NetError::BadRefines),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum TakeOptions {
    One,
    All,
    Last,
    Part(usize),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemeInfo {
    pub local_ip: u32,
    pub local_port: u16,
    pub remote_ip: u32,
    pub remote_port: u16,
}
