//! A synchronous-looking TCP port I/O core over a single-threaded `mio`
//! reactor.
//!
//! Every verb (`open`, `read`, `write`, `query`, `close`, `take`) blocks
//! the calling thread by pumping the reactor until its own completion
//! slot is set. `wait` is the one explicit cooperative yield point,
//! multiplexing timers, accepts, and in-flight transfers the same way.
//!
//! On Windows, `std`'s socket types call `WSAStartup` as needed, so
//! unlike a raw libuv/winsock embedding there is no explicit networking
//! startup step to run before using this crate.

#[macro_use]
extern crate log;

pub mod connector;
pub mod error;
pub mod event;
pub mod listener;
pub mod port;
pub mod reactor;
pub mod resolver;
pub mod socket;
pub mod transfer;
pub mod waiter;

pub use connector::ConnectOptions;
pub use error::{NetError, NetResult};
pub use event::{Event, EventSink, PortId, RecordingSink};
pub use port::{HostSpec, Port, PortSpec, SchemeInfo, TakeOptions};
pub use reactor::Reactor;
pub use socket::{Modes, SocketState, Transport};
pub use waiter::{wait, WaitOptions, WaitOutcome};
