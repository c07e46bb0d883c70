use std::io;

use thiserror::Error;

/// Error taxonomy surfaced to callers.
///
/// Synchronous usage mistakes (`InvalidSpec`, `BadRefines`) are returned
/// directly from the call that made them; terminal transport failures
/// travel through the same return path as the operation that triggered
/// them. Anything that arrives while an unrelated operation is pumping
/// the reactor goes out through `EventSink::post` instead, never through
/// a `Result` that has nothing to do with it.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("connect attempt timed out before a response was received")]
    ConnectionTimeout,

    #[error("connection failed against every address the resolver returned")]
    ConnectionFailedAllAddresses,

    #[error("port is not connected")]
    NotConnected,

    #[error("port has not been opened")]
    NotOpen,

    #[error("port spec did not describe a valid endpoint")]
    InvalidSpec,

    #[error("refinement is not meaningful for a network port")]
    BadRefines,

    #[error("UDP transport is not implemented at the port-actor boundary")]
    UdpUnsupported,

    #[error("wait was interrupted by a halt request")]
    Halted,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type NetResult<T> = Result<T, NetError>;
