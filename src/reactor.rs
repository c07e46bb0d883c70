use std::io;
use std::time::{Duration, Instant};

use mio::{Evented, Events, Poll, PollOpt, Ready, Token};
use slab::Slab;

/// The single-threaded event loop.
///
/// Owns exactly one `mio::Poll`. `run_once` blocks for at most the time
/// remaining until `deadline` (or indefinitely if `None`), then invokes
/// the callback registered for every source that became ready.
///
/// Registration lifetime mirrors what drives it: connect/read/write
/// register a callback for the span of a single verb call and
/// deregister again before returning (the "pending request" owns its
/// slot), while a listening socket keeps its accept callback registered
/// for as long as the port is listening. This is the same split the
/// original draws between a one-shot libuv request and a long-lived
/// `uv_listen` handle.
pub struct Reactor {
    poll: Poll,
    events: Events,
    callbacks: Slab<Box<dyn FnMut(Ready)>>,
}

impl Reactor {
    pub fn new() -> io::Result<Reactor> {
        Ok(Reactor {
            poll: Poll::new()?,
            events: Events::with_capacity(1024),
            callbacks: Slab::new(),
        })
    }

    /// Register `io` for `interest`, invoking `callback` with the
    /// observed readiness every time `run_once` sees it ready.
    /// Registration is level-triggered: a still-ready source fires its
    /// callback again on the next `run_once`, so callers don't need to
    /// track per-call-site readiness state themselves.
    pub fn register<E, F>(&mut self, io: &E, interest: Ready, callback: F) -> io::Result<Token>
    where
        E: Evented + ?Sized,
        F: FnMut(Ready) + 'static,
    {
        let key = self.callbacks.insert(Box::new(callback));
        let token = Token(key);
        if let Err(e) = self.poll.register(io, token, interest, PollOpt::level()) {
            self.callbacks.remove(key);
            return Err(e);
        }
        Ok(token)
    }

    pub fn deregister<E>(&mut self, io: &E, token: Token) -> io::Result<()>
    where
        E: Evented + ?Sized,
    {
        self.poll.deregister(io)?;
        if self.callbacks.contains(token.0) {
            self.callbacks.remove(token.0);
        }
        Ok(())
    }

    /// Run one iteration, blocking until at least one registered source
    /// fires or `deadline` passes (not blocking at all if `deadline` is
    /// already due).
    pub fn run_once(&mut self, deadline: Option<Instant>) -> io::Result<usize> {
        let timeout = deadline.map(|at| at.saturating_duration_since(Instant::now()));
        let n = self.poll.poll(&mut self.events, timeout)?;

        // Snapshot before dispatch: a callback may register or deregister
        // other sources (an accept handler builds a child port; a close
        // mid-batch removes a slot), which would otherwise invalidate an
        // in-progress iterator over `self.events`.
        let ready: Vec<(Token, Ready)> = self.events.iter().map(|e| (e.token(), e.readiness())).collect();
        for (token, readiness) in ready {
            if let Some(callback) = self.callbacks.get_mut(token.0) {
                callback(readiness);
            }
        }
        Ok(n)
    }

    /// Drain whatever is immediately ready without blocking.
    pub fn run_nowait(&mut self) -> io::Result<usize> {
        self.run_once(Some(Instant::now()))
    }
}
