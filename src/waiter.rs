use std::time::{Duration, Instant};

use crate::error::NetError;
use crate::reactor::Reactor;

const HALT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// What to wait for. `timeout: None` combined with `has_pending: false`
/// returns immediately -- there is nothing that could ever wake this
/// call.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitOptions {
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    TimedOut,
    Ready,
}

/// Pump the reactor until `opts.timeout` elapses or `halted` reports
/// true. `halted` is checked roughly every 500ms regardless of how long
/// the timeout is, so an interrupt flag set from outside this call gets
/// noticed promptly without needing a dedicated signal handler.
pub fn wait(
    reactor: &mut Reactor,
    opts: WaitOptions,
    has_pending: bool,
    mut halted: impl FnMut() -> bool,
) -> Result<WaitOutcome, NetError> {
    if opts.timeout.is_none() && !has_pending {
        return Ok(WaitOutcome::TimedOut);
    }

    let deadline = opts.timeout.map(|d| Instant::now() + d);

    loop {
        if halted() {
            return Err(NetError::Halted);
        }

        let halt_check = Instant::now() + HALT_POLL_INTERVAL;
        let next_wake = match deadline {
            Some(d) => d.min(halt_check),
            None => halt_check,
        };

        reactor.run_once(Some(next_wake))?;

        if let Some(d) = deadline {
            if Instant::now() >= d {
                return Ok(WaitOutcome::TimedOut);
            }
        }
    }
}
