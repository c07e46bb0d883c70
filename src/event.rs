use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::NetError;

/// Identifies a port for the lifetime of the process. Stands in for the
/// script-level port handle that the events below would otherwise carry
/// directly.
pub type PortId = u64;

pub(crate) fn next_port_id() -> PortId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// A `{type, port}` record posted for the embedding application's awake
/// logic to consume.
#[derive(Debug)]
pub enum Event {
    Connect { port: PortId },
    Read { port: PortId },
    Wrote { port: PortId },
    Close { port: PortId },
    Accept { port: PortId },
    Error { port: PortId, error: NetError },
}

/// Receiver for posted events. The original design posts into a single
/// process-wide queue drained by an awake handler; here the embedder
/// supplies the sink directly, so the reactor carries no hidden global
/// state of its own.
pub trait EventSink {
    fn post(&self, event: Event);
}

/// A sink that just remembers everything it was given, for tests and
/// small embedders that don't need anything fancier.
#[derive(Default)]
pub struct RecordingSink {
    pub events: RefCell<Vec<Event>>,
}

impl EventSink for RecordingSink {
    fn post(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}
