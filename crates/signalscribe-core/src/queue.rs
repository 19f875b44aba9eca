//! Bounded FIFO with atomic size observability, connecting pipeline stages.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

/// A queue that has been closed; `get()` drains remaining items before it
/// starts returning `None`.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

struct Shared {
    len: AtomicUsize,
    closed: AtomicBool,
}

/// A bounded FIFO carrying `T` across stage boundaries with an externally
/// observable `size()`. `put`/`get` poll in short increments so a `close()`
/// issued by another thread is noticed promptly (spec: poll granularity
/// <= 0.5s).
pub struct TrackedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    shared: Arc<Shared>,
}

impl<T> Clone for TrackedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            shared: self.shared.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("queue is closed")]
pub struct Closed;

impl<T> TrackedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            shared: Arc::new(Shared {
                len: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Blocking put. Fails with `Closed` if the queue has been closed.
    pub fn put(&self, value: T) -> Result<(), Closed> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(Closed);
        }
        let mut value = value;
        loop {
            match self.tx.send_timeout(value, POLL_INTERVAL) {
                Ok(()) => {
                    self.shared.len.fetch_add(1, Ordering::SeqCst);
                    return Ok(());
                }
                Err(crossbeam_channel::SendTimeoutError::Timeout(v)) => {
                    if self.shared.closed.load(Ordering::SeqCst) {
                        return Err(Closed);
                    }
                    value = v;
                }
                Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => {
                    return Err(Closed);
                }
            }
        }
    }

    /// Blocking get. Returns `None` once the queue is closed and drained.
    pub fn get(&self) -> Option<T> {
        loop {
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(v) => {
                    self.shared.len.fetch_sub(1, Ordering::SeqCst);
                    return Some(v);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.shared.closed.load(Ordering::SeqCst) && self.rx.is_empty() {
                        return None;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    pub fn size(&self) -> usize {
        self.shared.len.load(Ordering::SeqCst)
    }

    /// Idempotent. Wakes waiters; subsequent `put`s fail, `get`s drain then
    /// return `None`.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}
