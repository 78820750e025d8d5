//! In-process publish/subscribe fan-out.
//!
//! Every subscriber owns a bounded queue. `publish` waits for room in each queue
//! (bounded blocking), so a slow consumer back-pressures the sources instead of
//! losing events. Publishes are serialized, which keeps every subscriber's view in
//! publish order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

use crate::error::BusError;
use crate::model::Event;

pub const DEFAULT_CAPACITY: usize = 256;

struct Slot {
    id: u64,
    tx: mpsc::Sender<Event>,
    closed: CancellationToken,
}

struct Inner {
    capacity: usize,
    next_id: AtomicU64,
    slots: Mutex<Vec<Slot>>,
    publish_lock: tokio::sync::Mutex<()>,
    closed: CancellationToken,
}

/// Cheap to clone; all clones share the same subscriber set.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<Inner>,
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity: capacity.max(1),
                next_id: AtomicU64::new(0),
                slots: Mutex::new(Vec::with_capacity(8)),
                publish_lock: tokio::sync::Mutex::new(()),
                closed: CancellationToken::new(),
            }),
        }
    }

    /// Registers a new subscriber. It sees every event published from now on.
    pub fn subscribe(&self) -> Result<Subscription, BusError> {
        if self.inner.closed.is_cancelled() {
            return Err(BusError::Closed);
        }
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let closed = self.inner.closed.child_token();

        let mut slots = self.inner.slots.lock();
        // close() may have run between the check above and taking the lock
        if self.inner.closed.is_cancelled() {
            return Err(BusError::Closed);
        }
        slots.push(Slot {
            id,
            tx,
            closed: closed.clone(),
        });
        drop(slots);

        debug!(component = "bus", event = "subscribed", id, "new subscriber");
        Ok(Subscription {
            id,
            rx,
            closed,
            bus: Arc::downgrade(&self.inner),
        })
    }

    /// Delivers `event` to every registered subscriber, returning how many received it.
    pub async fn publish(&self, event: Event) -> Result<usize, BusError> {
        if self.inner.closed.is_cancelled() {
            return Err(BusError::Closed);
        }
        let _serial = tokio::select! {
            guard = self.inner.publish_lock.lock() => guard,
            _ = self.inner.closed.cancelled() => return Err(BusError::Closed),
        };

        let targets: Vec<(u64, mpsc::Sender<Event>)> = self
            .inner
            .slots
            .lock()
            .iter()
            .filter(|slot| !slot.closed.is_cancelled())
            .map(|slot| (slot.id, slot.tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut gone = Vec::new();
        for (id, tx) in targets {
            tokio::select! {
                biased;
                _ = self.inner.closed.cancelled() => return Err(BusError::Closed),
                sent = tx.send(event.clone()) => match sent {
                    Ok(()) => delivered += 1,
                    Err(_) => gone.push(id),
                },
            }
        }

        if !gone.is_empty() {
            self.inner.slots.lock().retain(|slot| !gone.contains(&slot.id));
        }
        Ok(delivered)
    }

    /// Ends every subscription. Events already queued are still handed out.
    pub fn close(&self) {
        self.inner.closed.cancel();
        let drained: Vec<Slot> = self.inner.slots.lock().drain(..).collect();
        debug!(
            component = "bus",
            event = "closed",
            subscribers = drained.len(),
            "bus closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    pub fn subscribers(&self) -> usize {
        self.inner.slots.lock().len()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A subscriber's handle: an ordered event queue plus a "closed" signal.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Event>,
    closed: CancellationToken,
    bus: std::sync::Weak<Inner>,
}

impl Subscription {
    /// Next event, or `None` once the bus or this subscription is closed and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Resolves when the bus or this subscription has been closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Stops receiving new events; queued ones can still be read.
    pub fn close(&mut self) {
        self.closed.cancel();
        self.rx.close();
        self.detach();
    }

    fn detach(&self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.slots.lock().retain(|slot| slot.id != self.id);
        }
    }

    /// Lazy event sequence, infinite until the subscription ends.
    pub fn into_stream(self) -> impl Stream<Item = Event> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
