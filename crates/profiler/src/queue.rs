//! Bounded kernel-event queue.
//!
//! Producers are kernel invocations on arbitrary threads; the only consumer is
//! [`EventQueue::drain`]. A push never waits on the consumer: when the queue is full the oldest
//! unread event is evicted and counted.
//!
//! Eviction must not leave a `kernel_end` without its `kernel_start`. The queue keeps a small
//! ledger of correlation ids: starts admitted and still waiting for their end, and starts that
//! were evicted while their end sits in the queue. Ends that lose their start are dropped and
//! counted like evicted events.

use crossbeam::queue::ArrayQueue;
use optix_kernels::{CorrelationId, KernelEvent, KernelEventKind, KernelTracer};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const DRAINING: u8 = 2;

#[derive(Debug, Default)]
struct PairLedger {
    /// Admitted starts whose end has not been admitted yet.
    awaiting_end: HashSet<CorrelationId>,
    /// Evicted starts whose end is still queued; that end is discarded on drain.
    orphaned: HashSet<CorrelationId>,
}

pub struct EventQueue {
    queue: ArrayQueue<KernelEvent>,
    ledger: Mutex<PairLedger>,
    dropped: AtomicU64,
    state: AtomicU8,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            ledger: Mutex::new(PairLedger::default()),
            dropped: AtomicU64::new(0),
            state: AtomicU8::new(CLOSED),
        }
    }

    /// Accept all events.
    pub fn open(&self) {
        self.state.store(OPEN, Ordering::Release);
    }

    /// Stop accepting new `kernel_start` events while still letting in-flight kernels
    /// deliver their `kernel_end`.
    pub fn close(&self) {
        self.state.store(DRAINING, Ordering::Release);
    }

    pub fn push(&self, event: KernelEvent) {
        let accepted = match (self.state.load(Ordering::Acquire), event.kind) {
            (OPEN, _) => true,
            (DRAINING, KernelEventKind::KernelEnd) => true,
            _ => false,
        };
        if !accepted {
            return;
        }

        let mut ledger = self.ledger.lock();
        match event.kind {
            KernelEventKind::KernelStart => {
                ledger.awaiting_end.insert(event.correlation_id);
            }
            KernelEventKind::KernelEnd => {
                // Start never admitted, or evicted before this end arrived.
                if !ledger.awaiting_end.remove(&event.correlation_id) {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        }

        if let Some(evicted) = self.queue.force_push(event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            let id = evicted.correlation_id;
            match evicted.kind {
                KernelEventKind::KernelStart => {
                    if !ledger.awaiting_end.remove(&id) {
                        ledger.orphaned.insert(id);
                    }
                }
                KernelEventKind::KernelEnd => {
                    ledger.orphaned.remove(&id);
                }
            }
        }
    }

    /// Remove every queued event in arrival order.
    pub fn drain(&self) -> Vec<KernelEvent> {
        let mut ledger = self.ledger.lock();
        let mut events = Vec::with_capacity(self.queue.len());
        while let Some(event) = self.queue.pop() {
            if event.kind == KernelEventKind::KernelEnd
                && ledger.orphaned.remove(&event.correlation_id)
            {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            events.push(event);
        }
        events
    }

    /// Events evicted on overflow plus ends discarded because their start was lost.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl KernelTracer for EventQueue {
    fn record(&self, event: KernelEvent) {
        self.push(event);
    }
}
