//! Pairing of kernel start/end events into spans.

use optix_kernels::{CorrelationId, KernelEvent, KernelEventKind, Timestamp};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Wall-clock extent of one kernel invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KernelSpan {
    pub correlation_id: CorrelationId,
    pub kernel: &'static str,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl KernelSpan {
    pub fn duration(&self) -> Duration {
        self.end.duration_since(self.start)
    }

    /// Portion of this span that falls inside `[from, to]`.
    pub fn overlap(&self, from: Timestamp, to: Timestamp) -> Duration {
        let start = self.start.max(from);
        let end = self.end.min(to);
        end.duration_since(start)
    }
}

/// Incrementally pairs drained events. Starts whose end has not arrived yet stay open across
/// calls to [`SpanTracker::ingest`], so a span may straddle two polls.
#[derive(Debug, Default)]
pub struct SpanTracker {
    open: HashMap<CorrelationId, KernelEvent>,
    spans: Vec<KernelSpan>,
    orphan_ends: usize,
}

impl SpanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, events: &[KernelEvent]) {
        for event in events {
            match event.kind {
                KernelEventKind::KernelStart => {
                    self.open.insert(event.correlation_id, *event);
                }
                KernelEventKind::KernelEnd => match self.open.remove(&event.correlation_id) {
                    Some(start) => self.spans.push(KernelSpan {
                        correlation_id: event.correlation_id,
                        kernel: start.kernel,
                        start: start.timestamp,
                        end: event.timestamp.max(start.timestamp),
                    }),
                    // Its start was never delivered.
                    None => self.orphan_ends += 1,
                },
            }
        }
    }

    /// Completed spans in end order.
    pub fn spans(&self) -> &[KernelSpan] {
        &self.spans
    }

    /// Starts without a matching end so far, oldest first.
    pub fn dangling(&self) -> Vec<KernelEvent> {
        let mut dangling: Vec<KernelEvent> = self.open.values().copied().collect();
        dangling.sort_by_key(|event| event.timestamp);
        dangling
    }

    pub fn orphan_ends(&self) -> usize {
        self.orphan_ends
    }

    pub fn clear(&mut self) {
        self.open.clear();
        self.spans.clear();
        self.orphan_ends = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u64, kind: KernelEventKind, at: u64) -> KernelEvent {
        KernelEvent {
            timestamp: Timestamp::from_nanos(at),
            kind,
            correlation_id: CorrelationId::from_raw(id),
            kernel: "k",
        }
    }

    #[test]
    fn pairs_across_ingest_calls() {
        let mut tracker = SpanTracker::new();
        tracker.ingest(&[
            event(1, KernelEventKind::KernelStart, 10),
            event(2, KernelEventKind::KernelStart, 20),
        ]);
        tracker.ingest(&[
            event(1, KernelEventKind::KernelEnd, 50),
            event(3, KernelEventKind::KernelEnd, 60),
        ]);

        assert_eq!(tracker.spans().len(), 1);
        assert_eq!(tracker.spans()[0].duration(), Duration::from_nanos(40));
        assert_eq!(tracker.dangling().len(), 1);
        assert_eq!(tracker.dangling()[0].correlation_id.get(), 2);
        assert_eq!(tracker.orphan_ends(), 1);
    }

    #[test]
    fn overlap_is_clipped_to_window() {
        let span = KernelSpan {
            correlation_id: CorrelationId::from_raw(1),
            kernel: "k",
            start: Timestamp::from_nanos(100),
            end: Timestamp::from_nanos(200),
        };
        assert_eq!(
            span.overlap(Timestamp::from_nanos(150), Timestamp::from_nanos(400)),
            Duration::from_nanos(50)
        );
        assert_eq!(
            span.overlap(Timestamp::from_nanos(300), Timestamp::from_nanos(400)),
            Duration::ZERO
        );
    }
}
