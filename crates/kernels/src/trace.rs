//! Kernel start/end tracing.
//!
//! A [`TraceHook`] is the call-site hook around each kernel invocation. It either forwards
//! events to an attached [`KernelTracer`] or reports [`TracerStatus::Unavailable`], in which
//! case kernels run untraced. Both events of one invocation are emitted from the same thread,
//! so a `kernel_start` always reaches the tracer before its `kernel_end`.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);
static NEXT_CORRELATION_ID: AtomicU64 = AtomicU64::new(1);

/// Monotonic instant, in nanoseconds since the process-wide trace origin.
///
/// Snapshots and kernel events share this clock so they can be placed on one timeline.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn now() -> Self {
        Self(ORIGIN.elapsed().as_nanos() as u64)
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self(Duration::from_secs_f64(secs.max(0.0)).as_nanos() as u64)
    }

    pub fn as_nanos(self) -> u64 {
        self.0
    }

    /// Saturates to zero when `earlier` is actually later.
    pub fn duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

/// Opaque token linking a `kernel_start` to its `kernel_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn next() -> Self {
        Self(NEXT_CORRELATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelEventKind {
    KernelStart,
    KernelEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KernelEvent {
    pub timestamp: Timestamp,
    pub kind: KernelEventKind,
    pub correlation_id: CorrelationId,
    /// Name of the kernel that emitted the event.
    pub kernel: &'static str,
}

impl KernelEvent {
    pub fn start(correlation_id: CorrelationId, kernel: &'static str) -> Self {
        Self {
            timestamp: Timestamp::now(),
            kind: KernelEventKind::KernelStart,
            correlation_id,
            kernel,
        }
    }

    pub fn end(correlation_id: CorrelationId, kernel: &'static str) -> Self {
        Self {
            timestamp: Timestamp::now(),
            kind: KernelEventKind::KernelEnd,
            correlation_id,
            kernel,
        }
    }
}

/// Receiver of kernel events. Implementations must return promptly and never block.
pub trait KernelTracer: Send + Sync {
    fn record(&self, event: KernelEvent);
}

pub type DynKernelTracer = Arc<dyn KernelTracer>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracerStatus {
    Attached,
    Unavailable,
}

#[derive(Clone, Default)]
pub struct TraceHook {
    tracer: Option<DynKernelTracer>,
}

impl TraceHook {
    pub fn unavailable() -> Self {
        Self { tracer: None }
    }

    pub fn attached(tracer: DynKernelTracer) -> Self {
        Self {
            tracer: Some(tracer),
        }
    }

    pub fn status(&self) -> TracerStatus {
        if self.tracer.is_some() {
            TracerStatus::Attached
        } else {
            TracerStatus::Unavailable
        }
    }

    /// Run `f` bracketed by start/end events for `kernel`.
    pub fn trace<T>(&self, kernel: &'static str, f: impl FnOnce() -> T) -> T {
        let Some(tracer) = &self.tracer else {
            return f();
        };

        let id = CorrelationId::next();
        tracer.record(KernelEvent::start(id, kernel));
        let output = f();
        tracer.record(KernelEvent::end(id, kernel));
        output
    }
}

impl fmt::Debug for TraceHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceHook")
            .field("status", &self.status())
            .finish()
    }
}
