//! Sampling session lifecycle.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::metrics::MetricSource;
use crate::queue::EventQueue;
use crate::snapshot::{Snapshot, SnapshotLog};
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use optix_kernels::{DynKernelTracer, KernelEvent, Timestamp, TraceHook};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

type SharedSource = Arc<Mutex<Box<dyn MetricSource>>>;

/// Result of [`SamplingSession::poll`].
#[derive(Debug, Clone, Default)]
pub struct Poll {
    /// Kernel events drained from the queue, in arrival order.
    pub events: Vec<KernelEvent>,
    /// Snapshots recorded so far in the current (or last) run.
    pub snapshots: Vec<Snapshot>,
}

struct Sampler {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct SamplingSession {
    config: SessionConfig,
    source: SharedSource,
    log: SnapshotLog,
    events: Arc<EventQueue>,
    sampler: Option<Sampler>,
    started_at: Option<Timestamp>,
}

impl SamplingSession {
    pub fn new<S>(config: SessionConfig, source: S) -> Self
    where
        S: MetricSource + 'static,
    {
        let events = Arc::new(EventQueue::new(config.event_capacity));
        Self {
            config,
            source: Arc::new(Mutex::new(Box::new(source))),
            log: SnapshotLog::new(),
            events,
            sampler: None,
            started_at: None,
        }
    }

    /// Idle → Running. Takes one snapshot right away, then one per interval.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.sampler.is_some() {
            return Err(SessionError::AlreadyRunning);
        }
        if self.config.interval.is_zero() {
            return Err(SessionError::ZeroInterval);
        }

        let log = SnapshotLog::new();
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let source = Arc::clone(&self.source);
        let writer = log.clone();
        let interval = self.config.interval;

        let handle = std::thread::Builder::new()
            .name("optix-sampler".into())
            .spawn(move || {
                let mut next_tick = Instant::now();
                loop {
                    match source.lock().sample() {
                        Ok(snapshot) => writer.push(snapshot),
                        Err(err) => warn!(error = %err, "metric sample failed; skipping tick"),
                    }

                    next_tick += interval;
                    match stop_rx.recv_deadline(next_tick) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("sampler thread exiting");
            })?;

        self.log = log;
        self.events.open();
        self.started_at = Some(Timestamp::now());
        self.sampler = Some(Sampler { stop_tx, handle });

        info!(
            interval_ms = interval.as_millis() as u64,
            event_capacity = self.events.capacity(),
            "sampling session started"
        );
        Ok(())
    }

    /// Running → Idle. Returns only after the sampler thread has exited; queued kernel events
    /// are kept for the next [`poll`](Self::poll).
    pub fn stop(&mut self) -> Result<(), SessionError> {
        let sampler = self.sampler.take().ok_or(SessionError::NotRunning)?;
        self.events.close();

        // A full channel means a stop is already pending; either way the thread wakes.
        let _ = sampler.stop_tx.try_send(());
        if sampler.handle.join().is_err() {
            error!("sampler thread panicked");
        }

        let dropped = self.events.dropped();
        if dropped > 0 {
            warn!(dropped, "kernel events dropped on full queue");
        }
        info!(
            snapshots = self.log.len(),
            elapsed_ms = self.elapsed().as_millis() as u64,
            "sampling session stopped"
        );
        Ok(())
    }

    /// Drain queued kernel events and copy the snapshot log. Valid in both states.
    pub fn poll(&self) -> Poll {
        Poll {
            events: self.events.drain(),
            snapshots: self.log.view(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.sampler.is_some()
    }

    /// Sink to attach to the kernel boundary.
    pub fn tracer(&self) -> DynKernelTracer {
        Arc::clone(&self.events) as DynKernelTracer
    }

    pub fn hook(&self) -> TraceHook {
        TraceHook::attached(self.tracer())
    }

    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }

    pub fn snapshot_count(&self) -> usize {
        self.log.len()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Time since the last `start()`; zero if never started.
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .map(|start| Timestamp::now().duration_since(start))
            .unwrap_or_default()
    }
}

impl Drop for SamplingSession {
    fn drop(&mut self) {
        if self.sampler.is_some() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ReplaySource;
    use optix_kernels::KernelEventKind;

    fn fast_session() -> SamplingSession {
        let config = SessionConfig::default().with_interval(Duration::from_millis(5));
        SamplingSession::new(config, ReplaySource::constant(50.0, Some(20.0)))
    }

    #[test]
    fn start_twice_fails_with_already_running() {
        let mut session = fast_session();
        session.start().unwrap();
        assert!(matches!(session.start(), Err(SessionError::AlreadyRunning)));
        session.stop().unwrap();
    }

    #[test]
    fn zero_interval_is_rejected_before_sampling() {
        let config = SessionConfig::default().with_interval(Duration::ZERO);
        let mut session = SamplingSession::new(config, ReplaySource::constant(50.0, None));
        assert!(matches!(session.start(), Err(SessionError::ZeroInterval)));
        assert!(!session.is_running());
        assert_eq!(session.snapshot_count(), 0);
    }

    #[test]
    fn stop_while_idle_fails_with_not_running() {
        let mut session = fast_session();
        assert!(matches!(session.stop(), Err(SessionError::NotRunning)));
        session.start().unwrap();
        session.stop().unwrap();
        assert!(matches!(session.stop(), Err(SessionError::NotRunning)));
    }

    #[test]
    fn no_snapshot_after_stop_returns() {
        let mut session = fast_session();
        session.start().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        session.stop().unwrap();

        let stopped_at = Timestamp::now();
        let recorded = session.snapshot_count();
        assert!(recorded >= 1);

        std::thread::sleep(Duration::from_millis(30));
        let snapshots = session.poll().snapshots;
        assert_eq!(snapshots.len(), recorded);
        assert!(snapshots.iter().all(|s| s.timestamp <= stopped_at));
    }

    #[test]
    fn poll_drains_kernel_events() {
        let mut session = fast_session();
        session.start().unwrap();
        let hook = session.hook();
        for _ in 0..3 {
            hook.trace("noop", || ());
        }

        let first = session.poll();
        assert_eq!(first.events.len(), 6);
        assert_eq!(first.events[0].kind, KernelEventKind::KernelStart);
        assert!(session.poll().events.is_empty());
        session.stop().unwrap();
    }

    #[test]
    fn kernel_end_after_stop_is_still_captured() {
        let mut session = fast_session();
        session.start().unwrap();
        let hook = session.hook();

        let (entered_tx, entered_rx) = channel::bounded::<()>(0);
        let (release_tx, release_rx) = channel::bounded::<()>(0);
        let worker = std::thread::spawn(move || {
            hook.trace("slow", || {
                entered_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        });

        entered_rx.recv().unwrap();
        session.stop().unwrap();
        release_tx.send(()).unwrap();
        worker.join().unwrap();

        let events = session.poll().events;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, KernelEventKind::KernelEnd);

        session.hook().trace("late", || ());
        assert!(session.poll().events.is_empty());
    }

    #[test]
    fn restart_begins_a_fresh_log() {
        let mut session = fast_session();
        session.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        session.stop().unwrap();
        let first_run = session.poll().snapshots;

        session.start().unwrap();
        session.stop().unwrap();
        let second_run = session.poll().snapshots;

        assert!(!first_run.is_empty());
        assert!(!second_run.is_empty());
        assert!(second_run[0].timestamp > first_run[first_run.len() - 1].timestamp);
    }
}
