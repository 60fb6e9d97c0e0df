//! Contiguous-window scanning shared by the threshold detectors.

use optix_profiler::Snapshot;
use std::time::Duration;

/// Inclusive index range of consecutive qualifying snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Window {
    pub start: usize,
    pub end: usize,
}

/// Maximal runs of snapshots satisfying `qualifies` whose first-to-last span is strictly
/// longer than `min_duration`.
pub(crate) fn sustained_windows<F>(
    snapshots: &[Snapshot],
    min_duration: Duration,
    qualifies: F,
) -> Vec<Window>
where
    F: Fn(&Snapshot) -> bool,
{
    let mut windows = Vec::new();
    let mut run_start: Option<usize> = None;

    let close = |start: usize, end: usize, windows: &mut Vec<Window>| {
        let span = snapshots[end]
            .timestamp
            .duration_since(snapshots[start].timestamp);
        if span > min_duration {
            windows.push(Window { start, end });
        }
    };

    for (idx, snapshot) in snapshots.iter().enumerate() {
        match (qualifies(snapshot), run_start) {
            (true, None) => run_start = Some(idx),
            (false, Some(start)) => {
                close(start, idx - 1, &mut windows);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        close(start, snapshots.len() - 1, &mut windows);
    }

    windows
}
