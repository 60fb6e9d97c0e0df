//! Persisted result of one profiling run.

use optix_detector::{Analysis, RunSummary, Severity};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileReport {
    pub summary: RunSummary,
    pub analysis: Analysis,
}

impl ProfileReport {
    pub fn new(summary: RunSummary, analysis: Analysis) -> Self {
        Self { summary, analysis }
    }

    /// Save report to JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load report from JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let report = serde_json::from_str(&json)?;
        Ok(report)
    }

    pub fn worst_severity(&self) -> Option<Severity> {
        self.analysis.issues.iter().map(|issue| issue.severity).max()
    }

    /// Whether any sample carried accelerator utilization.
    pub fn accelerator_observed(&self) -> bool {
        self.summary.avg_gpu.is_some()
    }

    /// Human-readable rendering for terminals and saved `.md` files.
    pub fn to_markdown(&self) -> String {
        let summary = &self.summary;
        let mut out = String::from("# optix performance report\n\n## Summary\n\n");
        push_line(&mut out, "| metric | value |\n|---|---|");
        push_line(&mut out, format!("| duration | {:.2} s |", summary.duration.as_secs_f64()));
        push_line(&mut out, format!("| samples | {} |", summary.samples));
        push_line(&mut out, format!("| avg cpu | {:.1} % |", summary.avg_cpu));
        match summary.avg_gpu {
            Some(gpu) => push_line(&mut out, format!("| avg gpu | {gpu:.1} % |")),
            None => push_line(&mut out, "| avg gpu | n/a |"),
        }
        push_line(&mut out, format!("| peak ram | {:.1} MB |", summary.peak_ram_mb));
        push_line(
            &mut out,
            format!(
                "| kernels | {} ({:.2} ms) |",
                summary.kernel_count,
                summary.kernel_time.as_secs_f64() * 1e3
            ),
        );
        if let Some(watts) = summary.peak_gpu_power_w {
            push_line(&mut out, format!("| peak gpu power | {watts:.1} W |"));
        }
        if let Some(celsius) = summary.peak_gpu_temp_c {
            push_line(&mut out, format!("| peak gpu temp | {celsius:.0} °C |"));
        }
        if summary.dropped_events > 0 {
            push_line(&mut out, format!("| dropped events | {} |", summary.dropped_events));
        }
        if summary.samples > 0 && !self.accelerator_observed() {
            push_line(
                &mut out,
                "\n> accelerator utilization unavailable; accelerator issues cannot be detected",
            );
        }

        out.push_str("\n## Issues\n\n");
        if self.analysis.issues.is_empty() {
            push_line(&mut out, "No issues detected.");
        }
        for issue in &self.analysis.issues {
            let kind = serde_json::to_value(&issue.kind)
                .ok()
                .and_then(|kind| kind.as_str().map(str::to_owned))
                .unwrap_or_else(|| format!("{:?}", issue.kind));
            push_line(
                &mut out,
                format!(
                    "- **{:?}** `{kind}` (samples {}..={}): {}",
                    issue.severity,
                    issue.evidence.start_index,
                    issue.evidence.end_index,
                    issue.description
                ),
            );
        }

        if !self.analysis.failures.is_empty() {
            out.push_str("\n## Detector failures\n\n");
            for failure in &self.analysis.failures {
                push_line(&mut out, format!("- `{}`: {}", failure.detector, failure.message));
            }
        }
        out
    }
}

fn push_line(out: &mut String, line: impl AsRef<str>) {
    out.push_str(line.as_ref());
    out.push('\n');
}
