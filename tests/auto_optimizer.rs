use anyhow::Result;
use approx::assert_abs_diff_eq;
use optix::detector::{IssueKind, Severity};
use optix::device::{Device, DeviceCapability, StaticProbe};
use optix::profiler::ReplaySource;
use optix::{AutoOptimizer, OptixConfig, ProfileReport};
use std::time::Duration;

fn fast_config() -> OptixConfig {
    let mut config = OptixConfig::default();
    config.session.interval = Duration::from_millis(5);
    config.dataloader.min_duration = Duration::from_millis(20);
    config.gpu_idle.min_duration = Duration::from_millis(20);
    config
}

#[test]
fn starved_accelerator_is_reported_as_dataloader_stall() -> Result<()> {
    let mut optix = AutoOptimizer::new(
        fast_config(),
        ReplaySource::constant(95.0, Some(0.0)),
        &StaticProbe::available(DeviceCapability::accelerator("FakeGPU", 1)),
    );

    optix.start()?;
    std::thread::sleep(Duration::from_millis(80));
    let snapshots = optix.stop()?;
    assert!(snapshots.len() >= 5);

    let report = optix.analyze();
    assert!(report.analysis.is_complete());
    assert_eq!(report.analysis.issues.len(), 1);
    let issue = &report.analysis.issues[0];
    assert_eq!(issue.kind, IssueKind::DataloaderStall);
    assert_eq!(issue.evidence.start_index, 0);
    assert_eq!(issue.evidence.end_index, snapshots.len() - 1);
    assert!(issue.severity >= Severity::Warning);

    assert_eq!(report.summary.samples, snapshots.len());
    assert_eq!(report.summary.avg_gpu, Some(0.0));
    Ok(())
}

#[test]
fn idle_accelerator_with_quiet_cpu_is_reported() -> Result<()> {
    let mut optix = AutoOptimizer::new(
        fast_config(),
        ReplaySource::constant(10.0, Some(1.0)),
        &StaticProbe::unavailable("no driver"),
    );

    optix.start()?;
    std::thread::sleep(Duration::from_millis(80));
    optix.stop()?;

    let kinds: Vec<IssueKind> = optix
        .analyze()
        .analysis
        .issues
        .into_iter()
        .map(|issue| issue.kind)
        .collect();
    assert_eq!(kinds, vec![IssueKind::GpuIdle]);
    Ok(())
}

#[test]
fn traced_workload_shows_up_in_the_report() -> Result<()> {
    let mut optix = AutoOptimizer::new(
        fast_config(),
        ReplaySource::constant(50.0, None),
        &StaticProbe::unavailable("no driver"),
    );
    let optimizer = optix.model_optimizer();

    optix.start()?;
    for _ in 0..3 {
        let result = optimizer.optimize(&[1.0, 2.0, 3.0, 4.0], 2, 2)?;
        assert_eq!(result.device, Device::Cpu);
        assert!(result.optimized);
    }
    optix.stop()?;

    assert_eq!(optix.last_events().len(), 6);
    let report = optix.analyze();
    assert_eq!(report.summary.kernel_count, 3);
    assert_eq!(report.summary.dropped_events, 0);
    assert_abs_diff_eq!(report.summary.avg_cpu, 50.0, epsilon = 1e-9);
    assert!(report.analysis.issues.is_empty());

    let path = std::env::temp_dir().join(format!("optix-it-{}.json", std::process::id()));
    report.save(&path)?;
    let loaded = ProfileReport::load(&path)?;
    std::fs::remove_file(&path)?;
    assert_eq!(loaded.summary.samples, report.summary.samples);
    assert_eq!(loaded.summary.kernel_count, 3);
    assert_eq!(loaded.analysis, report.analysis);
    Ok(())
}

#[test]
fn restart_analyzes_only_the_latest_run() -> Result<()> {
    let mut optix = AutoOptimizer::new(
        fast_config(),
        ReplaySource::constant(50.0, None),
        &StaticProbe::unavailable("no driver"),
    );
    let optimizer = optix.model_optimizer();

    optix.start()?;
    optimizer.optimize(&[1.0; 4], 2, 2)?;
    optix.stop()?;
    assert_eq!(optix.analyze().summary.kernel_count, 1);

    optix.start()?;
    optix.stop()?;
    assert_eq!(optix.analyze().summary.kernel_count, 0);
    assert!(optix.last_events().is_empty());
    Ok(())
}
