//! CLI wiring for optix.

use crate::auto::{default_source, AutoOptimizer};
use crate::config::OptixConfig;
use crate::optimizer::{random_matrix, ModelOptimizer};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use optix_device::{DeviceCapability, DeviceCapabilityProbe, SmartSelector, StaticProbe, WgpuProbe};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Largest matrix the `optimize` demo will allocate.
const MAX_DEMO_ELEMENTS: usize = 100_000_000;

#[derive(Parser, Debug)]
#[command(name = "optix", about = "Runtime profiler and device placement advisor")]
pub struct Cli {
    #[arg(long, value_enum, default_value = "auto")]
    pub device: DeviceArg,

    /// JSON configuration file; environment overrides apply on top.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum DeviceArg {
    /// Probe GPUs through wgpu.
    Auto,
    /// Pretend no accelerator is present.
    None,
}

impl DeviceArg {
    fn probe(self) -> Box<dyn DeviceCapabilityProbe> {
        match self {
            DeviceArg::Auto => Box::new(WgpuProbe::new()),
            DeviceArg::None => Box::new(StaticProbe::available(DeviceCapability::none())),
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum BackendArg {
    Cpu,
    Gpu,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum ReportFormat {
    Json,
    Markdown,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Profile a synthetic traced matmul workload and report detected issues.
    Profile {
        /// Seconds to run the workload.
        #[arg(long, default_value_t = 10.0)]
        duration: f64,
        /// Sampling interval in seconds.
        #[arg(long, default_value_t = 1.0)]
        interval: f64,
        /// Side length of the square matrices multiplied by the workload.
        #[arg(long, default_value_t = 256)]
        size: usize,
        #[arg(long, value_enum, default_value = "json")]
        format: ReportFormat,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run one placement-aware multiplication of a rows x cols matrix by its transpose.
    Optimize {
        #[arg(long, default_value_t = 100)]
        rows: usize,
        #[arg(long, default_value_t = 100)]
        cols: usize,
        /// Force a backend instead of letting placement decide.
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,
    },
    /// Print the detected device capability.
    Probe,
}

pub fn run_cli(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let Cli {
        device,
        config,
        command,
    } = cli;
    let config = match config {
        Some(path) => OptixConfig::load(path)?.with_env_overrides()?,
        None => OptixConfig::from_env()?,
    };
    let probe = device.probe();

    match command {
        Command::Profile {
            duration,
            interval,
            size,
            format,
            output,
        } => {
            let duration = seconds_arg("--duration", duration)?;
            let interval = seconds_arg("--interval", interval)?;
            demo_elements(size, size)?;

            let mut config = config;
            config.session.interval = interval;
            let mut optix = AutoOptimizer::new(config, default_source(), probe.as_ref());
            let optimizer = optix.model_optimizer();

            optix.start()?;
            let runs = run_workload(&optimizer, size, duration);
            let snapshots = optix.stop()?;
            let runs = runs?;
            info!(runs, snapshots = snapshots.len(), "workload finished");

            let report = optix.analyze();
            if !report.accelerator_observed() {
                warn!("accelerator utilization unavailable; accelerator issues cannot be detected");
            }
            let rendered = match format {
                ReportFormat::Json => serde_json::to_string_pretty(&report)?,
                ReportFormat::Markdown => report.to_markdown(),
            };
            println!("{rendered}");
            if let Some(path) = output {
                std::fs::write(&path, rendered)?;
                println!("report saved to {}", path.display());
            }
        }
        Command::Optimize {
            rows,
            cols,
            backend,
        } => {
            let elements = demo_elements(rows, cols)?;

            let use_accelerator = match backend {
                Some(BackendArg::Cpu) => false,
                Some(BackendArg::Gpu) => true,
                None => config.use_accelerator_if_available,
            };
            let selector = SmartSelector::from_probe(probe.as_ref(), config.placement);
            let optimizer = ModelOptimizer::new(selector).with_accelerator(use_accelerator);

            let data = vec![1.0f32; elements];
            let start = Instant::now();
            let result = optimizer.optimize(&data, rows, cols)?;
            let total_ms = start.elapsed().as_secs_f64() * 1e3;

            if backend.is_none() {
                let size_bytes = (elements as u64).saturating_mul(8);
                println!("suggested backend: {}", optimizer.suggest_backend(size_bytes));
            }
            println!("device: {}", result.device);
            println!("kernel: {}", result.kernel);
            println!("optimized: {}", result.optimized);
            println!("kernel time: {:.2} ms", result.execution_time_ms);
            println!("total time: {total_ms:.2} ms");
        }
        Command::Probe => {
            let capability = DeviceCapability::detect(probe.as_ref());
            println!("{}", serde_json::to_string_pretty(&capability)?);
        }
    }

    Ok(())
}

/// Parse a positive, finite, representable number of seconds.
fn seconds_arg(name: &str, seconds: f64) -> Result<Duration> {
    if !(seconds.is_finite() && seconds > 0.0) {
        bail!("{name} must be a positive number of seconds");
    }
    let duration = Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("{name} of {seconds} seconds is out of range"))?;
    if duration.is_zero() {
        bail!("{name} of {seconds} seconds rounds down to zero");
    }
    Ok(duration)
}

/// Element count of a `rows x cols` demo matrix, capped at [`MAX_DEMO_ELEMENTS`].
fn demo_elements(rows: usize, cols: usize) -> Result<usize> {
    match rows.checked_mul(cols) {
        Some(elements) if elements <= MAX_DEMO_ELEMENTS => Ok(elements),
        _ => {
            let elements = rows as f64 * cols as f64;
            bail!(
                "requested size ({elements} elements) is too large for this demo; \
                 it would need about {:.2} GB of memory",
                elements * 8.0 / 1024.0 / 1024.0 / 1024.0
            )
        }
    }
}

/// Repeatedly multiply random `size x size` matrices until `duration` has passed.
fn run_workload(optimizer: &ModelOptimizer, size: usize, duration: Duration) -> Result<usize> {
    let data = random_matrix(size, size)?;
    let deadline = Instant::now()
        .checked_add(duration)
        .context("workload duration is too long")?;
    let mut runs = 0;
    while Instant::now() < deadline {
        optimizer.optimize(&data, size, size)?;
        runs += 1;
    }
    Ok(runs)
}
