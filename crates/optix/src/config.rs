//! Top-level configuration.

use anyhow::{ensure, Context, Result};
use optix_detector::{DataLoaderThresholds, GpuIdleThresholds};
use optix_device::PlacementPolicy;
use optix_profiler::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const ENV_SAMPLE_INTERVAL_MS: &str = "OPTIX_SAMPLE_INTERVAL_MS";
pub const ENV_DISABLE_ACCELERATOR: &str = "OPTIX_DISABLE_ACCELERATOR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptixConfig {
    pub session: SessionConfig,
    pub placement: PlacementPolicy,
    pub dataloader: DataLoaderThresholds,
    pub gpu_idle: GpuIdleThresholds,
    pub use_accelerator_if_available: bool,
}

impl Default for OptixConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            placement: PlacementPolicy::default(),
            dataloader: DataLoaderThresholds::default(),
            gpu_idle: GpuIdleThresholds::default(),
            use_accelerator_if_available: true,
        }
    }
}

impl OptixConfig {
    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("invalid config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.session.interval.is_zero(),
            "session.interval_ms must be positive"
        );
        ensure!(
            self.session.event_capacity > 0,
            "session.event_capacity must be positive"
        );
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by the `OPTIX_*` variable names.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_SAMPLE_INTERVAL_MS) {
            let millis: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_SAMPLE_INTERVAL_MS}={raw} is not an integer"))?;
            ensure!(millis > 0, "{ENV_SAMPLE_INTERVAL_MS} must be positive");
            debug!(millis, "sample interval overridden from environment");
            self.session.interval = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup(ENV_DISABLE_ACCELERATOR) {
            if matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ) {
                debug!("accelerator disabled from environment");
                self.use_accelerator_if_available = false;
            }
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: OptixConfig = serde_json::from_str(
            r#"{"session": {"interval_ms": 200}, "dataloader": {"cpu_high_percent": 70.0}}"#,
        )
        .unwrap();
        assert_eq!(config.session.interval, Duration::from_millis(200));
        assert_eq!(config.dataloader.cpu_high_percent, 70.0);
        assert_eq!(config.dataloader.min_duration, Duration::from_secs(3));
        assert_eq!(config.gpu_idle.min_duration, Duration::from_secs(5));
        assert_eq!(config.placement, PlacementPolicy::default());
        assert!(config.use_accelerator_if_available);
    }

    #[test]
    fn environment_overrides_apply() {
        let config = OptixConfig::default()
            .with_overrides(lookup(&[
                (ENV_SAMPLE_INTERVAL_MS, "250"),
                (ENV_DISABLE_ACCELERATOR, "true"),
            ]))
            .unwrap();
        assert_eq!(config.session.interval, Duration::from_millis(250));
        assert!(!config.use_accelerator_if_available);
    }

    #[test]
    fn malformed_interval_is_rejected() {
        assert!(OptixConfig::default()
            .with_overrides(lookup(&[(ENV_SAMPLE_INTERVAL_MS, "fast")]))
            .is_err());
        assert!(OptixConfig::default()
            .with_overrides(lookup(&[(ENV_SAMPLE_INTERVAL_MS, "0")]))
            .is_err());
    }

    #[test]
    fn zero_interval_file_is_rejected() {
        let path = std::env::temp_dir().join(format!("optix-config-{}.json", fastrand::u64(..)));
        std::fs::write(&path, r#"{"session": {"interval_ms": 0}}"#).unwrap();
        let err = OptixConfig::load(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(format!("{err:#}").contains("interval_ms must be positive"));
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("optix-config-{}.json", fastrand::u64(..)));
        let mut config = OptixConfig::default();
        config.gpu_idle.gpu_idle_percent = 2.5;
        config.save(&path).unwrap();

        let loaded = OptixConfig::load(&path).unwrap();
        assert_eq!(loaded.gpu_idle.gpu_idle_percent, 2.5);
        std::fs::remove_file(path).unwrap();
    }
}
