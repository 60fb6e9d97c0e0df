//! Compute device discovery.
//!
//! A [`DeviceCapability`] is probed once and then passed explicitly to whoever needs it;
//! re-probing means constructing a new value.

use pollster::block_on;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("device layer unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Cpu,
    Accelerator,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapability {
    pub device_type: DeviceType,
    pub device_name: String,
    pub device_count: u32,
}

impl DeviceCapability {
    pub fn accelerator(name: impl Into<String>, count: u32) -> Self {
        Self {
            device_type: DeviceType::Accelerator,
            device_name: name.into(),
            device_count: count,
        }
    }

    pub fn cpu() -> Self {
        Self {
            device_type: DeviceType::Cpu,
            device_name: "cpu".into(),
            device_count: 1,
        }
    }

    pub fn none() -> Self {
        Self {
            device_type: DeviceType::None,
            device_name: String::new(),
            device_count: 0,
        }
    }

    pub fn has_accelerator(&self) -> bool {
        self.device_type == DeviceType::Accelerator && self.device_count > 0
    }

    /// Probe once, degrading to [`DeviceType::None`] when the device layer is unreachable.
    pub fn detect(probe: &dyn DeviceCapabilityProbe) -> Self {
        match probe.probe() {
            Ok(capability) => {
                info!(
                    device_type = ?capability.device_type,
                    device = %capability.device_name,
                    count = capability.device_count,
                    "device capability probed"
                );
                capability
            }
            Err(err) => {
                warn!(error = %err, "device probe failed; assuming no accelerator");
                Self::none()
            }
        }
    }
}

pub trait DeviceCapabilityProbe: Send + Sync {
    fn probe(&self) -> Result<DeviceCapability, ProbeError>;
}

/// Probe with a predetermined answer.
#[derive(Debug, Clone)]
pub struct StaticProbe {
    result: Result<DeviceCapability, ProbeError>,
}

impl StaticProbe {
    pub fn available(capability: DeviceCapability) -> Self {
        Self {
            result: Ok(capability),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            result: Err(ProbeError::Unavailable(reason.into())),
        }
    }
}

impl DeviceCapabilityProbe for StaticProbe {
    fn probe(&self) -> Result<DeviceCapability, ProbeError> {
        self.result.clone()
    }
}

/// Discovers hardware GPU adapters through wgpu (Vulkan, Metal, DX12, GL).
#[derive(Debug, Clone)]
pub struct WgpuProbe {
    backends: wgpu::Backends,
}

impl WgpuProbe {
    pub fn new() -> Self {
        Self {
            backends: wgpu::Backends::all(),
        }
    }
}

impl Default for WgpuProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn is_hardware(device_type: wgpu::DeviceType) -> bool {
    matches!(
        device_type,
        wgpu::DeviceType::DiscreteGpu | wgpu::DeviceType::IntegratedGpu
    )
}

impl DeviceCapabilityProbe for WgpuProbe {
    fn probe(&self) -> Result<DeviceCapability, ProbeError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: self.backends,
            ..Default::default()
        });

        let adapters: Vec<wgpu::AdapterInfo> = instance
            .enumerate_adapters(self.backends)
            .into_iter()
            .map(|adapter| adapter.get_info())
            .collect();
        if adapters.is_empty() {
            return Err(ProbeError::Unavailable(
                "no graphics adapter reachable".into(),
            ));
        }

        // The same physical device is reported once per backend.
        let mut seen = HashSet::new();
        let hardware: Vec<&wgpu::AdapterInfo> = adapters
            .iter()
            .filter(|info| is_hardware(info.device_type))
            .filter(|info| seen.insert((info.vendor, info.device, info.name.clone())))
            .collect();
        if hardware.is_empty() {
            return Ok(DeviceCapability::cpu());
        }

        let preferred = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map(|adapter| adapter.get_info())
        .filter(|info| is_hardware(info.device_type));

        let name = preferred
            .map(|info| info.name)
            .unwrap_or_else(|| hardware[0].name.clone());

        Ok(DeviceCapability::accelerator(name, hardware.len() as u32))
    }
}
