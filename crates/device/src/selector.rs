//! Ahead-of-execution device placement.
//!
//! The selector compares a coarse compute estimate against the cost of moving the operands
//! across the host/accelerator boundary. Only the direction of the heuristic is meaningful:
//! small element-wise work stays on the CPU, large super-linear work moves to the
//! accelerator. The constants live in [`PlacementPolicy`].

use crate::capability::{DeviceCapability, DeviceCapabilityProbe};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Operand size above which [`suggest_backend`] recommends the accelerator.
pub const SUGGEST_ACCELERATOR_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityClass {
    Linear,
    Quadratic,
    Cubic,
}

impl ComplexityClass {
    pub fn exponent(self) -> i32 {
        match self {
            ComplexityClass::Linear => 1,
            ComplexityClass::Quadratic => 2,
            ComplexityClass::Cubic => 3,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown complexity class `{0}` (expected linear, quadratic or cubic)")]
pub struct ParseComplexityError(String);

impl FromStr for ComplexityClass {
    type Err = ParseComplexityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(ComplexityClass::Linear),
            "quadratic" => Ok(ComplexityClass::Quadratic),
            "cubic" => Ok(ComplexityClass::Cubic),
            other => Err(ParseComplexityError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Accelerator(String),
}

impl Device {
    pub fn is_accelerator(&self) -> bool {
        matches!(self, Device::Accelerator(_))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Accelerator(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementPolicy {
    /// Transfer cost of one element, in units of one element-wise operation.
    pub transfer_cost_per_element: f64,
    /// Factor by which compute must exceed transfer before the accelerator wins.
    pub margin: f64,
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self {
            transfer_cost_per_element: 1024.0,
            margin: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlacementEstimate {
    pub elements: f64,
    pub work: f64,
    pub transfer: f64,
}

impl PlacementEstimate {
    pub fn favors_accelerator(&self, margin: f64) -> bool {
        self.elements > 0.0 && self.work > self.transfer * margin
    }
}

/// Pure placement function over an owned capability snapshot. Shareable across threads.
#[derive(Debug, Clone)]
pub struct SmartSelector {
    capability: DeviceCapability,
    policy: PlacementPolicy,
}

impl SmartSelector {
    pub fn new(capability: DeviceCapability, policy: PlacementPolicy) -> Self {
        Self { capability, policy }
    }

    pub fn from_probe(probe: &dyn DeviceCapabilityProbe, policy: PlacementPolicy) -> Self {
        Self::new(DeviceCapability::detect(probe), policy)
    }

    pub fn capability(&self) -> &DeviceCapability {
        &self.capability
    }

    pub fn policy(&self) -> &PlacementPolicy {
        &self.policy
    }

    pub fn has_accelerator(&self) -> bool {
        self.capability.has_accelerator()
    }

    pub fn estimate(&self, shape: &[usize], complexity: ComplexityClass) -> PlacementEstimate {
        let elements: f64 = if shape.is_empty() {
            0.0
        } else {
            shape.iter().map(|&dim| dim as f64).product()
        };

        PlacementEstimate {
            elements,
            work: elements.powi(complexity.exponent()),
            transfer: elements * self.policy.transfer_cost_per_element,
        }
    }

    pub fn select_device(
        &self,
        shape: &[usize],
        complexity: ComplexityClass,
        use_accelerator_if_available: bool,
    ) -> Device {
        if !use_accelerator_if_available || !self.has_accelerator() {
            return Device::Cpu;
        }

        let estimate = self.estimate(shape, complexity);
        let device = if estimate.favors_accelerator(self.policy.margin) {
            Device::Accelerator(self.capability.device_name.clone())
        } else {
            Device::Cpu
        };

        debug!(
            ?shape,
            ?complexity,
            work = estimate.work,
            transfer = estimate.transfer,
            %device,
            "placement decided"
        );
        device
    }
}

/// Size-only backend hint: `"gpu"` above [`SUGGEST_ACCELERATOR_BYTES`], otherwise `"cpu"`.
pub fn suggest_backend(size_bytes: u64) -> &'static str {
    if size_bytes > SUGGEST_ACCELERATOR_BYTES {
        "gpu"
    } else {
        "cpu"
    }
}
