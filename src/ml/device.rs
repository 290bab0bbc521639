//! Compute device selection for local model inference
//!
//! Detects the best available candle device (CUDA, Metal, or CPU) once per
//! process. CPU is always available, so selection cannot fail.

use candle_core::Device;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Device types supported for ML inference
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// Best device detected for this process
    #[default]
    Auto,
    /// CPU inference
    Cpu,
    /// CUDA GPU inference
    Cuda(usize),
    /// Metal GPU inference (macOS)
    Metal,
}

/// A detected device and its candle handle
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device_type: DeviceType,
    pub device: Device,
    pub name: String,
}

impl DeviceInfo {
    fn cpu() -> Self {
        Self {
            device_type: DeviceType::Cpu,
            device: Device::Cpu,
            name: "CPU".to_string(),
        }
    }
}

static SELECTED_DEVICE: OnceLock<DeviceInfo> = OnceLock::new();

/// The preferred device for this process, detected on first use
pub fn current_device() -> &'static DeviceInfo {
    SELECTED_DEVICE.get_or_init(|| {
        let info = detect();
        log::info!("Selected inference device: {}", info.name);
        info
    })
}

/// Resolve a requested device type, falling back to CPU when it is unavailable
pub fn device_for(requested: DeviceType) -> DeviceInfo {
    match requested {
        DeviceType::Auto => current_device().clone(),
        DeviceType::Cpu => DeviceInfo::cpu(),
        DeviceType::Cuda(ordinal) => cuda(ordinal).unwrap_or_else(|| {
            log::warn!("CUDA device {} unavailable, using CPU", ordinal);
            DeviceInfo::cpu()
        }),
        DeviceType::Metal => metal().unwrap_or_else(|| {
            log::warn!("Metal device unavailable, using CPU");
            DeviceInfo::cpu()
        }),
    }
}

fn detect() -> DeviceInfo {
    cuda(0).or_else(metal).unwrap_or_else(DeviceInfo::cpu)
}

#[cfg(feature = "cuda")]
fn cuda(ordinal: usize) -> Option<DeviceInfo> {
    match Device::cuda_if_available(ordinal) {
        Ok(device) if device.is_cuda() => Some(DeviceInfo {
            device_type: DeviceType::Cuda(ordinal),
            device,
            name: format!("CUDA GPU {}", ordinal),
        }),
        _ => None,
    }
}

#[cfg(not(feature = "cuda"))]
fn cuda(_ordinal: usize) -> Option<DeviceInfo> {
    None
}

#[cfg(feature = "metal")]
fn metal() -> Option<DeviceInfo> {
    Device::new_metal(0).ok().map(|device| DeviceInfo {
        device_type: DeviceType::Metal,
        device,
        name: "Metal GPU".to_string(),
    })
}

#[cfg(not(feature = "metal"))]
fn metal() -> Option<DeviceInfo> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_device_is_stable() {
        let first = current_device();
        let second = current_device();
        assert!(std::ptr::eq(first, second));
        assert!(!first.name.is_empty());
    }

    #[test]
    fn test_auto_uses_detected_device() {
        let info = device_for(DeviceType::Auto);
        assert_eq!(info.device_type, current_device().device_type);
        assert_ne!(info.device_type, DeviceType::Auto);
        assert_eq!(DeviceType::default(), DeviceType::Auto);
    }

    #[test]
    fn test_cpu_always_available() {
        let info = device_for(DeviceType::Cpu);
        assert_eq!(info.device_type, DeviceType::Cpu);
        assert!(matches!(info.device, Device::Cpu));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_missing_cuda_falls_back_to_cpu() {
        assert_eq!(device_for(DeviceType::Cuda(0)).device_type, DeviceType::Cpu);
    }
}
