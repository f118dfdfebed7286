//! Device selection for model placement.

use candle_core::Device;
use tracing::{debug, info, warn};

/// Returns the device a model should live on.
///
/// With `use_gpu` set, tries CUDA and then Metal (whichever backends were
/// compiled in) and falls back to the CPU with a warning. Without it the
/// model stays on the CPU.
#[must_use]
pub fn select_device(use_gpu: bool) -> Device {
    if !use_gpu {
        debug!("GPU not requested, using CPU");
        return Device::Cpu;
    }

    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            info!("Using CUDA device");
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            info!("Using Metal device");
            return device;
        }
    }

    warn!("GPU requested but no GPU backend is available, falling back to CPU");
    info!("Using CPU");
    Device::Cpu
}

/// Short human-readable name of a device.
#[must_use]
pub fn device_label(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda"
    } else if device.is_metal() {
        "metal"
    } else {
        "cpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_when_gpu_not_requested() {
        assert!(select_device(false).is_cpu());
    }

    #[test]
    fn test_gpu_request_always_yields_a_device() {
        // Falls back to the CPU on machines without a GPU backend
        let device = select_device(true);
        assert!(matches!(device_label(&device), "cpu" | "cuda" | "metal"));
    }

    #[test]
    fn test_cpu_label() {
        assert_eq!(device_label(&Device::Cpu), "cpu");
    }
}
