//! Compute device selection

use candle_core::Device;
use tracing::{info, warn};

use crate::error::Result;

/// What the current build and machine can offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceReport {
    /// Built with the `cuda` feature
    pub cuda_compiled: bool,
    /// Built with CUDA and a device answered
    pub cuda_available: bool,
    /// Built with the `metal` feature
    pub metal_compiled: bool,
}

impl DeviceReport {
    pub fn detect() -> Self {
        Self {
            cuda_compiled: cfg!(feature = "cuda"),
            cuda_available: candle_core::utils::cuda_is_available(),
            metal_compiled: cfg!(feature = "metal"),
        }
    }

    /// True when inference will fall back to the CPU
    pub fn cpu_only(&self) -> bool {
        !self.cuda_available && !self.metal_compiled
    }

    pub fn print(&self) {
        println!("{}", "=".repeat(80));
        println!("Device Information");
        println!("{}", "=".repeat(80));
        println!(
            "CUDA Support Compiled: {}",
            if self.cuda_compiled { "Yes" } else { "No" }
        );
        println!(
            "CUDA Available: {}",
            if self.cuda_available { "Yes" } else { "No" }
        );
        if self.metal_compiled {
            println!("Metal Support Compiled: Yes");
        }
        if self.cpu_only() {
            println!("WARNING: Running on CPU - this will be very slow!");
        }
        println!("{}", "=".repeat(80));
        println!();
    }
}

/// Pick CUDA device 0, then Metal, falling back to the CPU
pub fn select_device() -> Result<Device> {
    let device = Device::cuda_if_available(0)?;
    if device.is_cuda() {
        info!("Using CUDA device 0");
        return Ok(device);
    }

    if cfg!(feature = "metal") {
        let device = Device::new_metal(0)?;
        info!("Using Metal device 0");
        return Ok(device);
    }

    warn!("No GPU available, running on CPU - this will be very slow");
    Ok(Device::Cpu)
}

/// Short human-readable name for a device
pub fn describe(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda:0"
    } else if device.is_metal() {
        "metal:0"
    } else {
        "cpu"
    }
}
