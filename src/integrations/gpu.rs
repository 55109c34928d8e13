//! GPU utilization with discrete-first resolution.
//!
//! The resolver probes once per process: NVML for a discrete NVIDIA card,
//! then the kernel DRM `gpu_busy_percent` counter used by Intel and AMD
//! drivers. Whichever answers first is kept; if neither does, the GPU is
//! reported absent without probing again.

use nvml_wrapper::Nvml;
use std::fs;
use std::path::{Path, PathBuf};

use super::{AdapterKind, Reading, SampleError, SourceAdapter};
use crate::core::snapshot::{FieldKey, Value};

/// A resolved way of reading GPU utilization
pub trait GpuBackend: Send {
    fn name(&self) -> &str;

    fn utilization(&mut self) -> Result<f32, SampleError>;
}

/// A named probe. Returns a working backend or the reason this path is unusable.
pub struct GpuProbe {
    pub label: &'static str,
    pub run: Box<dyn FnMut() -> Result<Box<dyn GpuBackend>, SampleError> + Send>,
}

impl GpuProbe {
    pub fn new<F>(label: &'static str, run: F) -> Self
    where
        F: FnMut() -> Result<Box<dyn GpuBackend>, SampleError> + Send + 'static,
    {
        Self {
            label,
            run: Box::new(run),
        }
    }
}

enum Resolution {
    Unprobed,
    Ready(Box<dyn GpuBackend>),
    Absent,
}

pub struct GpuResolver {
    probes: Vec<GpuProbe>,
    resolution: Resolution,
}

impl GpuResolver {
    pub fn new(probes: Vec<GpuProbe>) -> Self {
        Self {
            probes,
            resolution: Resolution::Unprobed,
        }
    }

    /// NVML first, then DRM sysfs
    pub fn system() -> Self {
        Self::new(vec![
            GpuProbe::new("nvml", probe_nvml),
            GpuProbe::new("drm", || probe_drm(Path::new("/sys/class/drm"))),
        ])
    }

    fn probe(&mut self) -> Resolution {
        for probe in &mut self.probes {
            match (probe.run)() {
                Ok(backend) => {
                    tracing::info!(path = probe.label, gpu = backend.name(), "gpu resolved");
                    return Resolution::Ready(backend);
                }
                Err(e) => tracing::debug!(path = probe.label, "gpu probe failed: {}", e),
            }
        }
        tracing::info!("no queryable gpu found");
        Resolution::Absent
    }

    /// Read utilization and device name through the cached path.
    pub fn sample(&mut self) -> Result<(f32, String), SampleError> {
        if matches!(self.resolution, Resolution::Unprobed) {
            self.resolution = self.probe();
            // Probes hold library handles we no longer need
            self.probes.clear();
        }

        match &mut self.resolution {
            Resolution::Ready(backend) => {
                let usage = backend.utilization()?;
                Ok((usage.clamp(0.0, 100.0), backend.name().to_string()))
            }
            Resolution::Absent | Resolution::Unprobed => {
                Err(SampleError::absent("no queryable gpu"))
            }
        }
    }
}

pub struct GpuAdapter {
    resolver: GpuResolver,
}

impl GpuAdapter {
    pub fn new(resolver: GpuResolver) -> Self {
        Self { resolver }
    }
}

impl SourceAdapter for GpuAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Gpu
    }

    fn sample(&mut self) -> Result<Vec<Reading>, SampleError> {
        let (usage, name) = self.resolver.sample()?;
        Ok(vec![
            (FieldKey::GpuPercent, Value::Percent(usage)),
            (FieldKey::GpuName, Value::Text(name)),
        ])
    }
}

struct NvmlBackend {
    nvml: Nvml,
    index: u32,
    name: String,
}

/// Discrete NVIDIA GPU through the NVML driver library. A missing library or
/// driver is an absent capability, not a fault.
fn probe_nvml() -> Result<Box<dyn GpuBackend>, SampleError> {
    let nvml = Nvml::init().map_err(|e| SampleError::absent(format!("nvml init: {}", e)))?;
    let count = nvml
        .device_count()
        .map_err(|e| SampleError::absent(format!("nvml device count: {}", e)))?;
    if count == 0 {
        return Err(SampleError::absent("nvml reports no devices"));
    }

    let name = {
        let device = nvml
            .device_by_index(0)
            .map_err(|e| SampleError::absent(format!("nvml device 0: {}", e)))?;
        device
            .utilization_rates()
            .map_err(|e| SampleError::absent(format!("nvml utilization: {}", e)))?;
        device.name().unwrap_or_else(|_| "NVIDIA GPU".to_string())
    };

    Ok(Box::new(NvmlBackend {
        nvml,
        index: 0,
        name,
    }))
}

impl GpuBackend for NvmlBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn utilization(&mut self) -> Result<f32, SampleError> {
        let device = self
            .nvml
            .device_by_index(self.index)
            .map_err(|e| SampleError::transient(format!("nvml device: {}", e)))?;
        let rates = device
            .utilization_rates()
            .map_err(|e| SampleError::transient(format!("nvml utilization: {}", e)))?;
        Ok(rates.gpu as f32)
    }
}

struct DrmBackend {
    busy_path: PathBuf,
    name: String,
}

/// First `cardN` under `root` exposing `device/gpu_busy_percent`.
pub fn probe_drm(root: &Path) -> Result<Box<dyn GpuBackend>, SampleError> {
    let entries = fs::read_dir(root).map_err(|e| SampleError::absent(format!("drm: {}", e)))?;

    let mut cards: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("card"))
                .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        })
        .collect();
    cards.sort();

    for card in cards {
        let device = card.join("device");
        let busy_path = device.join("gpu_busy_percent");
        let Ok(raw) = fs::read_to_string(&busy_path) else {
            continue;
        };
        if raw.trim().parse::<f32>().is_err() {
            continue;
        }

        let vendor = fs::read_to_string(device.join("vendor")).unwrap_or_default();
        return Ok(Box::new(DrmBackend {
            busy_path,
            name: vendor_name(vendor.trim()).to_string(),
        }));
    }

    Err(SampleError::absent("no drm card exposes gpu_busy_percent"))
}

fn vendor_name(pci_vendor: &str) -> &'static str {
    match pci_vendor.to_ascii_lowercase().as_str() {
        "0x8086" => "Intel Graphics",
        "0x1002" => "AMD Radeon",
        "0x10de" => "NVIDIA GPU",
        _ => "Integrated GPU",
    }
}

impl GpuBackend for DrmBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn utilization(&mut self) -> Result<f32, SampleError> {
        let raw = fs::read_to_string(&self.busy_path)?;
        raw.trim()
            .parse::<f32>()
            .map_err(|e| SampleError::transient(format!("gpu_busy_percent: {}", e)))
    }
}
