//! Source adapters - one per metric family, behind a uniform sampling contract

pub mod battery;
pub mod clock;
pub mod cpu;
pub mod gpu;
pub mod memory;

use std::fmt;

use crate::core::snapshot::{FieldKey, Value};

/// One sampled value destined for a snapshot field
pub type Reading = (FieldKey, Value);

/// Why a sample attempt failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    /// Retry next cycle
    #[error("transient sampling failure: {0}")]
    Transient(String),
    /// The device or feature does not exist on this machine; stop asking
    #[error("capability absent: {0}")]
    CapabilityAbsent(String),
}

impl SampleError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient(reason.into())
    }

    pub fn absent(reason: impl Into<String>) -> Self {
        Self::CapabilityAbsent(reason.into())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::CapabilityAbsent(_))
    }
}

impl From<std::io::Error> for SampleError {
    fn from(err: std::io::Error) -> Self {
        Self::Transient(err.to_string())
    }
}

/// The closed set of metric families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    Cpu,
    Memory,
    Gpu,
    Battery,
    Clock,
}

impl AdapterKind {
    pub const ALL: [AdapterKind; 5] = [
        Self::Cpu,
        Self::Memory,
        Self::Gpu,
        Self::Battery,
        Self::Clock,
    ];

    /// Snapshot fields owned by this family
    pub fn fields(self) -> &'static [FieldKey] {
        match self {
            Self::Cpu => &[FieldKey::CpuPercent],
            Self::Memory => &[
                FieldKey::MemoryUsed,
                FieldKey::MemoryTotal,
                FieldKey::MemoryPercent,
            ],
            Self::Gpu => &[FieldKey::GpuPercent, FieldKey::GpuName],
            Self::Battery => &[FieldKey::BatteryPercent, FieldKey::BatteryCharging],
            Self::Clock => &[FieldKey::WallClock, FieldKey::OsVersion],
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Memory => write!(f, "memory"),
            Self::Gpu => write!(f, "gpu"),
            Self::Battery => write!(f, "battery"),
            Self::Clock => write!(f, "clock"),
        }
    }
}

/// Uniform "sample now" contract implemented by every metric source.
///
/// Implementations may cache OS handles between calls but must not leak them,
/// and every failure path must resolve to a [`SampleError`].
pub trait SourceAdapter: Send {
    fn kind(&self) -> AdapterKind;

    fn sample(&mut self) -> Result<Vec<Reading>, SampleError>;
}

/// Adapters for the local machine, in display order
pub fn system_adapters() -> Vec<Box<dyn SourceAdapter>> {
    vec![
        Box::new(clock::ClockAdapter::new()),
        Box::new(cpu::CpuAdapter::system()),
        Box::new(memory::MemoryAdapter::new()),
        Box::new(gpu::GpuAdapter::new(gpu::GpuResolver::system())),
        Box::new(battery::BatteryAdapter::system()),
    ]
}
