//! Snapshot data model: typed metric fields assembled once per sampling cycle

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;

/// Unit a metric value is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Percent,
    Bytes,
    Timestamp,
    Text,
    Flag,
}

/// A sampled value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Percent(f32),
    Bytes(u64),
    Timestamp(DateTime<Local>),
    Text(String),
    Flag(bool),
}

impl Value {
    pub fn unit(&self) -> Unit {
        match self {
            Self::Percent(_) => Unit::Percent,
            Self::Bytes(_) => Unit::Bytes,
            Self::Timestamp(_) => Unit::Timestamp,
            Self::Text(_) => Unit::Text,
            Self::Flag(_) => Unit::Flag,
        }
    }

    /// Whether the value lies inside the valid range for its unit.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Percent(p) => p.is_finite() && (0.0..=100.0).contains(p),
            _ => true,
        }
    }

    pub fn as_percent(&self) -> Option<f32> {
        match self {
            Self::Percent(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<u64> {
        match self {
            Self::Bytes(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Local>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Ok,
    Unavailable,
    Error,
}

/// A single field of a snapshot.
///
/// An `Ok` field always carries a value inside its valid range; any other
/// status carries none. The constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricField {
    status: FieldStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stale: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    absent: bool,
}

impl MetricField {
    /// Fresh value. Out-of-range values turn into an `Error` field.
    pub fn ok(value: Value) -> Self {
        if value.is_valid() {
            Self {
                status: FieldStatus::Ok,
                value: Some(value),
                stale: false,
                absent: false,
            }
        } else {
            Self::error()
        }
    }

    /// Last known-good value reused after a transient failure. An invalid
    /// value is an `Error` field, never a stale one.
    pub fn stale(value: Value) -> Self {
        let field = Self::ok(value);
        Self {
            stale: field.is_ok(),
            ..field
        }
    }

    pub fn unavailable() -> Self {
        Self {
            status: FieldStatus::Unavailable,
            value: None,
            stale: false,
            absent: false,
        }
    }

    /// Unavailable for good: the capability does not exist on this machine.
    pub fn absent() -> Self {
        Self {
            absent: true,
            ..Self::unavailable()
        }
    }

    pub fn error() -> Self {
        Self {
            status: FieldStatus::Error,
            value: None,
            stale: false,
            absent: false,
        }
    }

    pub fn status(&self) -> FieldStatus {
        self.status
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.status == FieldStatus::Ok
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn is_absent(&self) -> bool {
        self.absent
    }
}

impl Default for MetricField {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// Every field a snapshot carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    CpuPercent,
    MemoryUsed,
    MemoryTotal,
    MemoryPercent,
    GpuPercent,
    GpuName,
    BatteryPercent,
    BatteryCharging,
    WallClock,
    OsVersion,
}

impl FieldKey {
    pub const ALL: [FieldKey; 10] = [
        Self::CpuPercent,
        Self::MemoryUsed,
        Self::MemoryTotal,
        Self::MemoryPercent,
        Self::GpuPercent,
        Self::GpuName,
        Self::BatteryPercent,
        Self::BatteryCharging,
        Self::WallClock,
        Self::OsVersion,
    ];

    pub fn unit(self) -> Unit {
        match self {
            Self::CpuPercent | Self::MemoryPercent | Self::GpuPercent | Self::BatteryPercent => {
                Unit::Percent
            }
            Self::MemoryUsed | Self::MemoryTotal => Unit::Bytes,
            Self::GpuName | Self::OsVersion => Unit::Text,
            Self::BatteryCharging => Unit::Flag,
            Self::WallClock => Unit::Timestamp,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CpuPercent => "cpu_percent",
            Self::MemoryUsed => "memory_used",
            Self::MemoryTotal => "memory_total",
            Self::MemoryPercent => "memory_percent",
            Self::GpuPercent => "gpu_percent",
            Self::GpuName => "gpu_name",
            Self::BatteryPercent => "battery_percent",
            Self::BatteryCharging => "battery_charging",
            Self::WallClock => "wall_clock",
            Self::OsVersion => "os_version",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One fully assembled sampling cycle. Never mutated after publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub sequence: u64,
    pub captured_at: DateTime<Local>,
    pub cpu_percent: MetricField,
    pub memory_used: MetricField,
    pub memory_total: MetricField,
    pub memory_percent: MetricField,
    pub gpu_percent: MetricField,
    pub gpu_name: MetricField,
    pub battery_percent: MetricField,
    pub battery_charging: MetricField,
    pub wall_clock: MetricField,
    pub os_version: MetricField,
}

impl Snapshot {
    /// Sequence 0, every field unavailable. Served before the first cycle completes.
    pub fn placeholder() -> Self {
        Self::empty(0, Local::now())
    }

    pub(crate) fn empty(sequence: u64, captured_at: DateTime<Local>) -> Self {
        Self {
            sequence,
            captured_at,
            cpu_percent: MetricField::unavailable(),
            memory_used: MetricField::unavailable(),
            memory_total: MetricField::unavailable(),
            memory_percent: MetricField::unavailable(),
            gpu_percent: MetricField::unavailable(),
            gpu_name: MetricField::unavailable(),
            battery_percent: MetricField::unavailable(),
            battery_charging: MetricField::unavailable(),
            wall_clock: MetricField::unavailable(),
            os_version: MetricField::unavailable(),
        }
    }

    pub fn field(&self, key: FieldKey) -> &MetricField {
        match key {
            FieldKey::CpuPercent => &self.cpu_percent,
            FieldKey::MemoryUsed => &self.memory_used,
            FieldKey::MemoryTotal => &self.memory_total,
            FieldKey::MemoryPercent => &self.memory_percent,
            FieldKey::GpuPercent => &self.gpu_percent,
            FieldKey::GpuName => &self.gpu_name,
            FieldKey::BatteryPercent => &self.battery_percent,
            FieldKey::BatteryCharging => &self.battery_charging,
            FieldKey::WallClock => &self.wall_clock,
            FieldKey::OsVersion => &self.os_version,
        }
    }

    pub(crate) fn field_mut(&mut self, key: FieldKey) -> &mut MetricField {
        match key {
            FieldKey::CpuPercent => &mut self.cpu_percent,
            FieldKey::MemoryUsed => &mut self.memory_used,
            FieldKey::MemoryTotal => &mut self.memory_total,
            FieldKey::MemoryPercent => &mut self.memory_percent,
            FieldKey::GpuPercent => &mut self.gpu_percent,
            FieldKey::GpuName => &mut self.gpu_name,
            FieldKey::BatteryPercent => &mut self.battery_percent,
            FieldKey::BatteryCharging => &mut self.battery_charging,
            FieldKey::WallClock => &mut self.wall_clock,
            FieldKey::OsVersion => &mut self.os_version,
        }
    }

    pub fn percent(&self, key: FieldKey) -> Option<f32> {
        self.field(key).value().and_then(Value::as_percent)
    }

    pub fn bytes(&self, key: FieldKey) -> Option<u64> {
        self.field(key).value().and_then(Value::as_bytes)
    }

    pub fn text(&self, key: FieldKey) -> Option<&str> {
        self.field(key).value().and_then(Value::as_text)
    }

    pub fn flag(&self, key: FieldKey) -> Option<bool> {
        self.field(key).value().and_then(Value::as_flag)
    }
}
