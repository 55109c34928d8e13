//! Physical memory usage via sysinfo.

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use super::{AdapterKind, Reading, SampleError, SourceAdapter};
use crate::core::snapshot::{FieldKey, Value};

/// Keeps one `sysinfo::System` around instead of reallocating it every cycle.
pub struct MemoryAdapter {
    sys: System,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::new().with_ram()),
        );
        Self { sys }
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// used/total as a percentage, clamped so a racy read never exceeds 100.
pub fn memory_readings(used: u64, total: u64) -> Result<Vec<Reading>, SampleError> {
    if total == 0 {
        return Err(SampleError::transient("total memory reported as zero"));
    }
    let used = used.min(total);
    let percent = ((used as f64 / total as f64) * 100.0) as f32;

    Ok(vec![
        (FieldKey::MemoryUsed, Value::Bytes(used)),
        (FieldKey::MemoryTotal, Value::Bytes(total)),
        (FieldKey::MemoryPercent, Value::Percent(percent)),
    ])
}

impl SourceAdapter for MemoryAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Memory
    }

    fn sample(&mut self) -> Result<Vec<Reading>, SampleError> {
        self.sys
            .refresh_memory_specifics(MemoryRefreshKind::new().with_ram());
        memory_readings(self.sys.used_memory(), self.sys.total_memory())
    }
}
