//! Human-readable renderings of snapshot fields, shared by the dashboard and
//! `perch snapshot`.

use humansize::{format_size, BINARY};

use crate::core::snapshot::{FieldKey, FieldStatus, MetricField, Snapshot, Value};

/// `42%`, `N/A` or `ERR`
pub fn percent(field: &MetricField) -> String {
    match (field.status(), field.value()) {
        (FieldStatus::Ok, Some(Value::Percent(p))) => format!("{:.0}%", p),
        (FieldStatus::Error, _) => "ERR".to_string(),
        _ => "N/A".to_string(),
    }
}

/// `7.81 GiB / 15.5 GiB used`
pub fn memory_detail(snapshot: &Snapshot) -> Option<String> {
    let used = snapshot.bytes(FieldKey::MemoryUsed)?;
    let total = snapshot.bytes(FieldKey::MemoryTotal)?;
    Some(format!(
        "{} / {} used",
        format_size(used, BINARY),
        format_size(total, BINARY)
    ))
}

pub fn battery_detail(snapshot: &Snapshot) -> Option<&'static str> {
    snapshot
        .flag(FieldKey::BatteryCharging)
        .map(|charging| if charging { "Charging" } else { "On Battery" })
}

pub fn time(snapshot: &Snapshot) -> String {
    snapshot
        .wall_clock
        .value()
        .and_then(Value::as_timestamp)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

/// `MONDAY, OCTOBER 19, 2026`
pub fn date(snapshot: &Snapshot) -> Option<String> {
    snapshot
        .wall_clock
        .value()
        .and_then(Value::as_timestamp)
        .map(|t| t.format("%A, %B %d, %Y").to_string().to_uppercase())
}

/// Plain-text report for `perch snapshot`
pub fn report(snapshot: &Snapshot) -> String {
    let mut lines = vec![format!(
        "#{} captured {}",
        snapshot.sequence,
        snapshot.captured_at.format("%Y-%m-%d %H:%M:%S")
    )];

    lines.push(format!(
        "TIME     {}{}",
        time(snapshot),
        date(snapshot).map(|d| format!("  {}", d)).unwrap_or_default()
    ));
    lines.push(format!("CPU      {}", percent(&snapshot.cpu_percent)));
    lines.push(format!(
        "MEMORY   {}{}",
        percent(&snapshot.memory_percent),
        memory_detail(snapshot)
            .map(|d| format!("  {}", d))
            .unwrap_or_default()
    ));
    lines.push(format!(
        "GPU      {}{}",
        percent(&snapshot.gpu_percent),
        snapshot
            .text(FieldKey::GpuName)
            .map(|n| format!("  {}", n))
            .unwrap_or_default()
    ));
    lines.push(format!(
        "BATTERY  {}{}",
        percent(&snapshot.battery_percent),
        battery_detail(snapshot)
            .map(|d| format!("  {}", d))
            .unwrap_or_default()
    ));
    lines.push(format!(
        "OS       {}",
        snapshot.text(FieldKey::OsVersion).unwrap_or("N/A")
    ));

    lines.join("\n")
}
