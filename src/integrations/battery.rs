//! Battery charge and charging state.
//!
//! Desktops without a battery report `CapabilityAbsent` so the engine stops
//! asking after the first cycle.

use std::fs;
use std::path::{Path, PathBuf};

use super::{AdapterKind, Reading, SampleError, SourceAdapter};
use crate::core::snapshot::{FieldKey, Value};

/// Battery state as read from the platform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStatus {
    pub percent: f32,
    pub charging: bool,
}

impl BatteryStatus {
    fn readings(self) -> Vec<Reading> {
        vec![
            (
                FieldKey::BatteryPercent,
                Value::Percent(self.percent.clamp(0.0, 100.0)),
            ),
            (FieldKey::BatteryCharging, Value::Flag(self.charging)),
        ]
    }
}

enum BatterySource {
    /// Linux `power_supply` class directory
    Sysfs(PathBuf),
    /// macOS `pmset -g batt`
    Pmset,
    Unsupported,
}

pub struct BatteryAdapter {
    source: BatterySource,
}

impl BatteryAdapter {
    pub fn system() -> Self {
        let source = if cfg!(target_os = "linux") {
            BatterySource::Sysfs(PathBuf::from("/sys/class/power_supply"))
        } else if cfg!(target_os = "macos") {
            BatterySource::Pmset
        } else {
            BatterySource::Unsupported
        };
        Self { source }
    }

    pub fn sysfs(root: impl Into<PathBuf>) -> Self {
        Self {
            source: BatterySource::Sysfs(root.into()),
        }
    }
}

impl SourceAdapter for BatteryAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Battery
    }

    fn sample(&mut self) -> Result<Vec<Reading>, SampleError> {
        let status = match &self.source {
            BatterySource::Sysfs(root) => read_sysfs(root)?,
            BatterySource::Pmset => read_pmset()?,
            BatterySource::Unsupported => {
                return Err(SampleError::absent(
                    "battery status is not supported on this platform",
                ))
            }
        };
        Ok(status.readings())
    }
}

fn read_attr(dir: &Path, name: &str) -> Option<String> {
    fs::read_to_string(dir.join(name))
        .ok()
        .map(|s| s.trim().to_string())
}

/// System batteries only. Peripherals such as wireless mice report
/// `scope=Device` and say nothing about the machine's own power.
fn is_battery(dir: &Path) -> bool {
    if read_attr(dir, "scope").is_some_and(|scope| scope.eq_ignore_ascii_case("device")) {
        return false;
    }
    match read_attr(dir, "type") {
        Some(kind) => kind.eq_ignore_ascii_case("battery"),
        None => dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("BAT"))
            .unwrap_or(false),
    }
}

fn is_online_mains(dir: &Path) -> bool {
    read_attr(dir, "type").is_some_and(|kind| kind.eq_ignore_ascii_case("mains"))
        && read_attr(dir, "online").as_deref() == Some("1")
}

/// Read every battery under a `power_supply` directory. Multiple batteries
/// are averaged; an online mains supply counts as charging.
pub fn read_sysfs(root: &Path) -> Result<BatteryStatus, SampleError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SampleError::absent("no power_supply class"))
        }
        Err(e) => return Err(e.into()),
    };

    let mut dirs: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    dirs.sort();

    let batteries: Vec<&PathBuf> = dirs.iter().filter(|d| is_battery(d)).collect();
    if batteries.is_empty() {
        return Err(SampleError::absent("no battery present"));
    }

    let mut capacities = Vec::with_capacity(batteries.len());
    let mut charging = false;
    for dir in &batteries {
        let capacity = read_attr(dir, "capacity")
            .ok_or_else(|| SampleError::transient("battery capacity unreadable"))?
            .parse::<f32>()
            .map_err(|e| SampleError::transient(format!("battery capacity: {}", e)))?;
        capacities.push(capacity);

        if let Some(status) = read_attr(dir, "status") {
            charging |= matches!(status.as_str(), "Charging" | "Full" | "Not charging");
        }
    }
    charging |= dirs.iter().any(|d| is_online_mains(d));

    let percent = capacities.iter().sum::<f32>() / capacities.len() as f32;
    Ok(BatteryStatus { percent, charging })
}

fn read_pmset() -> Result<BatteryStatus, SampleError> {
    let output = std::process::Command::new("pmset")
        .args(["-g", "batt"])
        .output()?;
    if !output.status.success() {
        return Err(SampleError::transient(format!(
            "pmset exited with {}",
            output.status
        )));
    }
    parse_pmset(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `pmset -g batt` output:
///
/// ```text
/// Now drawing from 'AC Power'
///  -InternalBattery-0 (id=1234)	85%; charging; 0:40 remaining present: true
/// ```
pub fn parse_pmset(output: &str) -> Result<BatteryStatus, SampleError> {
    let line = output
        .lines()
        .find(|l| l.contains("InternalBattery"))
        .ok_or_else(|| SampleError::absent("no internal battery"))?;

    let percent = line
        .split(|c: char| c.is_whitespace() || c == ';')
        .find_map(|token| token.strip_suffix('%'))
        .ok_or_else(|| SampleError::transient("battery percentage missing from pmset"))?
        .parse::<f32>()
        .map_err(|e| SampleError::transient(format!("battery percentage: {}", e)))?;

    let on_ac = output.contains("'AC Power'");
    let discharging = line.contains("discharging");
    let charging = on_ac || (line.contains("charging") && !discharging) || line.contains("charged");

    Ok(BatteryStatus { percent, charging })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn supply(root: &Path, name: &str, attrs: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (attr, value) in attrs {
            fs::write(dir.join(attr), format!("{}\n", value)).unwrap();
        }
    }

    #[test]
    fn desktop_without_battery_is_absent() {
        let root = tempdir().unwrap();
        supply(root.path(), "AC", &[("type", "Mains"), ("online", "1")]);

        let mut adapter = BatteryAdapter::sysfs(root.path());
        assert!(adapter.sample().unwrap_err().is_absent());
    }

    #[test]
    fn desktop_with_wireless_mouse_battery_is_absent() {
        let root = tempdir().unwrap();
        supply(root.path(), "AC", &[("type", "Mains"), ("online", "1")]);
        supply(
            root.path(),
            "hidpp_battery_0",
            &[("type", "Battery"), ("scope", "Device"), ("capacity", "55")],
        );

        let mut adapter = BatteryAdapter::sysfs(root.path());
        assert!(adapter.sample().unwrap_err().is_absent());
    }

    #[test]
    fn laptop_battery_is_read_alongside_peripherals() {
        let root = tempdir().unwrap();
        supply(
            root.path(),
            "BAT0",
            &[("type", "Battery"), ("scope", "System"), ("capacity", "70"), ("status", "Discharging")],
        );
        supply(
            root.path(),
            "hidpp_battery_0",
            &[("type", "Battery"), ("scope", "Device"), ("capacity", "10")],
        );

        assert_eq!(read_sysfs(root.path()).unwrap().percent, 70.0);
    }

    #[test]
    fn missing_power_supply_class_is_absent() {
        let root = tempdir().unwrap();
        let mut adapter = BatteryAdapter::sysfs(root.path().join("nope"));
        assert!(adapter.sample().unwrap_err().is_absent());
    }

    #[test]
    fn reads_discharging_laptop_battery() {
        let root = tempdir().unwrap();
        supply(
            root.path(),
            "BAT0",
            &[("type", "Battery"), ("capacity", "64"), ("status", "Discharging")],
        );
        supply(root.path(), "AC", &[("type", "Mains"), ("online", "0")]);

        let status = read_sysfs(root.path()).unwrap();
        assert_eq!(
            status,
            BatteryStatus {
                percent: 64.0,
                charging: false
            }
        );
    }

    #[test]
    fn online_mains_counts_as_charging_and_batteries_average() {
        let root = tempdir().unwrap();
        supply(root.path(), "BAT0", &[("type", "Battery"), ("capacity", "80")]);
        supply(root.path(), "BAT1", &[("type", "Battery"), ("capacity", "40")]);
        supply(root.path(), "ADP1", &[("type", "Mains"), ("online", "1")]);

        let status = read_sysfs(root.path()).unwrap();
        assert_eq!(status.percent, 60.0);
        assert!(status.charging);
    }

    #[test]
    fn unreadable_capacity_is_transient() {
        let root = tempdir().unwrap();
        supply(root.path(), "BAT0", &[("type", "Battery"), ("capacity", "n/a")]);

        let mut adapter = BatteryAdapter::sysfs(root.path());
        assert!(matches!(adapter.sample(), Err(SampleError::Transient(_))));
    }

    #[test]
    fn parses_pmset_output() {
        let charging = "Now drawing from 'AC Power'\n -InternalBattery-0 (id=4653155)\t85%; charging; 0:40 remaining present: true\n";
        assert_eq!(
            parse_pmset(charging).unwrap(),
            BatteryStatus {
                percent: 85.0,
                charging: true
            }
        );

        let draining = "Now drawing from 'Battery Power'\n -InternalBattery-0 (id=4653155)\t42%; discharging; 3:12 remaining present: true\n";
        assert_eq!(
            parse_pmset(draining).unwrap(),
            BatteryStatus {
                percent: 42.0,
                charging: false
            }
        );
    }

    #[test]
    fn pmset_without_internal_battery_is_absent() {
        let desktop = "Now drawing from 'AC Power'\n";
        assert!(parse_pmset(desktop).unwrap_err().is_absent());
    }
}
