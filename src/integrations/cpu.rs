//! CPU load from cumulative busy/idle counters.
//!
//! A single counter read only says how much time has been spent since boot, so
//! the adapter keeps the previous reading and reports the busy share of the
//! time elapsed between two consecutive samples.

use std::path::PathBuf;

use sysinfo::{CpuRefreshKind, RefreshKind, System};

use super::{AdapterKind, Reading, SampleError, SourceAdapter};
use crate::core::snapshot::{FieldKey, Value};

/// Cumulative CPU time counters, in arbitrary but consistent ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

/// Source of cumulative CPU counters
#[cfg_attr(test, mockall::automock)]
pub trait CpuTicks {
    fn read(&mut self) -> Result<CpuTimes, SampleError>;
}

/// Busy percentage between two counter readings, clamped to [0, 100].
pub fn usage_between(previous: CpuTimes, current: CpuTimes) -> Result<f32, SampleError> {
    let total_delta = current
        .total
        .checked_sub(previous.total)
        .filter(|delta| *delta > 0)
        .ok_or_else(|| SampleError::transient("cpu counters did not advance"))?;
    let idle_delta = current.idle.saturating_sub(previous.idle).min(total_delta);
    let busy = total_delta - idle_delta;

    let percent = (busy as f64 / total_delta as f64) * 100.0;
    Ok(percent.clamp(0.0, 100.0) as f32)
}

pub struct CpuAdapter<T> {
    ticks: T,
    previous: Option<CpuTimes>,
}

impl<T: CpuTicks> CpuAdapter<T> {
    /// Takes an initial reading so the first sample already has a baseline.
    pub fn new(mut ticks: T) -> Self {
        let previous = match ticks.read() {
            Ok(times) => Some(times),
            Err(e) => {
                tracing::debug!("cpu baseline unavailable: {}", e);
                None
            }
        };
        Self { ticks, previous }
    }
}

#[cfg(target_os = "linux")]
pub type SystemTicks = ProcStatTicks;
#[cfg(not(target_os = "linux"))]
pub type SystemTicks = SysinfoTicks;

impl CpuAdapter<SystemTicks> {
    pub fn system() -> Self {
        Self::new(SystemTicks::new())
    }
}

impl<T: CpuTicks + Send> SourceAdapter for CpuAdapter<T> {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Cpu
    }

    fn sample(&mut self) -> Result<Vec<Reading>, SampleError> {
        let current = self.ticks.read()?;
        // Always advance the baseline, even when the delta is unusable
        let previous = self
            .previous
            .replace(current)
            .ok_or_else(|| SampleError::transient("establishing cpu baseline"))?;

        let percent = usage_between(previous, current)?;
        Ok(vec![(FieldKey::CpuPercent, Value::Percent(percent))])
    }
}

/// Aggregate `cpu` line of `/proc/stat`
pub struct ProcStatTicks {
    path: PathBuf,
}

impl ProcStatTicks {
    pub fn new() -> Self {
        Self::with_path("/proc/stat")
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcStatTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuTicks for ProcStatTicks {
    fn read(&mut self) -> Result<CpuTimes, SampleError> {
        let content = std::fs::read_to_string(&self.path)?;
        parse_proc_stat(&content)
    }
}

/// Parse `cpu  user nice system idle iowait irq softirq steal ...`.
///
/// iowait counts as idle. guest time is already folded into user/nice by the
/// kernel, so only the first eight columns make up the total.
pub fn parse_proc_stat(content: &str) -> Result<CpuTimes, SampleError> {
    let line = content
        .lines()
        .find(|l| l.starts_with("cpu ") || l.starts_with("cpu\t"))
        .ok_or_else(|| SampleError::transient("no aggregate cpu line in /proc/stat"))?;

    let columns = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|c| c.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SampleError::transient(format!("malformed /proc/stat: {}", e)))?;

    if columns.len() < 4 {
        return Err(SampleError::transient("truncated cpu line in /proc/stat"));
    }

    let idle = columns[3] + columns.get(4).copied().unwrap_or(0);
    let total = columns.iter().sum();
    Ok(CpuTimes { idle, total })
}

/// Synthesizes counters from sysinfo's global usage on platforms without
/// `/proc/stat`. Each read advances the total by a fixed number of ticks.
pub struct SysinfoTicks {
    sys: System,
    elapsed: CpuTimes,
}

impl SysinfoTicks {
    const TICKS_PER_READ: u64 = 10_000;

    pub fn new() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::new().with_cpu(CpuRefreshKind::new().with_cpu_usage()),
        );
        Self {
            sys,
            elapsed: CpuTimes { idle: 0, total: 0 },
        }
    }
}

impl Default for SysinfoTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuTicks for SysinfoTicks {
    fn read(&mut self) -> Result<CpuTimes, SampleError> {
        self.sys.refresh_cpu_usage();
        let usage = self.sys.global_cpu_usage();
        if !usage.is_finite() {
            return Err(SampleError::transient("sysinfo reported non-finite cpu usage"));
        }

        let busy_share = f64::from(usage.clamp(0.0, 100.0)) / 100.0;
        let idle_ticks = ((1.0 - busy_share) * Self::TICKS_PER_READ as f64).round() as u64;
        self.elapsed.total += Self::TICKS_PER_READ;
        self.elapsed.idle += idle_ticks;
        Ok(self.elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn times(idle: u64, total: u64) -> CpuTimes {
        CpuTimes { idle, total }
    }

    fn scripted(readings: Vec<Result<CpuTimes, SampleError>>) -> MockCpuTicks {
        let mut mock = MockCpuTicks::new();
        let mut seq = Sequence::new();
        for reading in readings {
            mock.expect_read()
                .times(1)
                .in_sequence(&mut seq)
                .return_once(move || reading);
        }
        mock
    }

    #[test]
    fn computes_busy_share_between_consecutive_reads() {
        let mock = scripted(vec![Ok(times(100, 200)), Ok(times(150, 300))]);
        let mut adapter = CpuAdapter::new(mock);

        let readings = adapter.sample().unwrap();
        assert_eq!(readings, vec![(FieldKey::CpuPercent, Value::Percent(50.0))]);
    }

    #[test]
    fn first_sample_without_baseline_is_transient_then_recovers() {
        let mock = scripted(vec![
            Err(SampleError::transient("boom")),
            Ok(times(0, 100)),
            Ok(times(75, 200)),
        ]);
        let mut adapter = CpuAdapter::new(mock);

        assert!(matches!(adapter.sample(), Err(SampleError::Transient(_))));
        assert_eq!(
            adapter.sample().unwrap(),
            vec![(FieldKey::CpuPercent, Value::Percent(25.0))]
        );
    }

    #[test]
    fn counters_that_do_not_advance_are_transient() {
        assert!(usage_between(times(10, 100), times(10, 100)).is_err());
        assert!(usage_between(times(10, 100), times(5, 50)).is_err());
    }

    #[test]
    fn idle_delta_larger_than_total_clamps_to_zero() {
        assert_eq!(usage_between(times(0, 0), times(500, 100)).unwrap(), 0.0);
        assert_eq!(usage_between(times(0, 0), times(0, 100)).unwrap(), 100.0);
    }

    #[test]
    fn parses_aggregate_proc_stat_line() {
        let content = "cpu  10 0 20 60 10 0 0 0 5 0\ncpu0 1 0 2 6 1 0 0 0 0 0\nintr 1\n";
        assert_eq!(parse_proc_stat(content).unwrap(), times(70, 100));
    }

    #[test]
    fn rejects_malformed_proc_stat() {
        assert!(parse_proc_stat("intr 1 2 3").is_err());
        assert!(parse_proc_stat("cpu  1 x 3 4").is_err());
        assert!(parse_proc_stat("cpu  1 2").is_err());
    }

    #[test]
    fn proc_stat_file_feeds_the_adapter() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cpu  100 0 0 100 0 0 0 0").unwrap();
        let path = file.path().to_path_buf();
        let mut adapter = CpuAdapter::new(ProcStatTicks::with_path(&path));

        std::fs::write(&path, "cpu  130 0 0 170 0 0 0 0\n").unwrap();
        assert_eq!(
            adapter.sample().unwrap(),
            vec![(FieldKey::CpuPercent, Value::Percent(30.0))]
        );
    }

    #[test]
    fn sysinfo_ticks_advance_monotonically() {
        let mut ticks = SysinfoTicks::new();
        let first = ticks.read().unwrap();
        let second = ticks.read().unwrap();
        assert!(second.total > first.total);
        assert!(second.idle >= first.idle);
    }
}
