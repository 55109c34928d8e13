//! Wall clock and OS identification. Cheap and infallible.

use chrono::Local;
use sysinfo::System;

use super::{AdapterKind, Reading, SampleError, SourceAdapter};
use crate::core::snapshot::{FieldKey, Value};

pub struct ClockAdapter {
    os_version: String,
}

impl ClockAdapter {
    pub fn new() -> Self {
        Self::with_os_version(detect_os_version())
    }

    pub fn with_os_version(os_version: impl Into<String>) -> Self {
        Self {
            os_version: os_version.into(),
        }
    }
}

impl Default for ClockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// e.g. `Linux 24.04 Ubuntu • x86_64`
fn detect_os_version() -> String {
    let os = System::long_os_version()
        .or_else(|| {
            System::name().map(|name| match System::os_version() {
                Some(version) => format!("{} {}", name, version),
                None => name,
            })
        })
        .unwrap_or_else(|| std::env::consts::OS.to_string());

    format!("{} • {}", os, std::env::consts::ARCH)
}

impl SourceAdapter for ClockAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Clock
    }

    fn sample(&mut self) -> Result<Vec<Reading>, SampleError> {
        Ok(vec![
            (FieldKey::WallClock, Value::Timestamp(Local::now())),
            (FieldKey::OsVersion, Value::Text(self.os_version.clone())),
        ])
    }
}
