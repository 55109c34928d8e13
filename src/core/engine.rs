//! Sampling engine: polls every adapter on a fixed cadence and publishes
//! one coherent snapshot per cycle.
//!
//! Adapters are isolated from each other. Each one is sampled on the blocking
//! pool under its own timeout, and its outcome only ever touches the fields it
//! owns.

use chrono::Local;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SamplingConfig;
use crate::core::snapshot::{MetricField, Snapshot};
use crate::core::state::SnapshotStore;
use crate::integrations::{self, AdapterKind, Reading, SampleError, SourceAdapter};

type SharedAdapter = Arc<Mutex<Box<dyn SourceAdapter>>>;

/// Where an adapter sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Active,
    /// Still polled, but the last attempt(s) failed
    Stale,
    /// Capability absent; never polled again
    Disabled,
}

/// Rolling per-adapter bookkeeping, owned by the engine
#[derive(Debug, Clone, Default)]
pub struct AdapterHealth {
    pub consecutive_failures: u32,
    pub last_success: Option<Instant>,
    pub disabled: bool,
    /// Sample attempts made, including ones that timed out
    pub calls: u64,
}

impl AdapterHealth {
    pub fn state(&self) -> AdapterState {
        if self.disabled {
            AdapterState::Disabled
        } else if self.consecutive_failures > 0 {
            AdapterState::Stale
        } else {
            AdapterState::Active
        }
    }
}

struct AdapterSlot {
    kind: AdapterKind,
    adapter: SharedAdapter,
    health: AdapterHealth,
    last_good: Vec<Reading>,
}

impl AdapterSlot {
    fn new(adapter: Box<dyn SourceAdapter>) -> Self {
        Self {
            kind: adapter.kind(),
            adapter: Arc::new(Mutex::new(adapter)),
            health: AdapterHealth::default(),
            last_good: Vec::new(),
        }
    }

    /// Fold one sampling outcome into health and the in-progress snapshot.
    /// `None` means the adapter was not polled this cycle.
    fn apply(
        &mut self,
        outcome: Option<Result<Vec<Reading>, SampleError>>,
        threshold: u32,
        snapshot: &mut Snapshot,
    ) {
        let Some(outcome) = outcome else {
            for key in self.kind.fields() {
                *snapshot.field_mut(*key) = MetricField::absent();
            }
            return;
        };
        self.health.calls += 1;

        match outcome {
            Ok(readings) => {
                if self.health.consecutive_failures > 0 {
                    tracing::debug!(
                        adapter = %self.kind,
                        failures = self.health.consecutive_failures,
                        "adapter recovered"
                    );
                }
                self.health.consecutive_failures = 0;
                self.health.last_success = Some(Instant::now());

                for (key, value) in &readings {
                    if !self.kind.fields().contains(key) {
                        tracing::warn!(adapter = %self.kind, field = %key, "ignoring foreign field");
                    } else if value.unit() != key.unit() {
                        tracing::warn!(adapter = %self.kind, field = %key, "reading has the wrong unit");
                        *snapshot.field_mut(*key) = MetricField::error();
                    } else {
                        *snapshot.field_mut(*key) = MetricField::ok(value.clone());
                    }
                }
                // Only readings that made it into the snapshot can be reused
                self.last_good = readings
                    .into_iter()
                    .filter(|(key, value)| {
                        self.kind.fields().contains(key) && value.unit() == key.unit() && value.is_valid()
                    })
                    .collect();
            }
            Err(SampleError::CapabilityAbsent(reason)) => {
                tracing::info!(adapter = %self.kind, "disabling adapter: {}", reason);
                self.health.disabled = true;
                self.last_good.clear();
                for key in self.kind.fields() {
                    *snapshot.field_mut(*key) = MetricField::absent();
                }
            }
            Err(SampleError::Transient(reason)) => {
                self.health.consecutive_failures = self.health.consecutive_failures.saturating_add(1);
                let failures = self.health.consecutive_failures;

                if failures < threshold {
                    tracing::debug!(adapter = %self.kind, failures, "transient failure: {}", reason);
                    for (key, value) in &self.last_good {
                        if self.kind.fields().contains(key) && value.unit() == key.unit() {
                            *snapshot.field_mut(*key) = MetricField::stale(value.clone());
                        }
                    }
                } else if failures == threshold {
                    tracing::warn!(adapter = %self.kind, failures, "adapter failing: {}", reason);
                } else {
                    tracing::trace!(adapter = %self.kind, failures, "still failing: {}", reason);
                }
            }
        }
    }
}

/// Run one adapter on the blocking pool, giving up after `timeout`.
///
/// An abandoned call keeps the adapter locked until it returns; attempts made
/// meanwhile fail fast instead of piling up on the same handle.
async fn sample_with_timeout(
    adapter: SharedAdapter,
    timeout: Duration,
) -> Result<Vec<Reading>, SampleError> {
    let task = tokio::task::spawn_blocking(move || {
        let Some(mut adapter) = adapter.try_lock() else {
            return Err(SampleError::transient("previous sample still in flight"));
        };
        adapter.sample()
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(SampleError::transient(format!("sampler task failed: {}", e))),
        Err(_) => Err(SampleError::transient(format!(
            "timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

pub struct SamplingEngine {
    slots: Vec<AdapterSlot>,
    config: SamplingConfig,
    store: SnapshotStore,
    sequence: u64,
}

impl SamplingEngine {
    pub fn new(
        adapters: Vec<Box<dyn SourceAdapter>>,
        config: SamplingConfig,
        store: SnapshotStore,
    ) -> Self {
        Self {
            slots: adapters.into_iter().map(AdapterSlot::new).collect(),
            config,
            store,
            sequence: 0,
        }
    }

    /// Engine wired to this machine's CPU, memory, GPU, battery and clock
    pub fn with_system_adapters(config: SamplingConfig, store: SnapshotStore) -> Self {
        Self::new(integrations::system_adapters(), config, store)
    }

    pub fn health(&self, kind: AdapterKind) -> Option<&AdapterHealth> {
        self.slots
            .iter()
            .find(|slot| slot.kind == kind)
            .map(|slot| &slot.health)
    }

    /// Sample every enabled adapter concurrently, assemble and publish a snapshot.
    pub async fn run_cycle(&mut self) -> Arc<Snapshot> {
        let timeout = self.config.adapter_timeout();
        let pending = self.slots.iter().map(|slot| {
            let adapter = (!slot.health.disabled).then(|| Arc::clone(&slot.adapter));
            async move {
                match adapter {
                    Some(adapter) => Some(sample_with_timeout(adapter, timeout).await),
                    None => None,
                }
            }
        });
        let outcomes = futures::future::join_all(pending).await;

        self.sequence += 1;
        let mut snapshot = Snapshot::empty(self.sequence, Local::now());
        let threshold = self.config.transient_failure_threshold;
        for (slot, outcome) in self.slots.iter_mut().zip(outcomes) {
            slot.apply(outcome, threshold, &mut snapshot);
        }

        let snapshot = Arc::new(snapshot);
        self.store.publish(Arc::clone(&snapshot));
        snapshot
    }

    /// Drive cycles on the refresh interval until `shutdown` flips to true or
    /// its sender is dropped. Shutdown is only observed between cycles.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.refresh_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            adapters = self.slots.len(),
            interval_ms = self.config.refresh_interval_ms,
            "sampling started"
        );

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            let snapshot = self.run_cycle().await;
            tracing::trace!(
                sequence = snapshot.sequence,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "cycle published"
            );
        }

        tracing::info!(cycles = self.sequence, "sampling stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::{FieldKey, FieldStatus, Value};
    use crate::integrations::battery::BatteryAdapter;
    use crate::integrations::cpu::{CpuAdapter, CpuTicks, CpuTimes};
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays back a script of outcomes and counts calls. Once the script is
    /// exhausted the last outcome repeats.
    struct Scripted {
        kind: AdapterKind,
        script: VecDeque<Result<Vec<Reading>, SampleError>>,
        last: Result<Vec<Reading>, SampleError>,
        calls: Arc<AtomicUsize>,
        delay: Option<Duration>,
    }

    impl Scripted {
        fn new(kind: AdapterKind, script: Vec<Result<Vec<Reading>, SampleError>>) -> Self {
            let last = script
                .last()
                .cloned()
                .unwrap_or_else(|| Err(SampleError::transient("empty script")));
            Self {
                kind,
                script: script.into(),
                last,
                calls: Arc::new(AtomicUsize::new(0)),
                delay: None,
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn calls(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.calls)
        }
    }

    impl SourceAdapter for Scripted {
        fn kind(&self) -> AdapterKind {
            self.kind
        }

        fn sample(&mut self) -> Result<Vec<Reading>, SampleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            self.script.pop_front().unwrap_or_else(|| self.last.clone())
        }
    }

    fn cpu(percent: f32) -> Result<Vec<Reading>, SampleError> {
        Ok(vec![(FieldKey::CpuPercent, Value::Percent(percent))])
    }

    fn memory(used: u64, total: u64) -> Result<Vec<Reading>, SampleError> {
        crate::integrations::memory::memory_readings(used, total)
    }

    fn transient() -> Result<Vec<Reading>, SampleError> {
        Err(SampleError::transient("hiccup"))
    }

    fn absent() -> Result<Vec<Reading>, SampleError> {
        Err(SampleError::absent("not here"))
    }

    fn config(threshold: u32) -> SamplingConfig {
        SamplingConfig {
            refresh_interval_ms: 10,
            adapter_timeout_ms: 200,
            transient_failure_threshold: threshold,
        }
    }

    fn engine(adapters: Vec<Box<dyn SourceAdapter>>, threshold: u32) -> (SamplingEngine, SnapshotStore) {
        let store = SnapshotStore::new();
        (SamplingEngine::new(adapters, config(threshold), store.clone()), store)
    }

    #[tokio::test]
    async fn failing_adapter_does_not_affect_others() {
        let gpu = Scripted::new(AdapterKind::Gpu, vec![transient()]);
        let battery = Scripted::new(AdapterKind::Battery, vec![absent()]);
        let cpu_adapter = Scripted::new(AdapterKind::Cpu, vec![cpu(12.0), cpu(34.0)]);
        let (mut engine, _) = engine(
            vec![Box::new(gpu), Box::new(battery), Box::new(cpu_adapter)],
            3,
        );

        let first = engine.run_cycle().await;
        assert_eq!(first.cpu_percent, MetricField::ok(Value::Percent(12.0)));
        assert_eq!(first.gpu_percent.status(), FieldStatus::Unavailable);
        assert_eq!(first.battery_percent.status(), FieldStatus::Unavailable);

        let second = engine.run_cycle().await;
        assert_eq!(second.cpu_percent, MetricField::ok(Value::Percent(34.0)));
    }

    #[tokio::test]
    async fn sequence_increases_by_one_per_publish() {
        let (mut engine, store) = engine(vec![Box::new(Scripted::new(AdapterKind::Cpu, vec![cpu(1.0)]))], 3);
        let mut rx = store.subscribe();

        for expected in 1..=5 {
            let snapshot = engine.run_cycle().await;
            assert_eq!(snapshot.sequence, expected);
            assert_eq!(store.current().sequence, expected);
            assert_eq!(rx.recv().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn machine_without_battery_stays_unavailable_and_is_asked_once() {
        let desktop = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(desktop.path().join("AC")).unwrap();
        std::fs::write(desktop.path().join("AC").join("type"), "Mains\n").unwrap();
        let battery = BatteryAdapter::sysfs(desktop.path());

        // Wrap the real sysfs adapter so calls can be counted
        struct Counting<A> {
            inner: A,
            calls: Arc<AtomicUsize>,
        }
        impl<A: SourceAdapter> SourceAdapter for Counting<A> {
            fn kind(&self) -> AdapterKind {
                self.inner.kind()
            }
            fn sample(&mut self) -> Result<Vec<Reading>, SampleError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.inner.sample()
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let counting = Counting {
            inner: battery,
            calls: Arc::clone(&calls),
        };
        let (mut engine, _) = engine(
            vec![
                Box::new(counting),
                Box::new(Scripted::new(AdapterKind::Cpu, vec![cpu(5.0)])),
            ],
            3,
        );

        let first = engine.run_cycle().await;
        assert_eq!(first.sequence, 1);
        assert_eq!(first.battery_percent.status(), FieldStatus::Unavailable);
        assert_eq!(first.battery_charging.status(), FieldStatus::Unavailable);
        assert!(first.battery_percent.is_absent());

        let mut last = first;
        for _ in 0..49 {
            last = engine.run_cycle().await;
        }
        assert_eq!(last.sequence, 50);
        assert_eq!(last.battery_percent.status(), FieldStatus::Unavailable);
        assert_eq!(last.battery_charging.status(), FieldStatus::Unavailable);
        assert!(last.cpu_percent.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let health = engine.health(AdapterKind::Battery).unwrap();
        assert_eq!(health.state(), AdapterState::Disabled);
        assert_eq!(health.calls, 1);
    }

    #[tokio::test]
    async fn transient_streak_below_threshold_serves_stale_then_recovers() {
        let adapter = Scripted::new(
            AdapterKind::Cpu,
            vec![cpu(10.0), transient(), transient(), cpu(20.0)],
        );
        let calls = adapter.calls();
        let (mut engine, _) = engine(vec![Box::new(adapter)], 3);

        assert_eq!(engine.run_cycle().await.cpu_percent, MetricField::ok(Value::Percent(10.0)));

        for failures in 1..=2 {
            let snapshot = engine.run_cycle().await;
            assert_eq!(snapshot.cpu_percent, MetricField::stale(Value::Percent(10.0)));
            let health = engine.health(AdapterKind::Cpu).unwrap();
            assert_eq!(health.consecutive_failures, failures);
            assert_eq!(health.state(), AdapterState::Stale);
        }

        let recovered = engine.run_cycle().await;
        assert_eq!(recovered.cpu_percent, MetricField::ok(Value::Percent(20.0)));
        let health = engine.health(AdapterKind::Cpu).unwrap();
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.last_success.is_some());
        assert_eq!(health.state(), AdapterState::Active);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn streak_at_threshold_is_unavailable_but_still_retried() {
        let adapter = Scripted::new(
            AdapterKind::Memory,
            vec![memory(1, 4), transient(), transient(), transient(), memory(2, 4)],
        );
        let calls = adapter.calls();
        let (mut engine, _) = engine(vec![Box::new(adapter)], 2);

        engine.run_cycle().await;
        let stale = engine.run_cycle().await;
        assert!(stale.memory_percent.is_stale());
        assert_eq!(stale.memory_used.value(), Some(&Value::Bytes(1)));

        for _ in 0..2 {
            let snapshot = engine.run_cycle().await;
            assert_eq!(snapshot.memory_percent.status(), FieldStatus::Unavailable);
            assert!(!snapshot.memory_percent.is_absent());
        }

        let recovered = engine.run_cycle().await;
        assert_eq!(recovered.memory_percent, MetricField::ok(Value::Percent(50.0)));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn transient_before_any_success_is_unavailable() {
        let (mut engine, _) = engine(vec![Box::new(Scripted::new(AdapterKind::Gpu, vec![transient()]))], 3);
        let snapshot = engine.run_cycle().await;
        assert_eq!(snapshot.gpu_percent.status(), FieldStatus::Unavailable);
        assert_eq!(engine.health(AdapterKind::Gpu).unwrap().state(), AdapterState::Stale);
    }

    #[tokio::test]
    async fn out_of_range_reading_is_an_error_field() {
        let (mut engine, _) = engine(vec![Box::new(Scripted::new(AdapterKind::Cpu, vec![cpu(180.0)]))], 3);
        let snapshot = engine.run_cycle().await;
        assert_eq!(snapshot.cpu_percent.status(), FieldStatus::Error);
        assert!(snapshot.cpu_percent.value().is_none());
    }

    #[tokio::test]
    async fn reading_with_wrong_unit_is_an_error_field() {
        let confused = Scripted::new(
            AdapterKind::Cpu,
            vec![Ok(vec![(FieldKey::CpuPercent, Value::Bytes(42))])],
        );
        let (mut engine, _) = engine(vec![Box::new(confused)], 3);
        let snapshot = engine.run_cycle().await;
        assert_eq!(snapshot.cpu_percent.status(), FieldStatus::Error);
    }

    #[tokio::test]
    async fn invalid_reading_is_never_served_as_stale() {
        let adapter = Scripted::new(
            AdapterKind::Memory,
            vec![
                Ok(vec![
                    (FieldKey::MemoryUsed, Value::Bytes(1)),
                    (FieldKey::MemoryTotal, Value::Bytes(4)),
                    (FieldKey::MemoryPercent, Value::Percent(250.0)),
                ]),
                transient(),
            ],
        );
        let (mut engine, _) = engine(vec![Box::new(adapter)], 3);

        let first = engine.run_cycle().await;
        assert_eq!(first.memory_percent.status(), FieldStatus::Error);

        let second = engine.run_cycle().await;
        assert!(second.memory_used.is_stale());
        assert_eq!(second.memory_percent.status(), FieldStatus::Unavailable);
        assert!(!second.memory_percent.is_stale());
    }

    #[tokio::test]
    async fn foreign_fields_are_ignored() {
        let sneaky = Scripted::new(
            AdapterKind::Cpu,
            vec![Ok(vec![
                (FieldKey::CpuPercent, Value::Percent(3.0)),
                (FieldKey::BatteryPercent, Value::Percent(99.0)),
            ])],
        );
        let (mut engine, _) = engine(vec![Box::new(sneaky)], 3);
        let snapshot = engine.run_cycle().await;
        assert!(snapshot.cpu_percent.is_ok());
        assert_eq!(snapshot.battery_percent.status(), FieldStatus::Unavailable);
    }

    #[tokio::test]
    async fn hung_adapter_is_bounded_by_its_timeout() {
        let slow = Scripted::new(AdapterKind::Gpu, vec![Ok(vec![])]).delayed(Duration::from_millis(600));
        let slow_calls = slow.calls();
        let fast = Scripted::new(AdapterKind::Cpu, vec![cpu(7.0)]);
        let store = SnapshotStore::new();
        let mut engine = SamplingEngine::new(
            vec![Box::new(slow), Box::new(fast)],
            SamplingConfig {
                refresh_interval_ms: 10,
                adapter_timeout_ms: 50,
                transient_failure_threshold: 3,
            },
            store,
        );

        for _ in 0..3 {
            let started = Instant::now();
            let snapshot = engine.run_cycle().await;
            assert!(
                started.elapsed() < Duration::from_millis(400),
                "cycle took {:?}",
                started.elapsed()
            );
            assert!(snapshot.cpu_percent.is_ok());
            assert_eq!(snapshot.gpu_percent.status(), FieldStatus::Unavailable);
        }

        // Later attempts found the first call still in flight and skipped it
        assert_eq!(slow_calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.health(AdapterKind::Gpu).unwrap().consecutive_failures, 3);
    }

    #[tokio::test]
    async fn panicking_adapter_counts_as_transient() {
        struct Panics;
        impl SourceAdapter for Panics {
            fn kind(&self) -> AdapterKind {
                AdapterKind::Gpu
            }
            fn sample(&mut self) -> Result<Vec<Reading>, SampleError> {
                panic!("driver exploded")
            }
        }

        let (mut engine, _) = engine(
            vec![Box::new(Panics), Box::new(Scripted::new(AdapterKind::Cpu, vec![cpu(1.0)]))],
            3,
        );
        let snapshot = engine.run_cycle().await;
        assert!(snapshot.cpu_percent.is_ok());
        let health = engine.health(AdapterKind::Gpu).unwrap();
        assert!(!health.disabled);
        assert_eq!(health.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn cpu_counters_flow_through_to_snapshot() {
        struct Counters(VecDeque<CpuTimes>);
        impl CpuTicks for Counters {
            fn read(&mut self) -> Result<CpuTimes, SampleError> {
                self.0
                    .pop_front()
                    .ok_or_else(|| SampleError::transient("exhausted"))
            }
        }

        let adapter = CpuAdapter::new(Counters(
            vec![
                CpuTimes { idle: 100, total: 200 },
                CpuTimes { idle: 150, total: 300 },
            ]
            .into(),
        ));
        let (mut engine, _) = engine(vec![Box::new(adapter)], 3);
        let snapshot = engine.run_cycle().await;
        assert_eq!(snapshot.cpu_percent, MetricField::ok(Value::Percent(50.0)));
    }

    #[tokio::test]
    async fn run_loop_publishes_until_shutdown() {
        let store = SnapshotStore::new();
        let engine = SamplingEngine::new(
            vec![Box::new(Scripted::new(AdapterKind::Cpu, vec![cpu(1.0)]))],
            config(3),
            store.clone(),
        );
        let mut rx = store.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = engine.spawn(shutdown_rx);

        let mut last = 0;
        for _ in 0..3 {
            let sequence = rx.recv().await.unwrap();
            assert!(sequence > last);
            last = sequence;
        }

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        let settled = store.current().sequence;
        assert!(settled >= 3);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.current().sequence, settled);
    }
}
