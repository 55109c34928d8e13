//! Presentation-side view state, rebuilt from published snapshots

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::DisplayConfig;
use crate::core::snapshot::{FieldKey, Snapshot};
use crate::ui::theme::Theme;

const CPU_HISTORY_LEN: usize = 60;

/// Cards the dashboard can show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Card {
    Clock,
    Cpu,
    Memory,
    Gpu,
    Battery,
}

impl Card {
    pub const ALL: [Card; 5] = [
        Self::Clock,
        Self::Cpu,
        Self::Memory,
        Self::Gpu,
        Self::Battery,
    ];

    fn primary_field(self) -> FieldKey {
        match self {
            Self::Clock => FieldKey::WallClock,
            Self::Cpu => FieldKey::CpuPercent,
            Self::Memory => FieldKey::MemoryPercent,
            Self::Gpu => FieldKey::GpuPercent,
            Self::Battery => FieldKey::BatteryPercent,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewState {
    pub snapshot: Arc<Snapshot>,
    pub cpu_history: VecDeque<f32>,
    pub show_details: bool,
    pub hide_unavailable: bool,
    pub theme: Theme,
}

impl ViewState {
    pub fn new(display: &DisplayConfig) -> Self {
        Self {
            snapshot: Arc::new(Snapshot::placeholder()),
            cpu_history: VecDeque::with_capacity(CPU_HISTORY_LEN),
            show_details: true,
            hide_unavailable: display.hide_unavailable,
            theme: Theme::from_name(&display.theme),
        }
    }

    /// Adopt a snapshot if it is newer than the one on screen.
    pub fn observe(&mut self, snapshot: Arc<Snapshot>) -> bool {
        if snapshot.sequence <= self.snapshot.sequence {
            return false;
        }
        if let Some(cpu) = snapshot.percent(FieldKey::CpuPercent) {
            self.cpu_history.push_back(cpu);
            if self.cpu_history.len() > CPU_HISTORY_LEN {
                self.cpu_history.pop_front();
            }
        }
        self.snapshot = snapshot;
        true
    }

    /// Cards for hardware this machine lacks are hidden once the engine has
    /// given up on them, if configured.
    pub fn visible_cards(&self) -> Vec<Card> {
        Card::ALL
            .into_iter()
            .filter(|card| {
                !self.hide_unavailable || !self.snapshot.field(card.primary_field()).is_absent()
            })
            .collect()
    }
}
