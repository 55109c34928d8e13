//! Main UI renderer

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::Block,
    Frame,
};

use crate::core::snapshot::FieldKey;
use crate::core::view::{Card, ViewState};
use crate::ui::format;
use crate::ui::widgets::*;

const HEADER_HEIGHT: u16 = 1;
const FOOTER_HEIGHT: u16 = 2;

pub struct Renderer;

impl Renderer {
    pub fn render(frame: &mut Frame, view: &ViewState) {
        let area = frame.area();
        let theme = &view.theme;

        // Clear background
        frame.render_widget(
            Block::default().style(Style::default().bg(theme.colors.bg_primary)),
            area,
        );

        let cards = view.visible_cards();
        let card_height = if view.show_details { 4 } else { 3 };

        let mut constraints = vec![Constraint::Length(HEADER_HEIGHT)];
        constraints.extend(cards.iter().map(|card| match card {
            Card::Clock => Constraint::Length(4),
            _ => Constraint::Length(card_height),
        }));
        constraints.push(Constraint::Min(0));
        constraints.push(Constraint::Length(FOOTER_HEIGHT));

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        frame.render_widget(Header::new(view, theme), chunks[0]);
        for (card, slot) in cards.iter().zip(chunks.iter().skip(1)) {
            Self::render_card(frame, view, *card, inset(*slot));
        }
        frame.render_widget(Footer::new(view, theme), chunks[chunks.len() - 1]);
    }

    fn render_card(frame: &mut Frame, view: &ViewState, card: Card, area: Rect) {
        let theme = &view.theme;
        let snapshot = &view.snapshot;
        let details = view.show_details;

        match card {
            Card::Clock => frame.render_widget(ClockCard::new(view, theme), area),
            Card::Cpu => {
                let mut widget =
                    MetricCard::new("CPU", &snapshot.cpu_percent, theme.colors.cpu, theme);
                if details {
                    widget = widget.history(&view.cpu_history);
                }
                frame.render_widget(widget, area);
            }
            Card::Memory => frame.render_widget(
                MetricCard::new("MEMORY", &snapshot.memory_percent, theme.colors.memory, theme)
                    .detail(details.then(|| format::memory_detail(snapshot)).flatten()),
                area,
            ),
            Card::Gpu => frame.render_widget(
                MetricCard::new("GPU", &snapshot.gpu_percent, theme.colors.gpu, theme).detail(
                    details
                        .then(|| snapshot.text(FieldKey::GpuName).map(str::to_string))
                        .flatten(),
                ),
                area,
            ),
            Card::Battery => frame.render_widget(
                MetricCard::new("BATTERY", &snapshot.battery_percent, theme.colors.battery, theme)
                    .detail(
                        details
                            .then(|| format::battery_detail(snapshot).map(str::to_string))
                            .flatten(),
                    ),
                area,
            ),
        }
    }
}

/// One column of padding either side
fn inset(area: Rect) -> Rect {
    if area.width <= 2 {
        return area;
    }
    Rect {
        x: area.x + 1,
        width: area.width - 2,
        ..area
    }
}
