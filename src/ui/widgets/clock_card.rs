//! Clock card: time and date

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::core::view::ViewState;
use crate::ui::format;
use crate::ui::theme::Theme;

pub struct ClockCard<'a> {
    view: &'a ViewState,
    theme: &'a Theme,
}

impl<'a> ClockCard<'a> {
    pub fn new(view: &'a ViewState, theme: &'a Theme) -> Self {
        Self { view, theme }
    }
}

impl<'a> Widget for ClockCard<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(Span::styled(" TIME ", self.theme.styles.card_title))
            .borders(Borders::ALL)
            .border_style(self.theme.styles.card_border)
            .style(Style::default().bg(self.theme.colors.bg_card));

        let snapshot = &self.view.snapshot;
        let time_style = if snapshot.wall_clock.is_ok() {
            Style::default()
                .fg(self.theme.colors.time)
                .add_modifier(Modifier::BOLD)
        } else {
            self.theme.styles.unavailable
        };

        let mut lines = vec![Line::from(Span::styled(format::time(snapshot), time_style))];
        if let Some(date) = format::date(snapshot) {
            lines.push(Line::from(Span::styled(date, self.theme.styles.detail)));
        }

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(block)
            .render(area, buf);
    }
}
