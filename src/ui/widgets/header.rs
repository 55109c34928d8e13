//! Header widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::core::view::ViewState;
use crate::ui::theme::Theme;

pub struct Header<'a> {
    view: &'a ViewState,
    theme: &'a Theme,
}

impl<'a> Header<'a> {
    pub fn new(view: &'a ViewState, theme: &'a Theme) -> Self {
        Self { view, theme }
    }
}

impl<'a> Widget for Header<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_style(area, self.theme.styles.header);

        let title = Line::from(vec![Span::styled(
            " ◉ SYSTEM STATS ",
            Style::default()
                .fg(self.theme.colors.fg_primary)
                .add_modifier(Modifier::BOLD),
        )]);
        buf.set_line(area.x, area.y, &title, area.width);

        // Sequence number on the right
        let sequence = format!("#{} ", self.view.snapshot.sequence);
        let span = Span::styled(&sequence, self.theme.styles.detail);
        let x = area.x + area.width.saturating_sub(sequence.len() as u16);
        buf.set_span(x, area.y, &span, sequence.len() as u16);
    }
}
