//! Footer widget with OS info and keybindings

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::Widget,
};

use crate::core::snapshot::FieldKey;
use crate::core::view::ViewState;
use crate::ui::theme::Theme;

pub struct Footer<'a> {
    view: &'a ViewState,
    theme: &'a Theme,
}

impl<'a> Footer<'a> {
    pub fn new(view: &'a ViewState, theme: &'a Theme) -> Self {
        Self { view, theme }
    }
}

impl<'a> Widget for Footer<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_style(area, self.theme.styles.footer);

        let os = self
            .view
            .snapshot
            .text(FieldKey::OsVersion)
            .unwrap_or("detecting OS…");
        let os_line = Line::from(Span::styled(os, self.theme.styles.detail));
        buf.set_line(area.x + 1, area.y, &os_line, area.width.saturating_sub(2));

        if area.height < 2 {
            return;
        }

        let bindings = [("d", "Details"), ("r", "Redraw"), ("q", "Quit")];
        let mut spans = Vec::new();
        for (i, (key, action)) in bindings.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled("  ", self.theme.styles.keybind));
            }
            spans.push(Span::styled(
                format!("[{}]", key),
                self.theme.styles.keybind_key,
            ));
            spans.push(Span::styled(
                format!(" {}", action),
                self.theme.styles.keybind,
            ));
        }

        let line = Line::from(spans);
        buf.set_line(area.x + 1, area.y + 1, &line, area.width.saturating_sub(2));
    }
}
