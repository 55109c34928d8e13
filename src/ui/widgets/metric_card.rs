//! Percentage card with a usage bar and one detail line

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Widget},
};
use std::collections::VecDeque;

use crate::core::snapshot::{FieldStatus, MetricField, Value};
use crate::ui::format;
use crate::ui::theme::Theme;

const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub struct MetricCard<'a> {
    title: &'static str,
    field: &'a MetricField,
    accent: Color,
    detail: Option<String>,
    history: Option<&'a VecDeque<f32>>,
    theme: &'a Theme,
}

impl<'a> MetricCard<'a> {
    pub fn new(title: &'static str, field: &'a MetricField, accent: Color, theme: &'a Theme) -> Self {
        Self {
            title,
            field,
            accent,
            detail: None,
            history: None,
            theme,
        }
    }

    pub fn detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }

    /// Draw a sparkline of recent values instead of a detail line
    pub fn history(mut self, history: &'a VecDeque<f32>) -> Self {
        self.history = Some(history);
        self
    }

    fn value_style(&self) -> Style {
        match self.field.status() {
            FieldStatus::Ok if self.field.is_stale() => self.theme.styles.stale,
            FieldStatus::Ok => Style::default()
                .fg(self.accent)
                .add_modifier(Modifier::BOLD),
            FieldStatus::Unavailable => self.theme.styles.unavailable,
            FieldStatus::Error => self.theme.styles.error,
        }
    }
}

/// `████░░░░` filled to `percent` of `width`
pub fn usage_bar(percent: f32, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f32).round() as usize;
    let filled = filled.min(width);
    "█".repeat(filled) + &"░".repeat(width - filled)
}

pub fn sparkline(values: &VecDeque<f32>, width: usize) -> String {
    let skip = values.len().saturating_sub(width);
    values
        .iter()
        .skip(skip)
        .map(|v| {
            let idx = ((v.clamp(0.0, 100.0) * 7.0) / 100.0).round() as usize;
            SPARK_CHARS[idx.min(7)]
        })
        .collect()
}

impl<'a> Widget for MetricCard<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(Span::styled(format!(" {} ", self.title), self.theme.styles.card_title))
            .borders(Borders::ALL)
            .border_style(self.theme.styles.card_border)
            .style(Style::default().bg(self.theme.colors.bg_card));

        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height == 0 || inner.width == 0 {
            return;
        }

        let label = format!("{:>4} ", format::percent(self.field));
        let label_width = label.chars().count() as u16;
        buf.set_span(
            inner.x,
            inner.y,
            &Span::styled(&label, self.value_style()),
            inner.width,
        );

        let bar_width = inner.width.saturating_sub(label_width) as usize;
        if bar_width > 0 {
            let percent = self
                .field
                .value()
                .and_then(Value::as_percent)
                .unwrap_or(0.0);
            let bar_style = if self.field.is_ok() && !self.field.is_stale() {
                Style::default().fg(self.accent).bg(self.theme.colors.bg_track)
            } else {
                self.theme.styles.unavailable.bg(self.theme.colors.bg_track)
            };
            buf.set_span(
                inner.x + label_width,
                inner.y,
                &Span::styled(usage_bar(percent, bar_width), bar_style),
                bar_width as u16,
            );
        }

        if inner.height < 2 {
            return;
        }

        let second_line = match (self.history, &self.detail) {
            (Some(history), _) if !history.is_empty() => {
                Span::styled(sparkline(history, inner.width as usize), Style::default().fg(self.accent))
            }
            (_, Some(detail)) => Span::styled(detail.clone(), self.theme.styles.detail),
            _ => return,
        };
        buf.set_span(inner.x, inner.y + 1, &second_line, inner.width);
    }
}
