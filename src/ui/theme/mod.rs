//! Theme system with color palettes

use ratatui::style::{Color, Modifier, Style};

/// Complete theme definition
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub colors: ThemeColors,
    pub styles: ThemeStyles,
}

#[derive(Debug, Clone)]
pub struct ThemeColors {
    // Base colors
    pub bg_primary: Color,
    pub bg_card: Color,
    pub bg_track: Color,

    pub fg_primary: Color,
    pub fg_muted: Color,

    // One accent per metric card
    pub cpu: Color,
    pub memory: Color,
    pub gpu: Color,
    pub battery: Color,
    pub time: Color,

    pub error: Color,
    pub border: Color,
}

#[derive(Debug, Clone)]
pub struct ThemeStyles {
    pub header: Style,
    pub footer: Style,
    pub card_title: Style,
    pub card_border: Style,
    pub detail: Style,
    pub unavailable: Style,
    pub stale: Style,
    pub error: Style,
    pub keybind: Style,
    pub keybind_key: Style,
}

impl Theme {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "tokyo-night" | "tokyonight" => Self::tokyo_night(),
            "nord" => Self::nord(),
            _ => Self::midnight(), // Default
        }
    }

    /// Midnight theme (default)
    pub fn midnight() -> Self {
        let colors = ThemeColors {
            bg_primary: Color::Rgb(11, 15, 20),
            bg_card: Color::Rgb(18, 24, 38),
            bg_track: Color::Rgb(2, 6, 23),

            fg_primary: Color::Rgb(229, 231, 235),
            fg_muted: Color::Rgb(156, 163, 175),

            cpu: Color::Rgb(99, 102, 241),
            memory: Color::Rgb(236, 72, 153),
            gpu: Color::Rgb(34, 197, 94),
            battery: Color::Rgb(245, 158, 11),
            time: Color::Rgb(56, 189, 248),

            error: Color::Rgb(248, 113, 113),
            border: Color::Rgb(31, 41, 55),
        };

        Self::from_colors("Midnight", colors)
    }

    /// Tokyo Night theme
    pub fn tokyo_night() -> Self {
        let colors = ThemeColors {
            bg_primary: Color::Rgb(26, 27, 38),
            bg_card: Color::Rgb(36, 40, 59),
            bg_track: Color::Rgb(41, 46, 66),

            fg_primary: Color::Rgb(192, 202, 245),
            fg_muted: Color::Rgb(86, 95, 137),

            cpu: Color::Rgb(122, 162, 247),
            memory: Color::Rgb(187, 154, 247),
            gpu: Color::Rgb(158, 206, 106),
            battery: Color::Rgb(224, 175, 104),
            time: Color::Rgb(125, 207, 255),

            error: Color::Rgb(247, 118, 142),
            border: Color::Rgb(41, 46, 66),
        };

        Self::from_colors("Tokyo Night", colors)
    }

    /// Nord theme
    pub fn nord() -> Self {
        let colors = ThemeColors {
            bg_primary: Color::Rgb(46, 52, 64),
            bg_card: Color::Rgb(59, 66, 82),
            bg_track: Color::Rgb(67, 76, 94),

            fg_primary: Color::Rgb(236, 239, 244),
            fg_muted: Color::Rgb(216, 222, 233),

            cpu: Color::Rgb(136, 192, 208),
            memory: Color::Rgb(180, 142, 173),
            gpu: Color::Rgb(163, 190, 140),
            battery: Color::Rgb(235, 203, 139),
            time: Color::Rgb(129, 161, 193),

            error: Color::Rgb(191, 97, 106),
            border: Color::Rgb(67, 76, 94),
        };

        Self::from_colors("Nord", colors)
    }

    fn from_colors(name: &str, colors: ThemeColors) -> Self {
        let styles = ThemeStyles {
            header: Style::default().bg(colors.bg_primary).fg(colors.fg_primary),
            footer: Style::default().bg(colors.bg_card).fg(colors.fg_muted),
            card_title: Style::default()
                .fg(colors.fg_muted)
                .add_modifier(Modifier::BOLD),
            card_border: Style::default().fg(colors.border),
            detail: Style::default().fg(colors.fg_muted),
            unavailable: Style::default()
                .fg(colors.fg_muted)
                .add_modifier(Modifier::DIM),
            stale: Style::default()
                .fg(colors.fg_muted)
                .add_modifier(Modifier::DIM | Modifier::ITALIC),
            error: Style::default().fg(colors.error),
            keybind: Style::default().fg(colors.fg_muted),
            keybind_key: Style::default()
                .fg(colors.time)
                .add_modifier(Modifier::BOLD),
        };

        Self {
            name: name.to_string(),
            colors,
            styles,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::midnight()
    }
}
