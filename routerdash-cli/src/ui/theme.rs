//! Color palette and style helpers for the dashboard.
//!
//! Palette tokens instead of hard-coded colors, with one helper per visual
//! state (device liveness, reference lines, notices, key hints).

use ratatui::style::{Color, Modifier, Style};

use routerdash_core::chart::RefLineKind;
use routerdash_core::model::{Device, Metric};
use routerdash_core::state::NoticeLevel;

/// Color palette tokens for the theme
#[derive(Clone, Debug)]
pub struct Palette {
    /// Panel border color
    pub panel_border: Color,
    /// Primary text color
    pub text: Color,
    /// Dimmed text (secondary info)
    pub text_dim: Color,
    /// Muted text (stale devices, disabled controls)
    pub text_muted: Color,
    /// Accent color (highlights, focus)
    pub accent: Color,
    pub success: Color,
    pub warn: Color,
    pub error: Color,
    /// Dormant device tag
    pub dormant: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
    pub key_hint: Color,
    /// One color per plotted metric
    pub rssi: Color,
    pub sinr: Color,
    pub rsrq: Color,
    pub rsrp: Color,
    /// Reference band center line
    pub ref_center: Color,
    /// Reference band upper line
    pub ref_upper: Color,
    pub cursor: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self::dark()
    }
}

impl Palette {
    pub fn dark() -> Self {
        Self {
            panel_border: Color::Rgb(60, 60, 60),
            text: Color::Rgb(212, 212, 212),
            text_dim: Color::Rgb(150, 150, 150),
            text_muted: Color::Rgb(100, 100, 100),
            accent: Color::Rgb(79, 193, 255),
            success: Color::Rgb(78, 201, 176),
            warn: Color::Rgb(220, 180, 100),
            error: Color::Rgb(244, 135, 113),
            dormant: Color::Rgb(252, 165, 165),
            selection_bg: Color::Rgb(38, 79, 120),
            selection_fg: Color::White,
            key_hint: Color::Rgb(206, 145, 120),
            rssi: Color::Rgb(37, 99, 235),
            sinr: Color::Rgb(22, 163, 74),
            rsrq: Color::Rgb(234, 88, 12),
            rsrp: Color::Rgb(147, 51, 234),
            ref_center: Color::Rgb(239, 68, 68),
            ref_upper: Color::Rgb(156, 163, 175),
            cursor: Color::Rgb(250, 204, 21),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Theme {
    pub palette: Palette,
}

impl Theme {
    /// Picker entry: dormant in red, stale dimmed, active as normal text
    pub fn device_style(&self, device: &Device) -> Style {
        let color = if device.dormant {
            self.palette.dormant
        } else if !device.has_recent {
            self.palette.text_muted
        } else {
            self.palette.text
        };
        Style::default().fg(color)
    }

    pub fn metric_style(&self, metric: Metric) -> Style {
        let color = match metric {
            Metric::RouterRssi => self.palette.rssi,
            Metric::Sinr => self.palette.sinr,
            Metric::Rsrq => self.palette.rsrq,
            Metric::Rsrp => self.palette.rsrp,
        };
        Style::default().fg(color)
    }

    pub fn ref_line_style(&self, kind: RefLineKind) -> Style {
        match kind {
            RefLineKind::Center => Style::default().fg(self.palette.ref_center),
            RefLineKind::Upper => Style::default()
                .fg(self.palette.ref_upper)
                .add_modifier(Modifier::DIM),
        }
    }

    pub fn notice_style(&self, level: NoticeLevel) -> Style {
        match level {
            NoticeLevel::Info => Style::default().fg(self.palette.success),
            NoticeLevel::Error => Style::default()
                .fg(self.palette.error)
                .add_modifier(Modifier::BOLD),
        }
    }

    pub fn tab_style(&self, active: bool) -> Style {
        if active {
            Style::default()
                .fg(self.palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.palette.text_dim)
        }
    }

    /// On/off toggles in the header
    pub fn toggle_style(&self, on: bool) -> Style {
        if on {
            Style::default().fg(self.palette.success)
        } else {
            Style::default().fg(self.palette.text_muted)
        }
    }
}

static DEFAULT_THEME: std::sync::OnceLock<Theme> = std::sync::OnceLock::new();

pub fn theme() -> &'static Theme {
    DEFAULT_THEME.get_or_init(Theme::default)
}

/// Shorthands over the global theme
pub mod styles {
    use super::*;

    pub fn device(device: &Device) -> Style {
        theme().device_style(device)
    }

    pub fn metric(metric: Metric) -> Style {
        theme().metric_style(metric)
    }

    pub fn ref_line(kind: RefLineKind) -> Style {
        theme().ref_line_style(kind)
    }

    pub fn notice(level: NoticeLevel) -> Style {
        theme().notice_style(level)
    }

    pub fn tab(active: bool) -> Style {
        theme().tab_style(active)
    }

    pub fn toggle(on: bool) -> Style {
        theme().toggle_style(on)
    }

    pub fn cursor() -> Style {
        Style::default().fg(theme().palette.cursor)
    }

    pub fn key_hint() -> Style {
        Style::default().fg(theme().palette.key_hint)
    }

    pub fn border_subtle() -> Style {
        Style::default().fg(theme().palette.panel_border)
    }

    pub fn border_focused() -> Style {
        Style::default().fg(theme().palette.accent)
    }

    pub fn selection() -> Style {
        Style::default()
            .bg(theme().palette.selection_bg)
            .fg(theme().palette.selection_fg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text() -> Style {
        Style::default().fg(theme().palette.text)
    }

    pub fn text_dim() -> Style {
        Style::default().fg(theme().palette.text_dim)
    }

    pub fn text_muted() -> Style {
        Style::default().fg(theme().palette.text_muted)
    }

    pub fn accent_bold() -> Style {
        Style::default()
            .fg(theme().palette.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn warn() -> Style {
        Style::default().fg(theme().palette.warn)
    }

    pub fn error() -> Style {
        Style::default().fg(theme().palette.error)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(theme().palette.text)
            .add_modifier(Modifier::BOLD)
    }
}
