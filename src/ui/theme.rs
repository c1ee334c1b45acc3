//! Theme color definitions for the UI
//!
//! Dark and light palettes, switchable at runtime, plus the mapping from a
//! binding's color tag to a terminal color.

use crate::bindings::ButtonColor;
use crate::config::Theme;
use ratatui::style::Color;

/// Complete color palette for the UI
#[derive(Debug, Clone, Copy)]
pub struct ThemeColors {
    /// Main background
    pub bg: Color,
    /// Primary foreground text
    pub fg: Color,
    /// Dimmed/secondary text, released buttons
    pub dim: Color,
    /// Headings and borders
    pub accent: Color,
    /// Software mode indicator
    pub green: Color,
    /// Notices
    pub yellow: Color,
    /// Hardware mode indicator, errors
    pub red: Color,
    /// Status bar background
    pub bar: Color,
}

impl ThemeColors {
    /// Create a color palette for the given theme variant
    pub fn from_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self::dark(),
            Theme::Light => Self::light(),
        }
    }

    pub fn dark() -> Self {
        Self {
            bg: Color::Rgb(22, 22, 30),
            fg: Color::Rgb(200, 200, 210),
            dim: Color::Rgb(120, 120, 130),
            accent: Color::Rgb(80, 200, 220),
            green: Color::Rgb(80, 200, 120),
            yellow: Color::Rgb(240, 180, 80),
            red: Color::Rgb(240, 90, 100),
            bar: Color::Rgb(55, 55, 70),
        }
    }

    /// High contrast for bright terminals
    pub fn light() -> Self {
        Self {
            bg: Color::Rgb(245, 245, 248),
            fg: Color::Rgb(30, 30, 40),
            dim: Color::Rgb(130, 130, 150),
            accent: Color::Rgb(0, 130, 160),
            green: Color::Rgb(30, 150, 70),
            yellow: Color::Rgb(180, 120, 0),
            red: Color::Rgb(200, 50, 60),
            bar: Color::Rgb(200, 200, 212),
        }
    }

    /// Color of a pressed button
    pub fn button(&self, color: ButtonColor) -> Color {
        match color {
            ButtonColor::Red => self.red,
            ButtonColor::Orange => Color::Rgb(240, 140, 50),
            ButtonColor::Yellow => self.yellow,
            ButtonColor::Green => self.green,
            ButtonColor::Blue => Color::Rgb(80, 130, 240),
            ButtonColor::Purple => Color::Rgb(170, 100, 220),
            ButtonColor::Gray => self.dim,
        }
    }
}
