//! Custom TUI widgets

use super::app::{ButtonBoard, LogEntry};
use super::theme::ThemeColors;
use crate::bindings::BindingTable;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use std::collections::VecDeque;

/// Run mode banner: hardware in red, software in green
pub struct ModeIndicator<'a> {
    label: &'a str,
    hardware: bool,
    colors: ThemeColors,
}

impl<'a> ModeIndicator<'a> {
    pub fn new(label: &'a str, hardware: bool, colors: ThemeColors) -> Self {
        Self {
            label,
            hardware,
            colors,
        }
    }
}

impl<'a> Widget for ModeIndicator<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let color = if self.hardware {
            self.colors.red
        } else {
            self.colors.green
        };
        let line = Line::from(vec![
            Span::styled(" Mode: ", Style::default().fg(self.colors.fg)),
            Span::styled(
                self.label,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
        ]);
        buf.set_line(area.x, area.y, &line, area.width);
    }
}

/// One row with the state of every bound button
pub struct ButtonPanel<'a> {
    bindings: &'a BindingTable,
    board: &'a ButtonBoard,
    colors: ThemeColors,
}

impl<'a> ButtonPanel<'a> {
    pub fn new(bindings: &'a BindingTable, board: &'a ButtonBoard, colors: ThemeColors) -> Self {
        Self {
            bindings,
            board,
            colors,
        }
    }
}

impl<'a> Widget for ButtonPanel<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Buttons ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.colors.accent));
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.height == 0 {
            return;
        }

        let mut spans = Vec::new();
        for binding in self.bindings.iter() {
            let (text, style) = if self.board.is_pressed(&binding.id) {
                (
                    format!(" {}: pressed ", binding.id),
                    Style::default()
                        .fg(self.colors.button(binding.color))
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                (
                    format!(" {}: released ", binding.id),
                    Style::default().fg(self.colors.dim),
                )
            };
            spans.push(Span::styled(text, style));
        }
        buf.set_line(inner.x, inner.y, &Line::from(spans), inner.width);
    }
}

/// Table of bindings: id, key, color tag and channel
pub struct BindingList<'a> {
    bindings: &'a BindingTable,
    colors: ThemeColors,
}

impl<'a> BindingList<'a> {
    pub fn new(bindings: &'a BindingTable, colors: ThemeColors) -> Self {
        Self { bindings, colors }
    }
}

impl<'a> Widget for BindingList<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Bindings ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.colors.accent));
        let inner = block.inner(area);
        block.render(area, buf);

        let header = format!("{:<10} {:<4} {:<8} {}", "button", "key", "color", "channel");
        buf.set_string(
            inner.x,
            inner.y,
            &header,
            Style::default().fg(self.colors.dim),
        );

        for (row, binding) in self.bindings.iter().enumerate() {
            let y = inner.y + 1 + row as u16;
            if y >= inner.y + inner.height {
                break;
            }
            let line = Line::from(vec![
                Span::styled(
                    format!("{:<10} ", binding.id),
                    Style::default().fg(self.colors.fg).add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!("{:<4} ", binding.key), Style::default().fg(self.colors.fg)),
                Span::styled(
                    format!("{:<8} ", binding.color.as_str()),
                    Style::default().fg(self.colors.button(binding.color)),
                ),
                Span::styled(binding.channel.to_string(), Style::default().fg(self.colors.fg)),
            ]);
            buf.set_line(inner.x, y, &line, inner.width);
        }
    }
}

/// Scrolling log pane; the newest lines stay visible
pub struct LogPanel<'a> {
    entries: &'a VecDeque<LogEntry>,
    colors: ThemeColors,
}

impl<'a> LogPanel<'a> {
    pub fn new(entries: &'a VecDeque<LogEntry>, colors: ThemeColors) -> Self {
        Self { entries, colors }
    }
}

impl<'a> Widget for LogPanel<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Log ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.colors.accent));
        let inner = block.inner(area);
        block.render(area, buf);

        let visible = inner.height as usize;
        let skip = self.entries.len().saturating_sub(visible);
        for (row, entry) in self.entries.iter().skip(skip).enumerate() {
            let line = Line::from(vec![
                Span::styled(
                    format!("{} ", entry.timestamp()),
                    Style::default().fg(self.colors.dim),
                ),
                Span::styled(entry.message.as_str(), Style::default().fg(self.colors.fg)),
            ]);
            buf.set_line(inner.x, inner.y + row as u16, &line, inner.width);
        }
    }
}

/// Widget for the help screen
pub struct HelpPanel {
    colors: ThemeColors,
}

impl HelpPanel {
    pub fn new(colors: ThemeColors) -> Self {
        Self { colors }
    }
}

impl Widget for HelpPanel {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Help - Button Simulator ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.colors.accent));
        let inner = block.inner(area);
        block.render(area, buf);

        let help_text = [
            "",
            " CONTROLS",
            " -----------",
            " Esc / Ctrl-C     : Quit (bindings are saved)",
            " F1               : Toggle this help",
            " F2               : Toggle dark/light theme",
            " F3               : Rebind a button (Tab next, Esc cancel)",
            "",
            " BUTTONS",
            " -----------",
            " Press a bound key anywhere to press its button.",
            " Hardware mode forwards each press and release to",
            " the native button library on the button's channel.",
            " Or from the command line: button-sim rebind <ID> <KEY>",
        ];

        for (i, line) in help_text.iter().enumerate() {
            if i as u16 >= inner.height {
                break;
            }
            let style = if line.contains("---") {
                Style::default().fg(self.colors.dim)
            } else if line.len() > 1 && line[1..].chars().all(|c| c.is_ascii_uppercase()) {
                Style::default().fg(self.colors.yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.colors.fg)
            };
            buf.set_string(inner.x, inner.y + i as u16, line, style);
        }
    }
}

/// Status bar widget
pub struct StatusBar<'a> {
    view: &'a str,
    elapsed: &'a str,
    ticks: Option<u64>,
    events: u64,
    message: Option<&'a str>,
    colors: ThemeColors,
}

impl<'a> StatusBar<'a> {
    pub fn new(view: &'a str, elapsed: &'a str, events: u64, colors: ThemeColors) -> Self {
        Self {
            view,
            elapsed,
            ticks: None,
            events,
            message: None,
            colors,
        }
    }

    pub fn ticks(mut self, ticks: Option<u64>) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn message(mut self, message: Option<&'a str>) -> Self {
        self.message = message;
        self
    }
}

impl<'a> Widget for StatusBar<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bg_style = Style::default().bg(self.colors.bar).fg(self.colors.fg);
        for x in area.x..area.x + area.width {
            buf.set_string(x, area.y, " ", bg_style);
        }

        let left = format!(" {} ", self.view);
        buf.set_string(area.x, area.y, &left, bg_style.add_modifier(Modifier::BOLD));

        if let Some(msg) = self.message {
            let msg_style = bg_style.fg(self.colors.yellow);
            let msg_x = area.x + (area.width / 2).saturating_sub(msg.len() as u16 / 2);
            buf.set_string(msg_x, area.y, msg, msg_style);
        }

        let ticks = match self.ticks {
            Some(ticks) => format!("Ticks: {} | ", ticks),
            None => String::new(),
        };
        let right = format!(" {} | {}Events: {} ", self.elapsed, ticks, self.events);
        let right_x = area.x + area.width.saturating_sub(right.len() as u16);
        buf.set_string(right_x, area.y, &right, bg_style);
    }
}
