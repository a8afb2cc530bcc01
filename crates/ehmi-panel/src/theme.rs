//! SilkCircuit Neon palette and semantic styling for the panel.
//!
//! The served dashboard may override background and foreground; every
//! semantic style is derived from a [`Theme`] so the overrides reach all
//! of them.

use std::str::FromStr;

use ratatui::style::{Color, Modifier, Style};
use tracing::warn;

// ── Core Palette ──────────────────────────────────────────────────────

pub const ELECTRIC_PURPLE: Color = Color::Rgb(225, 53, 255); // #e135ff
pub const NEON_CYAN: Color = Color::Rgb(128, 255, 234); // #80ffea
pub const ELECTRIC_YELLOW: Color = Color::Rgb(241, 250, 140); // #f1fa8c
pub const SUCCESS_GREEN: Color = Color::Rgb(80, 250, 123); // #50fa7b
pub const ERROR_RED: Color = Color::Rgb(255, 99, 99); // #ff6363

// ── Extended Palette ──────────────────────────────────────────────────

pub const DIM_WHITE: Color = Color::Rgb(189, 193, 207); // #bdc1cf
pub const BORDER_GRAY: Color = Color::Rgb(98, 114, 164); // #6272a4
pub const BG_HIGHLIGHT: Color = Color::Rgb(40, 42, 54); // #282a36

/// Panel colors after applying overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// `None` keeps the terminal's own background.
    pub bg: Option<Color>,
    pub fg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            bg: None,
            fg: DIM_WHITE,
        }
    }
}

#[allow(clippy::unused_self)]
impl Theme {
    /// Apply `bg` / `fg` overrides: color names (`"black"`, `"lightblue"`),
    /// `#rrggbb`, or an indexed color. Unparseable values are ignored.
    pub fn with_overrides(bg: Option<&str>, fg: Option<&str>) -> Self {
        let mut theme = Self::default();
        if let Some(bg) = bg.and_then(|s| parse_color("bg", s)) {
            theme.bg = Some(bg);
        }
        if let Some(fg) = fg.and_then(|s| parse_color("fg", s)) {
            theme.fg = fg;
        }
        theme
    }

    // ── Semantic Styles ───────────────────────────────────────────────

    /// Base style for the whole panel.
    pub fn base(&self) -> Style {
        let style = Style::default().fg(self.fg);
        match self.bg {
            Some(bg) => style.bg(bg),
            None => style,
        }
    }

    /// Title text for blocks/panels.
    pub fn title(&self) -> Style {
        Style::default().fg(NEON_CYAN).add_modifier(Modifier::BOLD)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(ELECTRIC_PURPLE)
    }

    /// Entry label text.
    pub fn label(&self) -> Style {
        Style::default().fg(self.fg)
    }

    /// Selected entry marker and label.
    pub fn selected(&self) -> Style {
        Style::default()
            .fg(ELECTRIC_PURPLE)
            .bg(BG_HIGHLIGHT)
            .add_modifier(Modifier::BOLD)
    }

    /// Anything that ignores input right now.
    pub fn disabled(&self) -> Style {
        Style::default().fg(BORDER_GRAY).add_modifier(Modifier::DIM)
    }

    pub fn switch_on(&self) -> Style {
        Style::default()
            .fg(SUCCESS_GREEN)
            .add_modifier(Modifier::BOLD)
    }

    pub fn switch_off(&self) -> Style {
        Style::default().fg(self.fg)
    }

    /// Button glyphs (`[Run]`, `[Apply]`).
    pub fn button(&self) -> Style {
        Style::default().fg(NEON_CYAN)
    }

    /// Value field holding text that has not been applied yet.
    pub fn field_changed(&self) -> Style {
        Style::default()
            .fg(ELECTRIC_YELLOW)
            .add_modifier(Modifier::ITALIC)
    }

    pub fn field(&self) -> Style {
        Style::default().fg(self.fg).add_modifier(Modifier::UNDERLINED)
    }

    pub fn error(&self) -> Style {
        Style::default().fg(ERROR_RED).add_modifier(Modifier::BOLD)
    }

    /// Key hint text (e.g., "q quit").
    pub fn key_hint(&self) -> Style {
        Style::default().fg(BORDER_GRAY)
    }
}

fn parse_color(which: &str, raw: &str) -> Option<Color> {
    match Color::from_str(raw.trim()) {
        Ok(color) => Some(color),
        Err(_) => {
            warn!(which, value = raw, "ignoring unrecognized color");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_no_overrides_keeps_palette() {
        assert_eq!(Theme::with_overrides(None, None), Theme::default());
    }

    #[test]
    fn test_named_and_hex_overrides() {
        let theme = Theme::with_overrides(Some("black"), Some("#e135ff"));
        assert_eq!(theme.bg, Some(Color::Black));
        assert_eq!(theme.fg, ELECTRIC_PURPLE);
        assert_eq!(theme.base().bg, Some(Color::Black));
    }

    #[test]
    fn test_bad_override_is_ignored() {
        let theme = Theme::with_overrides(Some("not-a-color"), Some("white"));
        assert_eq!(theme.bg, None);
        assert_eq!(theme.fg, Color::White);
    }
}
