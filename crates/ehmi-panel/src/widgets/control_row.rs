//! One dashboard entry rendered as a single line.
//!
//! ```text
//! ▸ Main pump        [ ON ]
//!   Setpoint         [42  ] [Apply]
//!   Flush            [Run]
//! ```

use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};

use ehmi_core::{Control, ControlKind};

use crate::theme::Theme;

/// Label column width, in cells.
pub const LABEL_WIDTH: usize = 24;

const SWITCH_ON: &str = "[ ON ]";
const SWITCH_OFF: &str = "[OFF ]";
const RUN: &str = "[Run]";
const APPLY: &str = "[Apply]";

/// Build the line for `control`.
///
/// `cursor` is the char position of the edit cursor when the entry is
/// selected and editable.
pub fn control_row(
    control: &Control,
    selected: bool,
    cursor: Option<usize>,
    theme: &Theme,
) -> Line<'static> {
    let disabled = control.is_disabled();
    let dim = |style: Style| if disabled { theme.disabled() } else { style };

    let marker = if selected { "▸ " } else { "  " };
    let label_style = if selected {
        theme.selected()
    } else {
        dim(theme.label())
    };

    let mut spans = vec![
        Span::styled(marker, label_style),
        Span::styled(pad(control.label(), LABEL_WIDTH), label_style),
        Span::raw(" "),
    ];

    match control.kind() {
        ControlKind::Toggle => {
            let (glyph, style) = if control.is_checked() {
                (SWITCH_ON, theme.switch_on())
            } else {
                (SWITCH_OFF, theme.switch_off())
            };
            spans.push(Span::styled(glyph, dim(style)));
        }
        ControlKind::Macro => spans.push(Span::styled(RUN, dim(theme.button()))),
        ControlKind::ValueInput { width } => {
            let field_style = dim(if control.is_dirty() {
                theme.field_changed()
            } else {
                theme.field()
            });
            spans.push(Span::styled("[", dim(theme.label())));
            spans.extend(field_spans(
                control.field(),
                usize::from(width),
                cursor.filter(|_| !disabled),
                field_style,
            ));
            spans.push(Span::styled("] ", dim(theme.label())));
            spans.push(Span::styled(APPLY, dim(theme.button())));
        }
    }

    Line::from(spans)
}

/// The visible window of `text`, `width` cells wide, scrolled so the
/// cursor stays in view. The cursor cell is reversed.
fn field_spans(
    text: &str,
    width: usize,
    cursor: Option<usize>,
    style: Style,
) -> Vec<Span<'static>> {
    let width = width.max(1);
    let chars: Vec<char> = text.chars().collect();

    let Some(cursor) = cursor else {
        let shown: String = chars.iter().take(width).collect();
        return vec![Span::styled(pad(&shown, width), style)];
    };

    let cursor = cursor.min(chars.len());
    let scroll = (cursor + 1).saturating_sub(width);
    let window: Vec<char> = chars.iter().skip(scroll).take(width).copied().collect();
    let at = cursor - scroll;

    let before: String = window.iter().take(at).collect();
    let under = window.get(at).copied().unwrap_or(' ');
    let after: String = window.iter().skip(at + 1).collect();
    // +1 for the cursor cell itself
    let used = before.chars().count() + 1 + after.chars().count();
    let fill = " ".repeat(width.saturating_sub(used));

    vec![
        Span::styled(before, style),
        Span::styled(under.to_string(), style.add_modifier(Modifier::REVERSED)),
        Span::styled(format!("{after}{fill}"), style),
    ]
}

/// Left-align `text` in `width` chars, truncating with an ellipsis.
fn pad(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count > width {
        let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    } else {
        format!("{text:<width$}")
    }
}
