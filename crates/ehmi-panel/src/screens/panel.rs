//! The control panel: every visible dashboard entry, one per line.
//!
//! Owns the [`Dashboard`] once the session delivers it. Selection moves
//! among visible entries only; the selected value entry keeps a
//! [`tui_input::Input`] in sync with its field for cursor editing.

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
};
use tracing::debug;
use tui_input::{Input, InputRequest};

use ehmi_core::{Control, ControlId, ControlKind, Dashboard};

use crate::action::Action;
use crate::component::Component;
use crate::theme::Theme;
use crate::widgets::control_row::control_row;

#[derive(Default)]
pub struct PanelScreen {
    dashboard: Option<Dashboard>,
    /// Selected control, always a visible one when set.
    selected: Option<ControlId>,
    /// Edit buffer for the selected value entry.
    input: Input,
    fatal: Option<String>,
}

impl PanelScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dashboard(&self) -> Option<&Dashboard> {
        self.dashboard.as_ref()
    }

    pub fn selected(&self) -> Option<ControlId> {
        self.selected
    }

    pub fn fatal(&self) -> Option<&str> {
        self.fatal.as_deref()
    }

    fn visible_ids(&self) -> Vec<ControlId> {
        self.dashboard
            .as_ref()
            .map(|d| d.visible().map(Control::id).collect())
            .unwrap_or_default()
    }

    /// Keep the selection on a visible entry. Entries only ever become
    /// visible, so this mostly fills in a missing selection.
    fn fix_selection(&mut self) {
        let visible = self.visible_ids();
        if self.selected.is_some_and(|id| visible.contains(&id)) {
            return;
        }
        self.select(visible.first().copied());
    }

    fn select(&mut self, id: Option<ControlId>) {
        self.selected = id;
        self.sync_input();
    }

    /// Reload the edit buffer from the selected control's field.
    fn sync_input(&mut self) {
        let field = self.selected_control().map(|c| c.field().to_owned());
        self.input = Input::new(field.unwrap_or_default());
    }

    fn selected_control(&self) -> Option<&Control> {
        let id = self.selected?;
        self.dashboard.as_ref()?.control(id)
    }

    fn selected_is_value(&self) -> bool {
        self.selected_control()
            .is_some_and(|c| matches!(c.kind(), ControlKind::ValueInput { .. }))
    }

    fn move_selection(&mut self, forward: bool) {
        let visible = self.visible_ids();
        if visible.is_empty() {
            return;
        }
        let current = self
            .selected
            .and_then(|id| visible.iter().position(|v| *v == id));
        let next = match (current, forward) {
            (None, _) => 0,
            (Some(i), true) => (i + 1).min(visible.len() - 1),
            (Some(i), false) => i.saturating_sub(1),
        };
        self.select(visible.get(next).copied());
    }

    fn press_selected(&mut self) {
        let (Some(id), Some(dashboard)) = (self.selected, self.dashboard.as_mut()) else {
            return;
        };
        if dashboard.press(id).is_none() {
            debug!(control = id.0, "press ignored");
        }
    }

    /// Feed an edit to the buffer and mirror it into the control.
    fn edit_selected(&mut self, request: InputRequest) {
        let (Some(id), Some(dashboard)) = (self.selected, self.dashboard.as_mut()) else {
            return;
        };
        if dashboard.control(id).is_some_and(Control::is_disabled) {
            return;
        }
        // Cursor moves stay in the buffer; only text changes reach the control.
        let text_changed = self.input.handle(request).is_some_and(|c| c.value);
        if text_changed && !dashboard.edit(id, self.input.value()) {
            self.sync_input();
        }
    }

    fn render_fatal(frame: &mut Frame, area: Rect, theme: &Theme, message: &str) {
        let block = Block::default()
            .title(" Error ")
            .title_style(theme.error())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme.error())
            .style(theme.base());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [_, middle, _] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(3),
            Constraint::Fill(1),
        ])
        .areas(inner);
        frame.render_widget(
            Paragraph::new(Span::styled(message.to_owned(), theme.error()))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            middle,
        );
    }
}

impl Component for PanelScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.fatal.is_some() || self.dashboard.is_none() {
            return Ok(match key.code {
                KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
                _ => None,
            });
        }

        let editing = self.selected_is_value();
        match key.code {
            KeyCode::Esc => return Ok(Some(Action::Quit)),
            KeyCode::Char('q') if !editing => return Ok(Some(Action::Quit)),
            KeyCode::Down => self.move_selection(true),
            KeyCode::Up => self.move_selection(false),
            KeyCode::Char('j') if !editing => self.move_selection(true),
            KeyCode::Char('k') if !editing => self.move_selection(false),
            KeyCode::Enter => self.press_selected(),
            KeyCode::Char(' ') if !editing => self.press_selected(),

            // ── Field editing ──
            KeyCode::Backspace if editing => self.edit_selected(InputRequest::DeletePrevChar),
            KeyCode::Delete if editing => self.edit_selected(InputRequest::DeleteNextChar),
            KeyCode::Left if editing => self.edit_selected(InputRequest::GoToPrevChar),
            KeyCode::Right if editing => self.edit_selected(InputRequest::GoToNextChar),
            KeyCode::Home if editing => self.edit_selected(InputRequest::GoToStart),
            KeyCode::End if editing => self.edit_selected(InputRequest::GoToEnd),
            KeyCode::Char(c) if editing && !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.edit_selected(InputRequest::InsertChar(c));
            }
            _ => {}
        }
        Ok(None)
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        match action {
            Action::DashboardReady(dashboard) => {
                self.dashboard = Some(*dashboard);
                self.selected = None;
                self.fix_selection();
            }
            Action::StateReceived(state) => {
                let Some(dashboard) = self.dashboard.as_mut() else {
                    return Ok(None);
                };
                if dashboard.notify(&state) {
                    self.fix_selection();
                    // A notification may have rewritten the selected field.
                    let field = self.selected_control().map(Control::field);
                    if field.is_some_and(|f| f != self.input.value()) {
                        self.sync_input();
                    }
                }
            }
            Action::Fatal(message) => self.fatal = Some(message),
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        if let Some(message) = &self.fatal {
            Self::render_fatal(frame, area, theme, message);
            return;
        }

        let block = Block::default()
            .title(" EVA ICS HMI ")
            .title_style(theme.title())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme.border())
            .style(theme.base());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(dashboard) = &self.dashboard else {
            frame.render_widget(
                Paragraph::new(Span::styled("Loading dashboard…", theme.key_hint()))
                    .alignment(Alignment::Center),
                inner,
            );
            return;
        };

        let lines: Vec<Line> = dashboard
            .visible()
            .map(|control| {
                let selected = self.selected == Some(control.id());
                let cursor = (selected
                    && matches!(control.kind(), ControlKind::ValueInput { .. }))
                .then(|| self.input.cursor());
                control_row(control, selected, cursor, theme)
            })
            .collect();

        // Keep the selected row on screen.
        let row = self
            .selected
            .and_then(|id| dashboard.visible().position(|c| c.id() == id))
            .unwrap_or(0);
        let height = usize::from(inner.height.max(1));
        let scroll = u16::try_from(row.saturating_sub(height - 1)).unwrap_or(u16::MAX);

        frame.render_widget(Paragraph::new(lines).scroll((scroll, 0)), inner);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::future::BoxFuture;
    use serde_json::{Value, json};

    use ehmi_core::{
        ActionDispatcher, CoreError, DashboardConfig, Oid, RemoteActions, RemoteState, WatchSet,
    };

    use super::*;

    /// Records every outbound action.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl RemoteActions for Recorder {
        fn run<'a>(&'a self, oid: &'a Oid) -> BoxFuture<'a, Result<(), CoreError>> {
            self.calls.lock().unwrap().push(format!("run {oid}"));
            Box::pin(async { Ok(()) })
        }

        fn toggle<'a>(&'a self, oid: &'a Oid) -> BoxFuture<'a, Result<(), CoreError>> {
            self.calls.lock().unwrap().push(format!("toggle {oid}"));
            Box::pin(async { Ok(()) })
        }

        fn set_value<'a>(
            &'a self,
            oid: &'a Oid,
            value: Value,
        ) -> BoxFuture<'a, Result<(), CoreError>> {
            self.calls.lock().unwrap().push(format!("set {oid} {value}"));
            Box::pin(async { Ok(()) })
        }
    }

    fn screen(config: &Value) -> (PanelScreen, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = ActionDispatcher::new(Arc::clone(&recorder) as Arc<dyn RemoteActions>);
        let config = DashboardConfig::from_json(config).unwrap();
        let dashboard = Dashboard::build(&config, dispatcher, &mut |_: WatchSet| {}).unwrap();

        let mut screen = PanelScreen::new();
        screen
            .update(Action::DashboardReady(Box::new(dashboard)))
            .unwrap();
        (screen, recorder)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn notify(screen: &mut PanelScreen, oid: &str, status: i64, value: Value) {
        let state = RemoteState::new(oid, status, value, 0);
        screen.update(Action::StateReceived(Arc::new(state))).unwrap();
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_only_macro_selectable_before_notifications() {
        let (mut screen, _) = screen(&json!({
            "button": [{ "oid": "unit:a/1" }, { "oid": "lmacro:ops/go" }]
        }));
        assert_eq!(screen.selected(), Some(ControlId(1)));

        notify(&mut screen, "unit:a/1", 1, json!(0));
        // Selection stays put; the new entry is reachable upward.
        assert_eq!(screen.selected(), Some(ControlId(1)));
        screen.handle_key_event(key(KeyCode::Char('k'))).unwrap();
        assert_eq!(screen.selected(), Some(ControlId(0)));
    }

    #[tokio::test]
    async fn test_space_toggles_and_disables_until_notified() {
        let (mut screen, recorder) = screen(&json!({ "button": { "oid": "unit:a/1" } }));
        notify(&mut screen, "unit:a/1", 1, json!(0));
        assert_eq!(screen.selected(), Some(ControlId(0)));

        screen.handle_key_event(key(KeyCode::Char(' '))).unwrap();
        screen.handle_key_event(key(KeyCode::Char(' '))).unwrap();
        settle().await;
        assert_eq!(*recorder.calls.lock().unwrap(), vec!["toggle unit:a/1"]);

        let control = screen.dashboard().unwrap().control(ControlId(0)).unwrap();
        assert!(control.is_disabled());

        notify(&mut screen, "unit:a/1", 1, json!(1));
        let control = screen.dashboard().unwrap().control(ControlId(0)).unwrap();
        assert!(!control.is_disabled());
        assert!(control.is_checked());
    }

    #[tokio::test]
    async fn test_typing_edits_field_and_enter_applies() {
        let (mut screen, recorder) = screen(&json!({
            "button": { "oid": "unit:v/1", "kind": "value" }
        }));
        notify(&mut screen, "unit:v/1", 1, json!(42));

        screen.handle_key_event(key(KeyCode::Backspace)).unwrap();
        screen.handle_key_event(key(KeyCode::Backspace)).unwrap();
        screen.handle_key_event(key(KeyCode::Char('q'))).unwrap();
        screen.handle_key_event(key(KeyCode::Char('7'))).unwrap();
        let control = screen.dashboard().unwrap().control(ControlId(0)).unwrap();
        assert_eq!(control.field(), "q7");
        assert!(control.is_dirty());

        screen.handle_key_event(key(KeyCode::Enter)).unwrap();
        settle().await;
        assert_eq!(*recorder.calls.lock().unwrap(), vec![r#"set unit:v/1 "q7""#]);

        let control = screen.dashboard().unwrap().control(ControlId(0)).unwrap();
        assert!(control.is_disabled());
        assert!(!control.is_dirty());
    }

    #[tokio::test]
    async fn test_notification_refreshes_selected_field() {
        let (mut screen, _) = screen(&json!({
            "button": { "oid": "unit:v/1", "kind": "value" }
        }));
        notify(&mut screen, "unit:v/1", 1, json!(1));
        notify(&mut screen, "unit:v/1", 1, json!(3.5));
        assert_eq!(screen.input.value(), "3.5");
        assert_eq!(screen.input.cursor(), 3);
    }

    #[test]
    fn test_quit_keys() {
        let mut screen = PanelScreen::new();
        assert!(matches!(
            screen.handle_key_event(key(KeyCode::Char('q'))).unwrap(),
            Some(Action::Quit)
        ));
        assert!(matches!(
            screen.handle_key_event(key(KeyCode::Esc)).unwrap(),
            Some(Action::Quit)
        ));
    }

    #[test]
    fn test_fatal_replaces_panel() {
        let mut screen = PanelScreen::new();
        screen
            .update(Action::Fatal("Login failed: access denied".into()))
            .unwrap();
        assert_eq!(screen.fatal(), Some("Login failed: access denied"));
    }
}
