//! Application core — event loop, action dispatch, status line.

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use ehmi_core::{ConnectionState, Session};

use crate::action::Action;
use crate::component::Component;
use crate::event::{TermEvent, TermInput};
use crate::screens::panel::PanelScreen;
use crate::theme::{self, Theme};
use crate::tui::Tui;

/// Top-level application state and event loop.
pub struct App {
    panel: PanelScreen,
    running: bool,
    connection: ConnectionState,
    theme: Theme,
    /// Service URL shown in the status line.
    endpoint: String,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
    session: Session,
    /// Cancellation token for the data bridge task.
    data_cancel: CancellationToken,
}

impl App {
    pub fn new(session: Session, theme: Theme) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let endpoint = session.config().url.to_string();

        Self {
            panel: PanelScreen::new(),
            running: true,
            connection: ConnectionState::Disconnected,
            theme,
            endpoint,
            action_tx,
            action_rx,
            session,
            data_cancel: CancellationToken::new(),
        }
    }

    /// Run the main event loop.
    ///
    /// Frames are drawn only after something changed: a key press, a
    /// session update, or a repaint request from the terminal.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::enter()?;

        let bridge = {
            let session = self.session.clone();
            let cancel = self.data_cancel.clone();
            let tx = self.action_tx.clone();
            tokio::spawn(async move {
                crate::data_bridge::spawn_data_bridge(session, tx, cancel).await;
            })
        };

        let mut input = TermInput::spawn();
        let mut stale = true;

        info!("panel event loop started");

        while self.running {
            if stale {
                tui.draw(|frame| self.render(frame))?;
                stale = false;
            }

            tokio::select! {
                event = input.next() => match event {
                    Some(TermEvent::Key(key)) => {
                        if let Some(action) = self.handle_key_event(key)? {
                            self.action_tx.send(action)?;
                        }
                        // cursor moves and field edits happen in the panel itself
                        stale = true;
                    }
                    Some(TermEvent::Repaint) => stale = true,
                    None => break,
                },
                Some(action) = self.action_rx.recv() => {
                    self.process_action(action)?;
                    stale = true;
                }
            }

            // A state burst becomes one frame
            while let Ok(action) = self.action_rx.try_recv() {
                self.process_action(action)?;
                stale = true;
            }
        }

        self.data_cancel.cancel();
        let _ = bridge.await;
        drop(input);
        info!("panel event loop ended");
        Ok(())
    }

    /// Ctrl-C always quits; everything else belongs to the panel.
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(Some(Action::Quit));
        }
        self.panel.handle_key_event(key)
    }

    fn process_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Quit => self.running = false,

            Action::ConnectionChanged(state) => {
                debug!(?state, "connection state changed");
                self.connection = state;
            }

            other => {
                if let Some(follow_up) = self.panel.update(other)? {
                    self.action_tx.send(follow_up)?;
                }
            }
        }
        Ok(())
    }

    fn render(&self, frame: &mut Frame) {
        let [content, status] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(frame.area());

        self.panel.render(frame, content, &self.theme);
        self.render_status_bar(frame, status);
    }

    /// Bottom status line: connection indicator, endpoint and key hints.
    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let indicator = match &self.connection {
            ConnectionState::Connected => {
                Span::styled("● connected", Style::default().fg(theme::SUCCESS_GREEN))
            }
            ConnectionState::Disconnected => {
                Span::styled("○ disconnected", Style::default().fg(theme::ERROR_RED))
            }
            ConnectionState::Failed => {
                Span::styled("✕ failed", Style::default().fg(theme::ERROR_RED))
            }
            ConnectionState::Connecting => {
                Span::styled("◐ connecting", Style::default().fg(theme::ELECTRIC_YELLOW))
            }
            ConnectionState::Reconnecting { attempt } => Span::styled(
                format!("◐ reconnecting ({attempt})"),
                Style::default().fg(theme::ELECTRIC_YELLOW),
            ),
        };

        let line = Line::from(vec![
            Span::raw(" "),
            indicator,
            Span::styled(format!(" │ {}", self.endpoint), self.theme.key_hint()),
            Span::styled(
                " │ j/k move  space/enter press  q quit",
                self.theme.key_hint(),
            ),
        ]);

        frame.render_widget(Paragraph::new(line).style(self.theme.base()), area);
    }
}
