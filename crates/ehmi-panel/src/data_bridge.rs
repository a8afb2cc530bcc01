//! Data bridge — connects a [`Session`] to TUI actions.
//!
//! Runs as a background task: connects the session, hands the built
//! dashboard to the app loop, then forwards every state, connection
//! transition and login failure as an [`Action`]. A server-side reload
//! request tears the session down and builds a fresh dashboard.

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ehmi_core::{Session, SessionEvent};

use crate::action::Action;

/// What ended one forwarding round.
enum Outcome {
    Reload,
    Stop,
}

/// Spawn the data bridge connecting [`Session`] events to the TUI.
///
/// Subscribes before connecting so the initial state load is not missed.
/// A failed connect is reported as [`Action::Fatal`] and ends the bridge.
pub async fn spawn_data_bridge(
    session: Session,
    action_tx: mpsc::UnboundedSender<Action>,
    cancel: CancellationToken,
) {
    loop {
        let mut events = session.events();

        let connected = tokio::select! {
            () = cancel.cancelled() => break,
            result = session.connect() => result,
        };

        match connected {
            Ok(dashboard) => {
                let _ = action_tx.send(Action::DashboardReady(Box::new(dashboard)));
            }
            Err(e) => {
                warn!(error = %e, "failed to start session");
                let _ = action_tx.send(Action::Fatal(e.to_string()));
                return;
            }
        }

        let outcome = forward(&mut events, &action_tx, &cancel).await;
        session.disconnect().await;

        match outcome {
            Outcome::Reload => info!("reload requested, rebuilding dashboard"),
            Outcome::Stop => break,
        }
    }

    session.disconnect().await;
    debug!("data bridge shut down");
}

/// Forward session events until cancelled, closed, or asked to reload.
async fn forward(
    events: &mut broadcast::Receiver<SessionEvent>,
    action_tx: &mpsc::UnboundedSender<Action>,
    cancel: &CancellationToken,
) -> Outcome {
    loop {
        let event = tokio::select! {
            biased;

            () = cancel.cancelled() => return Outcome::Stop,
            event = events.recv() => event,
        };

        let action = match event {
            Ok(SessionEvent::State(state)) => Action::StateReceived(state),
            Ok(SessionEvent::Connection(state)) => Action::ConnectionChanged(state),
            Ok(SessionEvent::LoginFailed(message)) => {
                Action::Fatal(format!("Login failed: {message}"))
            }
            Ok(SessionEvent::Reload) => return Outcome::Reload,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "panel fell behind the session, states dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return Outcome::Stop,
        };

        if action_tx.send(action).is_err() {
            return Outcome::Stop;
        }
    }
}
