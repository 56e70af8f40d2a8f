use crate::app::{Action, AppState};
use crate::tui;
use crate::tui::event::EventHandler;
use crate::workspace::WorkspaceController;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use super::handler::process_action;

pub async fn run_tui(controller: Arc<WorkspaceController>) -> Result<()> {
    // Pick up whatever sandbox is already running before the first frame
    controller.startup().await;

    let mut terminal = tui::init()?;

    let mut state = AppState::new(controller.settings().server.host.clone());
    let size = terminal.size()?;
    state.terminal_size = (size.width, size.height);
    state.sync(&controller);

    let mut events = EventHandler::new();
    let action_tx = events.action_sender();
    forward_workspace_events(&controller, action_tx.clone());

    let result = run_main_loop(&mut terminal, &mut state, &mut events, &controller, action_tx).await;

    controller.clipboard().stop();
    tui::restore()?;

    result
}

async fn run_main_loop(
    terminal: &mut tui::Terminal,
    state: &mut AppState,
    events: &mut EventHandler,
    controller: &Arc<WorkspaceController>,
    action_tx: mpsc::UnboundedSender<Action>,
) -> Result<()> {
    loop {
        terminal.draw(|frame| tui::ui::draw(frame, state))?;

        let action = events.next(state).await?;
        process_action(state, action, controller, &action_tx)?;

        if state.should_quit {
            break;
        }
    }

    Ok(())
}

/// Relay solves and navigation requests into the action loop
fn forward_workspace_events(controller: &WorkspaceController, action_tx: mpsc::UnboundedSender<Action>) {
    let mut rx = controller.subscribe_events();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if action_tx.send(Action::Workspace(event)).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "dropped workspace events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
