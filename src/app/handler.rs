use crate::app::{Action, AppState, InputMode};
use crate::models::{ChallengeRef, PopupAction};
use crate::workspace::{NextOutcome, Route, WorkspaceController, WorkspaceError, WorkspaceEvent};
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

const SIDEBAR_MIN: u16 = 24;
const SIDEBAR_MAX: u16 = 80;

pub fn process_action(
    state: &mut AppState,
    action: Action,
    controller: &Arc<WorkspaceController>,
    action_tx: &mpsc::UnboundedSender<Action>,
) -> Result<()> {
    match action {
        Action::Quit => {
            state.should_quit = true;
        }
        Action::Tick => {
            state.tick_animation();
        }
        Action::Resize(w, h) => {
            state.terminal_size = (w, h);
        }

        // Modes
        Action::EnterFlagMode => {
            if state.has_challenge() {
                state.input_mode = InputMode::Flag;
            } else {
                state.notify_error(WorkspaceError::NoActiveChallenge.to_string());
            }
        }
        Action::EnterGotoMode => {
            state.goto_buffer.clear();
            state.input_mode = InputMode::Goto;
        }
        Action::EnterHelpMode => {
            state.input_mode = InputMode::Help;
        }
        Action::ExitMode => {
            state.input_mode = InputMode::Normal;
        }

        // Text input
        Action::InputChar(c) => match state.input_mode {
            InputMode::Flag => {
                let mut input = state.submission.input.clone();
                input.push(c);
                controller.set_input(&input);
            }
            InputMode::Goto => state.goto_buffer.push(c),
            _ => {}
        },
        Action::InputBackspace => match state.input_mode {
            InputMode::Flag => {
                let mut input = state.submission.input.clone();
                input.pop();
                controller.set_input(&input);
            }
            InputMode::Goto => {
                state.goto_buffer.pop();
            }
            _ => {}
        },
        Action::Paste(text) => match state.input_mode {
            InputMode::Flag => {
                let input = format!("{}{}", state.submission.input, text.trim());
                controller.set_input(&input);
            }
            InputMode::Goto => state.goto_buffer.push_str(text.trim()),
            _ => {}
        },
        Action::InputSubmit => match state.input_mode {
            InputMode::Flag => {
                spawn_op(controller, action_tx, |ctl| async move {
                    shown_in_popup(ctl.submit_input().await)
                });
            }
            InputMode::Goto => {
                let target = std::mem::take(&mut state.goto_buffer);
                state.input_mode = InputMode::Normal;
                match parse_target(&target) {
                    Some((challenge, practice)) => {
                        let _ = action_tx.send(Action::OpenChallenge(challenge, practice));
                    }
                    None => state.notify_error(format!("Not a challenge: {target}")),
                }
            }
            _ => {}
        },
        Action::InputClear => {
            if state.input_mode == InputMode::Flag {
                controller.clear_input();
            }
            state.goto_buffer.clear();
            state.input_mode = InputMode::Normal;
        }

        // Services
        Action::CycleService => {
            controller.select_service(state.active_service().next());
        }
        Action::SelectService(service) => {
            controller.select_service(service);
        }

        // Sandbox
        Action::OpenChallenge(challenge, practice) => {
            state.busy = Some("Starting");
            spawn_op(controller, action_tx, move |ctl| async move {
                ctl.open_challenge(&challenge, practice).await?;
                Ok(Some(format!("Started {challenge}")))
            });
        }
        Action::Restart => {
            if require_challenge(state) {
                state.busy = Some("Restarting");
                spawn_op(controller, action_tx, |ctl| async move {
                    ctl.restart(None).await?;
                    Ok(Some("Challenge restarted".to_string()))
                });
            }
        }
        Action::TogglePractice => {
            let Some(practice) = state.session.active_challenge.as_ref().map(|c| !c.practice) else {
                state.notify_error(WorkspaceError::NoActiveChallenge.to_string());
                return Ok(());
            };
            state.busy = Some("Restarting");
            spawn_op(controller, action_tx, move |ctl| async move {
                ctl.set_practice(practice).await?;
                let mode = if practice { "practice" } else { "normal" };
                Ok(Some(format!("Restarted in {mode} mode")))
            });
        }
        Action::NextChallenge => {
            state.busy = Some("Loading next challenge");
            spawn_op(controller, action_tx, |ctl| async move {
                Ok(Some(match ctl.next().await? {
                    NextOutcome::NoNext => "No next challenge in this module".to_string(),
                    NextOutcome::InPlace(target) | NextOutcome::Reloaded(target) => {
                        format!("Started {target}")
                    }
                }))
            });
        }
        Action::InitiateKill => {
            if require_challenge(state) {
                state.input_mode = InputMode::ConfirmKill;
            }
        }
        Action::ConfirmKill => {
            state.input_mode = InputMode::Normal;
            state.busy = Some("Terminating");
            spawn_op(controller, action_tx, |ctl| async move {
                ctl.terminate().await?;
                Ok(Some("Challenge terminated".to_string()))
            });
        }
        Action::ResetHome => {
            state.busy = Some("Resetting home");
            spawn_op(controller, action_tx, |ctl| async move {
                ctl.reset_home().await?;
                Ok(Some("Home directory reset".to_string()))
            });
        }

        // Clipboard
        Action::ToggleClipboard => {
            let enable = !controller.clipboard().is_enabled();
            match controller.set_clipboard_monitoring(enable) {
                Ok(()) if enable => state.notify("Watching the clipboard for flags"),
                Ok(()) => state.notify("Clipboard monitoring off"),
                Err(e) => state.notify_error(e.to_string()),
            }
        }
        Action::ClipboardCopied => {
            if controller.clipboard().is_enabled() {
                controller.on_copy();
            } else {
                state.notify_error("Clipboard monitoring is off (press c)");
            }
        }
        Action::FocusGained => {
            controller.on_focus_regained();
        }

        // Popup
        Action::Popup(PopupAction::NextChallenge) => {
            let _ = action_tx.send(Action::NextChallenge);
        }
        Action::Popup(popup_action) => {
            spawn_op(controller, action_tx, move |ctl| async move {
                shown_in_popup(ctl.popup_action(popup_action).await)
            });
        }

        // View
        Action::ToggleSidebar => {
            controller
                .store()
                .set_sidebar_collapsed(!state.session.sidebar_collapsed);
        }
        Action::ToggleFullScreen => {
            controller.store().set_full_screen(!state.session.full_screen);
        }
        Action::ToggleMinimized => {
            if state.session.minimized {
                if let Some(active) = &state.session.active_challenge {
                    controller.on_path_changed(&active.reference().workspace_path(), false);
                }
            } else if state.has_challenge() {
                controller.minimize();
            }
        }
        Action::CloseWorkspace => {
            if let Some(path) = controller.close() {
                debug!(path, "workspace closed");
            }
        }
        Action::ResizeSidebar(delta) => {
            let width = (state.session.sidebar_width as i32 + delta as i32)
                .clamp(SIDEBAR_MIN as i32, SIDEBAR_MAX as i32) as u16;
            controller.store().set_sidebar_width(width);
        }

        // Results from background work
        Action::Notice(text) => {
            state.busy = None;
            state.notify(text);
        }
        Action::Failed(text) => {
            state.busy = None;
            state.notify_error(text);
        }
        Action::OpFinished => {
            state.busy = None;
        }
        Action::Workspace(event) => match event {
            WorkspaceEvent::Solved(record) => {
                state.notify(format!("Solved {}", record.challenge));
            }
            WorkspaceEvent::Navigate { path, .. } if path == "/login" => {
                state.notify_error(format!("Log in at {}", controller.login_url()));
            }
            WorkspaceEvent::Navigate { path, reload } => {
                debug!(path, reload, "navigated");
            }
        },
    }

    state.sync(controller);
    Ok(())
}

fn require_challenge(state: &mut AppState) -> bool {
    if state.has_challenge() {
        return true;
    }
    state.notify_error(WorkspaceError::NoActiveChallenge.to_string());
    false
}

/// Submission outcomes already have a popup; only other failures go to the
/// status bar
fn shown_in_popup<T>(result: Result<T, WorkspaceError>) -> Result<Option<String>, WorkspaceError> {
    match result {
        Ok(_)
        | Err(WorkspaceError::Incorrect)
        | Err(WorkspaceError::AuthRequired)
        | Err(WorkspaceError::NoActiveChallenge)
        | Err(WorkspaceError::NetworkError(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Run a controller operation in the background and report back through the
/// action channel
fn spawn_op<F, Fut>(
    controller: &Arc<WorkspaceController>,
    action_tx: &mpsc::UnboundedSender<Action>,
    op: F,
) where
    F: FnOnce(Arc<WorkspaceController>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<String>, WorkspaceError>> + Send + 'static,
{
    let controller = Arc::clone(controller);
    let action_tx = action_tx.clone();
    tokio::spawn(async move {
        let action = match op(controller).await {
            Ok(Some(text)) => Action::Notice(text),
            Ok(None) => Action::OpFinished,
            Err(e) => Action::Failed(e.to_string()),
        };
        let _ = action_tx.send(action);
    });
}

/// Parse `dojo/module/challenge` or a full workspace path. A trailing
/// `practice` word (or `-p`) asks for practice mode.
pub fn parse_target(input: &str) -> Option<(ChallengeRef, bool)> {
    let mut words = input.split_whitespace();
    let target = words.next()?;
    let practice = words.any(|w| w == "practice" || w == "-p" || w == "--practice");

    if let Some(challenge) = Route::parse(target).challenge() {
        return Some((challenge, practice));
    }

    let parts: Vec<&str> = target.trim_matches('/').split('/').collect();
    match parts.as_slice() {
        [dojo, module, challenge] if !dojo.is_empty() && !module.is_empty() && !challenge.is_empty() => {
            Some((ChallengeRef::new(*dojo, *module, *challenge), practice))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_short_form() {
        assert_eq!(
            parse_target("intro/basics/hello"),
            Some((ChallengeRef::new("intro", "basics", "hello"), false))
        );
        assert_eq!(
            parse_target("intro/basics/hello practice"),
            Some((ChallengeRef::new("intro", "basics", "hello"), true))
        );
    }

    #[test]
    fn test_parse_target_workspace_path() {
        assert_eq!(
            parse_target("/dojo/intro/module/basics/workspace/challenge/hello -p"),
            Some((ChallengeRef::new("intro", "basics", "hello"), true))
        );
    }

    #[test]
    fn test_parse_target_rejects_partial() {
        assert_eq!(parse_target(""), None);
        assert_eq!(parse_target("intro/basics"), None);
        assert_eq!(parse_target("intro//hello"), None);
    }
}
