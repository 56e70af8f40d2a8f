use crate::app::{Action, AppState, InputMode};
use crate::models::Service;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Keys that work in any mode
fn check_global_keys(key: &KeyEvent) -> Option<Action> {
    // Ctrl+c / Ctrl+q - Quit
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q'))
    {
        return Some(Action::Quit);
    }
    // F1 - Help
    if key.code == KeyCode::F(1) {
        return Some(Action::EnterHelpMode);
    }
    None
}

pub(super) fn handle_key_event(key: KeyEvent, state: &AppState) -> Action {
    if let Some(action) = check_global_keys(&key) {
        return action;
    }

    match state.input_mode {
        InputMode::Help => {
            return match key.code {
                KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') | KeyCode::Enter => {
                    Action::ExitMode
                }
                _ => Action::Tick,
            };
        }
        InputMode::ConfirmKill => {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Action::ConfirmKill,
                _ => Action::ExitMode,
            };
        }
        InputMode::Flag | InputMode::Goto => {
            return match key.code {
                KeyCode::Esc => Action::InputClear,
                KeyCode::Enter => Action::InputSubmit,
                KeyCode::Backspace => Action::InputBackspace,
                KeyCode::Tab if state.input_mode == InputMode::Flag => Action::ExitMode,
                KeyCode::Char(c)
                    if !key.modifiers.contains(KeyModifiers::CONTROL)
                        && !key.modifiers.contains(KeyModifiers::ALT) =>
                {
                    Action::InputChar(c)
                }
                _ => Action::Tick,
            };
        }
        InputMode::Normal => {}
    }

    // A visible popup takes Enter and Esc
    let actions = state.popup.actions();
    match key.code {
        KeyCode::Enter => {
            if let Some(first) = actions.first() {
                return Action::Popup(*first);
            }
        }
        KeyCode::Esc => {
            if let Some(last) = actions.last() {
                return Action::Popup(*last);
            }
            if state.session.full_screen {
                return Action::ToggleFullScreen;
            }
        }
        _ => {}
    }

    match key.code {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Char('?') => Action::EnterHelpMode,
        KeyCode::Char('f') | KeyCode::Char('/') | KeyCode::Enter => Action::EnterFlagMode,
        KeyCode::Char('g') | KeyCode::Char('o') => Action::EnterGotoMode,
        KeyCode::Tab => Action::CycleService,
        KeyCode::Char('1') => Action::SelectService(Service::Terminal),
        KeyCode::Char('2') => Action::SelectService(Service::Code),
        KeyCode::Char('3') => Action::SelectService(Service::Desktop),
        KeyCode::Char('r') => Action::Restart,
        KeyCode::Char('p') => Action::TogglePractice,
        KeyCode::Char('n') => Action::NextChallenge,
        KeyCode::Char('K') => Action::InitiateKill,
        KeyCode::Char('H') => Action::ResetHome,
        KeyCode::Char('c') => Action::ToggleClipboard,
        KeyCode::Char('v') => Action::ClipboardCopied,
        KeyCode::Char('s') => Action::ToggleSidebar,
        KeyCode::Char('F') => Action::ToggleFullScreen,
        KeyCode::Char('m') => Action::ToggleMinimized,
        KeyCode::Char('x') => Action::CloseWorkspace,
        KeyCode::Char('[') => Action::ResizeSidebar(-2),
        KeyCode::Char(']') => Action::ResizeSidebar(2),
        _ => Action::Tick,
    }
}
