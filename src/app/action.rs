use crate::models::{ChallengeRef, PopupAction, Service};
use crate::workspace::WorkspaceEvent;

#[derive(Debug, Clone)]
pub enum Action {
    // Modes
    EnterFlagMode,
    EnterGotoMode,
    EnterHelpMode,
    ExitMode,

    // Text input (flag or goto, depending on mode)
    InputChar(char),
    InputBackspace,
    InputSubmit,
    InputClear,
    Paste(String),

    // Services
    CycleService,
    SelectService(Service),

    // Sandbox
    OpenChallenge(ChallengeRef, bool),
    Restart,
    TogglePractice,
    NextChallenge,
    InitiateKill, // first 'K' press
    ConfirmKill,  // 'y' after 'K'
    ResetHome,

    // Clipboard
    ToggleClipboard,
    ClipboardCopied, // 'v': something was just copied elsewhere
    FocusGained,

    // Popup
    Popup(PopupAction),

    // View
    ToggleSidebar,
    ToggleFullScreen,
    ToggleMinimized,
    CloseWorkspace,
    ResizeSidebar(i16),

    // Results from background work
    Notice(String),
    Failed(String),
    OpFinished,
    Workspace(WorkspaceEvent),

    // App control
    Quit,
    Tick,
    Resize(u16, u16),
}
