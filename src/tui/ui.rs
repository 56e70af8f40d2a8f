use crate::app::{AppState, InputMode};
use crate::tui::components::{
    flag_bar, goto_dialog, help_popup, popup, sidebar, status_bar, workspace_pane,
};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

pub fn draw(frame: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());
    let main_area = chunks[0];
    let status_area = chunks[1];

    let show_sidebar =
        state.has_challenge() && !state.session.full_screen && !state.session.sidebar_collapsed;

    let content_area = if show_sidebar {
        let horizontal = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(state.session.sidebar_width),
                Constraint::Min(20),
            ])
            .split(main_area);
        sidebar::render(frame, horizontal[0], state);
        horizontal[1]
    } else {
        main_area
    };

    // Flag input sits under the service view unless full screen
    if state.workspace_open() && !state.session.full_screen {
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(content_area);
        workspace_pane::render(frame, vertical[0], state);
        flag_bar::render(frame, vertical[1], state);
    } else {
        workspace_pane::render(frame, content_area, state);
    }

    status_bar::render(frame, status_area, state);

    // Overlays
    popup::render(frame, main_area, state);
    match state.input_mode {
        InputMode::Help => help_popup::render(frame, state),
        InputMode::Goto => goto_dialog::render(frame, state),
        InputMode::Normal | InputMode::Flag | InputMode::ConfirmKill => {}
    }
}
