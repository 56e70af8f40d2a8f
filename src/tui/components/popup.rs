use crate::app::AppState;
use crate::models::{FeedbackStatus, PopupAction, PopupState, SubmissionResult};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

const WIDTH: u16 = 52;
const HEIGHT: u16 = 8;

/// Bottom-right toast for whichever popup shape is showing
pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
    let (title, color, mut lines) = match &state.popup {
        PopupState::None => return,
        PopupState::ClipboardDetection { flag } => (
            "Flag Detected".to_string(),
            Color::Cyan,
            vec![
                Line::from("A flag was copied to the clipboard:"),
                Line::from(Span::styled(
                    flag.clone(),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                )),
            ],
        ),
        PopupState::SubmissionResult { flag, result } => (
            result.title().to_string(),
            result_color(*result),
            vec![
                Line::from(result.message()),
                Line::from(Span::styled(flag.clone(), Style::default().fg(Color::DarkGray))),
            ],
        ),
        PopupState::RegularFeedback {
            status,
            message,
            result,
        } => {
            let color = match (status, result) {
                (_, Some(result)) => result_color(*result),
                (FeedbackStatus::Success, None) => Color::Green,
                (FeedbackStatus::Error, None) => Color::Red,
            };
            let title = match result {
                Some(result) => result.title(),
                None => "Submission Failed",
            };
            (title.to_string(), color, vec![Line::from(message.clone())])
        }
    };

    lines.push(Line::from(""));
    lines.push(actions_line(&state.popup.actions()));

    let width = WIDTH.min(area.width);
    let height = HEIGHT.min(area.height);
    let popup_area = Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y + area.height.saturating_sub(height + 1),
        width,
        height,
    };

    frame.render_widget(Clear, popup_area);
    let block = Block::default()
        .title(format!(" {title} "))
        .title_alignment(Alignment::Left)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color).add_modifier(Modifier::BOLD));
    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, popup_area);
}

fn result_color(result: SubmissionResult) -> Color {
    match result {
        SubmissionResult::FreshSuccess => Color::Green,
        SubmissionResult::AlreadySolved => Color::Blue,
        SubmissionResult::Incorrect => Color::Red,
        SubmissionResult::AuthRequired => Color::Yellow,
    }
}

fn action_label(action: PopupAction) -> &'static str {
    match action {
        PopupAction::Submit => "Submit",
        PopupAction::Dismiss => "Dismiss",
        PopupAction::NextChallenge => "Next Challenge",
        PopupAction::LogIn => "Log In",
        PopupAction::Close => "Close",
    }
}

/// First action on Enter, last on Esc
fn actions_line(actions: &[PopupAction]) -> Line<'static> {
    let mut spans = Vec::new();
    for (idx, action) in actions.iter().enumerate() {
        let key = if idx == 0 { "Enter" } else { "Esc" };
        if idx > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(
            format!("[{key}]"),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(format!(" {}", action_label(*action))));
    }
    Line::from(spans)
}
