use crate::app::{AppState, InputMode};
use crate::workspace::MonitorPhase;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

fn badge(text: &str, bg: Color) -> Span<'static> {
    Span::styled(
        format!(" {text} "),
        Style::default()
            .fg(Color::Black)
            .bg(bg)
            .add_modifier(Modifier::BOLD),
    )
}

pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
    let hint = Style::default().fg(Color::Gray);

    let (left_text, right_text) = match state.input_mode {
        InputMode::ConfirmKill => (
            vec![
                Span::styled(
                    " TERMINATE? ",
                    Style::default()
                        .fg(Color::White)
                        .bg(Color::Red)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
                Span::styled(
                    "Stop the running sandbox?",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
            ],
            vec![
                Span::styled("Press ", hint),
                Span::styled("[y]", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
                Span::styled(" to confirm, any other key to cancel", hint),
            ],
        ),
        InputMode::Help => (
            vec![badge("HELP", Color::Yellow)],
            vec![Span::styled("Press Esc or ? to close", hint)],
        ),
        InputMode::Flag => (
            vec![badge("FLAG", Color::Magenta)],
            vec![Span::styled("Enter=Submit  Esc=Clear  Tab=Leave", hint)],
        ),
        InputMode::Goto => (
            vec![badge("OPEN", Color::Green)],
            vec![Span::styled("dojo/module/challenge [practice]  Enter=Open  Esc=Cancel", hint)],
        ),
        InputMode::Normal => (normal_left(state), normal_right(state)),
    };

    let left_len: usize = left_text.iter().map(|s| s.content.chars().count()).sum();
    let right_len: usize = right_text.iter().map(|s| s.content.chars().count()).sum();
    let padding = area.width.saturating_sub(left_len as u16 + right_len as u16 + 1);

    let mut spans = left_text;
    spans.push(Span::raw(" ".repeat(padding as usize)));
    spans.extend(right_text);
    spans.push(Span::raw(" "));

    let paragraph = Paragraph::new(Line::from(spans))
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(paragraph, area);
}

fn normal_left(state: &AppState) -> Vec<Span<'static>> {
    let mut spans = Vec::new();

    if let Some(notice) = &state.notice {
        let color = if notice.is_error { Color::Red } else { Color::Green };
        spans.push(badge(if notice.is_error { "ERROR" } else { "OK" }, color));
        spans.push(Span::raw(format!(" {}", notice.text)));
        return spans;
    }

    if let Some(busy) = state.busy {
        spans.push(badge(busy, Color::Yellow));
        spans.push(Span::raw(format!(" {}", state.spinner())));
        return spans;
    }

    match &state.session.active_challenge {
        Some(active) => {
            spans.push(badge(state.active_service().display_name(), Color::Cyan));
            spans.push(Span::raw(format!(" {}", active.display_name())));
            if active.practice {
                spans.push(Span::styled(" [practice]", Style::default().fg(Color::Yellow)));
            }
        }
        None => spans.push(badge("DOJO", Color::Cyan)),
    }
    spans
}

fn normal_right(state: &AppState) -> Vec<Span<'static>> {
    let clipboard_color = match state.clipboard_phase {
        MonitorPhase::Monitoring => Color::Green,
        MonitorPhase::RequestingPermission => Color::Yellow,
        MonitorPhase::Disabled => Color::Gray,
    };
    vec![
        Span::styled("clipboard ", Style::default().fg(Color::Gray)),
        Span::styled(state.clipboard_phase.label(), Style::default().fg(clipboard_color)),
        Span::styled("  ?=Help", Style::default().fg(Color::Gray)),
    ]
}
