use crate::app::AppState;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// The embedded service view: what the iframe would show, as status text
pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
    let service = state.active_service();
    let title = format!(" {} ", service.display_name());
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let lines = if !state.has_challenge() {
        empty_lines(state)
    } else if state.session.minimized {
        minimized_lines(state)
    } else {
        service_lines(state)
    };

    let paragraph = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn empty_lines(state: &AppState) -> Vec<Line<'static>> {
    vec![
        Line::from(""),
        Line::from(Span::styled(
            "No active challenge",
            Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::raw("Press "),
            Span::styled("g", Style::default().fg(Color::Cyan)),
            Span::raw(" to open one, "),
            Span::styled("?", Style::default().fg(Color::Cyan)),
            Span::raw(" for help"),
        ]),
        Line::from(Span::styled(
            format!("Connected to {}", state.host),
            Style::default().fg(Color::DarkGray),
        )),
    ]
}

fn minimized_lines(state: &AppState) -> Vec<Line<'static>> {
    let name = state
        .session
        .active_challenge
        .as_ref()
        .map(|c| c.display_name())
        .unwrap_or_default();
    vec![
        Line::from(""),
        Line::from(Span::styled(
            "Workspace minimized",
            Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
        )),
        Line::from(name),
        Line::from(""),
        Line::from(vec![
            Span::raw("The sandbox keeps running. Press "),
            Span::styled("m", Style::default().fg(Color::Cyan)),
            Span::raw(" to restore"),
        ]),
        Line::from(Span::styled(
            state.location.clone(),
            Style::default().fg(Color::DarkGray),
        )),
    ]
}

fn service_lines(state: &AppState) -> Vec<Line<'static>> {
    let service = state.active_service();
    let readiness = &state.readiness;
    let mut lines = vec![Line::from("")];

    if let Some(error) = state.workspace.error.as_ref().or(readiness.error.as_ref()) {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::raw("Press "),
            Span::styled("r", Style::default().fg(Color::Cyan)),
            Span::raw(" to restart the challenge"),
        ]));
        return lines;
    }

    if state.workspace.locating {
        lines.push(Line::from(Span::styled(
            format!("{} Waiting for the dojo to assign a {} URL", state.spinner(), service.display_name()),
            Style::default().fg(Color::Yellow),
        )));
        return lines;
    }

    if readiness.ready && !state.session.is_starting() {
        lines.push(Line::from(Span::styled(
            format!("{} is ready", service.display_name()),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )));
        if let Some(url) = &readiness.url {
            lines.push(Line::from(Span::styled(
                url.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
            )));
        }
        if readiness.fallback {
            lines.push(Line::from(Span::styled(
                "(not confirmed: the service could not be reached directly)",
                Style::default().fg(Color::DarkGray),
            )));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::raw("Open the URL in a browser, or press "),
            Span::styled("f", Style::default().fg(Color::Cyan)),
            Span::raw(" to submit a flag"),
        ]));
        return lines;
    }

    lines.push(Line::from(Span::styled(
        format!("{} {}", state.spinner(), service.loading_hint()),
        Style::default().fg(Color::Yellow),
    )));
    if readiness.attempt > 0 {
        lines.push(Line::from(Span::styled(
            format!("attempt {}", readiness.attempt),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}
