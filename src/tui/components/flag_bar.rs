use crate::app::{AppState, InputMode};
use crate::workspace::SubmitPhase;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
    let editing = state.input_mode == InputMode::Flag;
    let view = &state.submission;

    let border = match view.phase {
        SubmitPhase::Submitting => Color::Yellow,
        SubmitPhase::Success => Color::Green,
        SubmitPhase::Error => Color::Red,
        SubmitPhase::Idle if editing => Color::Cyan,
        SubmitPhase::Idle => Color::DarkGray,
    };

    let mut title = vec![Span::raw(" Flag ")];
    if !view.message.is_empty() {
        title.push(Span::styled(
            format!("{} ", view.message),
            Style::default().fg(border).add_modifier(Modifier::BOLD),
        ));
    }

    let block = Block::default()
        .title(Line::from(title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));

    let content = if view.phase == SubmitPhase::Submitting {
        Line::from(Span::styled(
            format!("{} submitting {}", state.spinner(), view.input),
            Style::default().fg(Color::Yellow),
        ))
    } else if view.input.is_empty() && !editing {
        Line::from(Span::styled(
            "pwn.college{...}  (press f to type a flag)",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let cursor = if editing { "_" } else { "" };
        Line::from(vec![
            Span::styled(view.input.clone(), Style::default().fg(Color::White)),
            Span::styled(cursor, Style::default().fg(Color::Cyan)),
        ])
    };

    frame.render_widget(Paragraph::new(content).block(block), area);
}
