use crate::app::AppState;
use crate::models::Service;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default()
        .title(" Challenge ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let Some(active) = &state.session.active_challenge else {
        frame.render_widget(block, area);
        return;
    };

    let label = Style::default().fg(Color::Gray);
    let mut lines = vec![
        Line::from(Span::styled(
            active.challenge_name.clone(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("Dojo    ", label),
            Span::raw(active.dojo_name.clone()),
        ]),
        Line::from(vec![
            Span::styled("Module  ", label),
            Span::raw(active.module_name.clone()),
        ]),
        Line::from(""),
    ];

    let (mode, mode_style) = if active.practice {
        ("practice", Style::default().fg(Color::Yellow))
    } else {
        ("normal", Style::default().fg(Color::Green))
    };
    lines.push(Line::from(vec![
        Span::styled("Mode    ", label),
        Span::styled(mode, mode_style),
    ]));

    let sandbox = if active.is_starting {
        Span::styled(
            format!("{} starting", state.spinner()),
            Style::default().fg(Color::Yellow),
        )
    } else {
        Span::styled("running", Style::default().fg(Color::Green))
    };
    lines.push(Line::from(vec![Span::styled("Sandbox ", label), sandbox]));

    if let Some(resource) = &state.session.active_resource {
        lines.push(Line::from(vec![
            Span::styled("Resource ", label),
            Span::raw(resource.clone()),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Services",
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )));
    for (idx, service) in Service::ALL.iter().enumerate() {
        let selected = *service == state.active_service();
        let marker = if selected { "▸" } else { " " };
        let style = if selected {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::from(vec![
            Span::styled(format!(" {marker} {} ", idx + 1), Style::default().fg(Color::DarkGray)),
            Span::styled(service.display_name(), style),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Solved here ", label),
        Span::styled(
            state.solved_in_module.to_string(),
            Style::default().fg(Color::Green),
        ),
        Span::styled(format!("  ({} this session)", state.solved_total), label),
    ]));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}
