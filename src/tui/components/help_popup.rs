use super::centered_rect;
use crate::app::AppState;
use ratatui::{
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "Challenge",
        &[
            ("g", "Open a challenge (dojo/module/challenge)"),
            ("r", "Restart the sandbox"),
            ("p", "Toggle practice mode (restarts)"),
            ("n", "Next challenge"),
            ("K", "Terminate the sandbox"),
            ("H", "Reset home directory"),
        ],
    ),
    (
        "Workspace",
        &[
            ("Tab, 1-3", "Switch service (Terminal, Code, Desktop)"),
            ("m", "Minimize / restore"),
            ("x", "Close workspace (sandbox keeps running)"),
            ("s", "Toggle sidebar"),
            ("[ ]", "Sidebar width"),
            ("F", "Full screen"),
        ],
    ),
    (
        "Flags",
        &[
            ("f, /", "Type a flag (submits once complete)"),
            ("Enter", "Submit now / popup primary action"),
            ("Esc", "Clear input / dismiss popup"),
            ("c", "Toggle clipboard monitoring"),
            ("v", "Just copied a flag: check the clipboard now"),
        ],
    ),
    (
        "General",
        &[("?", "Show this help"), ("q, Ctrl+C", "Quit")],
    ),
];

pub fn render(frame: &mut Frame, _state: &AppState) {
    let area = centered_rect(60, 70, frame.area());

    // Clear the background
    frame.render_widget(Clear, area);

    let key_style = Style::default().fg(Color::Cyan);
    let heading = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let mut help_text = vec![
        Line::from(Span::styled(
            "Dojo Workbench",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    for (title, keys) in SECTIONS {
        help_text.push(Line::from(Span::styled(*title, heading)));
        for (key, description) in *keys {
            help_text.push(Line::from(vec![
                Span::styled(format!("  {key:<11}"), key_style),
                Span::raw(*description),
            ]));
        }
        help_text.push(Line::from(""));
    }
    help_text.push(Line::from(Span::styled(
        "Press Esc or ? to close",
        Style::default().fg(Color::DarkGray),
    )));

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));

    let paragraph = Paragraph::new(help_text)
        .block(block)
        .alignment(Alignment::Left);

    frame.render_widget(paragraph, area);
}
