use crate::app::AppState;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

pub fn render(frame: &mut Frame, state: &AppState) {
    let full = frame.area();
    let width = 60.min(full.width);
    let area = Rect {
        x: full.x + (full.width.saturating_sub(width)) / 2,
        y: full.y + full.height / 3,
        width,
        height: 3.min(full.height),
    };

    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Open challenge ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let line = Line::from(vec![
        Span::styled(state.goto_buffer.clone(), Style::default().fg(Color::White)),
        Span::styled("_", Style::default().fg(Color::Green)),
    ]);
    frame.render_widget(Paragraph::new(line).block(block), area);
}
