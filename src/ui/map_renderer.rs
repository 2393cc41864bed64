use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use crate::app::App;
use crate::logging;
use crate::robot::TaskState;
use crate::station::CurrentState;
use crate::world::{PerceivedGrid, Tile};

/// Grid on the left; status, battery and logs stacked on the right.
pub fn render_app(frame: &mut Frame, area: Rect, app: &App) {
    let grid_width = app.state.perceived.size() as u16 * 2 + 3;
    let [map_area, side_area] =
        Layout::horizontal([Constraint::Length(grid_width), Constraint::Min(30)]).areas(area);
    let [status_area, battery_area, log_area] = Layout::vertical([
        Constraint::Length(8),
        Constraint::Length(3),
        Constraint::Min(5),
    ])
    .areas(side_area);

    render_map(frame, map_area, &app.state.perceived);
    frame.render_widget(status_widget(&app.state, &app.last_message), status_area);
    frame.render_widget(battery_widget(&app.state, app.battery_capacity()), battery_area);
    frame.render_widget(logging::create_log_widget(), log_area);
}

pub fn render_map(frame: &mut Frame, area: Rect, grid: &PerceivedGrid) {
    let lines: Vec<Line<'static>> = grid.rows().map(create_styled_line).collect();
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Perceived map"),
    );
    frame.render_widget(paragraph, area);
}

fn create_styled_line(row: &[Tile]) -> Line<'static> {
    let spans: Vec<Span> = row
        .iter()
        .flat_map(|&tile| [create_styled_span(tile), Span::raw(" ")])
        .collect();
    Line::from(spans)
}

fn create_styled_span(tile: Tile) -> Span<'static> {
    let style = match tile {
        Tile::Unknown => Style::default().fg(Color::DarkGray),
        Tile::Dirty => Style::default().fg(Color::Yellow),
        Tile::Clean => Style::default().fg(Color::Green),
        Tile::Obstacle => Style::default().fg(Color::Gray),
        Tile::Robot => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
        Tile::Unreachable => Style::default().fg(Color::Red),
    };
    Span::styled(tile.as_char().to_string(), style)
}

fn status_widget(state: &CurrentState, message: &str) -> Paragraph<'static> {
    let power = if state.is_on { "on" } else { "off" };
    let lines = vec![
        Line::from(format!("Power: {}   Task: {}", power, state.task)),
        Line::from(format!("Position: {}", state.position)),
        Line::from(format!("Cleaned cells: {}", state.cleaned)),
        Line::from(format!("Moves since charge: {}", state.moves_since_charge)),
        Line::from(Span::styled(
            message.to_string(),
            Style::default().add_modifier(Modifier::ITALIC),
        )),
        Line::from("[s] start/stop  [q] quit"),
    ];
    Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Robot"))
}

fn battery_widget(state: &CurrentState, capacity: u32) -> Gauge<'static> {
    let ratio = if capacity == 0 {
        0.0
    } else {
        (f64::from(state.battery) / f64::from(capacity)).clamp(0.0, 1.0)
    };
    let color = match state.task {
        TaskState::Recharging => Color::Yellow,
        TaskState::Stopped => Color::DarkGray,
        _ => Color::Green,
    };
    Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Battery"))
        .gauge_style(Style::default().fg(color))
        .ratio(ratio)
        .label(format!("{}/{}", state.battery, capacity))
}
