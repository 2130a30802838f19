//! Replay view rendering.
//!
//! Shows the history load state, the playback controls, and the point under
//! the replay cursor for the selected device.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::dashboard::HistoryState;
use crate::engine::{ReplayState, Speed};
use crate::ui::common::format_metric;

/// Number of history points listed around the cursor.
const WINDOW: usize = 5;

/// Render the Replay view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::vertical([
        Constraint::Length(4), // Controls
        Constraint::Length(3), // Progress
        Constraint::Min(3),    // Points
    ])
    .split(area);

    render_controls(frame, app, chunks[0]);
    render_progress(frame, app, chunks[1]);
    render_points(frame, app, chunks[2]);
}

fn render_controls(frame: &mut Frame, app: &App, area: Rect) {
    let selected = app.dashboard.selected();
    let history = app.dashboard.history();
    let replay = app.dashboard.replay();

    let history_style = match history {
        HistoryState::Failed(_) => Style::default().fg(app.theme.critical),
        HistoryState::Loading => Style::default().fg(app.theme.warning),
        HistoryState::Loaded { .. } => Style::default().fg(app.theme.healthy),
        HistoryState::Idle => Style::default().add_modifier(Modifier::DIM),
    };

    let (state, speed) = match replay {
        Some(engine) => (engine.state(), engine.speed()),
        None => (ReplayState::Stopped, Speed::default()),
    };
    let state_style = match state {
        ReplayState::Playing => Style::default().fg(app.theme.replay).add_modifier(Modifier::BOLD),
        ReplayState::Paused => Style::default().fg(app.theme.warning),
        ReplayState::Stopped => Style::default().add_modifier(Modifier::DIM),
    };

    let speeds: Vec<Span> = Speed::ALL
        .iter()
        .flat_map(|s| {
            let style = if *s == speed {
                app.theme.tab_active
            } else {
                app.theme.tab_inactive
            };
            [Span::styled(format!(" {} ", s), style), Span::raw(" ")]
        })
        .collect();

    let mut speed_line = vec![Span::raw(" Speed: ")];
    speed_line.extend(speeds);

    let lines = vec![
        Line::from(vec![
            Span::raw(" Device: "),
            Span::styled(
                selected.unwrap_or_else(|| "-".to_string()),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("   History: "),
            Span::styled(history.label(), history_style),
            Span::raw("   State: "),
            Span::styled(state.label(), state_style),
        ]),
        Line::from(speed_line),
    ];

    let block = Block::default()
        .title(" Replay ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_progress(frame: &mut Frame, app: &App, area: Rect) {
    let (ratio, label) = match app.dashboard.replay() {
        Some(engine) if !engine.session().is_empty() => {
            let session = engine.session();
            (
                session.progress().clamp(0.0, 1.0),
                format!("{}/{}", session.index + 1, session.len()),
            )
        }
        _ => (0.0, "no points".to_string()),
    };

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .gauge_style(Style::default().fg(app.theme.replay))
        .ratio(ratio)
        .label(label);

    frame.render_widget(gauge, area);
}

fn render_points(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Points ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let Some(engine) = app.dashboard.replay() else {
        let hint = if app.dashboard.selected().is_some() {
            "  No history loaded (r to reload)"
        } else {
            "  Select a device in the Fleet view"
        };
        let empty = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(hint, Style::default().add_modifier(Modifier::DIM))),
        ])
        .block(block);
        frame.render_widget(empty, area);
        return;
    };

    let session = engine.session();
    let points = session.points();
    let end = (session.index + WINDOW + 1).min(points.len());
    let start = session.index.saturating_sub(WINDOW).min(end);

    let header = Row::new(vec![
        Cell::from("#"),
        Cell::from("ts"),
        Cell::from("Lat"),
        Cell::from("Lng"),
        Cell::from("Battery"),
        Cell::from("Signal"),
        Cell::from("Temp"),
    ])
    .style(app.theme.header);

    let rows: Vec<Row> = points[start..end]
        .iter()
        .enumerate()
        .map(|(offset, p)| {
            Row::new(vec![
                Cell::from(format!("{}", start + offset + 1)),
                Cell::from(p.ts.map(|ts| format!("{:.0}", ts)).unwrap_or_else(|| "-".to_string())),
                Cell::from(format!("{:.5}", p.lat)),
                Cell::from(format!("{:.5}", p.lng)),
                Cell::from(format_metric(p.battery, 0, "%")),
                Cell::from(format_metric(p.rssi, 0, " dBm")),
                Cell::from(format_metric(p.temp, 1, "°C")),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(6),
        Constraint::Fill(2),
        Constraint::Fill(2),
        Constraint::Fill(2),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Fill(1),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    if end > start {
        state.select(Some(session.index.saturating_sub(start)));
    }

    frame.render_stateful_widget(table, area, &mut state);
}
