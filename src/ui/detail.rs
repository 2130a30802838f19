//! Detail overlay rendering.
//!
//! Displays a modal overlay for the selected device: the current position
//! output, active alerts, and the live metric trends.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

use crate::app::App;
use crate::data::duration::format_age;
use crate::data::{Metric, Origin};
use crate::ui::common::{centered, format_coordinates, format_metric, render_sparkline};

/// Minimum width required for the detail overlay to render properly.
const MIN_OVERLAY_WIDTH: u16 = 50;
/// Minimum height required for the detail overlay to render properly.
const MIN_OVERLAY_HEIGHT: u16 = 16;

/// Width of each trend sparkline.
const SPARKLINE_WIDTH: usize = 30;

/// Render the selected device as a modal overlay.
pub fn render_overlay(frame: &mut Frame, app: &App, area: Rect) {
    // Skip rendering if terminal is too small for the overlay
    if area.width < MIN_OVERLAY_WIDTH || area.height < MIN_OVERLAY_HEIGHT {
        return;
    }

    let Some(device) = app.dashboard.fleet().selected_device() else {
        return;
    };
    let position = app.dashboard.position();
    let alerts = app.dashboard.alerts();
    let trail = app.dashboard.trail();
    let now_ms = app.dashboard.now_ms();

    let overlay_width = (area.width * 80 / 100).clamp(MIN_OVERLAY_WIDTH, 90);
    let overlay_height = (area.height * 80 / 100).clamp(MIN_OVERLAY_HEIGHT, 30);
    let overlay_area = centered(area, overlay_width, overlay_height);

    frame.render_widget(Clear, overlay_area);

    let chunks = Layout::vertical([
        Constraint::Length(7), // Device and position
        Constraint::Length(5), // Alerts
        Constraint::Min(5),    // Trends
        Constraint::Length(1), // Footer
    ])
    .split(overlay_area);

    // ===== HEADER SECTION =====
    let source = match position.as_ref().map(|p| p.origin) {
        Some(Origin::Replay { index }) => Span::styled(
            format!("replay #{}", index + 1),
            Style::default().fg(app.theme.replay),
        ),
        Some(Origin::Live) => Span::styled("live", Style::default().fg(app.theme.healthy)),
        None => Span::styled("none", Style::default().add_modifier(Modifier::DIM)),
    };

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let header_lines = vec![
        Line::from(vec![
            Span::styled(format!(" {} ", device.device_id), bold),
            Span::styled(
                if device.active { "Active" } else { "Inactive" },
                app.theme.activity_style(device.active),
            ),
            Span::raw(format!("  seen {} ago", format_age(device.seen_ago(now_ms)))),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::raw(" Position: "),
            Span::styled(
                format_coordinates(
                    position.as_ref().and_then(|p| p.lat),
                    position.as_ref().and_then(|p| p.lng),
                ),
                bold,
            ),
            Span::raw("  ("),
            source,
            Span::raw(")"),
        ]),
        Line::from(vec![
            Span::raw(" Battery: "),
            Span::styled(format_metric(position.as_ref().and_then(|p| p.battery), 0, "%"), bold),
            Span::raw("    Signal: "),
            Span::styled(format_metric(position.as_ref().and_then(|p| p.rssi), 0, " dBm"), bold),
            Span::raw("    Temp: "),
            Span::styled(format_metric(position.as_ref().and_then(|p| p.temp), 1, "°C"), bold),
        ]),
        Line::from(vec![
            Span::raw(" Sample ts: "),
            Span::raw(
                position
                    .as_ref()
                    .and_then(|p| p.ts)
                    .map(|ts| format!("{:.0}", ts))
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]),
    ];

    let header_block = Block::default()
        .title(" Device Detail ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    frame.render_widget(Paragraph::new(header_lines).block(header_block), chunks[0]);

    // ===== ALERTS =====
    let alerts_block = Block::default()
        .title(format!(" Alerts ({}) ", alerts.len()))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let alert_lines: Vec<Line> = if alerts.is_empty() {
        vec![Line::from(Span::styled(
            "  All readings within thresholds",
            Style::default().add_modifier(Modifier::DIM),
        ))]
    } else {
        alerts
            .iter()
            .map(|a| {
                Line::from(vec![
                    Span::styled(format!(" {:<5}", a.level.symbol()), app.theme.alert_style(a.level)),
                    Span::raw(a.message.clone()),
                ])
            })
            .collect()
    };
    frame.render_widget(Paragraph::new(alert_lines).block(alerts_block), chunks[1]);

    // ===== TRENDS =====
    let trend_rows: Vec<Row> = [
        ("Battery", Metric::Battery, 0, "%"),
        ("Signal", Metric::Rssi, 0, " dBm"),
        ("Temp", Metric::Temp, 1, "°C"),
    ]
    .into_iter()
    .map(|(label, metric, precision, unit)| {
        let series = trail.series(metric);
        Row::new(vec![
            Cell::from(label),
            Cell::from(render_sparkline(&trail.sparkline(metric), SPARKLINE_WIDTH)),
            Cell::from(format_metric(series.back().copied(), precision, unit)),
        ])
    })
    .collect();

    let trends = Table::new(
        trend_rows,
        [
            Constraint::Length(8),
            Constraint::Length(SPARKLINE_WIDTH as u16 + 1),
            Constraint::Fill(1),
        ],
    )
    .block(
        Block::default()
            .title(format!(" Trends (track: {} points) ", trail.points.len()))
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(app.theme.border)),
    );
    frame.render_widget(trends, chunks[2]);

    // ===== FOOTER =====
    let footer = Paragraph::new(Line::from(vec![Span::styled(
        " Press Esc to close ",
        Style::default().add_modifier(Modifier::DIM),
    )]));
    frame.render_widget(footer, chunks[3]);
}
