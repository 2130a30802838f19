//! Fleet view rendering.
//!
//! Displays the filtered device list with activity, age, and last-known
//! readings. Rows follow the fleet ordering: active devices first, then
//! most recently seen.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::data::duration::format_age;
use crate::data::DeviceState;
use crate::ui::common::{format_coordinates, format_metric};

/// Render the Fleet view showing every visible device in a table.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let view = app.dashboard.view();
    let now_ms = app.dashboard.now_ms();
    let thresholds = app.dashboard.config();

    let header = Row::new(vec![
        Cell::from(" "),
        Cell::from("Device"),
        Cell::from("Status"),
        Cell::from("Seen"),
        Cell::from("Battery"),
        Cell::from("Signal"),
        Cell::from("Temp"),
        Cell::from("Position"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = view
        .devices
        .iter()
        .map(|d| {
            let selected = view.selected.as_deref() == Some(d.device_id.as_str());
            let battery_style = match (d.last.battery, thresholds.battery_low) {
                (Some(v), Some(t)) if v < t => Style::default().fg(app.theme.critical),
                _ => Style::default(),
            };
            let rssi_style = match (d.last.rssi, thresholds.rssi_low) {
                (Some(v), Some(t)) if v < t => Style::default().fg(app.theme.warning),
                _ => Style::default(),
            };
            let temp_style = match (d.last.temp, thresholds.temp_high) {
                (Some(v), Some(t)) if v > t => Style::default().fg(app.theme.warning),
                _ => Style::default(),
            };

            let name_style = if selected {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(if selected { "●" } else { " " })
                    .style(Style::default().fg(app.theme.highlight)),
                Cell::from(d.device_id.clone()).style(name_style),
                Cell::from(status_label(d)).style(app.theme.activity_style(d.active)),
                Cell::from(format_age(d.seen_ago(now_ms))),
                Cell::from(format_metric(d.last.battery, 0, "%")).style(battery_style),
                Cell::from(format_metric(d.last.rssi, 0, " dBm")).style(rssi_style),
                Cell::from(format_metric(d.last.temp, 1, "°C")).style(temp_style),
                Cell::from(format_coordinates(d.last.lat, d.last.lng)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(1),
        Constraint::Fill(3),
        Constraint::Min(8),
        Constraint::Min(6),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Fill(2),
    ];

    let cursor = app.cursor.min(view.devices.len().saturating_sub(1));

    let filter_info = if app.filter_active {
        format!(" /{}_", app.filter_text)
    } else if !app.filter_text.is_empty() {
        format!(" /{}/ [c:clear]", app.filter_text)
    } else {
        String::new()
    };

    let position_info = if !view.devices.is_empty() {
        format!(" [{}/{}]", cursor + 1, view.devices.len())
    } else {
        String::new()
    };

    let title = format!(
        " Devices ({}/{}){}{} ",
        view.devices.len(),
        view.total,
        filter_info,
        position_info
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    if !view.devices.is_empty() {
        state.select(Some(cursor));
    }

    frame.render_stateful_widget(table, area, &mut state);
}

fn status_label(device: &DeviceState) -> &'static str {
    if device.active {
        "Active"
    } else {
        "Inactive"
    }
}
