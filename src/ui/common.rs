//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, status bar, and help overlay,
//! plus the small formatters every view uses.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, View};
use crate::source::ConnectionStatus;

/// Sparkline characters (8 levels of height).
const SPARKLINE_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render the header bar with the fleet overview.
///
/// Displays: connection indicator, active/inactive counts, current alerts.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let view = app.dashboard.view();
    let alerts = app.dashboard.alerts();

    let status = app.connection_status();
    let status_style = match status {
        ConnectionStatus::Connected => Style::default().fg(app.theme.healthy),
        ConnectionStatus::Connecting => Style::default().fg(app.theme.warning),
        ConnectionStatus::Disconnected => Style::default().fg(app.theme.critical),
    };

    let worst = alerts.iter().map(|a| a.level).max();
    let alert_span = match worst {
        Some(level) => Span::styled(
            format!("{} alert{}", alerts.len(), if alerts.len() == 1 { "" } else { "s" }),
            app.theme.alert_style(level),
        ),
        None => Span::styled("no alerts", Style::default().add_modifier(Modifier::DIM)),
    };

    let line = Line::from(vec![
        Span::styled(" ● ", status_style),
        Span::styled("FLEETWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(status.label(), status_style),
        Span::raw(" │ "),
        Span::styled(format!("{}", view.active), Style::default().fg(app.theme.healthy)),
        Span::raw(" active "),
        if view.inactive() > 0 {
            Span::styled(format!("{}", view.inactive()), Style::default().fg(app.theme.muted))
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        },
        Span::raw(" inactive │ "),
        Span::styled(format!("{}", view.total), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" devices │ "),
        alert_span,
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

/// Render the tab bar showing available views.
///
/// Highlights the currently active view.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = vec![Line::from(" 1:Fleet "), Line::from(" 2:Replay ")];

    let selected = match app.current_view {
        View::Fleet => 0,
        View::Replay => 1,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows: source, time since last record, available controls.
/// Also displays temporary status messages and errors.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = if app.filter_active {
        "Type to search | Enter:apply Esc:cancel"
    } else {
        match app.current_view {
            View::Fleet => "/:search ↑↓:move Enter:select Tab:switch ?:help q:quit",
            View::Replay => "Space:play/pause x:stop +/-:speed r:reload Tab:switch ?:help q:quit",
        }
    };

    let status = if let Some(err) = app.source_error() {
        format!(" {} | Error: {} | {}", app.source_description(), err, controls)
    } else if let Some(err) = app.settings_error() {
        format!(" Settings: {} | {}", err, controls)
    } else if let Some(last) = app.last_update {
        format!(
            " {} | {} received | Updated {:.1}s ago | {}",
            app.source_description(),
            app.received,
            last.elapsed().as_secs_f64(),
            controls,
        )
    } else {
        format!(" {} | Waiting for telemetry... | {}", app.source_description(), controls)
    };

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));

    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let section = |title: &'static str| {
        Line::from(vec![Span::styled(title, Style::default().add_modifier(Modifier::BOLD))])
    };

    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        section(" Navigation"),
        Line::from("  Tab/1/2     Switch views"),
        Line::from("  ↑/↓ j/k     Move cursor"),
        Line::from("  PgUp/PgDn   Jump 10 devices"),
        Line::from("  Home/End    Jump to first/last"),
        Line::from("  Enter       Select device, show detail"),
        Line::from("  Esc         Go back"),
        Line::from(""),
        section(" Fleet"),
        Line::from("  /         Search device ids"),
        Line::from("  c         Clear search"),
        Line::from(""),
        section(" Replay"),
        Line::from("  Space     Play / pause"),
        Line::from("  x         Stop (rewind)"),
        Line::from("  + / -     Faster / slower"),
        Line::from("  r         Reload history"),
        Line::from(""),
        section(" General"),
        Line::from("  ?         Toggle help"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay - responsive to terminal size
    let help_width = 44u16.min(area.width.saturating_sub(4));
    let help_height = 28u16.min(area.height.saturating_sub(2));
    let help_area = centered(area, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}

/// A `width` x `height` rectangle centered in `area`.
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

/// Format an optional reading, or "-" when absent.
pub fn format_metric(value: Option<f64>, precision: usize, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.*}{}", precision, v, unit),
        None => "-".to_string(),
    }
}

/// Format a coordinate pair, or "-" when there is no fix yet.
pub fn format_coordinates(lat: Option<f64>, lng: Option<f64>) -> String {
    match (lat, lng) {
        (Some(lat), Some(lng)) => format!("{:.5}, {:.5}", lat, lng),
        _ => "-".to_string(),
    }
}

/// Render the last `width` sparkline levels as bar characters.
pub fn render_sparkline(data: &[u8], width: usize) -> String {
    if data.is_empty() {
        return " ".repeat(width);
    }
    let skip = data.len().saturating_sub(width);
    data[skip..]
        .iter()
        .map(|&v| SPARKLINE_CHARS[v.min(7) as usize])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_metric() {
        assert_eq!(format_metric(Some(87.25), 0, "%"), "87%");
        assert_eq!(format_metric(Some(-95.0), 0, " dBm"), "-95 dBm");
        assert_eq!(format_metric(Some(41.26), 1, "°C"), "41.3°C");
        assert_eq!(format_metric(None, 1, "°C"), "-");
    }

    #[test]
    fn test_format_coordinates() {
        assert_eq!(format_coordinates(Some(14.69), Some(-17.44)), "14.69000, -17.44000");
        assert_eq!(format_coordinates(Some(14.69), None), "-");
    }

    #[test]
    fn test_render_sparkline_keeps_latest() {
        assert_eq!(render_sparkline(&[], 3), "   ");
        assert_eq!(render_sparkline(&[0, 7, 3], 8), "▁█▄");
        assert_eq!(render_sparkline(&[0, 1, 2, 3], 2), "▃▄");
    }

    #[test]
    fn test_centered() {
        let area = Rect::new(0, 0, 100, 40);
        assert_eq!(centered(area, 40, 20), Rect::new(30, 10, 40, 20));
    }
}
