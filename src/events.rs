use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::app::{App, View};

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    // If detail overlay is shown, handle overlay-specific keys
    if app.show_detail_overlay {
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Backspace | KeyCode::Char('q') => {
                app.close_overlay();
            }
            // Replay controls stay live under the overlay
            KeyCode::Char(' ') => app.toggle_play(),
            KeyCode::Char('x') => app.stop_replay(),
            _ => {}
        }
        return;
    }

    // If filter input is active, handle text input
    if app.filter_active {
        handle_filter_input(app, key);
        return;
    }

    match key.code {
        // Quit
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),

        // View switching
        KeyCode::Tab => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.prev_view();
            } else {
                app.next_view();
            }
        }
        KeyCode::BackTab => app.prev_view(),
        KeyCode::Char('1') => app.set_view(View::Fleet),
        KeyCode::Char('2') => app.set_view(View::Replay),

        // Navigation
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Left | KeyCode::Char('h') => app.prev_view(),
        KeyCode::Right | KeyCode::Char('l') => app.next_view(),
        KeyCode::PageUp => app.select_prev_n(10),
        KeyCode::PageDown => app.select_next_n(10),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),

        // Select and show detail
        KeyCode::Enter => app.enter_detail(),

        // Go back (Esc and Backspace)
        KeyCode::Esc | KeyCode::Backspace => app.go_back(),

        // Replay
        KeyCode::Char(' ') => app.toggle_play(),
        KeyCode::Char('x') => app.stop_replay(),
        KeyCode::Char('+') | KeyCode::Char('=') => app.faster(),
        KeyCode::Char('-') => app.slower(),
        KeyCode::Char('r') => app.reload_history(),

        // Help
        KeyCode::Char('?') => app.toggle_help(),

        // Filter (start typing to filter)
        KeyCode::Char('/') => app.start_filter(),

        // Clear filter
        KeyCode::Char('c') => {
            if !app.filter_text.is_empty() {
                app.clear_filter();
            }
        }

        _ => {}
    }
}

/// Handle key input while filter is active
fn handle_filter_input(app: &mut App, key: KeyEvent) {
    match key.code {
        // Confirm filter
        KeyCode::Enter => {
            app.filter_active = false;
        }

        // Cancel filter (keep text but exit input mode)
        KeyCode::Esc => {
            app.cancel_filter();
        }

        // Clear and exit
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.clear_filter();
        }

        KeyCode::Backspace => {
            app.filter_pop();
            if app.filter_text.is_empty() {
                app.filter_active = false;
            }
        }

        KeyCode::Char(c) => {
            app.filter_push(c);
        }

        _ => {}
    }
}

/// Handle mouse events
///
/// `content_start_row` is the row of the device table's header line.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent, content_start_row: u16) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.select_prev(),
        MouseEventKind::ScrollDown => app.select_next(),

        MouseEventKind::Down(MouseButton::Left) => {
            let clicked_row = mouse.row;

            if app.current_view == View::Fleet && clicked_row > content_start_row {
                let item_row = (clicked_row - content_start_row - 1) as usize;
                if item_row < app.visible_devices().len() {
                    app.cursor = item_row;
                    app.select_cursor_device();
                }
            }

            // Tab row sits right below the header
            if clicked_row == 1 {
                // Tab positions: " 1:Fleet " (0-9), " 2:Replay " (10-20)
                let col = mouse.column;
                if col < 10 {
                    app.set_view(View::Fleet);
                } else if col < 21 {
                    app.set_view(View::Replay);
                }
            }
        }

        // Right-click goes back
        MouseEventKind::Down(MouseButton::Right) => app.go_back(),

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crossterm::event::KeyEventState;
    use serde_json::json;

    use crate::clock::ManualClock;
    use crate::config::FleetConfig;
    use crate::dashboard::Dashboard;
    use crate::source::ChannelSource;
    use crate::ui::Theme;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: event::KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn app_with(ids: &[&str]) -> App {
        let clock = ManualClock::new(50_000_000);
        let dashboard =
            Dashboard::new(Arc::new(clock.clone()), FleetConfig::default(), Duration::from_secs(2));
        let (tx, source) = ChannelSource::create("test");
        let mut app = App::new(Box::new(source), dashboard, Theme::dark());
        for id in ids {
            tx.send(json!({"device_eui": id})).unwrap();
        }
        app.update();
        app
    }

    #[test]
    fn test_quit_key() {
        let mut app = app_with(&[]);
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.running);
    }

    #[test]
    fn test_view_keys() {
        let mut app = app_with(&[]);
        handle_key_event(&mut app, key(KeyCode::Char('2')));
        assert_eq!(app.current_view, View::Replay);
        handle_key_event(&mut app, key(KeyCode::Tab));
        assert_eq!(app.current_view, View::Fleet);
        handle_key_event(&mut app, key(KeyCode::Right));
        handle_key_event(&mut app, key(KeyCode::Esc));
        assert_eq!(app.current_view, View::Fleet);
    }

    #[test]
    fn test_help_swallows_next_key() {
        let mut app = app_with(&[]);
        handle_key_event(&mut app, key(KeyCode::Char('?')));
        assert!(app.show_help);
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.show_help);
        assert!(app.running);
    }

    #[test]
    fn test_filter_input_captures_keys() {
        let mut app = app_with(&["alpha", "beta"]);
        handle_key_event(&mut app, key(KeyCode::Char('/')));
        assert!(app.filter_active);

        // 'q' is search text while typing, not quit
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(app.running);
        assert_eq!(app.filter_text, "q");
        assert!(app.visible_devices().is_empty());

        handle_key_event(&mut app, key(KeyCode::Backspace));
        assert!(!app.filter_active);
        assert_eq!(app.visible_devices().len(), 2);

        handle_key_event(&mut app, key(KeyCode::Char('/')));
        handle_key_event(&mut app, key(KeyCode::Char('l')));
        handle_key_event(&mut app, key(KeyCode::Enter));
        assert!(!app.filter_active);
        assert_eq!(app.filter_text, "l");
        assert_eq!(app.visible_devices().len(), 1);

        handle_key_event(&mut app, key(KeyCode::Char('c')));
        assert!(app.filter_text.is_empty());
    }

    #[test]
    fn test_enter_opens_overlay_and_esc_closes() {
        let mut app = app_with(&["alpha"]);
        handle_key_event(&mut app, key(KeyCode::Enter));
        assert!(app.show_detail_overlay);
        handle_key_event(&mut app, key(KeyCode::Esc));
        assert!(!app.show_detail_overlay);
    }

    #[test]
    fn test_click_selects_row() {
        let mut app = app_with(&["alpha", "beta", "gamma"]);
        assert_eq!(app.dashboard.selected().as_deref(), Some("alpha"));

        // Table header at row 3; second device row is 5
        handle_mouse_event(&mut app, click(5, 5), 3);
        assert_eq!(app.cursor, 1);
        assert_eq!(app.dashboard.selected().as_deref(), Some("beta"));

        // Clicks below the last row are ignored
        handle_mouse_event(&mut app, click(5, 20), 3);
        assert_eq!(app.cursor, 1);
    }

    #[test]
    fn test_click_on_tabs() {
        let mut app = app_with(&[]);
        handle_mouse_event(&mut app, click(12, 1), 3);
        assert_eq!(app.current_view, View::Replay);
        handle_mouse_event(&mut app, click(2, 1), 3);
        assert_eq!(app.current_view, View::Fleet);
    }
}
