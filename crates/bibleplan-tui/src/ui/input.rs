//! Keyboard input handling for the TUI.
//!
//! This module translates keyboard events into application state changes.

use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{App, AppState, PAGE_SCROLL_SIZE};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // The error view only offers quitting
    if app.plan_error.is_some() {
        return matches!(key.code, KeyCode::Char('q') | KeyCode::Esc);
    }

    match app.state {
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            false
        }
        AppState::ConfirmingQuit => handle_quit_confirm(app, key),
        AppState::GoingToDay | AppState::Searching => {
            handle_prompt_input(app, key);
            false
        }
        AppState::Normal => handle_normal_input(app, key),
        AppState::Quitting => true,
    }
}

fn handle_quit_confirm(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
            app.state = AppState::Quitting;
            true
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.state = AppState::Normal;
            false
        }
        _ => false,
    }
}

fn handle_prompt_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input.clear();
            app.status_message = None;
            app.state = AppState::Normal;
        }
        KeyCode::Enter => match app.state {
            AppState::GoingToDay => app.submit_day_input(),
            AppState::Searching => app.submit_search(),
            _ => {}
        },
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Char(c) => app.push_input_char(c),
        _ => {}
    }
}

fn handle_normal_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
        }
        KeyCode::Esc => app.close_search(),

        // Day navigation
        KeyCode::Left | KeyCode::Char('h') => app.previous_day(),
        KeyCode::Right | KeyCode::Char('l') => app.next_day(),
        KeyCode::Char('g') => app.open_prompt(AppState::GoingToDay),
        KeyCode::Char('r') => {
            app.status_message = None;
            app.load_current_day();
        }

        KeyCode::Char(' ') | KeyCode::Char('c') => app.toggle_complete(),
        KeyCode::Char('/') => app.open_prompt(AppState::Searching),

        KeyCode::Char('+') | KeyCode::Char('=') => app.larger_text(),
        KeyCode::Char('-') => app.smaller_text(),

        // Scrolling
        KeyCode::Down | KeyCode::Char('j') => app.scroll_down(1),
        KeyCode::Up | KeyCode::Char('k') => app.scroll_up(1),
        KeyCode::PageDown => app.scroll_down(PAGE_SCROLL_SIZE),
        KeyCode::PageUp => app.scroll_up(PAGE_SCROLL_SIZE),
        KeyCode::Home => app.scroll = 0,
        _ => {}
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bibleplan_core::config::Config;
    use bibleplan_core::models::ReadingPlan;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app(dir: &tempfile::TempDir) -> App {
        let mut app = App::with_config(Config::default(), dir.path().to_path_buf(), 1).unwrap();
        app.plan = Some(Arc::new(ReadingPlan::bundled().unwrap()));
        app
    }

    #[tokio::test]
    async fn test_quit_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);

        assert!(!handle_input(&mut app, key(KeyCode::Char('q'))));
        assert_eq!(app.state, AppState::ConfirmingQuit);
        assert!(!handle_input(&mut app, key(KeyCode::Char('n'))));
        assert_eq!(app.state, AppState::Normal);

        handle_input(&mut app, key(KeyCode::Char('q')));
        assert!(handle_input(&mut app, key(KeyCode::Char('y'))));
    }

    #[tokio::test]
    async fn test_day_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);

        handle_input(&mut app, key(KeyCode::Right));
        handle_input(&mut app, key(KeyCode::Char('l')));
        assert_eq!(app.current_day, 3);
        handle_input(&mut app, key(KeyCode::Char('h')));
        assert_eq!(app.current_day, 2);

        handle_input(&mut app, key(KeyCode::Char('g')));
        assert_eq!(app.state, AppState::GoingToDay);
        assert_eq!(app.input, "2");
        handle_input(&mut app, key(KeyCode::Char('x')));
        handle_input(&mut app, key(KeyCode::Char('0')));
        handle_input(&mut app, key(KeyCode::Enter));
        assert_eq!(app.current_day, 20);
        assert_eq!(app.state, AppState::Normal);
    }

    #[tokio::test]
    async fn test_escape_closes_overlays() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);

        handle_input(&mut app, key(KeyCode::Char('?')));
        assert_eq!(app.state, AppState::ShowingHelp);
        handle_input(&mut app, key(KeyCode::Esc));
        assert_eq!(app.state, AppState::Normal);

        handle_input(&mut app, key(KeyCode::Char('/')));
        handle_input(&mut app, key(KeyCode::Char('q')));
        assert_eq!(app.input, "q");
        handle_input(&mut app, key(KeyCode::Esc));
        assert_eq!(app.state, AppState::Normal);
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        handle_input(&mut app, key(KeyCode::Char(' ')));
        assert!(app.is_current_day_complete());
        handle_input(&mut app, key(KeyCode::Char('c')));
        assert!(!app.is_current_day_complete());
    }

    #[tokio::test]
    async fn test_error_view_only_quits() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.plan_error = Some("Server returned 404".to_string());
        assert!(!handle_input(&mut app, key(KeyCode::Right)));
        assert_eq!(app.current_day, 1);
        assert!(handle_input(&mut app, key(KeyCode::Char('q'))));
    }
}
