use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::App;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => insert_text(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Keys that work whether or not the input is enabled
    match key.code {
        KeyCode::Esc => {
            app.should_quit = true;
            return;
        }
        KeyCode::PageUp => {
            app.scroll_page_up();
            return;
        }
        KeyCode::PageDown => {
            app.scroll_page_down();
            return;
        }
        KeyCode::Up => {
            app.scroll_up(1);
            return;
        }
        KeyCode::Down => {
            app.scroll_down(1);
            return;
        }
        _ => {}
    }

    // Input is disabled while a reply is pending
    if app.is_busy() {
        return;
    }

    match key.code {
        KeyCode::Enter => app.submit(),
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let input = app.session.input_mut();
                let byte_pos = char_to_byte_index(input, app.input_cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let input = app.session.input_mut();
            if app.input_cursor < input.chars().count() {
                let byte_pos = char_to_byte_index(input, app.input_cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.session.input().chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.session.input().chars().count();
        }
        KeyCode::Char(c) => {
            let input = app.session.input_mut();
            let byte_pos = char_to_byte_index(input, app.input_cursor);
            input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

/// Insert pasted text at the cursor. The input is a single line, so line
/// breaks become spaces.
fn insert_text(app: &mut App, text: &str) {
    if app.is_busy() {
        return;
    }
    let text: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();

    let input = app.session.input_mut();
    let byte_pos = char_to_byte_index(input, app.input_cursor);
    input.insert_str(byte_pos, &text);
    app.input_cursor += text.chars().count();
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use async_trait::async_trait;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use crate::client::{CompletionService, PendingRequest};
    use crate::config::Config;
    use crate::error::ChatError;

    struct NeverCalled;

    #[async_trait]
    impl CompletionService for NeverCalled {
        async fn complete(&self, _request: &PendingRequest) -> Result<String, ChatError> {
            Err(ChatError::Unknown)
        }
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c))).unwrap();
        }
    }

    fn app() -> App {
        // No API key, so Enter never spawns a task
        App::new(Config::new(), Arc::new(NeverCalled))
    }

    #[test]
    fn test_char_to_byte_index_multibyte() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[test]
    fn test_editing_keys() {
        let mut app = app();
        type_text(&mut app, "helo");
        handle_event(&mut app, key(KeyCode::Left)).unwrap();
        type_text(&mut app, "l");
        assert_eq!(app.session.input(), "hello");

        handle_event(&mut app, key(KeyCode::Home)).unwrap();
        handle_event(&mut app, key(KeyCode::Delete)).unwrap();
        handle_event(&mut app, key(KeyCode::End)).unwrap();
        handle_event(&mut app, key(KeyCode::Backspace)).unwrap();
        assert_eq!(app.session.input(), "ell");
        assert_eq!(app.input_cursor, 3);
    }

    #[test]
    fn test_paste_flattens_newlines() {
        let mut app = app();
        handle_event(&mut app, AppEvent::Paste("one\ntwo".into())).unwrap();
        assert_eq!(app.session.input(), "one two");
        assert_eq!(app.input_cursor, 7);
    }

    #[test]
    fn test_enter_submits_and_clears_input() {
        let mut app = app();
        type_text(&mut app, "hello");
        handle_event(&mut app, key(KeyCode::Enter)).unwrap();

        assert_eq!(app.session.transcript().len(), 1);
        assert_eq!(app.session.input(), "");
        assert_eq!(app.session.error(), Some("OpenRouter API key is missing"));
    }

    #[test]
    fn test_input_ignored_while_busy() {
        let mut app = app();
        app.session = crate::session::ChatSession::new(Config::new().with_api_key("sk-test"));
        app.session.begin("pending");
        assert!(app.is_busy());

        type_text(&mut app, "abc");
        handle_event(&mut app, key(KeyCode::Enter)).unwrap();

        assert_eq!(app.session.input(), "");
        assert_eq!(app.session.transcript().len(), 1);
    }

    #[test]
    fn test_quit_keys() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Esc)).unwrap();
        assert!(app.should_quit);

        let mut app = self::app();
        let ctrl_c = AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        handle_event(&mut app, ctrl_c).unwrap();
        assert!(app.should_quit);
    }
}
