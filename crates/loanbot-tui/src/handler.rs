use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crate::app::App;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Chat(chat) => app.apply_chat_event(chat),
        AppEvent::Transcript(transcript) => app.on_transcript(transcript),
        AppEvent::VoiceError(message) => app.on_voice_error(message),
        AppEvent::Download { index, result } => app.on_download(index, result),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => app.quit(),
            KeyCode::Char('t') => app.toggle_tts(),
            KeyCode::Char('r') => app.toggle_mic(),
            KeyCode::Char('d') => app.start_download(),
            KeyCode::Char('l') => app.reset(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.quit(),
        KeyCode::Enter => app.submit(false),

        // Chat scrolling
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => {
            let page = app.chat_height.max(2) / 2;
            app.scroll_up(page);
        }
        KeyCode::PageDown => {
            let page = app.chat_height.max(2) / 2;
            app.scroll_down(page);
        }
        KeyCode::End => app.scroll_to_bottom(),

        // Input editing
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
            app.status = None;
        }
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if app.cursor < app.input.chars().count() {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => app.cursor = 0,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use loanbot_core::voice::NoopSynthesizer;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(c: char) -> AppEvent {
        AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    #[test]
    fn test_char_to_byte_index_multibyte() {
        let s = "नमस्ते hi";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 1), 3);
        assert_eq!(char_to_byte_index(s, 100), s.len());
    }

    #[tokio::test]
    async fn test_typing_and_editing_with_unicode() {
        let (mut app, _chat_rx, _app_rx) =
            test_app(None, Arc::new(NoopSynthesizer), PathBuf::from("."));
        for c in "ghar₹".chars() {
            handle_event(&mut app, key(KeyCode::Char(c)));
        }
        assert_eq!(app.input, "ghar₹");
        assert_eq!(app.cursor, 5);

        handle_event(&mut app, key(KeyCode::Left));
        handle_event(&mut app, key(KeyCode::Backspace));
        assert_eq!(app.input, "gha₹");

        handle_event(&mut app, key(KeyCode::Home));
        handle_event(&mut app, key(KeyCode::Delete));
        assert_eq!(app.input, "ha₹");
        assert_eq!(app.cursor, 0);
    }

    #[tokio::test]
    async fn test_enter_submits_input() {
        let (mut app, mut chat_rx, _app_rx) =
            test_app(None, Arc::new(NoopSynthesizer), PathBuf::from("."));
        app.input = "income is 50000".to_string();
        app.cursor = app.input.chars().count();
        handle_event(&mut app, key(KeyCode::Enter));
        assert!(app.input.is_empty());

        let first = chat_rx.recv().await.unwrap();
        handle_event(&mut app, AppEvent::Chat(first));
        assert_eq!(
            app.entries,
            vec![crate::app::ChatEntry::User("income is 50000".to_string())]
        );
    }

    #[tokio::test]
    async fn test_ctrl_keys() {
        let (mut app, _chat_rx, _app_rx) =
            test_app(None, Arc::new(NoopSynthesizer), PathBuf::from("."));

        handle_event(&mut app, ctrl('r'));
        assert_eq!(app.status.as_deref(), Some("Voice input is not configured"));

        handle_event(&mut app, ctrl('d'));
        assert_eq!(app.status.as_deref(), Some("No sanction letter to download"));

        handle_event(&mut app, ctrl('c'));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_scrolling_breaks_and_restores_follow() {
        let (mut app, _chat_rx, _app_rx) =
            test_app(None, Arc::new(NoopSynthesizer), PathBuf::from("."));
        app.scroll = 10;
        handle_event(&mut app, key(KeyCode::Up));
        assert!(!app.follow_bottom);
        assert_eq!(app.scroll, 9);
        handle_event(&mut app, key(KeyCode::End));
        assert!(app.follow_bottom);
    }
}
