use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode};
use crate::tui::TermEvent;

pub async fn handle_event(app: &mut App, event: TermEvent) -> Result<()> {
    match event {
        TermEvent::Key(key) => handle_key(app, key).await?,
        TermEvent::Mouse(mouse) => handle_mouse(app, mouse),
        TermEvent::Paste(text) => {
            if app.input_mode == InputMode::Editing && !app.show_clear_confirm && app.chat.notice().is_none() {
                // Pasted line endings become newlines in the draft
                app.insert_str(&text.replace("\r\n", "\n").replace('\r', "\n"));
            }
        }
        TermEvent::Resize => app.scroll_to_bottom(),
        TermEvent::Tick => app.tick().await,
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // A notice blocks everything until it is dismissed
    if app.chat.notice().is_some() {
        app.chat.dismiss_notice();
        return Ok(());
    }

    if app.show_clear_confirm {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.answer_clear_confirm(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.answer_clear_confirm(false);
            }
            _ => {}
        }
        return Ok(());
    }

    if key.code == KeyCode::Char('l') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.open_clear_confirm();
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }

    Ok(())
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Enter | KeyCode::Tab => {
            app.input_mode = InputMode::Editing;
            app.cursor_end();
        }

        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(app.chat_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(app.chat_height / 2);
        }
        KeyCode::PageDown => app.scroll_down(app.chat_height),
        KeyCode::PageUp => app.scroll_up(app.chat_height),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),

        KeyCode::Char('c') => app.open_clear_confirm(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
        }
        // Shift+Enter (or Alt+Enter where the terminal swallows Shift) starts a new line
        KeyCode::Enter
            if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            app.insert_char('\n');
        }
        KeyCode::Enter => app.send_draft(),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::PageDown => app.scroll_down(app.chat_height),
        KeyCode::PageUp => app.scroll_up(app.chat_height),
        KeyCode::Char(c)
            if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            app.insert_char(c);
        }
        _ => {}
    }
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
    use crate::api::{ApiClient, DEFAULT_TIMEOUT};
    use crate::chat::FALLBACK_REPLY;
    use crate::state::Sender;
    use std::time::Duration;

    fn key(code: KeyCode) -> TermEvent {
        TermEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    /// An address that refuses connections: bind, note the port, release it.
    fn unreachable_app() -> App {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let base = format!("http://127.0.0.1:{}/api", port);
        App::new(ApiClient::new(&base, Duration::from_secs(5)).unwrap())
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c))).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_typing_updates_draft() {
        let mut app = App::new(ApiClient::new("http://127.0.0.1:9/api", DEFAULT_TIMEOUT).unwrap());
        type_text(&mut app, "Hello").await;
        assert_eq!(app.chat.draft().text(), "Hello");
        assert_eq!(app.chat.draft().char_count(), 5);

        handle_event(&mut app, key(KeyCode::Backspace)).await.unwrap();
        assert_eq!(app.chat.draft().text(), "Hell");
    }

    #[tokio::test]
    async fn test_shift_enter_inserts_newline() {
        let mut app = App::new(ApiClient::new("http://127.0.0.1:9/api", DEFAULT_TIMEOUT).unwrap());
        type_text(&mut app, "a").await;
        let shift_enter = TermEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT));
        handle_event(&mut app, shift_enter).await.unwrap();
        type_text(&mut app, "b").await;
        assert_eq!(app.chat.draft().text(), "a\nb");
        assert!(!app.chat.is_in_flight());
    }

    #[tokio::test]
    async fn test_enter_sends_and_unreachable_server_yields_fallback() {
        let mut app = unreachable_app();
        type_text(&mut app, "Hi").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();

        assert!(app.chat.is_in_flight());
        assert!(app.chat.draft().text().is_empty());

        // A second Enter while in flight changes nothing
        type_text(&mut app, "again").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.chat.draft().text(), "again");
        assert_eq!(app.chat.conversation().messages().count(), 1);

        tick_until_idle(&mut app).await;

        assert!(app.chat.send_enabled());
        let messages: Vec<_> = app.chat.conversation().messages().collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text(), "Hi");
        assert_eq!(messages[1].sender(), Sender::Assistant);
        assert_eq!(messages[1].text(), FALLBACK_REPLY);
        assert!(!app.chat.conversation().has_placeholder());
        assert_eq!(app.input_mode, InputMode::Editing);
    }

    #[tokio::test]
    async fn test_clear_confirm_declined_keeps_modal_flow_local() {
        let mut app = App::new(ApiClient::new("http://127.0.0.1:9/api", DEFAULT_TIMEOUT).unwrap());
        let ctrl_l = TermEvent::Key(KeyEvent::new(KeyCode::Char('l'), KeyModifiers::CONTROL));
        handle_event(&mut app, ctrl_l).await.unwrap();
        assert!(app.show_clear_confirm);

        // Typing while the modal is open does not reach the draft
        type_text(&mut app, "x").await;
        assert!(app.chat.draft().text().is_empty());

        handle_event(&mut app, key(KeyCode::Char('n'))).await.unwrap();
        assert!(!app.show_clear_confirm);
        assert!(app.chat.conversation().is_welcome_state());
        assert_eq!(app.chat.notice(), None);
    }

    async fn tick_until_idle(app: &mut App) {
        for _ in 0..100 {
            handle_event(app, TermEvent::Tick).await.unwrap();
            if !app.chat.is_in_flight() && !app.is_clearing() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    #[tokio::test]
    async fn test_clear_confirmed_against_unreachable_server_raises_notice() {
        let mut app = unreachable_app();
        app.open_clear_confirm();
        handle_event(&mut app, key(KeyCode::Char('y'))).await.unwrap();
        tick_until_idle(&mut app).await;

        assert!(app.chat.notice().is_some());
        // Any key dismisses the notice without acting on it
        handle_event(&mut app, key(KeyCode::Char('q'))).await.unwrap();
        assert_eq!(app.chat.notice(), None);
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn test_pending_clear_does_not_block_event_loop() {
        // Accepts connections into the backlog but never answers
        let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}/api", silent.local_addr().unwrap());
        let mut app = App::new(ApiClient::new(&base, Duration::from_secs(30)).unwrap());
        type_text(&mut app, "draft").await;

        app.open_clear_confirm();
        let answered = tokio::time::timeout(
            Duration::from_millis(500),
            handle_event(&mut app, key(KeyCode::Char('y'))),
        )
        .await;
        assert!(answered.is_ok());
        assert!(app.is_clearing());
        assert!(!app.show_clear_confirm);

        // The loop keeps serving ticks and keys while the request is pending
        handle_event(&mut app, TermEvent::Tick).await.unwrap();
        assert!(app.is_clearing());
        assert_eq!(app.chat.notice(), None);
        assert_eq!(app.chat.draft().text(), "draft");

        // A second confirmation cannot be opened until the first resolves
        let ctrl_l = TermEvent::Key(KeyEvent::new(KeyCode::Char('l'), KeyModifiers::CONTROL));
        handle_event(&mut app, ctrl_l).await.unwrap();
        assert!(!app.show_clear_confirm);

        let ctrl_c = TermEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        handle_event(&mut app, ctrl_c).await.unwrap();
        assert!(app.should_quit);

        app.shutdown();
        assert!(!app.is_clearing());
    }

    #[tokio::test]
    async fn test_control_chords_do_not_insert_text() {
        let mut app = App::new(ApiClient::new("http://127.0.0.1:9/api", DEFAULT_TIMEOUT).unwrap());
        type_text(&mut app, "ab").await;
        for (c, modifiers) in [
            ('d', KeyModifiers::CONTROL),
            ('u', KeyModifiers::CONTROL),
            ('x', KeyModifiers::ALT),
        ] {
            handle_event(&mut app, TermEvent::Key(KeyEvent::new(KeyCode::Char(c), modifiers)))
                .await
                .unwrap();
        }
        assert_eq!(app.chat.draft().text(), "ab");

        // Shifted characters still type
        handle_event(&mut app, TermEvent::Key(KeyEvent::new(KeyCode::Char('C'), KeyModifiers::SHIFT)))
            .await
            .unwrap();
        assert_eq!(app.chat.draft().text(), "abC");
    }

    #[tokio::test]
    async fn test_normal_mode_quit_and_reenter_editing() {
        let mut app = App::new(ApiClient::new("http://127.0.0.1:9/api", DEFAULT_TIMEOUT).unwrap());
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);

        handle_event(&mut app, key(KeyCode::Char('i'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Editing);

        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Char('q'))).await.unwrap();
        assert!(app.should_quit);
    }
}
