use ratatui::layout::Rect;
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ChatApi, ChatReply, HealthReport};
use crate::chat::{ChatClient, ClearOutcome, PendingChat};
use crate::error::ApiError;
use crate::state::{Entry, WELCOME_LINES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

struct InFlightChat {
    pending: PendingChat,
    handle: JoinHandle<Result<ChatReply, ApiError>>,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Clamp a row or column count to what a terminal coordinate can hold.
pub(crate) fn clamp_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

/// Rows a block of text occupies when wrapped at `width` columns.
fn wrapped_rows(text: &str, width: usize) -> usize {
    text.split('\n')
        .map(|line| {
            let chars = line.chars().count();
            if chars == 0 {
                1
            } else {
                chars.div_ceil(width)
            }
        })
        .sum()
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub cursor: usize, // char index into the draft

    // Chat pane
    pub chat_scroll: u16,
    pub chat_height: u16, // inner size, updated during render
    pub chat_width: u16,
    pub chat_area: Option<Rect>,
    pub animation_frame: u8, // 0-2 for the "Thinking" ellipsis

    // Modals
    pub show_clear_confirm: bool,

    pub chat: ChatClient,
    api: ApiClient,
    chat_task: Option<InFlightChat>,
    clear_task: Option<JoinHandle<Result<(), ApiError>>>,
    health_task: Option<JoinHandle<Result<HealthReport, ApiError>>>,
}

impl App {
    pub fn new(api: ApiClient) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,
            animation_frame: 0,

            show_clear_confirm: false,

            chat: ChatClient::new(),
            api,
            chat_task: None,
            clear_task: None,
            health_task: None,
        }
    }

    pub fn api_base_url(&self) -> &str {
        self.api.base_url()
    }

    /// Probe `/health` in the background; the result lands on a later tick.
    pub fn start_health_probe(&mut self) {
        let api = self.api.clone();
        self.health_task = Some(tokio::spawn(async move { api.health().await }));
    }

    pub fn send_draft(&mut self) {
        let text = self.chat.draft().text().to_string();
        let Some(pending) = self.chat.begin_submit(&text) else {
            return;
        };
        self.cursor = 0;

        let api = self.api.clone();
        let message = pending.message().to_string();
        let handle = tokio::spawn(async move { api.chat(&message).await });
        self.chat_task = Some(InFlightChat { pending, handle });

        self.scroll_to_bottom();
    }

    /// Ignored while an earlier clear request is still outstanding.
    pub fn open_clear_confirm(&mut self) {
        if !self.is_clearing() {
            self.show_clear_confirm = true;
        }
    }

    pub fn is_clearing(&self) -> bool {
        self.clear_task.is_some()
    }

    /// Resolve the clear-history modal with the user's answer. A confirmed
    /// clear runs in the background and is applied by `poll_tasks`.
    pub fn answer_clear_confirm(&mut self, confirmed: bool) {
        self.show_clear_confirm = false;
        if !confirmed || self.is_clearing() {
            return;
        }

        let api = self.api.clone();
        self.clear_task = Some(tokio::spawn(async move { api.clear_history().await }));
    }

    /// Feed finished background tasks back into the chat client.
    pub async fn poll_tasks(&mut self) {
        if self.health_task.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = self.health_task.take() {
                let result = handle
                    .await
                    .unwrap_or_else(|e| Err(ApiError::Aborted(e.to_string())));
                self.chat.apply_health(result);
            }
        }

        if self.clear_task.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = self.clear_task.take() {
                let result = handle
                    .await
                    .unwrap_or_else(|e| Err(ApiError::Aborted(e.to_string())));
                if matches!(self.chat.apply_clear(result), ClearOutcome::Cleared) {
                    self.chat_scroll = 0;
                }
            }
        }

        if self.chat_task.as_ref().is_some_and(|t| t.handle.is_finished()) {
            if let Some(task) = self.chat_task.take() {
                let outcome = task
                    .handle
                    .await
                    .unwrap_or_else(|e| Err(ApiError::Aborted(e.to_string())));
                self.chat.complete_submit(task.pending, outcome);
                if self.chat.take_focus_request() {
                    self.input_mode = InputMode::Editing;
                    self.cursor = self.chat.draft().char_count();
                }
                self.scroll_to_bottom();
            }
        }
    }

    /// Tick animation frame and poll background work (called by Tick event)
    pub async fn tick(&mut self) {
        if self.chat.is_in_flight() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.poll_tasks().await;
    }

    /// Abort anything still running before the terminal is torn down.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.chat_task.take() {
            task.handle.abort();
        }
        if let Some(handle) = self.clear_task.take() {
            handle.abort();
        }
        if let Some(handle) = self.health_task.take() {
            handle.abort();
        }
    }

    // Draft editing. Every change goes through ChatClient::update_draft so
    // the character count stays in sync.
    pub fn insert_str(&mut self, s: &str) {
        let mut text = self.chat.draft().text().to_string();
        let byte_pos = char_to_byte_index(&text, self.cursor);
        text.insert_str(byte_pos, s);
        self.cursor += s.chars().count();
        self.chat.update_draft(text);
    }

    pub fn insert_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.insert_str(c.encode_utf8(&mut buf));
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let mut text = self.chat.draft().text().to_string();
        let byte_pos = char_to_byte_index(&text, self.cursor);
        text.remove(byte_pos);
        self.chat.update_draft(text);
    }

    pub fn delete(&mut self) {
        if self.cursor >= self.chat.draft().char_count() {
            return;
        }
        let mut text = self.chat.draft().text().to_string();
        let byte_pos = char_to_byte_index(&text, self.cursor);
        text.remove(byte_pos);
        self.chat.update_draft(text);
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.chat.draft().char_count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.chat.draft().char_count();
    }

    // Chat scrolling
    pub fn scroll_down(&mut self, rows: u16) {
        let max_scroll = self.content_rows().saturating_sub(self.visible_rows());
        self.chat_scroll = self.chat_scroll.saturating_add(rows).min(max_scroll);
    }

    pub fn scroll_up(&mut self, rows: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(rows);
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.content_rows().saturating_sub(self.visible_rows());
    }

    fn visible_rows(&self) -> u16 {
        if self.chat_height > 0 { self.chat_height } else { 20 }
    }

    /// Estimated rendered height of the conversation; mirrors the layout in
    /// `ui::conversation_lines`.
    fn content_rows(&self) -> u16 {
        let width = if self.chat_width > 0 { self.chat_width as usize } else { 50 };

        let mut rows: usize = 0;
        for entry in self.chat.conversation().entries() {
            rows += match entry {
                Entry::Welcome => {
                    let body: usize = WELCOME_LINES
                        .iter()
                        .map(|line| wrapped_rows(line, width) + 1)
                        .sum();
                    2 + body // title + blank, paragraphs each followed by a blank
                }
                Entry::Message(message) => {
                    let sources = usize::from(message.sources().is_some_and(|n| n > 0));
                    1 + wrapped_rows(message.text(), width) + sources + 1
                }
                Entry::Typing(_) => 3,
            };
        }
        clamp_u16(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DEFAULT_TIMEOUT;

    fn app() -> App {
        App::new(ApiClient::new("http://127.0.0.1:9/api", DEFAULT_TIMEOUT).unwrap())
    }

    #[test]
    fn test_wrapped_rows() {
        assert_eq!(wrapped_rows("", 10), 1);
        assert_eq!(wrapped_rows("0123456789", 10), 1);
        assert_eq!(wrapped_rows("0123456789a", 10), 2);
        assert_eq!(wrapped_rows("a\nb", 10), 2);
    }

    #[test]
    fn test_editing_keeps_draft_count_in_sync() {
        let mut app = app();
        app.insert_str("héllo");
        assert_eq!(app.chat.draft().char_count(), 5);
        assert_eq!(app.cursor, 5);

        app.cursor_home();
        app.insert_char('¡');
        assert_eq!(app.chat.draft().text(), "¡héllo");

        app.cursor_end();
        app.backspace();
        assert_eq!(app.chat.draft().text(), "¡héll");

        app.cursor_home();
        app.delete();
        assert_eq!(app.chat.draft().text(), "héll");
        assert_eq!(app.chat.draft().char_count(), 4);
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut app = app();
        app.cursor_left();
        app.backspace();
        assert_eq!(app.cursor, 0);
        app.insert_str("ab");
        app.cursor_right();
        assert_eq!(app.cursor, 2);
        app.delete();
        assert_eq!(app.chat.draft().text(), "ab");
    }

    #[test]
    fn test_huge_reply_saturates_scroll() {
        let mut app = app();
        let pending = app.chat.begin_submit("Hi").unwrap();
        app.chat.complete_submit(
            pending,
            Ok(ChatReply {
                response: "\n".repeat(70_000),
                context_used: None,
                num_sources: None,
            }),
        );

        app.scroll_to_bottom();
        assert_eq!(app.chat_scroll, u16::MAX - app.visible_rows());

        app.scroll_down(10);
        assert_eq!(app.chat_scroll, u16::MAX - app.visible_rows());
        app.scroll_to_top();
        assert_eq!(app.chat_scroll, 0);
    }

    #[tokio::test]
    async fn test_declined_clear_spawns_nothing() {
        let mut app = app();
        app.open_clear_confirm();
        app.answer_clear_confirm(false);
        assert!(!app.show_clear_confirm);
        assert!(!app.is_clearing());
    }

    #[tokio::test]
    async fn test_blank_send_spawns_nothing() {
        let mut app = app();
        app.insert_str("   ");
        app.send_draft();
        assert!(app.chat_task.is_none());
        assert!(app.chat.conversation().is_welcome_state());
    }
}
