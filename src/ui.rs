use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::{clamp_u16, App, InputMode};
use crate::chat::CLEAR_HISTORY_PROMPT;
use crate::state::{ConversationView, Entry, Sender, StatusKind, WELCOME_LINES, WELCOME_TITLE};

/// Rows of the input box including borders; the draft may span several lines.
const INPUT_MAX_ROWS: u16 = 6;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        match after.find("**") {
            Some(end) if end > 0 => {
                if start > 0 {
                    spans.push(Span::raw(rest[..start].to_string()));
                }
                spans.push(Span::styled(
                    after[..end].to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
                rest = &after[end + 2..];
            }
            // No closing ** (or an empty pair), treat as literal
            _ => break,
        }
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

/// Height of the input box for `draft`, borders included.
fn input_rows(draft: &str) -> u16 {
    clamp_u16(draft.split('\n').count())
        .saturating_add(2)
        .min(INPUT_MAX_ROWS)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let input_rows = input_rows(app.chat.draft().text());

    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_rows),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_conversation(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Popups (notice takes priority)
    if let Some(notice) = app.chat.notice() {
        render_notice(notice, frame, area);
    } else if app.show_clear_confirm {
        render_clear_confirm(frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = app.chat.status();
    let indicator_color = match status.kind {
        StatusKind::Online => Color::Green,
        StatusKind::Error => Color::Red,
        StatusKind::Unknown => Color::Yellow,
    };

    let title = Line::from(vec![
        Span::styled(" Jarvis ", Style::default().fg(Color::Cyan).bold()),
        Span::styled("● ", Style::default().fg(indicator_color)),
        Span::styled(status.label.clone(), Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(app.api_base_url().to_string(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Lines for the conversation pane; `App::content_rows` estimates their height.
fn conversation_lines(conversation: &ConversationView, animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();

    for entry in conversation.entries() {
        match entry {
            Entry::Welcome => {
                lines.push(Line::from(Span::styled(
                    format!("👋 {}", WELCOME_TITLE),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::default());
                for paragraph in WELCOME_LINES {
                    lines.push(Line::from(Span::styled(
                        paragraph,
                        Style::default().fg(Color::Gray),
                    )));
                    lines.push(Line::default());
                }
            }
            Entry::Message(message) => {
                match message.sender() {
                    Sender::User => {
                        lines.push(Line::from(Span::styled(
                            "You:",
                            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                        )));
                        for line in message.text().split('\n') {
                            lines.push(Line::from(line.to_string()));
                        }
                    }
                    Sender::Assistant => {
                        lines.push(Line::from(Span::styled(
                            "Jarvis:",
                            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                        )));
                        for line in message.text().split('\n') {
                            lines.push(parse_markdown_line(line));
                        }
                        if let Some(sources) = message.sources().filter(|n| *n > 0) {
                            let noun = if sources == 1 { "source" } else { "sources" };
                            lines.push(Line::from(Span::styled(
                                format!("({} knowledge {})", sources, noun),
                                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                            )));
                        }
                    }
                }
                lines.push(Line::default());
            }
            Entry::Typing(_) => {
                lines.push(Line::from(Span::styled(
                    "Jarvis:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
                lines.push(Line::default());
            }
        }
    }

    lines
}

fn render_conversation(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store for mouse hit-testing and scroll calculations (inner size minus borders)
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let border_color = if app.input_mode == InputMode::Normal { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversation ");

    let lines = conversation_lines(app.chat.conversation(), app.animation_frame);
    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let draft = app.chat.draft();
    let editing = app.input_mode == InputMode::Editing;

    let count_color = if draft.is_over_threshold() { Color::Red } else { Color::Gray };
    let mut title = vec![
        Span::raw(" Message "),
        Span::styled(format!("({})", draft.char_count()), Style::default().fg(count_color)),
        Span::raw(" "),
    ];
    if !app.chat.send_enabled() {
        title.push(Span::styled("sending… ", Style::default().fg(Color::Yellow)));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(Line::from(title));

    // Cursor position as (row, column) within the draft
    let before_cursor: String = draft.text().chars().take(app.cursor).collect();
    let cursor_row = clamp_u16(before_cursor.matches('\n').count());
    let cursor_col = clamp_u16(
        before_cursor
            .rsplit('\n')
            .next()
            .map(|line| line.chars().count())
            .unwrap_or(0),
    );

    let inner_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);
    let row_offset = cursor_row.saturating_sub(inner_height.saturating_sub(1));
    let col_offset = cursor_col.saturating_sub(inner_width.saturating_sub(1));

    let input = Paragraph::new(draft.text().to_string())
        .style(Style::default().fg(Color::Cyan))
        .block(block)
        .scroll((row_offset, col_offset));

    frame.render_widget(input, area);

    if editing && !app.show_clear_confirm && app.chat.notice().is_none() {
        frame.set_cursor_position((
            area.x + 1 + cursor_col - col_offset,
            area.y + 1 + cursor_row - row_offset,
        ));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " CHAT ",
        InputMode::Editing => " TYPE ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Shift+Enter ", key_style),
            Span::styled(" newline ", label_style),
            Span::styled(" Ctrl+L ", key_style),
            Span::styled(" clear ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ],
        InputMode::Normal => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" g/G ", key_style),
            Span::styled(" top/bottom ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" c ", key_style),
            Span::styled(" clear ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height.saturating_sub(2));
    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

fn render_clear_confirm(frame: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 50, 6);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Clear History ");

    let text = Text::from(vec![
        Line::from(CLEAR_HISTORY_PROMPT),
        Line::default(),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" yes   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" no"),
        ]),
    ]);

    let popup = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    frame.render_widget(popup, popup_area);
}

fn render_notice(notice: &str, frame: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 40, 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Error ");

    let text = Text::from(vec![
        Line::from(notice.to_string()),
        Line::default(),
        Line::from(Span::styled("Press any key", Style::default().fg(Color::DarkGray))),
    ]);

    let popup = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    frame.render_widget(popup, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Message;

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_markdown_bold_spans() {
        let line = parse_markdown_line("a **bold** move");
        assert_eq!(line.spans.len(), 3);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(plain(&line), "a bold move");
    }

    #[test]
    fn test_markdown_unclosed_is_literal() {
        let line = parse_markdown_line("2 ** 3");
        assert_eq!(plain(&line), "2 ** 3");
    }

    #[test]
    fn test_typing_placeholder_renders_thinking() {
        let mut view = ConversationView::welcome();
        view.remove_welcome();
        view.push(Message::user("Hi"));
        view.show_placeholder();

        let lines = conversation_lines(&view, 2);
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert!(text.contains(&"Thinking...".to_string()));
        assert_eq!(text[0], "You:");
        assert_eq!(text[1], "Hi");
    }

    #[test]
    fn test_input_rows_bounded_for_huge_paste() {
        assert_eq!(input_rows(""), 3);
        assert_eq!(input_rows("a\nb"), 4);
        assert_eq!(input_rows(&"\n".repeat(70_000)), INPUT_MAX_ROWS);
    }

    #[test]
    fn test_source_annotation_only_for_positive_counts() {
        let mut view = ConversationView::welcome();
        view.push(Message::assistant("a").with_sources(Some(0)));
        view.push(Message::assistant("b").with_sources(Some(3)));

        let text: Vec<String> = conversation_lines(&view, 0).iter().map(plain).collect();
        assert!(text.contains(&"(3 knowledge sources)".to_string()));
        assert!(!text.iter().any(|l| l.contains("0 knowledge")));
    }
}
