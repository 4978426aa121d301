//! UI-agnostic view state
//!
//! These types describe what the chat surface shows and are shared between
//! the terminal UI and the scripted CLI. Nothing here is persisted; the
//! authoritative conversation lives in the Jarvis service.

/// Character count above which the draft counter is drawn as a warning.
pub const DRAFT_WARN_THRESHOLD: usize = 450;

pub const WELCOME_TITLE: &str = "Hello, I'm Jarvis";
pub const WELCOME_LINES: [&str; 2] = [
    "Your intelligent AI assistant powered by advanced language models and semantic search.",
    "I can help you with information about products, services, and answer your questions using my knowledge base.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

/// A chat message. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    text: String,
    sender: Sender,
    sources: Option<usize>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            sources: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Assistant,
            sources: None,
        }
    }

    pub fn with_sources(mut self, sources: Option<usize>) -> Self {
        self.sources = sources;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    /// Number of knowledge sources the server reported for this reply.
    pub fn sources(&self) -> Option<usize> {
        self.sources
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaceholderId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Welcome,
    Message(Message),
    Typing(PlaceholderId),
}

/// Ordered conversation entries, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationView {
    entries: Vec<Entry>,
    next_placeholder: u64,
}

impl Default for ConversationView {
    fn default() -> Self {
        Self::welcome()
    }
}

impl ConversationView {
    /// The empty conversation: only the welcome block.
    pub fn welcome() -> Self {
        Self {
            entries: vec![Entry::Welcome],
            next_placeholder: 0,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Message(message) => Some(message),
            _ => None,
        })
    }

    pub fn is_welcome_state(&self) -> bool {
        self.entries == [Entry::Welcome]
    }

    pub fn has_placeholder(&self) -> bool {
        self.entries.iter().any(|e| matches!(e, Entry::Typing(_)))
    }

    pub fn remove_welcome(&mut self) {
        self.entries.retain(|e| !matches!(e, Entry::Welcome));
    }

    pub fn push(&mut self, message: Message) {
        self.entries.push(Entry::Message(message));
    }

    pub fn show_placeholder(&mut self) -> PlaceholderId {
        let id = PlaceholderId(self.next_placeholder);
        self.next_placeholder += 1;
        self.entries.push(Entry::Typing(id));
        id
    }

    /// Removing an id that is already gone is a no-op.
    pub fn remove_placeholder(&mut self, id: PlaceholderId) {
        self.entries.retain(|e| *e != Entry::Typing(id));
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.entries.push(Entry::Welcome);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Online,
    Error,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub kind: StatusKind,
    pub label: String,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            kind: StatusKind::Unknown,
            label: "Connecting...".to_string(),
        }
    }
}

impl SessionStatus {
    pub fn online(total_documents: u64) -> Self {
        Self {
            kind: StatusKind::Online,
            label: format!("Online • {} docs loaded", total_documents),
        }
    }

    pub fn error(label: &str) -> Self {
        Self {
            kind: StatusKind::Error,
            label: label.to_string(),
        }
    }
}

/// Unsent input text and its character count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    text: String,
    char_count: usize,
}

impl Draft {
    pub fn set(&mut self, text: String) {
        // Unicode scalar count, not bytes
        self.char_count = text.chars().count();
        self.text = text;
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.char_count = 0;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_count(&self) -> usize {
        self.char_count
    }

    pub fn is_over_threshold(&self) -> bool {
        self.char_count > DRAFT_WARN_THRESHOLD
    }
}
