//! The chat session core.
//!
//! `ChatClient` owns everything the chat surface shows (conversation, status,
//! draft, in-flight flag, pending notice) and converts every API failure into
//! something user-visible. It never touches a terminal, so both the TUI and
//! the scripted CLI drive it the same way.

use async_trait::async_trait;

use crate::api::{ChatApi, ChatReply, HealthReport};
use crate::error::ApiError;
use crate::state::{ConversationView, Draft, Message, PlaceholderId, SessionStatus};

pub const FALLBACK_REPLY: &str =
    "Sorry, I encountered an error. Please make sure the backend server is running.";
pub const CLEAR_HISTORY_PROMPT: &str = "Are you sure you want to clear the conversation history?";
pub const CLEAR_HISTORY_FAILED: &str = "Failed to clear history";

/// Yes/no confirmation supplied by whatever surface is driving the client.
#[async_trait]
pub trait Confirm: Send {
    async fn confirm(&mut self, prompt: &str) -> bool;
}

/// A confirmation whose answer is already known, e.g. from a modal the user
/// has just answered or from `--yes`.
#[derive(Debug, Clone, Copy)]
pub struct Answered(pub bool);

#[async_trait]
impl Confirm for Answered {
    async fn confirm(&mut self, _prompt: &str) -> bool {
        self.0
    }
}

/// Ticket for a submission that has been started but not resolved.
#[derive(Debug)]
pub struct PendingChat {
    message: String,
    placeholder: PlaceholderId,
}

impl PendingChat {
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    Replied,
    Failed,
}

#[derive(Debug)]
pub enum ClearOutcome {
    Cancelled,
    Cleared,
    Failed(ApiError),
}

#[derive(Debug, Default)]
pub struct ChatClient {
    conversation: ConversationView,
    status: SessionStatus,
    draft: Draft,
    in_flight: bool,
    focus_requested: bool,
    notice: Option<String>,
}

impl ChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> &ConversationView {
        &self.conversation
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// The send control is enabled exactly while nothing is in flight.
    pub fn send_enabled(&self) -> bool {
        !self.in_flight
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Returns true once after a submission resolves.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    pub async fn probe_health(&mut self, api: &dyn ChatApi) {
        let result = api.health().await;
        self.apply_health(result);
    }

    pub fn apply_health(&mut self, result: Result<HealthReport, ApiError>) {
        self.status = match result {
            Ok(report) if report.is_healthy() => SessionStatus::online(report.stats.total_documents),
            Ok(report) => {
                tracing::warn!(status = %report.status, "health check reported unhealthy server");
                SessionStatus::error("Server Error")
            }
            Err(err) if err.is_transport() => {
                tracing::warn!(error = %err, "health check failed");
                SessionStatus::error("Offline")
            }
            Err(err) => {
                tracing::warn!(error = %err, "health check failed");
                SessionStatus::error("Server Error")
            }
        };
        tracing::info!(label = %self.status.label, "session status updated");
    }

    pub fn update_draft(&mut self, text: String) {
        self.draft.set(text);
    }

    /// First half of a submission: everything that happens before the request
    /// leaves. Returns `None` for blank input or while another request is in
    /// flight, in which case nothing has changed.
    pub fn begin_submit(&mut self, draft_text: &str) -> Option<PendingChat> {
        let message = draft_text.trim();
        if message.is_empty() || self.in_flight {
            return None;
        }
        let message = message.to_string();

        self.draft.clear();
        self.conversation.remove_welcome();
        self.conversation.push(Message::user(message.clone()));
        let placeholder = self.conversation.show_placeholder();
        self.in_flight = true;

        tracing::debug!(chars = message.chars().count(), "chat request started");
        Some(PendingChat {
            message,
            placeholder,
        })
    }

    /// Second half of a submission. Runs on every exit edge; the in-flight
    /// flag is always cleared here.
    pub fn complete_submit(
        &mut self,
        pending: PendingChat,
        outcome: Result<ChatReply, ApiError>,
    ) -> ChatOutcome {
        self.conversation.remove_placeholder(pending.placeholder);

        let result = match outcome {
            Ok(reply) => {
                self.conversation
                    .push(Message::assistant(reply.response).with_sources(reply.num_sources));
                ChatOutcome::Replied
            }
            Err(err) => {
                tracing::error!(error = %err, "error sending message");
                self.conversation.push(Message::assistant(FALLBACK_REPLY));
                ChatOutcome::Failed
            }
        };

        self.in_flight = false;
        self.focus_requested = true;
        result
    }

    /// Full submission, awaiting the request inline.
    pub async fn submit(&mut self, api: &dyn ChatApi, draft_text: &str) -> Option<ChatOutcome> {
        let pending = self.begin_submit(draft_text)?;
        let outcome = api.chat(pending.message()).await;
        Some(self.complete_submit(pending, outcome))
    }

    pub async fn clear_history(
        &mut self,
        api: &dyn ChatApi,
        confirm: &mut dyn Confirm,
    ) -> ClearOutcome {
        if !confirm.confirm(CLEAR_HISTORY_PROMPT).await {
            return ClearOutcome::Cancelled;
        }
        let result = api.clear_history().await;
        self.apply_clear(result)
    }

    /// Apply the result of a confirmed `/clear-history` request. The view is
    /// only reset on success; any failure leaves it untouched and raises the
    /// notice.
    pub fn apply_clear(&mut self, result: Result<(), ApiError>) -> ClearOutcome {
        match result {
            Ok(()) => {
                self.conversation.reset();
                tracing::info!("conversation history cleared");
                ClearOutcome::Cleared
            }
            Err(err) => {
                tracing::error!(error = %err, "error clearing history");
                self.notice = Some(CLEAR_HISTORY_FAILED.to_string());
                ClearOutcome::Failed(err)
            }
        }
    }
}
