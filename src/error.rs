use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the Jarvis API.
///
/// The chat surface treats every variant the same way ("the service is
/// unavailable"); the distinction only matters for the health label and for
/// CLI diagnostics.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, DNS or timeout failure before a response arrived.
    #[error("could not reach the Jarvis API: {0}")]
    Transport(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Jarvis API returned {status}{}", server_detail(.message))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    /// The response body was not the expected JSON shape.
    #[error("unexpected response from the Jarvis API: {0}")]
    Decode(#[source] reqwest::Error),

    /// The background task running the request was cancelled or panicked.
    #[error("request task aborted: {0}")]
    Aborted(String),
}

fn server_detail(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default()
}

impl ApiError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err)
        } else {
            ApiError::Transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_includes_server_message() {
        let err = ApiError::Status {
            status: StatusCode::BAD_REQUEST,
            message: Some("Message cannot be empty".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Jarvis API returned 400 Bad Request: Message cannot be empty"
        );
        assert!(!err.is_transport());
    }

    #[test]
    fn test_status_display_without_message() {
        let err = ApiError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: None,
        };
        assert_eq!(err.to_string(), "Jarvis API returned 500 Internal Server Error");
    }
}
