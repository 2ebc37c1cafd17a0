//! Error taxonomy for stream sessions.
//!
//! Only [`SessionError`] ever leaves a session. Frame-level failures
//! ([`DecodeError`]) are logged and swallowed by the session loop.

use thiserror::Error;

/// Terminal failure of a stream session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The request failed before any event was streamed.
    #[error("Check request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Reading the transport failed mid-stream.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The stream closed before the result event arrived.
    #[error("Stream ended without a report after {records} events")]
    Incomplete { records: usize },
}

impl SessionError {
    /// One line suitable for replacing a loading indicator.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Rejected { status, message } if message.is_empty() => {
                format!("The server rejected the check (HTTP {}).", status)
            }
            SessionError::Rejected { status, message } => {
                format!("The server rejected the check (HTTP {}): {}", status, message)
            }
            SessionError::Transport(reason) => {
                format!("Lost connection to the server: {}", reason)
            }
            SessionError::Incomplete { .. } => {
                "The server closed the stream before the report was ready.".to_string()
            }
        }
    }
}

/// Failure to turn one raw record into a typed event.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed JSON in '{event_type}' event: {source}")]
    Json {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unhandled event type: {0}")]
    UnknownType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_rejected() {
        let err = SessionError::Rejected {
            status: 413,
            message: "Resume file too large (max 10MB)".to_string(),
        };
        assert!(err.user_message().contains("413"));
        assert!(err.user_message().contains("Resume file too large"));

        let bare = SessionError::Rejected {
            status: 500,
            message: String::new(),
        };
        assert!(bare.user_message().ends_with("(HTTP 500)."));
    }

    #[test]
    fn test_user_message_incomplete() {
        let err = SessionError::Incomplete { records: 7 };
        assert!(err.to_string().contains("7 events"));
        assert!(err.user_message().contains("before the report was ready"));
    }
}
