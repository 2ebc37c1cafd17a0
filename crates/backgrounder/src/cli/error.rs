//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use crate::cli::config::KNOWN_PROVIDERS;
use crate::cli::output::format_size;
use backgrounder_stream::SessionError;
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_context("The specified file does not exist")
            .with_suggestions([
                format!("TRY: Check if the file exists: ls -la {}", path.display()),
                format!(
                    "TRY: Look for similar files: ls {}",
                    path.parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| ".".to_string())
                ),
            ])
    }

    pub fn cannot_read_file(path: &Path, reason: &str) -> Self {
        Self::new(format!("Cannot read file: {}", path.display()))
            .with_context(reason.to_string())
            .with_suggestions([
                format!("TRY: Check file permissions: ls -la {}", path.display()),
                "TRY: Ensure the file is not open in another program".to_string(),
            ])
    }

    /// Upload exceeds the limit the server enforces
    pub fn upload_too_large(kind: &str, path: &Path, size: u64, limit: u64) -> Self {
        Self::new(format!(
            "{} too large: {} ({}, max {})",
            kind,
            path.display(),
            format_size(size),
            format_size(limit)
        ))
        .with_context("The server rejects uploads over this size")
        .with_suggestions([
            format!("TRY: Compress or trim the {} before uploading", kind.to_lowercase()),
            "TRY: Pass --photo-url instead of --photo for hosted images".to_string(),
        ])
    }

    pub fn unknown_provider(name: &str) -> Self {
        Self::new(format!("Unknown LinkedIn provider: '{}'", name))
            .with_context("The server only knows a fixed set of providers")
            .with_suggestions([
                format!("TRY: Use one of: {}", KNOWN_PROVIDERS.join(", ")),
                "TRY: Omit --provider to use the server default".to_string(),
            ])
    }

    pub fn server_unreachable(url: &str, reason: &str) -> Self {
        Self::new(format!("Cannot reach check server: {}", url))
            .with_context(reason.to_string())
            .with_suggestions([
                "TRY: Start the server and retry".to_string(),
                "TRY: Point at another server: --server URL or BACKGROUNDER_SERVER".to_string(),
                "TRY: Show the resolved server URL: backgrounder config".to_string(),
            ])
    }

    /// Terminal session failure, phrased for the person at the terminal
    pub fn session_failed(error: &SessionError) -> Self {
        let err = Self::new(error.user_message()).with_context(error.to_string());
        match error {
            SessionError::Rejected { status: 413, .. } => {
                err.with_suggestion("TRY: Upload a smaller resume or photo")
            }
            SessionError::Rejected { .. } => {
                err.with_suggestion("TRY: Check the server logs for the rejected request")
            }
            SessionError::Transport(_) | SessionError::Incomplete { .. } => err.with_suggestions([
                "TRY: Retry the check; the server may have restarted".to_string(),
                "TRY: Re-run with --verbose to see each received event".to_string(),
            ]),
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Print an error as a JSON object on stdout, for `--json` callers.
pub fn print_json_error(err: &anyhow::Error) {
    let value = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({
            "error": helpful.message,
            "context": helpful.context,
            "suggestions": helpful.suggestions,
        }),
        None => serde_json::json!({
            "error": err.to_string(),
            "context": err.chain().skip(1).map(|e| e.to_string()).collect::<Vec<_>>(),
        }),
    };
    println!("{}", value);
}
