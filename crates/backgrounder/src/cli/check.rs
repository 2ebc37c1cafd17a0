//! Start a background check and follow its event stream.
//!
//! The request is a multipart form. Uploads are validated locally against
//! the same limits the server enforces so an oversized file fails fast.
//! A non-2xx response never opens a stream; it is reported through the
//! session as a rejection.

use crate::cli::config::{validate_provider, ClientConfig};
use crate::cli::error::HelpfulError;
use crate::cli::progress::TerminalSink;
use crate::cli::{cancel_on_ctrl_c, finish_session, runtime};
use backgrounder_stream::{CancellationToken, ReportSink, SessionError, SessionOutcome, StreamSession};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Arguments for the check command
#[derive(Debug, clap::Args)]
pub struct CheckArgs {
    /// Full name of the person to check
    pub name: String,

    /// Current or most recent employer
    #[arg(long)]
    pub company: Option<String>,

    /// Job title
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    /// LinkedIn profile URL, skips the profile search
    #[arg(long)]
    pub linkedin_url: Option<String>,

    /// LinkedIn provider (serpapi, playwright, proxycurl, rapidapi)
    #[arg(long)]
    pub provider: Option<String>,

    /// Hosted photo for reverse image search
    #[arg(long)]
    pub photo_url: Option<String>,

    /// Resume file (PDF, DOCX or text)
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// Photo file for reverse image search
    #[arg(long)]
    pub photo: Option<PathBuf>,

    /// Server base URL (overrides config and BACKGROUNDER_SERVER)
    #[arg(long)]
    pub server: Option<String>,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// A file attached to the request.
#[derive(Debug)]
pub struct Upload {
    pub field: &'static str,
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// Validated contents of one check request.
#[derive(Debug)]
pub struct CheckRequest {
    pub fields: Vec<(&'static str, String)>,
    pub uploads: Vec<Upload>,
}

impl CheckRequest {
    /// Validate arguments and read uploads. Blank text fields are omitted.
    pub fn build(args: &CheckArgs, config: &ClientConfig) -> Result<Self, HelpfulError> {
        if args.name.trim().is_empty() {
            return Err(HelpfulError::new("Name is required")
                .with_suggestion("TRY: backgrounder check \"Jane Doe\" --company Acme"));
        }

        let provider = match args.provider.as_deref().or(config.provider.as_deref()) {
            Some(raw) => Some(validate_provider(raw)?),
            None => None,
        };

        let optional = [
            ("company", args.company.clone()),
            ("title", args.title.clone()),
            ("location", args.location.clone()),
            ("linkedin_url", args.linkedin_url.clone()),
            ("provider", provider),
            ("photo_url", args.photo_url.clone()),
        ];
        let mut fields = vec![("name", args.name.trim().to_string())];
        fields.extend(optional.into_iter().filter_map(|(key, value)| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        }));

        let mut uploads = Vec::new();
        if let Some(path) = &args.resume {
            uploads.push(read_upload("resume", "Resume", path, config.max_resume_bytes)?);
        }
        if let Some(path) = &args.photo {
            uploads.push(read_upload("photo", "Photo", path, config.max_photo_bytes)?);
        }

        Ok(Self { fields, uploads })
    }

    pub fn into_form(self) -> anyhow::Result<Form> {
        let mut form = Form::new();
        for (key, value) in self.fields {
            form = form.text(key, value);
        }
        for upload in self.uploads {
            let part = Part::bytes(upload.bytes)
                .file_name(upload.file_name)
                .mime_str(upload.mime)?;
            form = form.part(upload.field, part);
        }
        Ok(form)
    }
}

fn read_upload(
    field: &'static str,
    kind: &str,
    path: &Path,
    limit: u64,
) -> Result<Upload, HelpfulError> {
    let metadata = std::fs::metadata(path).map_err(|_| HelpfulError::file_not_found(path))?;
    if metadata.len() > limit {
        return Err(HelpfulError::upload_too_large(kind, path, metadata.len(), limit));
    }
    let bytes =
        std::fs::read(path).map_err(|e| HelpfulError::cannot_read_file(path, &e.to_string()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| field.to_string());
    Ok(Upload {
        field,
        mime: mime_for(path),
        file_name,
        bytes,
    })
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" | "md" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Pull the human-readable part out of an error body (`{"detail": ...}`).
fn rejection_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let mut config = ClientConfig::resolve()?;
    if let Some(server) = &args.server {
        config.server_url = server.clone();
    }
    let request = CheckRequest::build(&args, &config)?;

    let rt = runtime()?;
    let (outcome, sink) = rt.block_on(async {
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(cancel.clone());
        let mut sink = TerminalSink::new(args.json);
        let outcome = stream_check(request, &config, &mut sink, cancel).await;
        (outcome, sink)
    });

    match outcome {
        Ok(outcome) => finish_session(outcome, sink, args.json),
        Err(err) => {
            sink.clear();
            Err(err)
        }
    }
}

/// Send the request and run a session over the response body.
pub async fn stream_check<K: ReportSink>(
    request: CheckRequest,
    config: &ClientConfig,
    sink: K,
    cancel: CancellationToken,
) -> anyhow::Result<SessionOutcome> {
    let url = config.check_url();
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()?;
    let mut session = StreamSession::with_cancellation(sink, cancel.clone());

    info!(url = %url, uploads = request.uploads.len(), "Submitting check");
    let send = client.post(&url).multipart(request.into_form()?).send();
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(SessionOutcome::Cancelled),
        response = send => response.map_err(|e| HelpfulError::server_unreachable(&url, &e.to_string()))?,
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %body, "Check rejected");
        return Ok(session.fail(SessionError::Rejected {
            status: status.as_u16(),
            message: rejection_message(&body),
        }));
    }

    Ok(session.run(Box::pin(response.bytes_stream())).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(name: &str) -> CheckArgs {
        CheckArgs {
            name: name.to_string(),
            company: None,
            title: None,
            location: None,
            linkedin_url: None,
            provider: None,
            photo_url: None,
            resume: None,
            photo: None,
            server: None,
            json: false,
        }
    }

    #[test]
    fn test_blank_fields_are_omitted() {
        let mut a = args(" Jane Doe ");
        a.company = Some("Acme".to_string());
        a.title = Some("   ".to_string());
        let request = CheckRequest::build(&a, &ClientConfig::default()).unwrap();
        assert_eq!(
            request.fields,
            vec![("name", "Jane Doe".to_string()), ("company", "Acme".to_string())]
        );
        assert!(request.uploads.is_empty());
    }

    #[test]
    fn test_provider_falls_back_to_config() {
        let config = ClientConfig {
            provider: Some("Proxycurl".to_string()),
            ..ClientConfig::default()
        };
        let request = CheckRequest::build(&args("Jane"), &config).unwrap();
        assert!(request.fields.contains(&("provider", "proxycurl".to_string())));

        let mut a = args("Jane");
        a.provider = Some("crawler".to_string());
        assert!(CheckRequest::build(&a, &config).is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(CheckRequest::build(&args("  "), &ClientConfig::default()).is_err());
    }

    #[test]
    fn test_oversized_upload_rejected_locally() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("me.png");
        std::fs::write(&photo, vec![0u8; 2048]).unwrap();

        let config = ClientConfig {
            max_photo_bytes: 1024,
            ..ClientConfig::default()
        };
        let mut a = args("Jane");
        a.photo = Some(photo);
        let err = CheckRequest::build(&a, &config).unwrap_err();
        assert!(err.message.starts_with("Photo too large"));
    }

    #[test]
    fn test_uploads_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let resume = dir.path().join("cv.PDF");
        std::fs::write(&resume, b"%PDF-1.4").unwrap();

        let mut a = args("Jane");
        a.resume = Some(resume);
        let request = CheckRequest::build(&a, &ClientConfig::default()).unwrap();
        let upload = &request.uploads[0];
        assert_eq!(upload.field, "resume");
        assert_eq!(upload.file_name, "cv.PDF");
        assert_eq!(upload.mime, "application/pdf");
        assert_eq!(upload.bytes, b"%PDF-1.4");
        assert!(request.into_form().is_ok());
    }

    #[test]
    fn test_missing_upload() {
        let mut a = args("Jane");
        a.resume = Some(PathBuf::from("/nonexistent/cv.pdf"));
        let err = CheckRequest::build(&a, &ClientConfig::default()).unwrap_err();
        assert!(err.message.contains("File not found"));
    }

    #[test]
    fn test_rejection_message() {
        assert_eq!(
            rejection_message("{\"detail\": \"Resume file too large (max 10MB)\"}"),
            "Resume file too large (max 10MB)"
        );
        assert_eq!(rejection_message(" Bad Gateway \n"), "Bad Gateway");
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let config = ClientConfig {
            server_url: "http://127.0.0.1:9".to_string(),
            ..ClientConfig::default()
        };
        let request = CheckRequest::build(&args("Jane"), &config).unwrap();
        let mut sink = TerminalSink::new(true);
        let outcome = stream_check(request, &config, &mut sink, cancel).await.unwrap();
        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert!(sink.error().is_none());
    }
}
