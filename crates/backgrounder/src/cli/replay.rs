//! Replay a captured event stream from disk.
//!
//! The file holds the raw response body of a check. It is fed through a
//! regular session in fixed-size chunks, which makes it handy for checking
//! how a given capture renders without a running server.

use crate::cli::error::HelpfulError;
use crate::cli::progress::TerminalSink;
use crate::cli::{cancel_on_ctrl_c, finish_session, runtime};
use backgrounder_stream::{CancellationToken, ReportSink, SessionOutcome, StreamSession};
use futures::stream;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use tracing::info;

/// Arguments for the replay command
#[derive(Debug, clap::Args)]
pub struct ReplayArgs {
    /// Captured event stream (raw response body)
    pub file: PathBuf,

    /// Bytes delivered per chunk
    #[arg(long, default_value = "4096", value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: u64,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ReplayArgs) -> anyhow::Result<()> {
    let bytes = read_capture(&args.file)?;
    let chunk_size = usize::try_from(args.chunk_size).unwrap_or(usize::MAX);
    info!(
        file = %args.file.display(),
        bytes = bytes.len(),
        chunk_size,
        "Replaying captured stream"
    );

    let rt = runtime()?;
    let (outcome, sink) = rt.block_on(async {
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(cancel.clone());
        let mut sink = TerminalSink::new(args.json);
        let outcome = replay_bytes(&bytes, chunk_size, &mut sink, cancel).await;
        (outcome, sink)
    });

    finish_session(outcome, sink, args.json)
}

/// Feed `bytes` through a session, `chunk_size` bytes at a time.
pub async fn replay_bytes<K: ReportSink>(
    bytes: &[u8],
    chunk_size: usize,
    sink: K,
    cancel: CancellationToken,
) -> SessionOutcome {
    let chunks: Vec<Result<&[u8], Infallible>> = bytes.chunks(chunk_size.max(1)).map(Ok).collect();
    StreamSession::with_cancellation(sink, cancel)
        .run(stream::iter(chunks))
        .await
}

fn read_capture(path: &Path) -> Result<Vec<u8>, HelpfulError> {
    if !path.exists() {
        return Err(HelpfulError::file_not_found(path));
    }
    std::fs::read(path).map_err(|e| HelpfulError::cannot_read_file(path, &e.to_string()))
}
