//! CLI module for Backgrounder
//!
//! `check` starts a background check on the server and follows its event
//! stream; `replay` feeds a captured stream from disk through the same
//! session; `config` shows the resolved settings.

pub mod check;
pub mod config;
pub mod error;
pub mod output;
pub mod progress;
pub mod replay;

use crate::cli::error::HelpfulError;
use crate::cli::progress::TerminalSink;
use anyhow::Context;
use backgrounder_stream::{CancellationToken, SessionOutcome};
use std::fmt;
use tracing::{info, warn};

/// The user interrupted a running session.
#[derive(Debug)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for Interrupted {}

pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

/// Cancel `token` on the first Ctrl-C.
pub(crate) fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, cancelling session");
                token.cancel();
            }
            Err(err) => warn!("Failed to listen for Ctrl-C: {}", err),
        }
    });
}

/// Turn a finished session into command output.
pub(crate) fn finish_session(
    outcome: SessionOutcome,
    mut sink: TerminalSink,
    json: bool,
) -> anyhow::Result<()> {
    match outcome {
        SessionOutcome::Completed => match sink.take_report() {
            Some(report) => output::print_report(&report, json),
            None => anyhow::bail!("Session completed without a report"),
        },
        SessionOutcome::Failed => match sink.error() {
            Some(error) => Err(HelpfulError::session_failed(error).into()),
            None => anyhow::bail!("Session failed without an error"),
        },
        SessionOutcome::Cancelled => {
            sink.clear();
            Err(Interrupted.into())
        }
    }
}
