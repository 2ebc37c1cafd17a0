//! Stream session: one check request, one transport, one sink.
//!
//! The session owns the frame buffer and the task registry. It suspends
//! only while waiting for the next chunk; parsing and state updates run
//! synchronously on the chunk in hand, so [`StreamSession::feed`] can be
//! driven directly by hosts that own their own read loop.
//!
//! Sink callbacks fire in stream order:
//!
//! ```text
//! on_progress* -> on_progress(100%) -> on_report      (completed)
//! on_progress* -> on_error                            (transport failure)
//! on_progress*                                        (cancelled)
//! ```

use crate::cancel::CancellationToken;
use crate::error::SessionError;
use crate::event::{decode, StreamEvent};
use crate::frame::FrameParser;
use crate::tracker::{ProgressState, ProgressTracker};
use crate::view::{materialize, ReportViewModel};
use futures::{Stream, StreamExt};
use std::fmt::Display;
use tracing::{debug, error, info, warn};

/// Receiver of session output. Implemented by rendering hosts.
pub trait ReportSink {
    /// Latest progress snapshot; earlier snapshots may be discarded.
    fn on_progress(&mut self, state: &ProgressState);

    /// Final view model. Called at most once, always last.
    fn on_report(&mut self, report: ReportViewModel);

    /// Terminal failure. No report follows.
    fn on_error(&mut self, error: &SessionError);
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    fn on_progress(&mut self, state: &ProgressState) {
        (**self).on_progress(state)
    }

    fn on_report(&mut self, report: ReportViewModel) {
        (**self).on_report(report)
    }

    fn on_error(&mut self, error: &SessionError) {
        (**self).on_error(error)
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Report delivered.
    Completed,
    /// Aborted by the caller; nothing further was emitted.
    Cancelled,
    /// A terminal error was delivered to the sink.
    Failed,
}

pub struct StreamSession<K: ReportSink> {
    parser: FrameParser,
    tracker: ProgressTracker,
    sink: K,
    cancel: CancellationToken,
    /// Records pulled off the wire, including dropped ones.
    records: usize,
    reported: bool,
}

impl<K: ReportSink> StreamSession<K> {
    pub fn new(sink: K) -> Self {
        Self::with_cancellation(sink, CancellationToken::new())
    }

    pub fn with_cancellation(sink: K, cancel: CancellationToken) -> Self {
        Self {
            parser: FrameParser::new(),
            tracker: ProgressTracker::new(),
            sink,
            cancel,
            records: 0,
            reported: false,
        }
    }

    /// Handle that aborts this session when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> ProgressState {
        self.tracker.snapshot()
    }

    pub fn is_complete(&self) -> bool {
        self.reported
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Process one chunk of the response body.
    ///
    /// Returns `true` once the report has been delivered; later chunks are
    /// ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        if self.reported || self.cancel.is_cancelled() {
            return self.reported;
        }
        self.parser.push(chunk);

        while let Some(record) = self.parser.next_record() {
            if self.cancel.is_cancelled() {
                return false;
            }
            self.records += 1;
            let Some(event) = decode(&record) else {
                continue;
            };
            match event {
                StreamEvent::Status(status) => {
                    if self.tracker.apply(&status) {
                        self.sink.on_progress(&self.tracker.snapshot());
                    }
                }
                StreamEvent::Result(report) => {
                    let last = self.tracker.finish();
                    self.sink.on_progress(&last);
                    self.sink.on_report(materialize(*report));
                    self.reported = true;
                    let trailing = self.parser.pending_bytes();
                    if trailing > 0 {
                        debug!(bytes = trailing, "Ignoring data after result event");
                    }
                    info!(records = self.records, "Report delivered");
                    return true;
                }
            }
        }
        false
    }

    /// The transport closed. Fails the session unless the report arrived.
    pub fn end_of_stream(&mut self) -> SessionOutcome {
        if self.reported {
            return SessionOutcome::Completed;
        }
        if self.cancel.is_cancelled() {
            return SessionOutcome::Cancelled;
        }
        std::mem::take(&mut self.parser).finish();
        self.fail(SessionError::Incomplete {
            records: self.records,
        })
    }

    /// Deliver a terminal error, unless the caller already aborted.
    pub fn fail(&mut self, error: SessionError) -> SessionOutcome {
        if self.cancel.is_cancelled() {
            return SessionOutcome::Cancelled;
        }
        if self.reported {
            warn!(error = %error, "Ignoring error after report");
            return SessionOutcome::Completed;
        }
        error!(error = %error, "Stream session failed");
        self.sink.on_error(&error);
        SessionOutcome::Failed
    }

    /// Drive the session over a byte stream until the report, a terminal
    /// error, or cancellation. The transport is dropped on return.
    pub async fn run<T, B, E>(mut self, mut transport: T) -> SessionOutcome
    where
        T: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Display,
    {
        let cancel = self.cancel.clone();
        info!("Stream session opened");

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(records = self.records, "Stream session cancelled");
                    return SessionOutcome::Cancelled;
                }
                next = transport.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    if self.feed(chunk.as_ref()) {
                        return SessionOutcome::Completed;
                    }
                    if cancel.is_cancelled() {
                        info!(records = self.records, "Stream session cancelled");
                        return SessionOutcome::Cancelled;
                    }
                }
                Some(Err(err)) => return self.fail(SessionError::Transport(err.to_string())),
                None => return self.end_of_stream(),
            }
        }
    }
}

/// Open a session over an established byte stream and run it to the end.
pub async fn open<T, B, E, K>(transport: T, sink: K, cancel: CancellationToken) -> SessionOutcome
where
    T: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
    K: ReportSink,
{
    StreamSession::with_cancellation(sink, cancel).run(transport).await
}

/// Sink that only logs. Useful for headless hosts.
#[derive(Debug, Default)]
pub struct TracingSink {
    last_percent: Option<u8>,
}

impl ReportSink for TracingSink {
    fn on_progress(&mut self, state: &ProgressState) {
        if self.last_percent != Some(state.percent) {
            info!(percent = state.percent, status = %state.status_text, "Progress");
            self.last_percent = Some(state.percent);
        } else {
            debug!(percent = state.percent, status = %state.status_text, "Progress");
        }
    }

    fn on_report(&mut self, report: ReportViewModel) {
        info!(
            name = %report.name,
            sections = ?report.visible_sections(),
            "Report ready"
        );
    }

    fn on_error(&mut self, error: &SessionError) {
        error!(error = %error, "{}", error.user_message());
    }
}
